//! Application state management

use crate::auth::{
    AuthService, CredentialStore, DocumentCredentialStore, JwtConfig, PasswordConfig,
    PasswordResetFlow, TokenService,
};
use crate::mailer::{LogMailer, Mailer};
use natours_core::{AppConfig, DocumentStore, MemoryStore, ResourceFactory, ReviewService, Tour, User};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Backing document store
    pub store: Arc<dyn DocumentStore>,
    /// Session token signer/verifier
    pub tokens: TokenService,
    /// Identity lookups for authentication
    pub credentials: Arc<dyn CredentialStore>,
    pub auth: AuthService,
    pub reset: PasswordResetFlow,
    pub tours: ResourceFactory<Tour>,
    pub users: ResourceFactory<User>,
    pub reviews: ReviewService,
}

impl AppState {
    /// Wire every service on top of `store` and `mailer`
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>, mailer: Arc<dyn Mailer>) -> Self {
        let tokens = TokenService::new(&JwtConfig::from(&config.auth));
        let credentials: Arc<dyn CredentialStore> =
            Arc::new(DocumentCredentialStore::new(Arc::clone(&store)));

        let auth = AuthService::new(Arc::clone(&credentials), tokens.clone(), &config);
        let reset = PasswordResetFlow::new(
            Arc::clone(&credentials),
            mailer,
            tokens.clone(),
            PasswordConfig::from(&config.auth),
            config.auth.reset_token_ttl_mins,
        );

        Self {
            start_time: Instant::now(),
            tours: ResourceFactory::new(Arc::clone(&store)),
            users: ResourceFactory::new(Arc::clone(&store)),
            reviews: ReviewService::new(Arc::clone(&store)),
            store,
            tokens,
            credentials,
            auth,
            reset,
            config,
        }
    }

    /// In-process store with mail written to the log
    pub fn in_memory(config: AppConfig) -> Self {
        let mailer = Arc::new(LogMailer::new(config.email.from.clone()));
        Self::new(config, Arc::new(MemoryStore::new()), mailer)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
