//! Natours API Server

use anyhow::Context;
use natours_api::{create_router, state::AppState};
use natours_core::{AppConfig, AuthConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("NATOURS_CONFIG") {
        Ok(path) => AppConfig::from_file(&path)
            .with_context(|| format!("loading {path}"))?
            .with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "natours_api={0},natours_core={0},audit=info,tower_http=debug",
            config.logging.level
        ))
    });
    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config);

    if config.environment.is_production()
        && config.auth.jwt_secret == AuthConfig::default().jwt_secret
    {
        anyhow::bail!("JWT_SECRET must be set in production");
    }
    if config.environment.is_production() && config.server.public_host.is_none() {
        tracing::warn!("PUBLIC_HOST is not set, password reset links will point at localhost");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let bootstrap_admin = config.bootstrap_admin.clone();
    let state = Arc::new(AppState::in_memory(config));

    if let Some(admin) = bootstrap_admin {
        state
            .auth
            .bootstrap_admin(&admin)
            .await
            .context("creating bootstrap administrator")?;
    }

    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        environment = ?state.config.environment,
        "Natours API Server starting on http://{}",
        addr
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
