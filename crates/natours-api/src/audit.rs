//! Security audit logging for authentication events
//!
//! Every event is emitted at INFO level with the "audit" target so it can be
//! filtered and routed separately from application logs. Events never carry
//! passwords, session tokens or reset tokens.
//!
//! ```ignore
//! use natours_api::audit::{audit_log, AuditEvent};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     user_id: user.id,
//!     email: user.email.clone(),
//!     ip_address: Some("192.168.1.1".to_string()),
//! });
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// New account created through signup
    Signup {
        user_id: Uuid,
        email: String,
        ip_address: Option<String>,
    },

    LoginSuccess {
        user_id: Uuid,
        email: String,
        ip_address: Option<String>,
    },

    /// Failed login; the reason is internal and never sent to the client
    LoginFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
    },

    Logout {
        ip_address: Option<String>,
    },

    PasswordChange {
        user_id: Uuid,
        ip_address: Option<String>,
    },

    /// Reset email handed to the mailer
    PasswordResetRequested {
        user_id: Uuid,
        email: String,
        ip_address: Option<String>,
    },

    PasswordResetCompleted {
        user_id: Uuid,
        ip_address: Option<String>,
    },

    /// Account deactivated by its owner
    AccountDeactivated {
        user_id: Uuid,
        ip_address: Option<String>,
    },

    AccessDenied {
        user_id: Uuid,
        role: String,
        resource: String,
        allowed_roles: Vec<String>,
        ip_address: Option<String>,
    },

    /// Missing, invalid, expired or superseded session token on a protected route
    InvalidToken {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::Signup { .. } => "User signed up",
            AuditEvent::LoginSuccess { .. } => "Login succeeded",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::Logout { .. } => "Logout",
            AuditEvent::PasswordChange { .. } => "Password changed",
            AuditEvent::PasswordResetRequested { .. } => "Password reset requested",
            AuditEvent::PasswordResetCompleted { .. } => "Password reset completed",
            AuditEvent::AccountDeactivated { .. } => "Account deactivated",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
        }
    }

    fn ip_address(&self) -> Option<&str> {
        match self {
            AuditEvent::Signup { ip_address, .. }
            | AuditEvent::LoginSuccess { ip_address, .. }
            | AuditEvent::LoginFailure { ip_address, .. }
            | AuditEvent::Logout { ip_address }
            | AuditEvent::PasswordChange { ip_address, .. }
            | AuditEvent::PasswordResetRequested { ip_address, .. }
            | AuditEvent::PasswordResetCompleted { ip_address, .. }
            | AuditEvent::AccountDeactivated { ip_address, .. }
            | AuditEvent::AccessDenied { ip_address, .. }
            | AuditEvent::InvalidToken { ip_address, .. } => ip_address.as_deref(),
        }
    }
}

/// Log a security audit event with structured fields
///
/// The whole event is attached as JSON under `event` for log aggregators.
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    info!(
        target: "audit",
        timestamp = %Utc::now(),
        event = %event_json,
        ip_address = ?event.ip_address(),
        "{}",
        event.summary()
    );
}

/// Client IP from `X-Forwarded-For` (first hop) or `X-Real-IP`
pub fn extract_ip_address(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(first_ip) = headers
        .get("x-forwarded-for")
        .and_then(|xff| xff.to_str().ok())
        .and_then(|xff| xff.split(',').next())
    {
        return Some(first_ip.trim().to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|ip| ip.to_str().ok())
        .map(|s| s.to_string())
}

pub fn extract_user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
