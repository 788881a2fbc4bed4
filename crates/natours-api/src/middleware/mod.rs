//! HTTP middleware shared by every route

pub mod rate_limit;
pub mod security_headers;

pub use rate_limit::{limited, rate_limit_envelope};
pub use security_headers::{security_headers_middleware, SecurityHeaders};
