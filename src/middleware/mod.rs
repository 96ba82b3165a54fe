//! HTTP middleware

pub mod auth;
pub mod rate_limit;

pub use auth::{auth_middleware, create_access_token, validate_token, AuthError, AuthUser, Claims};
pub use rate_limit::{
    api_rate_limit_config, rate_limit_middleware, spawn_rate_limit_cleanup, RateLimitConfig,
    RateLimitState,
};
