//! SIEM Reports Library
//!
//! This crate provides the core functionality for the analytics report
//! generation service: report registration and listing, PDF rendering,
//! and integration with the tenant API, message bus and blob storage.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;
pub use middleware::{auth_middleware, AuthUser, Claims};

use services::publisher::EventPublisher;
use services::search::SearchClient;
use services::storage::ObjectStorageClient;
use services::tenant_api::TenantApiClient;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
    /// Tenant API client (optional)
    pub tenant_api: Option<Arc<TenantApiClient>>,
    /// Message bus producer (optional)
    pub publisher: Option<Arc<EventPublisher>>,
    /// Blob storage client (optional)
    pub storage: Option<Arc<ObjectStorageClient>>,
    /// Search engine client (optional)
    pub search: Option<Arc<SearchClient>>,
}
