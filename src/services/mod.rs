//! Business logic services

pub mod chart;
pub mod pdf;
pub mod publisher;
pub mod render;
pub mod report_service;
pub mod search;
pub mod storage;
pub mod tenant_api;

pub use publisher::EventPublisher;
pub use render::{RenderService, RenderedReport};
pub use report_service::ReportService;
pub use search::SearchClient;
pub use storage::ObjectStorageClient;
pub use tenant_api::{TenantApiClient, TenantInfo, UserProfile};
