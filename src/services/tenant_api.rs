//! Platform tenant API client
//!
//! Resolves tenant codes and user profiles against the platform's central
//! API. Calls are made on behalf of the authenticated user, forwarding their
//! bearer token, so tenant access control stays with the platform.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::TenantApiConfig;
use crate::utils::error::AppError;

/// Tenant record as returned by the platform API
#[derive(Debug, Clone, Deserialize)]
pub struct TenantInfo {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// User profile as returned by the platform API
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Clone)]
pub struct TenantApiClient {
    client: Client,
    base_url: String,
}

impl TenantApiClient {
    pub fn new(config: &TenantApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build tenant API client")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve a tenant by code. The platform returns 404 for tenants the
    /// caller cannot see, so an unknown code and a forbidden one look alike.
    pub async fn get_tenant_info(&self, tenant_code: &str, token: &str) -> Result<TenantInfo, AppError> {
        let url = format!("{}/api/v1/tenants/{}/info", self.base_url, tenant_code);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::TenantApi(format!("Failed to reach tenant API: {}", e)))?;

        match response.status() {
            status if status.is_success() => response
                .json::<TenantInfo>()
                .await
                .map_err(|e| AppError::TenantApi(format!("Invalid tenant API response: {}", e))),
            reqwest::StatusCode::NOT_FOUND => Err(AppError::NotFound(format!(
                "Tenant not found: {}",
                tenant_code
            ))),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(AppError::Forbidden("Tenant access denied".to_string()))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AppError::Upstream {
                    status,
                    message: format!("Tenant API error: {}", body),
                })
            }
        }
    }

    /// Fetch the profile of the given user, mainly for their timezone
    pub async fn get_user_profile(&self, email: &str, token: &str) -> Result<UserProfile, AppError> {
        let url = format!("{}/api/v1/user-profiles/email/{}", self.base_url, email);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::TenantApi(format!("Failed to reach tenant API: {}", e)))?;

        match response.status() {
            status if status.is_success() => response
                .json::<UserProfile>()
                .await
                .map_err(|e| AppError::TenantApi(format!("Invalid profile response: {}", e))),
            reqwest::StatusCode::NOT_FOUND => {
                Err(AppError::NotFound(format!("User not found: {}", email)))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AppError::Upstream {
                    status,
                    message: format!("Tenant API error: {}", body),
                })
            }
        }
    }
}
