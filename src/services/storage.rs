//! Object storage client
//!
//! Uploads rendered PDF files to the platform blob store over its HTTP API.
//! Objects are keyed as `{environment}/REPORTS/{file_name}` inside the
//! configured bucket.

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::info;

use crate::config::ObjectStorageConfig;
use crate::utils::error::AppError;

#[derive(Clone)]
pub struct ObjectStorageClient {
    client: Client,
    endpoint: String,
    bucket: String,
    token: String,
    environment: String,
}

impl ObjectStorageClient {
    pub fn new(config: &ObjectStorageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build object storage client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            token: config.token.clone(),
            environment: config.environment.clone(),
        })
    }

    fn object_url(&self, file_name: &str) -> String {
        format!(
            "{}/{}/{}/REPORTS/{}",
            self.endpoint, self.bucket, self.environment, file_name
        )
    }

    /// Upload a rendered report, returning the object URL
    pub async fn upload_report(&self, file_name: &str, body: Vec<u8>) -> Result<String, AppError> {
        let url = self.object_url(file_name);
        let size = body.len();

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header("Content-Type", "application/pdf")
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("Object storage: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                status,
                message: format!("Object storage upload failed: {}", text),
            });
        }

        info!(object = %url, bytes = size, "Report uploaded");
        Ok(url)
    }
}
