//! Search cluster client
//!
//! Queries the event search cluster for date-histogram aggregations used by
//! report charts. Only the aggregation buckets are requested, never the
//! documents themselves.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::NaiveDateTime;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::OpenSearchConfig;
use crate::services::chart::Bucket;
use crate::utils::error::AppError;
use crate::utils::timefmt::parse_db_timestamp;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    aggregations: Option<Aggregations>,
}

#[derive(Debug, Deserialize)]
struct Aggregations {
    events_over_time: HistogramAgg,
}

#[derive(Debug, Deserialize)]
struct HistogramAgg {
    buckets: Vec<HistogramBucket>,
}

#[derive(Debug, Deserialize)]
struct HistogramBucket {
    key_as_string: String,
    doc_count: i64,
}

#[derive(Clone)]
pub struct SearchClient {
    client: Client,
    url: String,
    index_pattern: String,
    auth_header: String,
}

impl SearchClient {
    pub fn new(config: &OpenSearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build search client")?;

        let credentials = BASE64.encode(format!("{}:{}", config.username, config.password));

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            index_pattern: config.index_pattern.clone(),
            auth_header: format!("Basic {}", credentials),
        })
    }

    /// Event counts per histogram bucket for the tenant over the period
    pub async fn event_histogram(
        &self,
        tenant_code: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        bucket: Bucket,
    ) -> Result<Vec<(NaiveDateTime, f64)>, AppError> {
        let url = format!("{}/{}/_search", self.url, self.index_pattern);
        let body = json!({
            "size": 0,
            "query": {
                "bool": {
                    "filter": [
                        { "term": { "tenant": tenant_code } },
                        { "range": { "@timestamp": {
                            "gte": start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                            "lte": end.format("%Y-%m-%dT%H:%M:%S").to_string(),
                        }}}
                    ]
                }
            },
            "aggs": {
                "events_over_time": {
                    "date_histogram": {
                        "field": "@timestamp",
                        "calendar_interval": bucket.calendar_interval(),
                        "min_doc_count": 0,
                    }
                }
            }
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.auth_header)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("Search cluster: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                status,
                message: format!("Search query failed: {}", text),
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("Invalid search response: {}", e)))?;

        let buckets = parsed
            .aggregations
            .map(|a| a.events_over_time.buckets)
            .unwrap_or_default();

        Ok(buckets
            .into_iter()
            .filter_map(|b| {
                let ts = parse_db_timestamp(&b.key_as_string)?.naive_utc();
                Some((ts, b.doc_count as f64))
            })
            .collect())
    }
}
