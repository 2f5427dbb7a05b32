//! Dashboard REST API client.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument};

/// REST API failures.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },
}

#[derive(Serialize)]
struct NewProject<'a> {
    title: &'a str,
    description: &'a str,
    status: &'static str,
}

/// Client for the dashboard's project endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Client rooted at `base_url` (e.g. `http://localhost:3002`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Client using a preconfigured `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url }
    }

    /// Create a `todo` project and return the record the API sends back.
    #[instrument(skip(self, description), fields(base_url = %self.base_url))]
    pub async fn create_task(&self, title: &str, description: &str) -> Result<Value, ApiError> {
        let url = format!("{}/api/projects", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&NewProject {
                title,
                description,
                status: "todo",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let created: Value = response.json().await?;
        let id = created.get("id").unwrap_or(&serde_json::Value::Null);
        info!(id = %id, "task created");
        Ok(created)
    }
}
