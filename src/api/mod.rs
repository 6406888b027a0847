use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::CACHE_CONTROL;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::constants::{MAX_REDIRECTS, NON_JSON_PREVIEW_CHARS};
use crate::models::tag::{DeregisterReceipt, SeedReceipt, TagsSnapshot};

/// Failures talking to the spreadsheet service. Every variant renders as
/// operator-readable status text.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },
    // Typically an auth redirect or an HTML error page instead of the
    // JSON envelope; the preview is what makes these diagnosable.
    #[error("Non-JSON response (auth / blocked / HTML): {preview}")]
    NonJson { preview: String },
    #[error("{message}")]
    Remote { message: String },
}

/// Client for the sheet-backed tag service. All operations are GET requests
/// against one endpoint, dispatched by an `action` query parameter.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            timeout,
        })
    }

    /// Perform one service call and unwrap the `{ok, ...}` envelope.
    ///
    /// Blank parameter values are sent as empty strings rather than
    /// omitted; the service distinguishes "absent" from "empty".
    pub async fn call(&self, action: &str, params: &[(&str, &str)]) -> Result<Value, ApiError> {
        let mut query: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 1);
        query.push(("action", action));
        query.extend_from_slice(params);

        debug!("🔍 Tag service call: action={}", action);

        let response = self
            .http
            .get(&self.base_url)
            .header(CACHE_CONTROL, "no-store")
            .query(&query)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        let json: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(_) => {
                return Err(ApiError::NonJson {
                    preview: body.chars().take(NON_JSON_PREVIEW_CHARS).collect(),
                })
            }
        };

        if !truthy(json.get("ok")) {
            let message = json
                .get("error")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or("API error")
                .to_string();
            return Err(ApiError::Remote { message });
        }

        Ok(json)
    }

    /// Fetch the whole registered-tags table.
    pub async fn tags_table(&self) -> Result<TagsSnapshot, ApiError> {
        let value = self.call("tags_table", &[]).await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// Create or update one tag row on the sheet. `sheet` addresses the
    /// backing tab; `lot_id` is the displayed lot.
    pub async fn tag_seed(
        &self,
        sheet: &str,
        lot_id: &str,
        tag_id: &str,
        product: &str,
        qty: i64,
    ) -> Result<SeedReceipt, ApiError> {
        let qty = qty.to_string();
        let value = self
            .call(
                "tag_seed",
                &[
                    ("sheet", sheet),
                    ("lot_id", lot_id),
                    ("tag_id", tag_id),
                    ("product", product),
                    ("qty", &qty),
                ],
            )
            .await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// Remove a lot's row. Addresses the tab by `sheet`, which survives
    /// tab renames where the displayed lot id would miss.
    pub async fn tag_deregister(
        &self,
        sheet: &str,
        lot_id: &str,
    ) -> Result<DeregisterReceipt, ApiError> {
        let value = self
            .call("tag_deregister", &[("sheet", sheet), ("lot_id", lot_id)])
            .await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// Service build info, passed through untyped.
    pub async fn version(&self) -> Result<Value, ApiError> {
        self.call("version", &[]).await
    }

    fn transport_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            ApiError::Transport(err)
        }
    }
}

/// Envelope `ok` check, as loose as the service itself: absent, null,
/// false, zero and empty-string all count as failure.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
