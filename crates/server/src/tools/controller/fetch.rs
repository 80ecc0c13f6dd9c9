//! controller_fetch tool implementation.
//!
//! Routes one request through the active controller, exactly as an
//! intercepted page request would be.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use harbor_client::{Registration, ResponseSource, Served, fetch::canonicalize};
use harbor_core::{RequestDescriptor, ResponseKind};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the controller_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControllerFetchParams {
    /// Absolute URL to request.
    pub url: String,

    /// HTTP method (default: GET). Only GET is intercepted.
    #[serde(default = "default_method")]
    pub method: String,

    /// Maximum body characters to include in the output (default: 65536).
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,
}

fn default_method() -> String {
    "GET".into()
}

fn default_max_body_chars() -> usize {
    64 * 1024
}

/// Output from the controller_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControllerFetchOutput {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub kind: ResponseKind,
    /// network, cache, fallback, or passthrough.
    pub source: String,
    /// Namespace the response was read from, if any.
    pub namespace: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body as UTF-8 text (lossy), truncated to `max_body_chars`.
    pub body: String,
    pub body_bytes: usize,
    pub body_truncated: bool,
}

impl ControllerFetchOutput {
    fn from_served(served: Served, max_body_chars: usize) -> Self {
        let source = match served.source {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Fallback => "fallback",
            ResponseSource::Passthrough => "passthrough",
        };
        let response = served.response;
        let text = String::from_utf8_lossy(&response.body);
        let body_truncated = text.chars().count() > max_body_chars;
        let body = text.chars().take(max_body_chars).collect();

        Self {
            url: response.url,
            status: response.status,
            status_text: response.status_text,
            kind: response.kind,
            source: source.into(),
            namespace: served.namespace,
            headers: response.headers,
            body,
            body_bytes: response.body.len(),
            body_truncated,
        }
    }
}

/// Implementation of the controller_fetch tool.
pub async fn fetch_impl(
    registration: &Registration, params: ControllerFetchParams,
) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }

    let url = canonicalize(&params.url).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
    let request = RequestDescriptor::new(&params.method, url.as_str())?;

    let served = registration.fetch(request).await?;
    json_result(&ControllerFetchOutput::from_served(served, params.max_body_chars))
}
