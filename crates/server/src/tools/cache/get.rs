//! cache_get tool implementation.
//!
//! Looks up the stored response for a GET request without touching the network.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use harbor_client::fetch::canonicalize;
use harbor_core::{CacheDb, Error, RequestDescriptor, ResponseKind};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// URL of the cached GET request.
    pub url: String,

    /// Restrict the lookup to one namespace. Searches all namespaces if unset.
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub namespace: String,
    pub url: String,
    pub status: u16,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    /// Body as UTF-8 text (lossy).
    pub body: String,
    pub stored_at: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(cache: &CacheDb, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = canonicalize(&params.url).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
    let request = RequestDescriptor::get_url(url);

    let entry = match params.namespace.as_deref() {
        Some(namespace) => cache.match_in(namespace, &request).await?,
        None => cache.match_any(&request).await?,
    }
    .ok_or_else(|| Error::CacheMiss(request.url().to_string()))?;

    let output = CacheGetOutput {
        namespace: entry.namespace,
        url: entry.url,
        status: entry.response.status,
        kind: entry.response.kind,
        headers: entry.response.headers,
        body: String::from_utf8_lossy(&entry.response.body).into_owned(),
        stored_at: entry.stored_at,
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{active_galaxy, output};

    #[tokio::test]
    async fn test_get_missing() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let params = CacheGetParams { url: "http://localhost:8080/".into(), namespace: None };

        let err = get_impl(&cache, params).await.unwrap_err();
        assert!(err.message.contains("CACHE_MISS"));
    }

    #[tokio::test]
    async fn test_get_found() {
        let registration = active_galaxy().await;
        let params = CacheGetParams { url: "http://localhost:8080/manifest.json".into(), namespace: None };

        let result = get_impl(registration.cache(), params).await.unwrap();
        let out: CacheGetOutput = output(&result);
        assert_eq!(out.namespace, "birthday-galaxy-v1");
        assert_eq!(out.body, "{}");
        assert_eq!(out.status, 200);
    }

    #[tokio::test]
    async fn test_get_scoped_to_namespace() {
        let registration = active_galaxy().await;
        let params = CacheGetParams {
            url: "http://localhost:8080/manifest.json".into(),
            namespace: Some("birthday-galaxy-runtime".into()),
        };

        assert!(get_impl(registration.cache(), params).await.is_err());
    }
}
