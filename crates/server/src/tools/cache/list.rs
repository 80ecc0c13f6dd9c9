//! cache_list tool implementation.
//!
//! Lists namespaces, or the entries of one namespace.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use harbor_core::{CacheDb, Error};

use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// List the entries of this namespace instead of the namespaces.
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceSummary {
    pub name: String,
    pub entries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EntrySummary {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub body_bytes: usize,
    pub stored_at: String,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CacheListOutput {
    Namespaces { namespaces: Vec<NamespaceSummary> },
    Entries { namespace: String, entries: Vec<EntrySummary> },
}

/// Implementation of the cache_list tool.
pub async fn list_impl(cache: &CacheDb, params: CacheListParams) -> Result<CallToolResult, McpError> {
    let output = match params.namespace {
        Some(namespace) => {
            if !cache.has_namespace(&namespace).await? {
                return Err(Error::CacheMiss(format!("namespace {namespace}")).into());
            }
            let entries = cache
                .entries(&namespace)
                .await?
                .into_iter()
                .map(|e| EntrySummary {
                    method: e.method,
                    url: e.url,
                    status: e.response.status,
                    body_bytes: e.response.body.len(),
                    stored_at: e.stored_at,
                })
                .collect();
            CacheListOutput::Entries { namespace, entries }
        }
        None => {
            let mut namespaces = Vec::new();
            for name in cache.namespace_names().await? {
                let entries = cache.entry_count(&name).await?;
                namespaces.push(NamespaceSummary { name, entries });
            }
            CacheListOutput::Namespaces { namespaces }
        }
    };

    json_result(&output)
}
