//! controller_sync tool implementation.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use harbor_client::Registration;

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the controller_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControllerSyncParams {
    /// Sync tag, e.g. "sync-analytics".
    pub tag: String,
}

/// Implementation of the controller_sync tool.
pub async fn sync_impl(registration: &Registration, params: ControllerSyncParams) -> Result<CallToolResult, McpError> {
    if params.tag.trim().is_empty() {
        return Err(ToolError::InvalidInput("tag cannot be empty".into()).into());
    }

    let outcome = registration.sync(params.tag.trim()).await?;
    json_result(&outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{active_galaxy, output};

    #[tokio::test]
    async fn test_sync_analytics() {
        let registration = active_galaxy().await;
        let result = sync_impl(&registration, ControllerSyncParams { tag: "sync-analytics".into() })
            .await
            .unwrap();
        let value: serde_json::Value = output(&result);
        assert_eq!(value["status"], "completed");
        assert_eq!(value["tag"], "sync-analytics");
    }

    #[tokio::test]
    async fn test_sync_unknown_tag() {
        let registration = active_galaxy().await;
        let result = sync_impl(&registration, ControllerSyncParams { tag: "sync-stars".into() })
            .await
            .unwrap();
        let value: serde_json::Value = output(&result);
        assert_eq!(value["status"], "ignored");
    }

    #[tokio::test]
    async fn test_sync_empty_tag() {
        let registration = active_galaxy().await;
        assert!(sync_impl(&registration, ControllerSyncParams { tag: " ".into() }).await.is_err());
    }
}
