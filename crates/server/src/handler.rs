//! MCP server handler implementation.
//!
//! Routes tool calls to the controller registration and the cache store.
//! Each tool call is one host event; the call does not return until the
//! event's work has settled.

use std::sync::Arc;

use crate::tools::cache::{CacheGetParams, CacheListParams, get::get_impl, list::list_impl};
use crate::tools::controller::{
    ControllerFetchParams, ControllerRegisterParams, ControllerSyncParams,
    fetch::fetch_impl,
    lifecycle::{promote_impl, register_impl, status_impl},
    sync::sync_impl,
};

use harbor_client::Registration;
use harbor_core::AppConfig;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for harbor.
#[derive(Clone)]
pub struct HarborServer {
    tool_router: ToolRouter<Self>,
    registration: Arc<Registration>,
    config: Arc<AppConfig>,
}

#[tool_router]
impl HarborServer {
    /// Create a new server handler around an opened registration.
    pub fn new(registration: Registration, config: AppConfig) -> Self {
        Self { tool_router: Self::tool_router(), registration: Arc::new(registration), config: Arc::new(config) }
    }

    #[tool(
        description = "Install a controller version (fetching its app-shell manifest) and activate it if allowed. Defaults to the configured version and profile."
    )]
    async fn controller_register(
        &self, params: Parameters<ControllerRegisterParams>,
    ) -> Result<CallToolResult, McpError> {
        register_impl(&self.registration, &self.config, params.0).await
    }

    #[tool(description = "Activate the installed controller version that is waiting, retiring stale caches.")]
    async fn controller_promote(&self) -> Result<CallToolResult, McpError> {
        promote_impl(&self.registration).await
    }

    #[tool(description = "Show the active and waiting controller versions and the version history.")]
    async fn controller_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.registration).await
    }

    #[tool(
        description = "Send a request through the active controller. Reports whether the response came from the network, a cache, the offline fallback, or passed through."
    )]
    async fn controller_fetch(&self, params: Parameters<ControllerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, params.0).await
    }

    #[tool(description = "Deliver a background sync event (e.g. sync-analytics) to the active controller.")]
    async fn controller_sync(&self, params: Parameters<ControllerSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.registration, params.0).await
    }

    #[tool(description = "List cache namespaces with entry counts, or the entries of one namespace.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(self.registration.cache(), params.0).await
    }

    #[tool(description = "Read a cached GET response by URL without touching the network.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(self.registration.cache(), params.0).await
    }
}

impl ServerHandler for HarborServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "harbor".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
