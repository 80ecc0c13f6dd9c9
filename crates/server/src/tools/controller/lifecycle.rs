//! controller_register, controller_promote, and controller_status.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use harbor_client::{ControllerConfig, Registration, RegistrationStatus};
use harbor_core::{AppConfig, Profile, VersionRecord};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the controller_register tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ControllerRegisterParams {
    /// Version tag to install. Defaults to the configured version.
    #[serde(default)]
    pub version: Option<String>,

    /// Caching profile, "awesome" or "galaxy". Defaults to the configured profile.
    #[serde(default)]
    pub profile: Option<String>,
}

/// Output from the controller_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControllerStatusOutput {
    pub active: Option<String>,
    pub waiting: Option<String>,
    /// Every version the store has seen, most recent first.
    pub versions: Vec<VersionRecord>,
}

fn parse_profile(s: &str) -> Result<Profile, ToolError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "awesome" => Ok(Profile::Awesome),
        "galaxy" => Ok(Profile::Galaxy),
        other => Err(ToolError::InvalidInput(format!("unknown profile: {other}"))),
    }
}

/// Implementation of the controller_register tool.
pub async fn register_impl(
    registration: &Registration, app: &AppConfig, params: ControllerRegisterParams,
) -> Result<CallToolResult, McpError> {
    let mut app = app.clone();
    if let Some(version) = params.version {
        app.version = version;
    }
    if let Some(profile) = params.profile.as_deref() {
        app.profile = parse_profile(profile)?;
    }
    app.validate().map_err(|e| ToolError::InvalidInput(e.to_string()))?;

    let config = ControllerConfig::from_app(&app)?;
    let outcome = registration.register(config).await?;

    json_result(&outcome)
}

/// Implementation of the controller_promote tool.
pub async fn promote_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let report = registration.promote_waiting().await?;
    json_result(&report)
}

/// Implementation of the controller_status tool.
pub async fn status_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let RegistrationStatus { active, waiting } = registration.status().await;
    let versions = registration.cache().versions().await?;

    json_result(&ControllerStatusOutput { active, waiting, versions })
}
