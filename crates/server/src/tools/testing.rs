//! Shared fixtures for tool tests.

use std::collections::HashMap;
use std::sync::Arc;

use harbor_client::{ControllerConfig, Registration, Upstream};
use harbor_core::{CacheDb, Error, RequestDescriptor, ResponseSnapshot};
use rmcp::model::CallToolResult;
use url::Url;

/// Upstream answering from a fixed URL table; unknown URLs fail.
pub(crate) struct FixedUpstream(HashMap<String, (u16, String)>);

impl FixedUpstream {
    pub(crate) fn galaxy_shell() -> Self {
        let mut routes = HashMap::new();
        routes.insert("http://localhost:8080/".to_string(), (200, "<html>root</html>".to_string()));
        routes.insert("http://localhost:8080/index.html".to_string(), (200, "<html>index</html>".to_string()));
        routes.insert("http://localhost:8080/manifest.json".to_string(), (200, "{}".to_string()));
        routes.insert("https://fonts.googleapis.com/css2?family=Inter".to_string(), (200, "@font-face{}".to_string()));
        Self(routes)
    }
}

#[async_trait::async_trait]
impl Upstream for FixedUpstream {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        let url = request.url().to_string();
        match self.0.get(&url) {
            Some((status, body)) => Ok(ResponseSnapshot::new(url, *status, body.as_str())),
            None => Err(Error::Network(format!("{url}: unreachable"))),
        }
    }
}

pub(crate) fn scope() -> Url {
    Url::parse("http://localhost:8080/").unwrap()
}

/// A registration with galaxy v1 installed and active.
pub(crate) async fn active_galaxy() -> Registration {
    let cache = CacheDb::open_in_memory().await.unwrap();
    let registration = Registration::new(cache, Arc::new(FixedUpstream::galaxy_shell()));
    registration
        .register(ControllerConfig::galaxy("v1", scope()))
        .await
        .unwrap();
    registration
}

/// Parse the JSON text content of a tool result.
pub(crate) fn output<T: serde::de::DeserializeOwned>(result: &CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
