//! Install and activate.

use futures_util::future::try_join_all;
use serde::Serialize;

use harbor_core::{Error, RequestDescriptor, ResponseSnapshot};

use super::Controller;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub version: String,
    pub namespace: String,
    /// URLs stored in the shell namespace, in manifest order.
    pub cached: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct ActivationReport {
    pub version: String,
    /// Namespaces removed because they belong to other versions.
    pub deleted: Vec<String>,
    /// Whether already-open clients are taken over immediately.
    pub claimed_clients: bool,
}

impl Controller {
    /// Populate the shell namespace from the manifest.
    ///
    /// Every manifest URL is fetched before anything is stored. A network
    /// failure or non-2xx status on any of them fails the install and leaves
    /// the namespace without entries from this pass.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let namespace = &self.config.shell_namespace;
        self.cache.open_namespace(namespace).await?;

        let requests = self.config.manifest_requests()?;
        let fetches = requests.iter().map(|request| self.fetch_manifest_entry(request));
        let pairs = try_join_all(fetches).await?;

        let cached = pairs.iter().map(|(request, _)| request.cache_url()).collect();
        self.cache.put_all(namespace, pairs).await?;

        tracing::info!(version = %self.config.version, namespace = %namespace, entries = requests.len(), "installed");

        Ok(InstallReport { version: self.config.version.clone(), namespace: namespace.clone(), cached })
    }

    async fn fetch_manifest_entry(
        &self, request: &RequestDescriptor,
    ) -> Result<(RequestDescriptor, ResponseSnapshot), Error> {
        let url = request.url().to_string();
        let response = self
            .upstream
            .fetch(request)
            .await
            .map_err(|e| Error::InstallFailed { url: url.clone(), reason: e.to_string() })?;

        if !response.is_ok() {
            return Err(Error::InstallFailed { url, reason: format!("status {}", response.status) });
        }

        Ok((request.clone(), response))
    }

    /// Delete every namespace this version does not retain.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let mut deleted = Vec::new();
        for name in self.cache.namespace_names().await? {
            if self.config.retains(&name) {
                continue;
            }
            if self.cache.delete_namespace(&name).await? {
                tracing::info!(version = %self.config.version, namespace = %name, "deleted stale namespace");
                deleted.push(name);
            }
        }

        tracing::info!(version = %self.config.version, claimed_clients = self.config.claim_clients, "activated");

        Ok(ActivationReport {
            version: self.config.version.clone(),
            deleted,
            claimed_clients: self.config.claim_clients,
        })
    }
}
