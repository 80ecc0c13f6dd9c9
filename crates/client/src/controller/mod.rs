//! Offline cache controller.
//!
//! A controller is one version of the caching policy for a scope. It reacts
//! to four events: install (populate the shell namespace), activate (retire
//! stale namespaces), fetch (decide where a response comes from), and sync
//! (deferred work by tag).
//!
//! Every event is handled through [`Controller::dispatch`], which returns a
//! future covering the whole unit of work. The host must drive that future to
//! completion before treating the event as finished.

mod lifecycle;
mod policy;
mod sync;

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use url::Url;

use harbor_core::{AppConfig, CacheDb, CachedEntry, Error, Profile, RequestDescriptor, ResponseSnapshot};

use crate::fetch::{Upstream, resolve};
use crate::routing::AllowList;

pub use lifecycle::{ActivationReport, InstallReport};
pub use sync::{ANALYTICS_SYNC_TAG, SyncOutcome};

/// Which namespaces survive activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetentionRule {
    /// Keep only the current shell and runtime namespace names.
    Exact,
    /// Keep every name ending with the version tag.
    VersionSuffix,
}

/// How GET requests are sourced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingPolicy {
    /// Allow-listed hosts go network first and are copied into the runtime
    /// namespace, falling back to that copy when the network fails. All other
    /// requests are served from any namespace, or the network uncached.
    NetworkFirstRuntime { allow: AllowList },
    /// Serve from any namespace, else the network. Successful responses whose
    /// URL carries a marker are copied into the runtime namespace. When the
    /// network fails, the fallback document is served from cache.
    CacheThenNetwork { markers: AllowList, fallback: String },
}

/// Everything a controller version needs, passed in at construction.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub version: String,
    pub shell_namespace: String,
    pub runtime_namespace: String,
    /// Paths resolved against `scope` and stored at install.
    pub manifest: Vec<String>,
    pub scope: Url,
    pub retention: RetentionRule,
    pub routing: RoutingPolicy,
    /// Ignore requests whose scheme is not http(s).
    pub http_only: bool,
    /// Activate as soon as install succeeds, even if another version is active.
    pub skip_waiting: bool,
    /// Take over clients opened under a previous version on activation.
    pub claim_clients: bool,
    pub sync_tags: Vec<String>,
}

impl ControllerConfig {
    /// Awesome-list browser: app shell plus GitHub runtime cache.
    pub fn awesome(version: &str, scope: Url) -> Self {
        Self {
            version: version.to_string(),
            shell_namespace: format!("awesome-shell-{version}"),
            runtime_namespace: "awesome-runtime".into(),
            manifest: vec!["./".into(), "./index.html".into(), "./main.js".into()],
            scope,
            retention: RetentionRule::VersionSuffix,
            routing: RoutingPolicy::NetworkFirstRuntime { allow: AllowList::github() },
            http_only: false,
            skip_waiting: false,
            claim_clients: false,
            sync_tags: Vec::new(),
        }
    }

    /// Birthday galaxy PWA: cache then network with an offline page.
    pub fn galaxy(version: &str, scope: Url) -> Self {
        Self {
            version: version.to_string(),
            shell_namespace: format!("birthday-galaxy-{version}"),
            runtime_namespace: "birthday-galaxy-runtime".into(),
            manifest: vec!["/".into(), "/index.html".into(), "/manifest.json".into()],
            scope,
            retention: RetentionRule::Exact,
            routing: RoutingPolicy::CacheThenNetwork {
                markers: AllowList::cdn_markers(),
                fallback: "/index.html".into(),
            },
            http_only: true,
            skip_waiting: true,
            claim_clients: true,
            sync_tags: vec![ANALYTICS_SYNC_TAG.into()],
        }
    }

    /// Build the preset selected by the application config.
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let scope = config.scope_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
        Ok(match config.profile {
            Profile::Awesome => Self::awesome(&config.version, scope),
            Profile::Galaxy => Self::galaxy(&config.version, scope),
        })
    }

    /// Stable identity of this controller. Two profiles may share a version
    /// tag, so the shell namespace (profile prefix plus version) is used.
    pub fn identity(&self) -> &str {
        &self.shell_namespace
    }

    /// Whether a namespace name belongs to this version.
    pub fn retains(&self, name: &str) -> bool {
        match self.retention {
            RetentionRule::Exact => name == self.shell_namespace || name == self.runtime_namespace,
            RetentionRule::VersionSuffix => name.ends_with(&self.version),
        }
    }

    /// Manifest entries as GET requests.
    pub fn manifest_requests(&self) -> Result<Vec<RequestDescriptor>, Error> {
        self.manifest
            .iter()
            .map(|path| {
                resolve(&self.scope, path)
                    .map(RequestDescriptor::get_url)
                    .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
            })
            .collect()
    }
}

/// Events delivered by the host.
#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(RequestDescriptor),
    Sync(String),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Install => EventKind::Install,
            Event::Activate => EventKind::Activate,
            Event::Fetch(_) => EventKind::Fetch,
            Event::Sync(_) => EventKind::Sync,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
    Sync,
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    Fallback,
    Passthrough,
}

/// A response handed back to the requesting page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: ResponseSnapshot,
    pub source: ResponseSource,
    /// Namespace the response was read from, for cache and fallback hits.
    pub namespace: Option<String>,
}

impl Served {
    pub fn network(response: ResponseSnapshot) -> Self {
        Self { response, source: ResponseSource::Network, namespace: None }
    }

    pub fn passthrough(response: ResponseSnapshot) -> Self {
        Self { response, source: ResponseSource::Passthrough, namespace: None }
    }

    pub fn cache(entry: CachedEntry) -> Self {
        Self { response: entry.response, source: ResponseSource::Cache, namespace: Some(entry.namespace) }
    }

    pub fn fallback(entry: CachedEntry) -> Self {
        Self { response: entry.response, source: ResponseSource::Fallback, namespace: Some(entry.namespace) }
    }
}

/// Decision for an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not intercepted; the request goes to the network untouched.
    Passthrough,
    Respond(Served),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivationReport),
    Fetch(FetchOutcome),
    Sync(SyncOutcome),
    /// The controller has no listener for this kind of event.
    Unobserved,
}

/// The unit of work for one event.
pub type EventFuture<'a> = BoxFuture<'a, Result<EventOutcome, Error>>;

pub struct Controller {
    config: ControllerConfig,
    cache: CacheDb,
    upstream: Arc<dyn Upstream>,
    subscriptions: Vec<EventKind>,
}

impl Controller {
    /// Build a controller and subscribe it to the events it handles.
    pub fn new(config: ControllerConfig, cache: CacheDb, upstream: Arc<dyn Upstream>) -> Self {
        let mut subscriptions = vec![EventKind::Install, EventKind::Activate, EventKind::Fetch];
        if !config.sync_tags.is_empty() {
            subscriptions.push(EventKind::Sync);
        }

        Self { config, cache, upstream, subscriptions }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn identity(&self) -> &str {
        self.config.identity()
    }

    pub fn subscribes_to(&self, kind: EventKind) -> bool {
        self.subscriptions.contains(&kind)
    }

    /// Handle one event. The returned future settles when all of the event's
    /// cache and network work has finished.
    pub fn dispatch(&self, event: Event) -> EventFuture<'_> {
        async move {
            if !self.subscribes_to(event.kind()) {
                tracing::debug!(version = %self.config.version, kind = ?event.kind(), "event not observed");
                return Ok(EventOutcome::Unobserved);
            }

            match event {
                Event::Install => self.install().await.map(EventOutcome::Installed),
                Event::Activate => self.activate().await.map(EventOutcome::Activated),
                Event::Fetch(request) => self.handle_fetch(&request).await.map(EventOutcome::Fetch),
                Event::Sync(tag) => self.sync(&tag).await.map(EventOutcome::Sync),
            }
        }
        .boxed()
    }
}
