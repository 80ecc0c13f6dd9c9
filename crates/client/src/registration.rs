//! Controller versions for one scope.
//!
//! A registration owns at most one active controller and at most one waiting
//! controller. New versions install first; a failed install is marked
//! redundant and the active version keeps serving. A successful install
//! activates right away when nothing is active or the version skips waiting,
//! otherwise it waits for [`Registration::promote_waiting`].

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use harbor_core::{CacheDb, Error, RequestDescriptor, VersionState};

use crate::controller::{
    ActivationReport, Controller, ControllerConfig, Event, EventOutcome, FetchOutcome, InstallReport, Served,
    SyncOutcome,
};
use crate::fetch::Upstream;

/// Result of registering a controller version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct RegisterOutcome {
    pub version: String,
    pub state: VersionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation: Option<ActivationReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct RegistrationStatus {
    pub active: Option<String>,
    pub waiting: Option<String>,
}

pub struct Registration {
    cache: CacheDb,
    upstream: Arc<dyn Upstream>,
    active: RwLock<Option<Arc<Controller>>>,
    waiting: RwLock<Option<Arc<Controller>>>,
    /// Serializes install/activate so versions cannot interleave.
    lifecycle: Mutex<()>,
}

impl Registration {
    pub fn new(cache: CacheDb, upstream: Arc<dyn Upstream>) -> Self {
        Self { cache, upstream, active: RwLock::new(None), waiting: RwLock::new(None), lifecycle: Mutex::new(()) }
    }

    /// Start up with a configured version.
    ///
    /// If the store already records this controller (same profile and
    /// version) as activated it is restored without reinstalling. Otherwise
    /// it is registered; an install failure is logged and leaves the
    /// registration without an active controller, so requests pass straight
    /// through.
    pub async fn open(cache: CacheDb, upstream: Arc<dyn Upstream>, config: ControllerConfig) -> Result<Self, Error> {
        let registration = Self::new(cache, upstream);

        let persisted = registration.cache.active_record().await?;
        if persisted.is_some_and(|record| record.controller == config.identity()) {
            tracing::info!(controller = %config.identity(), version = %config.version, "restored active controller");
            let controller = registration.controller(config);
            *registration.active.write().await = Some(controller);
            return Ok(registration);
        }

        match registration.register(config).await {
            Ok(outcome) => tracing::info!(version = %outcome.version, state = ?outcome.state, "registered"),
            Err(e @ Error::InstallFailed { .. }) => tracing::error!(error = %e, "install failed; serving uncached"),
            Err(e) => return Err(e),
        }

        Ok(registration)
    }

    fn controller(&self, config: ControllerConfig) -> Arc<Controller> {
        Arc::new(Controller::new(config, self.cache.clone(), self.upstream.clone()))
    }

    /// Install a controller version and activate it when allowed.
    ///
    /// Registering the controller that is already active is a no-op. A
    /// controller of another profile with the same version tag is a new
    /// controller and is installed.
    pub async fn register(&self, config: ControllerConfig) -> Result<RegisterOutcome, Error> {
        let _guard = self.lifecycle.lock().await;

        let already_active = self
            .active
            .read()
            .await
            .as_ref()
            .is_some_and(|active| active.identity() == config.identity());
        if already_active {
            return Ok(RegisterOutcome {
                version: config.version,
                state: VersionState::Activated,
                install: None,
                activation: None,
            });
        }

        let version = config.version.clone();
        let identity = config.identity().to_string();
        let controller = self.controller(config);

        self.cache.set_version_state(&identity, &version, VersionState::Installing).await?;
        let install = match controller.dispatch(Event::Install).await {
            Ok(EventOutcome::Installed(report)) => report,
            Ok(other) => {
                self.cache.set_version_state(&identity, &version, VersionState::Redundant).await?;
                let reason = format!("unexpected outcome {other:?}");
                return Err(Error::InstallFailed { url: String::new(), reason });
            }
            Err(e) => {
                self.cache.set_version_state(&identity, &version, VersionState::Redundant).await?;
                tracing::warn!(controller = %identity, error = %e, "install failed; keeping previous version");
                return Err(e);
            }
        };
        self.cache.set_version_state(&identity, &version, VersionState::Installed).await?;

        let has_active = self.active.read().await.is_some();
        if has_active && !controller.config().skip_waiting {
            let previous = self.waiting.write().await.replace(controller);
            if let Some(previous) = previous {
                self.cache
                    .set_version_state(previous.identity(), previous.version(), VersionState::Redundant)
                    .await?;
            }
            tracing::info!(controller = %identity, "installed; waiting for promotion");
            return Ok(RegisterOutcome {
                version,
                state: VersionState::Installed,
                install: Some(install),
                activation: None,
            });
        }

        let activation = self.activate(controller).await?;
        Ok(RegisterOutcome {
            version,
            state: VersionState::Activated,
            install: Some(install),
            activation: Some(activation),
        })
    }

    /// Activate the waiting controller, if there is one.
    pub async fn promote_waiting(&self) -> Result<Option<ActivationReport>, Error> {
        let _guard = self.lifecycle.lock().await;

        let Some(controller) = self.waiting.write().await.take() else {
            return Ok(None);
        };
        self.activate(controller).await.map(Some)
    }

    async fn activate(&self, controller: Arc<Controller>) -> Result<ActivationReport, Error> {
        let version = controller.version().to_string();
        let identity = controller.identity().to_string();
        self.cache.set_version_state(&identity, &version, VersionState::Activating).await?;

        let report = match controller.dispatch(Event::Activate).await? {
            EventOutcome::Activated(report) => report,
            other => {
                return Err(Error::NotActive(format!("{identity}: unexpected outcome {other:?}")));
            }
        };

        self.cache.set_version_state(&identity, &version, VersionState::Activated).await?;
        *self.active.write().await = Some(controller);

        let mut waiting = self.waiting.write().await;
        if waiting.as_ref().is_some_and(|w| w.identity() == identity) {
            *waiting = None;
        }

        Ok(report)
    }

    /// Serve a request through the active controller.
    ///
    /// Without an active controller, or when the controller does not
    /// intercept the request, it goes to the network uncached.
    pub async fn fetch(&self, request: RequestDescriptor) -> Result<Served, Error> {
        let active = self.active.read().await.clone();

        if let Some(controller) = active {
            match controller.dispatch(Event::Fetch(request.clone())).await? {
                EventOutcome::Fetch(FetchOutcome::Respond(served)) => return Ok(served),
                EventOutcome::Fetch(FetchOutcome::Passthrough) | EventOutcome::Unobserved => {}
                other => tracing::warn!(outcome = ?other, "unexpected fetch outcome; passing through"),
            }
        }

        self.upstream.fetch(&request).await.map(Served::passthrough)
    }

    /// Deliver a background sync event to the active controller.
    pub async fn sync(&self, tag: &str) -> Result<SyncOutcome, Error> {
        let active = self.active.read().await.clone();
        let Some(controller) = active else {
            return Err(Error::NotActive(format!("no active controller for sync {tag}")));
        };

        match controller.dispatch(Event::Sync(tag.to_string())).await? {
            EventOutcome::Sync(outcome) => Ok(outcome),
            _ => Ok(SyncOutcome::Ignored(tag.to_string())),
        }
    }

    pub async fn status(&self) -> RegistrationStatus {
        RegistrationStatus {
            active: self.active.read().await.as_ref().map(|c| c.version().to_string()),
            waiting: self.waiting.read().await.as_ref().map(|c| c.version().to_string()),
        }
    }

    pub fn cache(&self) -> &CacheDb {
        &self.cache
    }
}
