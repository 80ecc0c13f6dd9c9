//! Background sync.

use serde::Serialize;

use harbor_core::Error;

use super::Controller;

/// Tag for deferred analytics submission.
pub const ANALYTICS_SYNC_TAG: &str = "sync-analytics";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(tag = "status", content = "tag", rename_all = "lowercase")]
pub enum SyncOutcome {
    Completed(String),
    /// No handler is registered for the tag.
    Ignored(String),
}

impl Controller {
    pub async fn sync(&self, tag: &str) -> Result<SyncOutcome, Error> {
        if !self.config.sync_tags.iter().any(|t| t == tag) {
            tracing::debug!(tag, "no sync handler registered");
            return Ok(SyncOutcome::Ignored(tag.to_string()));
        }

        if tag == ANALYTICS_SYNC_TAG {
            flush_analytics().await?;
        }

        tracing::info!(tag, "sync completed");
        Ok(SyncOutcome::Completed(tag.to_string()))
    }
}

/// Nothing is queued for analytics yet, so there is nothing to submit.
async fn flush_analytics() -> Result<(), Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use url::Url;

    use harbor_core::CacheDb;

    use super::*;
    use crate::controller::{ControllerConfig, Event, EventOutcome};
    use crate::testing::StubUpstream;

    async fn galaxy() -> Controller {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let scope = Url::parse("http://localhost:8080/").unwrap();
        Controller::new(ControllerConfig::galaxy("v1", scope), cache, Arc::new(StubUpstream::new()))
    }

    #[tokio::test]
    async fn test_analytics_sync_completes() {
        let controller = galaxy().await;
        let outcome = controller.dispatch(Event::Sync(ANALYTICS_SYNC_TAG.into())).await.unwrap();
        assert_eq!(outcome, EventOutcome::Sync(SyncOutcome::Completed("sync-analytics".into())));
    }

    #[tokio::test]
    async fn test_unknown_tag_ignored() {
        let controller = galaxy().await;
        let outcome = controller.sync("sync-favorites").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Ignored("sync-favorites".into()));
    }
}
