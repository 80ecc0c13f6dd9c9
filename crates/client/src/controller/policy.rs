//! Fetch interception.
//!
//! Non-GET requests are never intercepted. GET requests are routed by the
//! controller's [`RoutingPolicy`]:
//!
//! | policy                | route   | order                                  |
//! |-----------------------|---------|----------------------------------------|
//! | `NetworkFirstRuntime` | runtime | network, store copy; else runtime copy |
//! | `NetworkFirstRuntime` | other   | any namespace; else network uncached   |
//! | `CacheThenNetwork`    | all     | any namespace; else network; else fallback document |

use harbor_core::{Error, RequestDescriptor, ResponseSnapshot};

use super::{Controller, FetchOutcome, RoutingPolicy, Served};
use crate::fetch::resolve;
use crate::routing::{AllowList, Route, classify};

impl Controller {
    pub(crate) async fn handle_fetch(&self, request: &RequestDescriptor) -> Result<FetchOutcome, Error> {
        if !request.is_get() {
            tracing::debug!(method = request.method(), url = %request.url(), "passthrough: not GET");
            return Ok(FetchOutcome::Passthrough);
        }
        if self.config.http_only && !request.is_http() {
            tracing::debug!(url = %request.url(), "passthrough: not http(s)");
            return Ok(FetchOutcome::Passthrough);
        }

        let served = match &self.config.routing {
            RoutingPolicy::NetworkFirstRuntime { allow } => match classify(request.url(), &self.config.scope, allow) {
                Route::Runtime => self.network_first(request).await?,
                Route::Shell | Route::Other => self.cache_first(request).await?,
            },
            RoutingPolicy::CacheThenNetwork { markers, fallback } => {
                self.cache_then_network(request, markers, fallback).await?
            }
        };

        tracing::debug!(url = %request.url(), source = ?served.source, status = served.response.status, "served");
        Ok(FetchOutcome::Respond(served))
    }

    /// Network first, copying cacheable responses into the runtime namespace
    /// (created on first write). The runtime copy is only read when the
    /// network fails.
    async fn network_first(&self, request: &RequestDescriptor) -> Result<Served, Error> {
        let runtime = &self.config.runtime_namespace;

        match self.upstream.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.store_runtime_copy(request, &response).await;
                }
                Ok(Served::network(response))
            }
            Err(err) => match self.cache.match_in(runtime, request).await? {
                Some(entry) => {
                    tracing::warn!(url = %request.url(), error = %err, "network failed; serving runtime copy");
                    Ok(Served::cache(entry))
                }
                None => Err(err),
            },
        }
    }

    /// Any namespace first; on a miss the network response is returned uncached.
    async fn cache_first(&self, request: &RequestDescriptor) -> Result<Served, Error> {
        if let Some(entry) = self.cache.match_any(request).await? {
            return Ok(Served::cache(entry));
        }

        self.upstream.fetch(request).await.map(Served::network)
    }

    async fn cache_then_network(
        &self, request: &RequestDescriptor, markers: &AllowList, fallback: &str,
    ) -> Result<Served, Error> {
        if let Some(entry) = self.cache.match_any(request).await? {
            return Ok(Served::cache(entry));
        }

        match self.upstream.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() && markers.matches(request.url()) {
                    self.store_runtime_copy(request, &response).await;
                }
                Ok(Served::network(response))
            }
            Err(err) => self.offline_fallback(fallback, err).await,
        }
    }

    async fn offline_fallback(&self, fallback: &str, err: Error) -> Result<Served, Error> {
        let url = resolve(&self.config.scope, fallback).map_err(|e| Error::InvalidUrl(format!("{fallback}: {e}")))?;
        let fallback_request = RequestDescriptor::get_url(url);

        match self.cache.match_any(&fallback_request).await? {
            Some(entry) => {
                tracing::warn!(
                    error = %err,
                    fallback = %fallback_request.url(),
                    "network failed; serving offline document"
                );
                Ok(Served::fallback(entry))
            }
            None => Err(Error::FallbackMissing(format!("{} ({err})", fallback_request.url()))),
        }
    }

    /// The response is returned either way; a failed write only costs the copy.
    async fn store_runtime_copy(&self, request: &RequestDescriptor, response: &ResponseSnapshot) {
        let runtime = &self.config.runtime_namespace;
        if let Err(e) = self.cache.put(runtime, request, response).await {
            tracing::warn!(url = %request.url(), namespace = %runtime, error = %e, "failed to store runtime copy");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use url::Url;

    use harbor_core::{CacheDb, ResponseKind};

    use super::*;
    use crate::controller::{ControllerConfig, ResponseSource};
    use crate::testing::StubUpstream;

    fn scope() -> Url {
        Url::parse("http://localhost:8080/").unwrap()
    }

    fn get(url: &str) -> RequestDescriptor {
        RequestDescriptor::get(url).unwrap()
    }

    async fn awesome(upstream: Arc<StubUpstream>) -> (Controller, CacheDb) {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let controller = Controller::new(ControllerConfig::awesome("v1", scope()), cache.clone(), upstream);
        (controller, cache)
    }

    async fn galaxy(upstream: Arc<StubUpstream>) -> (Controller, CacheDb) {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let controller = Controller::new(ControllerConfig::galaxy("v1", scope()), cache.clone(), upstream);
        (controller, cache)
    }

    fn served(outcome: FetchOutcome) -> Served {
        match outcome {
            FetchOutcome::Respond(served) => served,
            FetchOutcome::Passthrough => panic!("expected a response, got passthrough"),
        }
    }

    #[tokio::test]
    async fn test_non_get_is_never_intercepted() {
        let upstream = Arc::new(StubUpstream::new());
        let (controller, cache) = awesome(upstream.clone()).await;

        for method in ["POST", "PUT", "DELETE"] {
            let request = RequestDescriptor::new(method, "https://api.github.com/repos/a/b").unwrap();
            assert_eq!(controller.handle_fetch(&request).await.unwrap(), FetchOutcome::Passthrough);
        }

        assert!(upstream.hits().is_empty());
        assert!(cache.namespace_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_network_first_stores_runtime_copy() {
        let url = "https://api.github.com/search/repositories?q=topic:awesome";
        let upstream = Arc::new(StubUpstream::new().respond(url, 200, "{\"items\":[]}"));
        let (controller, cache) = awesome(upstream).await;

        let served = served(controller.handle_fetch(&get(url)).await.unwrap());
        assert_eq!(served.source, ResponseSource::Network);
        assert_eq!(served.response.body, b"{\"items\":[]}");

        let entry = cache.match_in("awesome-runtime", &get(url)).await.unwrap().unwrap();
        assert_eq!(entry.response.body, served.response.body);
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_runtime_copy() {
        let url = "https://api.github.com/repos/sindresorhus/awesome";
        let upstream = Arc::new(StubUpstream::new().respond(url, 200, "{\"stars\":1}"));
        let (controller, _cache) = awesome(upstream.clone()).await;

        controller.handle_fetch(&get(url)).await.unwrap();
        upstream.set_offline(url);

        let served = served(controller.handle_fetch(&get(url)).await.unwrap());
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.namespace.as_deref(), Some("awesome-runtime"));
        assert_eq!(served.response.body, b"{\"stars\":1}");
        assert_eq!(upstream.hit_count(url), 2);
    }

    #[tokio::test]
    async fn test_network_first_prefers_network_over_copy() {
        let url = "https://raw.githubusercontent.com/a/b/main/README.md";
        let upstream = Arc::new(StubUpstream::new().respond(url, 200, "old"));
        let (controller, _cache) = awesome(upstream.clone()).await;

        controller.handle_fetch(&get(url)).await.unwrap();
        upstream.set_response(ResponseSnapshot::new(url, 200, "new"));

        let served = served(controller.handle_fetch(&get(url)).await.unwrap());
        assert_eq!(served.source, ResponseSource::Network);
        assert_eq!(served.response.body, b"new");
    }

    #[tokio::test]
    async fn test_network_first_propagates_without_copy() {
        let url = "https://avatars.githubusercontent.com/u/1";
        let upstream = Arc::new(StubUpstream::new().fail(url));
        let (controller, _cache) = awesome(upstream).await;

        let err = controller.handle_fetch(&get(url)).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_network_first_skips_error_statuses() {
        let url = "https://api.github.com/search/repositories?q=x";
        let upstream = Arc::new(StubUpstream::new().respond(url, 403, "rate limited"));
        let (controller, cache) = awesome(upstream).await;

        let served = served(controller.handle_fetch(&get(url)).await.unwrap());
        assert_eq!(served.response.status, 403);
        assert!(cache.match_in("awesome-runtime", &get(url)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_first_returns_response_when_copy_fails() {
        let url = "https://api.github.com/repos/sindresorhus/awesome";
        let upstream = Arc::new(StubUpstream::new().respond(url, 200, "{\"stars\":1}"));
        let (controller, cache) = awesome(upstream.clone()).await;
        cache.close().await.unwrap();

        let served = served(controller.handle_fetch(&get(url)).await.unwrap());
        assert_eq!(served.source, ResponseSource::Network);
        assert_eq!(served.response.body, b"{\"stars\":1}");
        assert_eq!(upstream.hit_count(url), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_fails_only_that_request() {
        let shell = "http://localhost:8080/main.js";
        let api = "https://api.github.com/search/repositories?q=x";
        let upstream = Arc::new(StubUpstream::new().respond(shell, 200, "main()").respond(api, 200, "[]"));
        let (controller, cache) = awesome(upstream.clone()).await;
        cache.close().await.unwrap();

        let err = controller.handle_fetch(&get(shell)).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert_eq!(upstream.hit_count(shell), 0);

        let served = served(controller.handle_fetch(&get(api)).await.unwrap());
        assert_eq!(served.response.body, b"[]");
    }

    #[tokio::test]
    async fn test_galaxy_failed_lookup_surfaces_store_error() {
        let fonts = "https://fonts.googleapis.com/css2?family=Inter";
        let upstream = Arc::new(StubUpstream::new().respond(fonts, 200, "@font-face{}"));
        let (controller, cache) = galaxy(upstream.clone()).await;
        cache.close().await.unwrap();

        let err = controller.handle_fetch(&get(fonts)).await.unwrap_err();
        assert!(err.to_string().starts_with("CACHE_ERROR"));
        assert!(upstream.hits().is_empty());
    }

    #[tokio::test]
    async fn test_cache_first_is_idempotent() {
        let url = "http://localhost:8080/main.js";
        let upstream = Arc::new(StubUpstream::new().respond(url, 200, "console.log(1)"));
        let (controller, cache) = awesome(upstream.clone()).await;
        cache
            .put("awesome-shell-v1", &get(url), &ResponseSnapshot::new(url, 200, "console.log(1)"))
            .await
            .unwrap();

        let first = served(controller.handle_fetch(&get(url)).await.unwrap());
        let second = served(controller.handle_fetch(&get(url)).await.unwrap());
        assert_eq!(first.response.body, second.response.body);
        assert_eq!(first.source, ResponseSource::Cache);
        assert_eq!(upstream.hit_count(url), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_goes_to_network_uncached() {
        let url = "https://github.com/sindresorhus/awesome";
        let upstream = Arc::new(StubUpstream::new().respond(url, 200, "<html>"));
        let (controller, cache) = awesome(upstream.clone()).await;

        for _ in 0..2 {
            let served = served(controller.handle_fetch(&get(url)).await.unwrap());
            assert_eq!(served.source, ResponseSource::Network);
        }
        assert_eq!(upstream.hit_count(url), 2);
        assert!(cache.match_any(&get(url)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_awesome_intercepts_other_schemes() {
        let url = "chrome-extension://abc/content.js";
        let upstream = Arc::new(StubUpstream::new());
        let (controller, _cache) = awesome(upstream.clone()).await;

        assert!(controller.handle_fetch(&get(url)).await.is_err());
        assert_eq!(upstream.hit_count(url), 1);
    }

    #[tokio::test]
    async fn test_galaxy_skips_other_schemes() {
        let upstream = Arc::new(StubUpstream::new());
        let (controller, _cache) = galaxy(upstream.clone()).await;

        let outcome = controller.handle_fetch(&get("chrome-extension://abc/content.js")).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Passthrough);
        assert!(upstream.hits().is_empty());
    }

    #[tokio::test]
    async fn test_galaxy_caches_marked_urls_only() {
        let fonts = "https://fonts.googleapis.com/css2?family=Inter";
        let local = "https://example.org/data.json";
        let upstream = Arc::new(StubUpstream::new().respond(fonts, 200, "@font-face{}").respond(local, 200, "{}"));
        let (controller, cache) = galaxy(upstream).await;

        let a = served(controller.handle_fetch(&get(fonts)).await.unwrap());
        let b = served(controller.handle_fetch(&get(local)).await.unwrap());
        assert_eq!(a.source, ResponseSource::Network);
        assert_eq!(b.source, ResponseSource::Network);
        assert_eq!(b.response.body, b"{}");

        assert!(cache.match_in("birthday-galaxy-runtime", &get(fonts)).await.unwrap().is_some());
        assert!(cache.match_in("birthday-galaxy-runtime", &get(local)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_galaxy_serves_cached_before_network() {
        let fonts = "https://fonts.gstatic.com/s/inter.woff2";
        let upstream = Arc::new(StubUpstream::new().respond(fonts, 200, "woff"));
        let (controller, _cache) = galaxy(upstream.clone()).await;

        controller.handle_fetch(&get(fonts)).await.unwrap();
        let second = served(controller.handle_fetch(&get(fonts)).await.unwrap());
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(upstream.hit_count(fonts), 1);
    }

    #[tokio::test]
    async fn test_galaxy_returns_non_cacheable_as_is() {
        let cdn = "https://cdn.jsdelivr.net/npm/missing.js";
        let upstream = Arc::new(StubUpstream::new().respond(cdn, 404, "not found"));
        let (controller, cache) = galaxy(upstream.clone()).await;

        let served = served(controller.handle_fetch(&get(cdn)).await.unwrap());
        assert_eq!(served.response.status, 404);
        assert!(!cache.has_namespace("birthday-galaxy-runtime").await.unwrap());

        upstream.set_response(ResponseSnapshot::new(cdn, 200, "").with_kind(ResponseKind::Error));
        controller.handle_fetch(&get(cdn)).await.unwrap();
        assert!(cache.match_any(&get(cdn)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_galaxy_offline_fallback_document() {
        let page = "http://localhost:8080/stars";
        let upstream = Arc::new(StubUpstream::new().fail(page));
        let (controller, cache) = galaxy(upstream).await;
        cache
            .put(
                "birthday-galaxy-v1",
                &get("http://localhost:8080/index.html"),
                &ResponseSnapshot::new("http://localhost:8080/index.html", 200, "<html>offline</html>"),
            )
            .await
            .unwrap();

        let served = served(controller.handle_fetch(&get(page)).await.unwrap());
        assert_eq!(served.source, ResponseSource::Fallback);
        assert_eq!(served.response.body, b"<html>offline</html>");
    }

    #[tokio::test]
    async fn test_galaxy_missing_fallback_propagates() {
        let page = "http://localhost:8080/stars";
        let upstream = Arc::new(StubUpstream::new().fail(page));
        let (controller, _cache) = galaxy(upstream).await;

        let err = controller.handle_fetch(&get(page)).await.unwrap_err();
        assert!(matches!(err, Error::FallbackMissing(_)));
    }
}
