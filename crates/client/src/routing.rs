//! Request classification.
//!
//! Pure predicates over parsed URLs. Nothing here touches the network or the
//! cache, so the routing tables can be tested on their own.

use url::Url;

/// Hosts or URL fragments whose responses go to the runtime namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowList {
    /// Match on hostname: `exact` entries must equal the host, `domains`
    /// match the domain itself or any subdomain of it.
    Hosts { exact: Vec<String>, domains: Vec<String> },
    /// Loose match: any marker appearing anywhere in the full URL.
    Substrings(Vec<String>),
}

impl AllowList {
    /// GitHub API, raw content, and every user-content host.
    pub fn github() -> Self {
        AllowList::Hosts {
            exact: vec!["api.github.com".into(), "raw.githubusercontent.com".into()],
            domains: vec!["githubusercontent.com".into()],
        }
    }

    /// CDN, Google APIs, and Google static content markers.
    pub fn cdn_markers() -> Self {
        AllowList::Substrings(vec!["cdn".into(), "googleapis".into(), "gstatic".into()])
    }

    pub fn matches(&self, url: &Url) -> bool {
        match self {
            AllowList::Hosts { exact, domains } => {
                let Some(host) = url.host_str() else {
                    return false;
                };
                exact.iter().any(|h| h == host)
                    || domains.iter().any(|d| {
                        host == d
                            || host
                                .strip_suffix(d.as_str())
                                .is_some_and(|rest| rest.ends_with('.'))
                    })
            }
            AllowList::Substrings(markers) => markers.iter().any(|m| url.as_str().contains(m.as_str())),
        }
    }
}

/// Where a request is headed, from the controller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Same origin as the controller scope.
    Shell,
    /// Allow-listed third party; eligible for the runtime namespace.
    Runtime,
    /// Anything else.
    Other,
}

/// Classify a URL. Allow-listed hosts win over same-origin.
pub fn classify(url: &Url, scope: &Url, allow: &AllowList) -> Route {
    if allow.matches(url) {
        Route::Runtime
    } else if url.origin() == scope.origin() {
        Route::Shell
    } else {
        Route::Other
    }
}
