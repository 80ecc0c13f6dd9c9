//! Scripted upstream for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use harbor_core::{Error, RequestDescriptor, ResponseSnapshot};

use crate::fetch::Upstream;

#[derive(Debug, Clone)]
enum Reply {
    Respond(ResponseSnapshot),
    Fail,
}

/// Upstream answering from a URL table and recording every request it sees.
/// Unknown URLs fail like an unreachable host.
#[derive(Debug, Default)]
pub(crate) struct StubUpstream {
    replies: Mutex<HashMap<String, Reply>>,
    hits: Mutex<Vec<String>>,
}

impl StubUpstream {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, url: &str, status: u16, body: &str) -> Self {
        self.set_response(ResponseSnapshot::new(url, status, body));
        self
    }

    pub(crate) fn fail(self, url: &str) -> Self {
        self.set_offline(url);
        self
    }

    pub(crate) fn set_response(&self, response: ResponseSnapshot) {
        self.replies
            .lock()
            .unwrap()
            .insert(response.url.clone(), Reply::Respond(response));
    }

    pub(crate) fn set_offline(&self, url: &str) {
        self.replies.lock().unwrap().insert(url.to_string(), Reply::Fail);
    }

    /// Every `METHOD url` seen, in order.
    pub(crate) fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub(crate) fn hit_count(&self, url: &str) -> usize {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .filter(|hit| hit.split_once(' ').is_some_and(|(_, u)| u == url))
            .count()
    }
}

#[async_trait::async_trait]
impl Upstream for StubUpstream {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        let url = request.url().to_string();
        self.hits.lock().unwrap().push(format!("{} {url}", request.method()));

        match self.replies.lock().unwrap().get(&url).cloned() {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail) | None => Err(Error::Network(format!("{url}: connection refused"))),
        }
    }
}
