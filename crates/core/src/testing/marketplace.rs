//! Scripted marketplace API

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use sellersync_domain::{Result, SellerSyncError};
use serde_json::Value;

use crate::marketplace::ports::{ApiRequest, MarketplaceApi};

/// One request as the fake received it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub access_token: String,
    pub request: ApiRequest,
}

#[derive(Default)]
struct Route {
    once: VecDeque<Result<Value>>,
    always: Option<Result<Value>>,
}

/// Routes requests by path (and optionally `offset`) to scripted responses.
///
/// A route registered with [`on_page`](Self::on_page) matches only requests
/// carrying that `offset` query value and takes priority over the plain
/// path route. Unrouted requests fail with a 404 `UpstreamError`.
#[derive(Default)]
pub struct FakeMarketplace {
    routes: Mutex<HashMap<String, Route>>,
    accepted_tokens: Mutex<Option<HashSet<String>>>,
    panics: Mutex<HashSet<String>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeMarketplace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn upstream(status: u16, message: &str) -> SellerSyncError {
        SellerSyncError::UpstreamError { status, message: message.to_string() }
    }

    pub fn on(&self, path: &str, body: Value) {
        self.routes.lock().entry(path.to_string()).or_default().always = Some(Ok(body));
    }

    pub fn once(&self, path: &str, body: Value) {
        self.routes.lock().entry(path.to_string()).or_default().once.push_back(Ok(body));
    }

    pub fn on_page(&self, path: &str, offset: u32, body: Value) {
        self.on(&Self::page_key(path, &offset.to_string()), body);
    }

    pub fn fail(&self, path: &str, error: SellerSyncError) {
        self.routes.lock().entry(path.to_string()).or_default().always = Some(Err(error));
    }

    pub fn fail_once(&self, path: &str, error: SellerSyncError) {
        self.routes.lock().entry(path.to_string()).or_default().once.push_back(Err(error));
    }

    /// Panic inside `send` for requests to `path`.
    pub fn panic_on(&self, path: &str) {
        self.panics.lock().insert(path.to_string());
    }

    /// Reject every access token not in `tokens` with `Unauthorized`.
    pub fn accept_only(&self, tokens: &[&str]) {
        *self.accepted_tokens.lock() = Some(tokens.iter().map(ToString::to_string).collect());
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Calls whose path equals `path`.
    #[must_use]
    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls.lock().iter().filter(|c| c.request.path == path).cloned().collect()
    }

    fn page_key(path: &str, offset: &str) -> String {
        format!("{path}?offset={offset}")
    }

    fn respond(&self, request: &ApiRequest) -> Result<Value> {
        let mut routes = self.routes.lock();
        let mut keys = Vec::with_capacity(2);
        if let Some(offset) = request.query_value("offset") {
            keys.push(Self::page_key(&request.path, offset));
        }
        keys.push(request.path.clone());

        for key in keys {
            if let Some(route) = routes.get_mut(&key) {
                if let Some(response) = route.once.pop_front() {
                    return response;
                }
                if let Some(response) = &route.always {
                    return response.clone();
                }
            }
        }
        Err(Self::upstream(404, &format!("no route for {}", request.path)))
    }
}

#[async_trait]
impl MarketplaceApi for FakeMarketplace {
    async fn send(&self, access_token: &str, request: &ApiRequest) -> Result<Value> {
        self.calls
            .lock()
            .push(RecordedCall { access_token: access_token.to_string(), request: request.clone() });

        if let Some(accepted) = self.accepted_tokens.lock().as_ref() {
            if !accepted.contains(access_token) {
                return Err(SellerSyncError::Unauthorized("invalid access token".into()));
            }
        }
        if self.panics.lock().contains(&request.path) {
            panic!("scripted panic for {}", request.path);
        }
        self.respond(request)
    }
}
