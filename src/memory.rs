//! Test support: an in-memory [`UrlApi`] backend with a call log.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::{
    api::{ApiError, ApiResponse, UrlApi},
    dates,
    model::{BackendDate, CreateUrlRequest, ShortLink, UrlPatch},
};

/// A call received by [`MemoryUrlApi`], in arrival order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApiCall {
    List,
    Get(String),
    Create(CreateUrlRequest),
    Update(String, UrlPatch),
    Delete(String),
}

#[derive(Debug, Default)]
struct State {
    links: Vec<ShortLink>,
    calls: Vec<ApiCall>,
    next_key: u64,
    unreachable: bool,
}

/// In-memory stand-in for the shortening backend. Test support only: the unit
/// and integration tests drive the manager, renderer and CLI through it, and
/// nothing in the binary constructs one. Answers the way the real service
/// does: 404 for unknown keys, 400 for expired links and 409 for a taken alias.
/// Clones share state.
#[derive(Clone, Debug, Default)]
pub struct MemoryUrlApi {
    state: Arc<Mutex<State>>,
}

impl MemoryUrlApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_links(links: Vec<ShortLink>) -> Self {
        let api = Self::new();
        api.lock().links = links;
        api
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // a panic while holding the lock only happens in a failing test
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every following call fails as if the backend were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    pub fn links(&self) -> Vec<ShortLink> {
        self.lock().links.clone()
    }

    fn record(&self, call: ApiCall) -> Result<std::sync::MutexGuard<'_, State>, ApiError> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.unreachable {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        Ok(state)
    }
}

fn alias_taken(links: &[ShortLink], alias: &str, except_key: Option<&str>) -> bool {
    !alias.is_empty()
        && links
            .iter()
            .any(|link| Some(link.key.as_str()) != except_key && (link.alias == alias || link.key == alias))
}

fn parse_expiration(value: &str) -> Result<BackendDate, ApiError> {
    dates::from_iso_utc(value)
        .map(BackendDate)
        .map_err(|_| ApiError::Status(StatusCode::BAD_REQUEST))
}

#[async_trait]
impl UrlApi for MemoryUrlApi {
    async fn list(&self) -> Result<ApiResponse, ApiError> {
        let state = self.record(ApiCall::List)?;
        Ok(ApiResponse::json_body(StatusCode::OK, &state.links))
    }

    async fn get(&self, key_or_alias: &str) -> Result<ApiResponse, ApiError> {
        let mut state = self.record(ApiCall::Get(key_or_alias.to_string()))?;
        let now = dates::now_local();
        let Some(link) = state
            .links
            .iter_mut()
            .find(|link| link.key == key_or_alias || (!link.alias.is_empty() && link.alias == key_or_alias))
        else {
            return Ok(ApiResponse::new(StatusCode::NOT_FOUND, ""));
        };
        if link.expires_at.is_some_and(|expires_at| expires_at.0 <= now) {
            return Ok(ApiResponse::new(StatusCode::BAD_REQUEST, ""));
        }
        link.hit += 1;
        let resolved = serde_json::json!({"url": link.url});
        Ok(ApiResponse::json_body(StatusCode::OK, &resolved))
    }

    async fn create(&self, request: &CreateUrlRequest) -> Result<ShortLink, ApiError> {
        let mut state = self.record(ApiCall::Create(request.clone()))?;
        let alias = request.alias.clone().unwrap_or_default();
        if alias_taken(&state.links, &alias, None) {
            return Err(ApiError::Status(StatusCode::CONFLICT));
        }
        let expires_at = request.expires_at.as_deref().map(parse_expiration).transpose()?;

        state.next_key += 1;
        let link = ShortLink {
            key: format!("k{:05}", state.next_key),
            url: request.url.clone(),
            alias,
            hit: 0,
            created_at: BackendDate(dates::now_local()),
            expires_at,
        };
        state.links.push(link.clone());
        Ok(link)
    }

    async fn update(&self, key: &str, patch: &UrlPatch) -> Result<ShortLink, ApiError> {
        let mut state = self.record(ApiCall::Update(key.to_string(), patch.clone()))?;
        if let Some(alias) = &patch.alias
            && alias_taken(&state.links, alias, Some(key))
        {
            return Err(ApiError::Status(StatusCode::CONFLICT));
        }
        let expires_at = match &patch.expires_at {
            Some(Some(value)) => Some(Some(parse_expiration(value)?)),
            Some(None) => Some(None),
            None => None,
        };
        let Some(link) = state.links.iter_mut().find(|link| link.key == key) else {
            return Err(ApiError::Status(StatusCode::NOT_FOUND));
        };
        if let Some(url) = &patch.url {
            link.url = url.clone();
        }
        if let Some(alias) = &patch.alias {
            link.alias = alias.clone();
        }
        if let Some(expires_at) = expires_at {
            link.expires_at = expires_at;
        }
        Ok(link.clone())
    }

    async fn delete(&self, key: &str) -> Result<ApiResponse, ApiError> {
        let mut state = self.record(ApiCall::Delete(key.to_string()))?;
        let before = state.links.len();
        state.links.retain(|link| link.key != key);
        if state.links.len() == before {
            return Ok(ApiResponse::new(StatusCode::NOT_FOUND, ""));
        }
        Ok(ApiResponse::new(StatusCode::NO_CONTENT, ""))
    }
}
