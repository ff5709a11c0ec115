//! Resolving a key or alias to its destination.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use reqwest::StatusCode;

use crate::{api::UrlApi, model::Resolved};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RedirectError {
    Expired,  // 400 from the backend
    NotFound, // 404
    Other,
}

impl RedirectError {
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST => RedirectError::Expired,
            StatusCode::NOT_FOUND => RedirectError::NotFound,
            _ => RedirectError::Other,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RedirectError::Expired => "El enlace ha expirado y ha sido eliminado.",
            RedirectError::NotFound => "El enlace no existe o ha sido eliminado.",
            RedirectError::Other => "No se pudo redirigir. Por favor, intente de nuevo.",
        }
    }
}

impl std::fmt::Display for RedirectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedirectError::Expired => write!(f, "link expired"),
            RedirectError::NotFound => write!(f, "link not found"),
            RedirectError::Other => write!(f, "redirect failed"),
        }
    }
}

impl std::error::Error for RedirectError {}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RedirectState {
    Loading,
    Failed(RedirectError),
    Navigated(String),
}

/// Where a successful resolution sends the visitor.
pub trait Navigator {
    fn navigate(&mut self, url: &str);
}

/// Shared flag telling an in-flight resolution whether its view still exists.
#[derive(Clone, Debug)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    fn new() -> Self {
        Liveness(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn end(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Ends the view's liveness when dropped.
#[derive(Debug)]
pub struct MountGuard(Liveness);

impl MountGuard {
    pub fn liveness(&self) -> Liveness {
        self.0.clone()
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        self.0.end();
    }
}

/// Asks the backend for the destination of `key_or_alias`.
pub async fn fetch_destination(api: &dyn UrlApi, key_or_alias: &str) -> Result<String, RedirectError> {
    let response = api.get(key_or_alias).await.map_err(|e| {
        tracing::error!("resolving {key_or_alias}: {e}");
        RedirectError::Other
    })?;
    tracing::debug!("resolving {key_or_alias}: {}", response.status());
    if !response.is_ok() {
        return Err(RedirectError::from_status(response.status()));
    }
    response.json::<Resolved>().map(|resolved| resolved.url).map_err(|e| {
        tracing::error!("resolving {key_or_alias}: {e}");
        RedirectError::Other
    })
}

/// The redirect page: starts in `Loading`, ends either navigated or failed.
#[derive(Debug)]
pub struct RedirectView {
    key_or_alias: String,
    state: RedirectState,
    liveness: Liveness,
}

impl RedirectView {
    /// The view lives until the returned guard is dropped.
    pub fn mount(key_or_alias: &str) -> (Self, MountGuard) {
        let liveness = Liveness::new();
        let view = Self {
            key_or_alias: key_or_alias.to_string(),
            state: RedirectState::Loading,
            liveness: liveness.clone(),
        };
        (view, MountGuard(liveness))
    }

    pub fn key_or_alias(&self) -> &str {
        &self.key_or_alias
    }

    pub fn state(&self) -> &RedirectState {
        &self.state
    }

    /// Resolves and either navigates or records the error. A completion that
    /// arrives after unmount changes nothing.
    pub async fn resolve<N: Navigator + Send>(&mut self, api: &dyn UrlApi, navigator: &mut N) -> &RedirectState {
        self.state = RedirectState::Loading;
        let result = fetch_destination(api, &self.key_or_alias).await;

        if !self.liveness.is_alive() {
            tracing::debug!("dropping stale resolution of {}", &self.key_or_alias);
            return &self.state;
        }
        match result {
            Ok(url) => {
                navigator.navigate(&url);
                self.state = RedirectState::Navigated(url);
            }
            Err(e) => {
                tracing::info!("{}: {e}", &self.key_or_alias);
                self.state = RedirectState::Failed(e);
            }
        }
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        api::{ApiError, ApiResponse},
        model::{CreateUrlRequest, ShortLink, UrlPatch},
    };

    /// Answers every lookup with a fixed response, optionally unmounting the
    /// view while the call is in flight.
    struct Scripted {
        response: Result<ApiResponse, ApiError>,
        unmount: Option<Liveness>,
    }

    impl Scripted {
        fn status(status: StatusCode, body: &str) -> Self {
            Self {
                response: Ok(ApiResponse::new(status, body)),
                unmount: None,
            }
        }
    }

    #[async_trait]
    impl UrlApi for Scripted {
        async fn list(&self) -> Result<ApiResponse, ApiError> {
            unimplemented!()
        }

        async fn get(&self, _key_or_alias: &str) -> Result<ApiResponse, ApiError> {
            if let Some(liveness) = &self.unmount {
                liveness.end();
            }
            self.response.clone()
        }

        async fn create(&self, _request: &CreateUrlRequest) -> Result<ShortLink, ApiError> {
            unimplemented!()
        }

        async fn update(&self, _key: &str, _patch: &UrlPatch) -> Result<ShortLink, ApiError> {
            unimplemented!()
        }

        async fn delete(&self, _key: &str) -> Result<ApiResponse, ApiError> {
            unimplemented!()
        }
    }

    #[derive(Default)]
    struct RecordingNavigator {
        visited: Vec<String>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&mut self, url: &str) {
            self.visited.push(url.to_string());
        }
    }

    async fn run(api: Scripted) -> (RedirectState, Vec<String>) {
        let (mut view, _guard) = RedirectView::mount("abc");
        let mut navigator = RecordingNavigator::default();
        let state = view.resolve(&api, &mut navigator).await.clone();
        (state, navigator.visited)
    }

    #[tokio::test]
    async fn test_ok_navigates_to_exact_url() {
        let api = Scripted::status(StatusCode::OK, r#"{"url":"https://example.com"}"#);
        let (state, visited) = run(api).await;
        assert_eq!(state, RedirectState::Navigated("https://example.com".to_string()));
        assert_eq!(visited, vec!["https://example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_not_found() {
        let (state, visited) = run(Scripted::status(StatusCode::NOT_FOUND, "")).await;
        assert_eq!(state, RedirectState::Failed(RedirectError::NotFound));
        assert!(visited.is_empty());
    }

    #[tokio::test]
    async fn test_expired() {
        let (state, visited) = run(Scripted::status(StatusCode::BAD_REQUEST, "")).await;
        assert_eq!(state, RedirectState::Failed(RedirectError::Expired));
        assert!(visited.is_empty());
    }

    #[tokio::test]
    async fn test_other_failures() {
        let (state, _) = run(Scripted::status(StatusCode::INTERNAL_SERVER_ERROR, "")).await;
        assert_eq!(state, RedirectState::Failed(RedirectError::Other));

        let (state, _) = run(Scripted::status(StatusCode::OK, "not json")).await;
        assert_eq!(state, RedirectState::Failed(RedirectError::Other));

        let unreachable = Scripted {
            response: Err(ApiError::Transport("connection refused".to_string())),
            unmount: None,
        };
        let (state, visited) = run(unreachable).await;
        assert_eq!(state, RedirectState::Failed(RedirectError::Other));
        assert!(visited.is_empty());
    }

    #[tokio::test]
    async fn test_stale_completion_is_ignored() {
        let (mut view, guard) = RedirectView::mount("abc");
        let mut api = Scripted::status(StatusCode::OK, r#"{"url":"https://example.com"}"#);
        api.unmount = Some(guard.liveness());
        let mut navigator = RecordingNavigator::default();

        let state = view.resolve(&api, &mut navigator).await;
        assert_eq!(*state, RedirectState::Loading);
        assert!(navigator.visited.is_empty());
    }

    #[tokio::test]
    async fn test_stale_error_is_ignored() {
        let (mut view, guard) = RedirectView::mount("abc");
        let mut api = Scripted::status(StatusCode::NOT_FOUND, "");
        api.unmount = Some(guard.liveness());
        let mut navigator = RecordingNavigator::default();

        view.resolve(&api, &mut navigator).await;
        assert_eq!(*view.state(), RedirectState::Loading);
    }

    #[test]
    fn test_guard_drop_ends_liveness() {
        let (view, guard) = RedirectView::mount("abc");
        assert!(view.liveness.is_alive());
        drop(guard);
        assert!(!view.liveness.is_alive());
    }
}
