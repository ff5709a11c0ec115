//! Client for the shortening backend's `/urls` resource.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::model::{CreateUrlRequest, ShortLink, UrlPatch};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApiError {
    /// The request never produced a response.
    Transport(String),
    /// A create or update answered with a non-success status.
    Status(StatusCode),
    /// The body was not the JSON we expected.
    Decode(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Transport(message) => write!(f, "backend unreachable: {}", message),
            ApiError::Status(status) => write!(f, "backend answered {}", status),
            ApiError::Decode(message) => write!(f, "unexpected backend response: {}", message),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

/// A backend response whose status the caller is expected to check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiResponse {
    status: StatusCode,
    body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json_body<T: serde::Serialize>(status: StatusCode, value: &T) -> Self {
        Self::new(status, serde_json::to_string(value).unwrap_or_default())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// True for any 2xx status.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// The five backend operations. `list`, `get` and `delete` hand back the raw
/// response; `create` and `update` return the record the backend echoes.
#[async_trait]
pub trait UrlApi: Send + Sync {
    async fn list(&self) -> Result<ApiResponse, ApiError>;

    async fn get(&self, key_or_alias: &str) -> Result<ApiResponse, ApiError>;

    async fn create(&self, request: &CreateUrlRequest) -> Result<ShortLink, ApiError>;

    async fn update(&self, key: &str, patch: &UrlPatch) -> Result<ShortLink, ApiError>;

    async fn delete(&self, key: &str) -> Result<ApiResponse, ApiError>;
}

/// [`UrlApi`] over HTTP. No retries and no caching.
#[derive(Clone, Debug)]
pub struct HttpUrlApi {
    client: reqwest::Client,
    base: String,
}

impl HttpUrlApi {
    pub fn new(base_url: &Url) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &Url) -> Self {
        Self {
            client,
            base: base_url.as_str().trim_end_matches('/').to_string(),
        }
    }

    fn collection(&self) -> String {
        format!("{}/urls/", self.base)
    }

    fn member(&self, segment: &str) -> String {
        format!("{}/urls/{}", self.base, urlencoding::encode(segment))
    }

    async fn into_api_response(response: reqwest::Response) -> Result<ApiResponse, ApiError> {
        let status = response.status();
        let body = response.text().await?;
        Ok(ApiResponse::new(status, body))
    }

    async fn into_link(response: reqwest::Response) -> Result<ShortLink, ApiError> {
        let response = Self::into_api_response(response).await?;
        if !response.is_ok() {
            return Err(ApiError::Status(response.status()));
        }
        response.json()
    }
}

#[async_trait]
impl UrlApi for HttpUrlApi {
    async fn list(&self) -> Result<ApiResponse, ApiError> {
        let url = self.collection();
        tracing::debug!("GET {}", &url);
        let response = self.client.get(&url).send().await?;
        Self::into_api_response(response).await
    }

    async fn get(&self, key_or_alias: &str) -> Result<ApiResponse, ApiError> {
        let url = self.member(key_or_alias);
        tracing::debug!("GET {}", &url);
        let response = self.client.get(&url).send().await?;
        Self::into_api_response(response).await
    }

    async fn create(&self, request: &CreateUrlRequest) -> Result<ShortLink, ApiError> {
        let url = self.collection();
        tracing::debug!("POST {} {:?}", &url, request);
        let response = self.client.post(&url).json(request).send().await?;
        Self::into_link(response).await
    }

    async fn update(&self, key: &str, patch: &UrlPatch) -> Result<ShortLink, ApiError> {
        let url = self.member(key);
        tracing::debug!("PUT {} {:?}", &url, patch);
        let response = self.client.put(&url).json(patch).send().await?;
        Self::into_link(response).await
    }

    async fn delete(&self, key: &str) -> Result<ApiResponse, ApiError> {
        let url = self.member(key);
        tracing::debug!("DELETE {}", &url);
        let response = self.client.delete(&url).send().await?;
        Self::into_api_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let api = HttpUrlApi::new(&Url::parse("http://localhost:8080/api/").unwrap());
        assert_eq!(api.collection(), "http://localhost:8080/api/urls/");
        assert_eq!(api.member("abc"), "http://localhost:8080/api/urls/abc");
        assert_eq!(api.member("a/b c"), "http://localhost:8080/api/urls/a%2Fb%20c");
    }

    #[test]
    fn test_response_status() {
        assert!(ApiResponse::new(StatusCode::OK, "").is_ok());
        assert!(ApiResponse::new(StatusCode::NO_CONTENT, "").is_ok());
        assert!(!ApiResponse::new(StatusCode::NOT_FOUND, "").is_ok());
        assert!(!ApiResponse::new(StatusCode::BAD_REQUEST, "").is_ok());
    }

    #[test]
    fn test_response_json() {
        let response = ApiResponse::new(StatusCode::OK, r#"{"url":"https://example.com"}"#);
        let resolved: crate::model::Resolved = response.json().unwrap();
        assert_eq!(resolved.url, "https://example.com");

        let broken = ApiResponse::new(StatusCode::OK, "<html>");
        assert!(matches!(broken.json::<crate::model::Resolved>(), Err(ApiError::Decode(_))));
    }
}
