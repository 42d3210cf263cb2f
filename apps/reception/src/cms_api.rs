//! # CMS REST Client
//!
//! Thin JSON client for the CMS endpoints the reception console calls.
//!
//! ```text
//!   request<T> ──► reqwest ──► status ok and no "error" key? ──► { data }
//!                                  │
//!                                  └── otherwise ──────────────► { error }
//! ```
//!
//! Nothing here returns `Err`: every failure (bad URL, connection refused,
//! non-2xx status, `{"error": ...}` body, undecodable JSON) ends up in
//! [`ApiResponse::error`].

use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

// =============================================================================
// Response Envelope
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ApiResponse {
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// What went wrong inside a request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx status or an `error` key in the body.
    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl<T> From<Result<T, ApiError>> for ApiResponse<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => ApiResponse::ok(data),
            Err(err) => ApiResponse::failed(err.to_string()),
        }
    }
}

/// Fails when the status is not 2xx or the body carries an `error` key.
pub fn check_body(status: StatusCode, body: &Value) -> Result<(), ApiError> {
    let error = body.get("error");
    if status.is_success() && error.is_none() {
        return Ok(());
    }
    let message = match error {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => format!("Request failed with status {}", status.as_u16()),
    };
    Err(ApiError::Server {
        status: status.as_u16(),
        message,
    })
}

// =============================================================================
// Media
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
            Orientation::Square => "square",
        }
    }
}

/// One file for `POST /cms/api/media`.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub alt_text: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: Url) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves `path` (with optional query string) against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    /// JSON request; never fails, see [`ApiResponse`].
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ApiResponse<T> {
        let result = self.send_json(method.clone(), path, body).await;
        if let Err(err) = &result {
            warn!(%method, path, error = %err, "CMS request failed");
        }
        result.into()
    }

    /// `GET /cms/api/pages/:shopId`
    pub async fn list_pages(&self, shop_id: &str) -> ApiResponse<Vec<Value>> {
        self.request(Method::GET, &format!("cms/api/pages/{shop_id}"), None)
            .await
    }

    /// `POST /cms/api/page-draft/:shopId`
    pub async fn save_draft(&self, shop_id: &str, page: &Value) -> ApiResponse<Value> {
        self.request(Method::POST, &format!("cms/api/page-draft/{shop_id}"), Some(page))
            .await
    }

    /// `POST /cms/api/page/:shopId`
    pub async fn publish_page(&self, shop_id: &str, page: &Value) -> ApiResponse<Value> {
        self.request(Method::POST, &format!("cms/api/page/{shop_id}"), Some(page))
            .await
    }

    /// `POST /cms/api/media?shop=&orientation=` as multipart form data.
    pub async fn upload_media(
        &self,
        shop_id: &str,
        orientation: Orientation,
        upload: MediaUpload,
    ) -> ApiResponse<MediaItem> {
        let result = self.send_media(shop_id, orientation, upload).await;
        if let Err(err) = &result {
            warn!(shop_id, error = %err, "Media upload failed");
        }
        result.into()
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        debug!(%method, %url, "CMS request");

        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        decode(response).await
    }

    async fn send_media(
        &self,
        shop_id: &str,
        orientation: Orientation,
        upload: MediaUpload,
    ) -> Result<MediaItem, ApiError> {
        let mut url = self.endpoint("cms/api/media")?;
        url.query_pairs_mut()
            .append_pair("shop", shop_id)
            .append_pair("orientation", orientation.as_str());

        let file = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)?;
        let mut form = Form::new().part("file", file);
        if let Some(alt) = upload.alt_text.filter(|a| !a.trim().is_empty()) {
            form = form.text("altText", alt);
        }
        if !upload.tags.is_empty() {
            form = form.text("tags", serde_json::to_string(&upload.tags)?);
        }

        debug!(%url, "CMS media upload");
        let response = self.http.post(url).multipart(form).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let text = response.text().await?;
    let body: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(err) if status.is_success() => return Err(err.into()),
            Err(_) => Value::Null,
        }
    };
    check_body(status, &body)?;
    Ok(serde_json::from_value(body)?)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> ApiClient {
        ApiClient::new(Url::parse("http://127.0.0.1:1/").unwrap())
    }

    #[test]
    fn test_error_key_fails_even_on_200() {
        let Err(err) = check_body(StatusCode::OK, &json!({"error": "Page not found"})) else {
            panic!("error body accepted");
        };
        assert_eq!(err.to_string(), "Page not found");
        assert!(check_body(StatusCode::OK, &json!({"id": "p1"})).is_ok());
    }

    #[test]
    fn test_status_without_body_message() {
        let Err(err) = check_body(StatusCode::BAD_GATEWAY, &Value::Null) else {
            panic!("502 accepted");
        };
        assert_eq!(err.to_string(), "Request failed with status 502");
    }

    #[test]
    fn test_endpoints_join_base() {
        let client = ApiClient::new(Url::parse("http://localhost:3006/").unwrap());
        assert_eq!(
            client.endpoint("cms/api/pages/shop-1").unwrap().as_str(),
            "http://localhost:3006/cms/api/pages/shop-1"
        );
    }

    #[test]
    fn test_envelope_serialization() {
        let ok = serde_json::to_value(ApiResponse::ok(json!({"id": 1}))).unwrap();
        assert_eq!(ok, json!({"data": {"id": 1}}));
        let failed = serde_json::to_value(ApiResponse::<Value>::failed("nope")).unwrap();
        assert_eq!(failed, json!({"error": "nope"}));
    }

    #[tokio::test]
    async fn test_connection_failure_is_captured() {
        let response = client().list_pages("shop-1").await;
        assert!(!response.is_ok());
        assert!(response.data.is_none());
        assert!(response.error.unwrap().starts_with("Request failed"));
    }

    #[tokio::test]
    async fn test_bad_mime_is_captured() {
        let upload = MediaUpload {
            file_name: "lobby.jpg".to_string(),
            mime_type: "not a mime".to_string(),
            bytes: vec![0xff, 0xd8],
            alt_text: None,
            tags: vec!["lobby".to_string()],
        };
        let response = client()
            .upload_media("shop-1", Orientation::Landscape, upload)
            .await;
        assert!(response.error.is_some());
    }
}
