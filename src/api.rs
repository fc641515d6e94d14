//! Thin typed access to the remote REST API.
//!
//! The API wraps successful payloads as `{ "data": ... }` and reports
//! failures as `{ "message": ... }`. [`Transport`] moves JSON over the wire;
//! [`Api`] unwraps envelopes into typed values.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{ApiError, ValidationError};
use crate::session::Session;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !IMAGE_TYPES.contains(&self.content_type.as_str()) {
            return Err(ValidationError::UnsupportedImage {
                name: self.file_name.clone(),
                content_type: self.content_type.clone(),
            });
        }
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(ValidationError::ImageTooLarge {
                name: self.file_name.clone(),
                size: self.bytes.len(),
                limit: MAX_IMAGE_BYTES,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Json(Value),
    Images(Vec<ImageUpload>),
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub payload: Payload,
    pub token: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            query: Vec::new(),
            payload: Payload::Empty,
            token: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        self.payload = Payload::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn images(mut self, images: Vec<ImageUpload>) -> Self {
        self.payload = Payload::Images(images);
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn auth(mut self, session: &Session) -> Self {
        self.token = Some(session.token.clone());
        self
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the decoded response body
    /// (`Value::Null` for an empty body).
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct HttpTransport {
    http: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(HttpTransport {
            http,
            base: with_trailing_slash(base),
        })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = self.endpoint(&request.path)?;
        debug!("{} {}", request.method, url);

        let authenticated = request.token.is_some();
        let mut builder = self.http.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.token {
            builder = builder.bearer_auth(token);
        }
        builder = match request.payload {
            Payload::Empty => builder,
            Payload::Json(body) => builder.json(&body),
            Payload::Images(images) => {
                let mut form = Form::new();
                for image in images {
                    let part = Part::bytes(image.bytes)
                        .file_name(image.file_name)
                        .mime_str(&image.content_type)?;
                    form = form.part("images", part);
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(response_error(status, &text, authenticated));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// A 401 on a request that carried a token means the session is gone.
/// Without a token (login, register) it is an ordinary rejection and keeps
/// the server's message.
pub(crate) fn response_error(status: StatusCode, body: &str, authenticated: bool) -> ApiError {
    if status == StatusCode::UNAUTHORIZED && authenticated {
        return ApiError::Unauthorized;
    }
    status_error(status, body)
}

fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Envelope-aware access on top of a [`Transport`].
#[derive(Clone)]
pub struct Api {
    transport: Arc<dyn Transport>,
}

impl Api {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Api { transport }
    }

    /// Whole response body, for the endpoints that skip the envelope.
    pub async fn raw<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let body = self.transport.send(request).await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn data<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let body = self.transport.send(request).await?;
        Ok(serde_json::from_value(take_data(body))?)
    }

    /// Like [`Api::data`], but a missing `data` field reads as an empty list.
    pub async fn list<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Vec<T>, ApiError> {
        let body = self.transport.send(request).await?;
        match take_data(body) {
            Value::Null => Ok(Vec::new()),
            data => Ok(serde_json::from_value(data)?),
        }
    }

    pub async fn send(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.transport.send(request).await.map(|_| ())
    }
}

fn take_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
