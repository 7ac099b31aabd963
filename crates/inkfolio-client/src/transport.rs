//! Transport — the single point of entry for all backend HTTP calls.
//!
//! ARCHITECTURAL RULE: no other module builds requests or reads responses
//! directly. Every call goes through [`Transport::send`], which makes exactly
//! one network call and normalizes the outcome into `{payload, requestId}` or
//! a typed [`ApiError`]. Retries live in the workflow layer so a request
//! without an idempotency key is never silently double-submitted.

use reqwest::{header, multipart, Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::{ApiError, ErrorCode};
use crate::models::FilePayload;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request body: JSON or a multipart file, never both.
pub enum RequestBody {
    Empty,
    Json(Value),
    File(FilePayload),
}

/// One backend call. `path` is absolute backend-relative (`/v1/...`).
pub struct ApiRequest<'a> {
    pub method: Method,
    pub path: &'a str,
    pub body: RequestBody,
    pub token: Option<&'a str>,
    pub idempotency_key: Option<&'a str>,
    pub cancel: Option<&'a CancellationToken>,
}

impl<'a> ApiRequest<'a> {
    pub fn get(path: &'a str) -> Self {
        ApiRequest::new(Method::GET, path)
    }

    pub fn post(path: &'a str) -> Self {
        ApiRequest::new(Method::POST, path)
    }

    fn new(method: Method, path: &'a str) -> Self {
        ApiRequest {
            method,
            path,
            body: RequestBody::Empty,
            token: None,
            idempotency_key: None,
            cancel: None,
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn file(mut self, file: FilePayload) -> Self {
        self.body = RequestBody::File(file);
        self
    }

    pub fn token(mut self, token: Option<&'a str>) -> Self {
        self.token = token;
        self
    }

    pub fn idempotency_key(mut self, key: &'a str) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    pub fn cancel(mut self, cancel: Option<&'a CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Normalized success response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// JSON payload, `Value::Null` when the response had no JSON body.
    pub payload: Value,
    pub request_id: Option<String>,
}

impl ApiResponse {
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            ApiError::network(format!("Malformed response payload: {e}"))
        })
    }
}

/// HTTP transport bound to one backend base URL. Keeps a cookie store so the
/// backend's anonymous-session cookie persists across calls.
#[derive(Clone)]
pub struct Transport {
    http: Client,
    base_url: String,
}

impl Transport {
    pub fn new(config: &Config) -> Self {
        Transport {
            http: Client::builder()
                .cookie_store(true)
                .timeout(config.request_timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: config.base_url.clone(),
        }
    }

    /// Sends one request and normalizes the response. Never retries.
    pub async fn send(&self, request: ApiRequest<'_>) -> Result<ApiResponse, ApiError> {
        debug_assert!(
            request.path.starts_with('/'),
            "backend path must start with '/'"
        );
        let url = format!("{}{}", self.base_url, request.path);
        debug!("{} {}", request.method, request.path);

        let mut builder = self.http.request(request.method.clone(), &url);
        if let Some(token) = request.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(key) = request.idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::File(file) => {
                let part = multipart::Part::bytes(file.bytes.to_vec())
                    .file_name(file.file_name.clone())
                    .mime_str(&file.mime_type)
                    .map_err(|e| ApiError::network(format!("Invalid MIME type: {e}")))?;
                builder.multipart(multipart::Form::new().part("file", part))
            }
        };

        let response = match request.cancel {
            Some(cancel) => tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::cancelled()),
                response = builder.send() => response,
            },
            None => builder.send().await,
        };
        let response = response.map_err(|e| {
            warn!("request to {} failed: {e}", request.path);
            ApiError::network(format!("Network error: {e}"))
        })?;

        let status = response.status().as_u16();
        let header_request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);
        let payload = if is_json {
            response.json::<Value>().await.ok()
        } else {
            None
        };

        let normalized = classify_response(status, payload, header_request_id);
        if let Err(error) = &normalized {
            warn!(
                "{} {} -> {} ({})",
                request.method, request.path, status, error.code
            );
        }
        normalized
    }

    /// Fetches an artifact by absolute URL (e.g. the rendered resume HTML) and
    /// returns its body as text. Bypasses caches so a freshly rendered
    /// artifact is never served stale.
    pub async fn fetch_text(
        &self,
        url: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, ApiError> {
        let builder = self.http.get(url).header(header::CACHE_CONTROL, "no-store");

        let response = match cancel {
            Some(cancel) => tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::cancelled()),
                response = builder.send() => response,
            },
            None => builder.send().await,
        };
        let response =
            response.map_err(|e| ApiError::network(format!("Network error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError {
                code: ErrorCode::HttpError,
                message: format!("Request failed with status {}", status.as_u16()),
                request_id: None,
                http_status: Some(status.as_u16()),
            });
        }

        response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("Network error: {e}")))
    }
}

/// Pure response normalization, factored out so classification is testable
/// without IO.
///
/// Correlation id: the `x-request-id` header wins, falling back to one
/// embedded in the error body. On non-success the body's `error.code` and
/// `error.message` are used when present; otherwise a generic code/message is
/// synthesized from the HTTP status.
fn classify_response(
    status: u16,
    payload: Option<Value>,
    header_request_id: Option<String>,
) -> Result<ApiResponse, ApiError> {
    let body_request_id = payload
        .as_ref()
        .and_then(|p| p.pointer("/error/requestId"))
        .and_then(Value::as_str)
        .map(str::to_owned);
    let request_id = header_request_id.or(body_request_id);

    if (200..300).contains(&status) {
        return Ok(ApiResponse {
            payload: payload.unwrap_or(Value::Null),
            request_id,
        });
    }

    let code = payload
        .as_ref()
        .and_then(|p| p.pointer("/error/code"))
        .and_then(Value::as_str)
        .map(ErrorCode::from_code)
        .unwrap_or(ErrorCode::HttpError);
    let message = payload
        .as_ref()
        .and_then(|p| p.pointer("/error/message"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Request failed with status {status}"));

    Err(ApiError {
        code,
        message,
        request_id,
        http_status: Some(status),
    })
}
