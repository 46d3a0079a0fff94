//! Resilient request client.
//!
//! [`ApiClient`] wraps every call to the vault API. Each attempt carries a
//! fresh `X-Client-Request-Id`, the bearer credential when one is held, and
//! non-2xx responses are folded into [`ApiError`] with the server envelope,
//! correlation id and Retry-After wait attached.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::error::{ApiError, HttpFailure};
use super::notify::{ClientNotifier, RateLimitAdvisory};
use super::retry_after::parse_retry_after;
use super::session::Session;
use crate::config::ClientConfig;
use crate::user_agent;

/// Header carrying the client-generated correlation id.
pub const CLIENT_REQUEST_ID_HEADER: &str = "X-Client-Request-Id";

/// Header carrying the server-assigned correlation id.
pub const SERVER_REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Message used when a JSON error envelope has no message.
const ENVELOPE_FALLBACK_MESSAGE: &str = "An error occurred";

/// Body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// 204, or a success with no body at all.
    Empty,
    /// Parsed JSON document.
    Json(Value),
    /// Non-JSON content; wraps the raw text.
    Text(String),
}

/// A successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// The 2xx status code.
    pub status: u16,
    /// The decoded body.
    pub body: ResponseBody,
}

impl ApiResponse {
    /// Whether the response carried no value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self.body, ResponseBody::Empty)
    }

    /// Decodes a JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MalformedResponse`] if the body is empty, not JSON,
    /// or does not match `T`.
    pub fn json<T: DeserializeOwned>(self, endpoint: &str) -> Result<T, ApiError> {
        let status = self.status;
        self.optional_json(endpoint)?
            .ok_or_else(|| ApiError::malformed(endpoint, status))
    }

    /// Decodes a JSON body into `T`, mapping an empty body to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MalformedResponse`] if the body is text or does not match `T`.
    pub fn optional_json<T: DeserializeOwned>(self, endpoint: &str) -> Result<Option<T>, ApiError> {
        match self.body {
            ResponseBody::Empty => Ok(None),
            ResponseBody::Json(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| {
                    debug!(endpoint, error = %e, "response JSON did not match expected shape");
                    ApiError::malformed(endpoint, self.status)
                }),
            ResponseBody::Text(_) => Err(ApiError::malformed(endpoint, self.status)),
        }
    }
}

/// Error envelope sent by the API on non-2xx JSON responses.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    path: Option<String>,
    timestamp: Option<Value>,
}

/// HTTP client for the vault API.
///
/// Cheap to clone; clones share the connection pool, the [`Session`], and
/// the notifier.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    session: Arc<Session>,
    notifier: Arc<dyn ClientNotifier>,
}

impl ApiClient {
    /// Creates a client for `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] if the base URL does not parse or
    /// the HTTP client cannot be built.
    pub fn new(
        config: &ClientConfig,
        session: Arc<Session>,
        notifier: Arc<dyn ClientNotifier>,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::invalid_request(&config.base_url, e.to_string()))?;
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|e| ApiError::invalid_request(&config.base_url, e.to_string()))?;

        debug!(base_url = %base_url, "created API client");
        Ok(Self {
            http,
            base_url,
            session,
            notifier,
        })
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the shared session.
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Resolves an endpoint path against the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] if the joined URL is invalid.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(endpoint)
            .map_err(|e| ApiError::invalid_request(endpoint, e.to_string()))
    }

    /// Starts a request with the correlation id and credential attached.
    ///
    /// Returns the builder and the generated client request id. Callers add
    /// their body afterwards.
    pub fn request(&self, method: Method, url: Url) -> (RequestBuilder, Uuid) {
        let client_request_id = Uuid::new_v4();
        let mut builder = self
            .http
            .request(method, url)
            .header(CLIENT_REQUEST_ID_HEADER, client_request_id.to_string());
        if let Some(token) = self.session.token() {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        (builder, client_request_id)
    }

    /// Executes a request and decodes its success body.
    ///
    /// `body` is serialized as JSON only when present; otherwise no
    /// `Content-Type` is sent. Extra `headers` cannot replace the credential
    /// or the correlation id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] for transport failures, non-2xx responses, and
    /// JSON success responses that fail to parse.
    #[instrument(skip(self, body, headers), fields(client_request_id))]
    pub async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        headers: &HeaderMap,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.endpoint_url(endpoint)?;
        let (mut builder, client_request_id) = self.request(method, url);
        tracing::Span::current().record("client_request_id", client_request_id.to_string());

        // Caller headers may not override the credential or correlation id.
        let mut merged = headers.clone();
        merged.remove(CLIENT_REQUEST_ID_HEADER);
        merged.remove(AUTHORIZATION);
        builder = builder.headers(merged);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = self.send(builder, endpoint).await?;
        decode_success(response, endpoint).await
    }

    /// `GET` with no body.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn get(&self, endpoint: &str) -> Result<ApiResponse, ApiError> {
        self.execute(Method::GET, endpoint, None, &HeaderMap::new())
            .await
    }

    /// `GET` decoding the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute); an empty body is a malformed response.
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.get(endpoint).await?.json(endpoint)
    }

    /// `POST` with an optional JSON body.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn post(&self, endpoint: &str, body: Option<&Value>) -> Result<ApiResponse, ApiError> {
        self.execute(Method::POST, endpoint, body, &HeaderMap::new())
            .await
    }

    /// `DELETE` with no body.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn delete(&self, endpoint: &str) -> Result<ApiResponse, ApiError> {
        self.execute(Method::DELETE, endpoint, None, &HeaderMap::new())
            .await
    }

    /// `HEAD` probe returning only the response headers.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    #[instrument(skip(self), fields(client_request_id))]
    pub async fn head(&self, endpoint: &str) -> Result<HeaderMap, ApiError> {
        let url = self.endpoint_url(endpoint)?;
        let (builder, client_request_id) = self.request(Method::HEAD, url);
        tracing::Span::current().record("client_request_id", client_request_id.to_string());
        let response = self.send(builder, endpoint).await?;
        Ok(response.headers().clone())
    }

    /// Sends a prepared request, converting non-2xx responses into [`ApiError`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] on transport failure and
    /// [`ApiError::Http`] for non-2xx statuses.
    pub async fn send(&self, builder: RequestBuilder, endpoint: &str) -> Result<Response, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::network(endpoint, e))?;

        if response.status().is_success() {
            debug!(endpoint, status = response.status().as_u16(), "request succeeded");
            Ok(response)
        } else {
            Err(self.failure_from_response(endpoint, response).await)
        }
    }

    /// Builds the typed error for a non-2xx response and fires the side channels.
    ///
    /// A 401 clears the session; only the call that actually cleared a
    /// credential notifies, so a burst of 401s yields one expiry signal. A
    /// 429 raises a rate-limit advisory. Neither triggers a retry.
    pub async fn failure_from_response(&self, endpoint: &str, response: Response) -> ApiError {
        let status = response.status();
        let code = status.as_u16();
        let headers = response.headers();
        let request_id = header_string(headers, SERVER_REQUEST_ID_HEADER);
        let retry_after = (code == 429)
            .then(|| parse_retry_after(header_string(headers, RETRY_AFTER.as_str()).as_deref()));
        let json = is_json(headers);
        let request_path = response.url().path().to_string();
        let text = response.text().await.unwrap_or_default();

        let envelope = if json {
            serde_json::from_str::<ErrorEnvelope>(&text).ok()
        } else {
            None
        };

        let failure = match envelope {
            Some(envelope) => HttpFailure {
                status: code,
                message: envelope
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| ENVELOPE_FALLBACK_MESSAGE.to_string()),
                path: envelope.path,
                timestamp: envelope.timestamp.map(|ts| match ts {
                    Value::String(s) => s,
                    other => other.to_string(),
                }),
                request_id,
                retry_after,
            },
            None => HttpFailure {
                status: code,
                message: if text.trim().is_empty() {
                    status.canonical_reason().unwrap_or("HTTP error").to_string()
                } else {
                    text
                },
                path: Some(request_path),
                timestamp: None,
                request_id,
                retry_after,
            },
        };

        match code {
            401 => {
                if self.session.expire() {
                    info!(endpoint, "credential rejected; signalling session expiry");
                    self.notifier.session_expired();
                }
            }
            429 => {
                let wait = failure.retry_after.unwrap_or_default();
                warn!(endpoint, retry_after_secs = wait, "rate limited by server");
                self.notifier.rate_limited(RateLimitAdvisory::new(
                    wait,
                    endpoint,
                    failure.request_id.clone(),
                ));
            }
            _ => {
                debug!(endpoint, status = code, message = %failure.message, "request failed");
            }
        }

        ApiError::http(endpoint, failure)
    }
}

async fn decode_success(response: Response, endpoint: &str) -> Result<ApiResponse, ApiError> {
    let status = response.status().as_u16();
    if status == 204 {
        return Ok(ApiResponse {
            status,
            body: ResponseBody::Empty,
        });
    }

    let json = is_json(response.headers());
    let text = response
        .text()
        .await
        .map_err(|e| ApiError::network(endpoint, e))?;

    if text.trim().is_empty() {
        return Ok(ApiResponse {
            status,
            body: ResponseBody::Empty,
        });
    }

    if !json {
        return Ok(ApiResponse {
            status,
            body: ResponseBody::Text(text),
        });
    }

    serde_json::from_str(&text)
        .map(|value| ApiResponse {
            status,
            body: ResponseBody::Json(value),
        })
        .map_err(|_| ApiError::malformed(endpoint, status))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
