//! JSON-over-HTTP transport for REST-controlled chargers
//!
//! Adapters build a [`Request`] and hand it to a [`JsonTransport`]. The
//! production transport is [`HttpHelper`] on top of `reqwest`; tests swap in
//! an in-memory transport that records requests.

use crate::error::{ChargerError, Result};
use crate::logging::get_logger;
use serde_json::Value;
use std::time::Duration;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP method subset used by charger APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
}

/// Request authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Basic { user: String, password: String },
    Bearer(String),
}

/// A single JSON request
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub auth: Option<Auth>,
    pub body: Option<Value>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            auth: None,
            body: None,
        }
    }

    pub fn put(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            url: url.into(),
            auth: None,
            body: Some(body),
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            auth: None,
            body: Some(body),
        }
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }
}

/// Request/response exchange of JSON documents.
///
/// Non-success responses surface as [`ChargerError::Http`] carrying the raw
/// body, so adapters can extract vendor error messages.
#[async_trait::async_trait]
pub trait JsonTransport: Send + Sync {
    async fn request(&self, req: Request) -> Result<Value>;
}

/// `reqwest`-backed transport
pub struct HttpHelper {
    client: reqwest::Client,
    logger: crate::logging::StructuredLogger,
}

impl HttpHelper {
    /// Create a transport logging under `component`
    pub fn new(component: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            logger: get_logger(component),
        })
    }
}

#[async_trait::async_trait]
impl JsonTransport for HttpHelper {
    async fn request(&self, req: Request) -> Result<Value> {
        let method = match req.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
        };

        self.logger.trace(&format!("{} {}", method, req.url));

        let mut builder = self
            .client
            .request(method, &req.url)
            .header(reqwest::header::ACCEPT, "application/json");
        builder = match req.auth {
            Some(Auth::Basic { user, password }) => builder.basic_auth(user, Some(password)),
            Some(Auth::Bearer(token)) => builder.bearer_auth(token),
            None => builder,
        };
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        self.logger.trace(&format!("{} -> {}", status, text));

        if !status.is_success() {
            return Err(ChargerError::http(status.as_u16(), text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Extract the vendor `msg` field from an HTTP error body and prepend it
pub fn with_vendor_message(err: ChargerError) -> ChargerError {
    let msg = match &err {
        ChargerError::Http { body, .. } => serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("msg").and_then(Value::as_str).map(str::to_string))
            .filter(|m| !m.is_empty()),
        _ => None,
    };

    match msg {
        Some(msg) => ChargerError::api(format!("{}: {}", msg, err)),
        None => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_builders() {
        let req = Request::put("http://x/y", json!({"a": 1}))
            .with_auth(Auth::Bearer("t".to_string()));
        assert_eq!(req.method, Method::Put);
        assert_eq!(req.auth, Some(Auth::Bearer("t".to_string())));
        assert_eq!(req.body, Some(json!({"a": 1})));
    }

    #[test]
    fn vendor_message_wraps_http_error() {
        let err = with_vendor_message(ChargerError::http(403, r#"{"msg":"forbidden"}"#));
        assert_eq!(
            err.to_string(),
            "API error: forbidden: HTTP error: status 403"
        );

        let err = with_vendor_message(ChargerError::http(500, "oops"));
        assert!(matches!(err, ChargerError::Http { status: 500, .. }));
    }
}
