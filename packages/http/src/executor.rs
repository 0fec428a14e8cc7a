//! HTTP execution abstraction for testing.
//!
//! The remote store talks to its origin only through [`HttpExecutor`], so
//! tests can swap in [`mock::MockExecutor`] instead of opening sockets.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::types::{HttpRequest, HttpResponse};
use crate::Error;

/// Trait for executing HTTP requests.
pub trait HttpExecutor: Send + Sync {
    /// Execute an HTTP request and return the response.
    ///
    /// Returns `Err` with a message if the request never produced a response.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String>;
}

/// Production HTTP executor using reqwest's blocking client.
///
/// Must not be created or dropped on an async runtime thread.
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Create with default timeout of 30 seconds.
    pub fn with_default_timeout() -> Result<Self, Error> {
        Self::new(Duration::from_secs(30))
    }

    fn headers(request: &HttpRequest) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            headers.insert(
                HeaderName::try_from(name.as_str())?,
                HeaderValue::try_from(value.as_str())?,
            );
        }
        Ok(headers)
    }
}

impl HttpExecutor for ReqwestExecutor {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let method: http::Method = request.method.into();
        let headers = Self::headers(request).map_err(|e| e.to_string())?;

        log::debug!("{} {}", method, request.url);
        let response = self
            .client
            .request(method, &request.url)
            .headers(headers)
            .send()
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string();

        let mut resp_headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                resp_headers.insert(name.to_string(), v.to_string());
            }
        }

        let body = response.bytes().map_err(|e| e.to_string())?;

        Ok(HttpResponse {
            status,
            status_text,
            headers: resp_headers,
            body,
        })
    }
}

/// Mock HTTP executor for testing.
///
/// Returns predefined responses keyed by URL.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub struct MockExecutor {
        /// Responses keyed by request URL.
        responses: Arc<Mutex<HashMap<String, HttpResponse>>>,
        recorded_requests: Arc<Mutex<Vec<HttpRequest>>>,
        /// When set, every request fails with this message.
        failure: Arc<Mutex<Option<String>>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_response(self, url: impl Into<String>, response: HttpResponse) -> Self {
            self.responses.lock().unwrap().insert(url.into(), response);
            self
        }

        /// Configure to fail all requests with an error.
        pub fn fail_with(self, message: impl Into<String>) -> Self {
            *self.failure.lock().unwrap() = Some(message.into());
            self
        }

        pub fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.recorded_requests.lock().unwrap().clone()
        }

        pub fn clear_recorded(&self) {
            self.recorded_requests.lock().unwrap().clear();
        }

        pub fn success_response(body: impl Into<Bytes>) -> HttpResponse {
            HttpResponse {
                status: 200,
                status_text: "OK".to_string(),
                headers: HashMap::new(),
                body: body.into(),
            }
        }

        pub fn error_response(status: u16, message: &str) -> HttpResponse {
            HttpResponse {
                status,
                status_text: message.to_string(),
                headers: HashMap::new(),
                body: Bytes::copy_from_slice(message.as_bytes()),
            }
        }

        pub fn not_found() -> HttpResponse {
            Self::error_response(404, "Not Found")
        }
    }

    impl HttpExecutor for MockExecutor {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
            self.recorded_requests.lock().unwrap().push(request.clone());

            if let Some(message) = self.failure.lock().unwrap().clone() {
                return Err(message);
            }

            let responses = self.responses.lock().unwrap();
            Ok(responses
                .get(&request.url)
                .cloned()
                .unwrap_or_else(Self::not_found))
        }
    }
}
