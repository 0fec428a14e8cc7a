use std::collections::HashMap;

use bytes::Bytes;

/// HTTP methods the remote store issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    GET,
    HEAD,
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => http::Method::GET,
            Method::HEAD => http::Method::HEAD,
        }
    }
}

/// A request against the origin server.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: Method,

    /// Absolute URL of the resource.
    pub url: String,

    pub headers: HashMap<String, String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self {
            method: Method::HEAD,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Response from the origin server. The body is kept as raw bytes since
/// repository files are arbitrary binary content.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,

    /// Status text (e.g., "OK", "Not Found")
    pub status_text: String,

    pub headers: HashMap<String, String>,

    pub body: Bytes,
}

impl HttpResponse {
    /// Check if the response status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
