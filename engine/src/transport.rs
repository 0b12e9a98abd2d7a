//! Transport abstraction.
//!
//! The engine never speaks HTTP itself. It hands a [`Request`] to a
//! [`Transport`] and classifies the [`Response`] it gets back.

use crate::response::{Headers, Response};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request against the remote collection API.
///
/// `path` is relative to the app's data root, e.g. `/Books/123`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    /// Serialized query string, without the leading `?`
    pub query: Option<String>,
    pub body: Option<Value>,
    pub headers: Headers,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            body: None,
            headers: Headers::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }
}

/// Sends requests to the remote.
///
/// An `Err` means the exchange could not be completed at all (no status code)
/// and must carry [`ErrorKind::Network`](crate::ErrorKind::Network). Any
/// response that did arrive, whatever its status, is returned as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_builder() {
        let req = Request::new(Method::Put, "/Books/1")
            .with_body(json!({"_id": "1"}))
            .with_header("X-Custom", "yes")
            .with_query("");
        assert_eq!(req.method.as_str(), "PUT");
        assert_eq!(req.query, None);
        assert_eq!(req.headers.get("x-custom").map(String::as_str), Some("yes"));
    }
}
