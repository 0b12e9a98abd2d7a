//! Response classification.
//!
//! Turns a raw transport outcome (status code, headers, body) into either a
//! success value or a typed [`Error`]. Pure and synchronous.

use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Status codes the classifier treats specially.
pub struct StatusCode;

impl StatusCode {
    pub const OK: u16 = 200;
    pub const CREATED: u16 = 201;
    pub const EMPTY: u16 = 204;
    pub const REDIRECT_TEMPORARILY: u16 = 301;
    pub const REDIRECT_PERMANENTLY: u16 = 302;
    pub const NOT_MODIFIED: u16 = 304;
    pub const RESUME_INCOMPLETE: u16 = 308;
    pub const NOT_FOUND: u16 = 404;
    pub const SERVER_ERROR: u16 = 500;
}

/// Response headers, keyed by lowercase header name.
pub type Headers = BTreeMap<String, String>;

/// Error names that all classify as [`ErrorKind::NotFound`].
const NOT_FOUND_NAMES: [&str; 6] = [
    "EntityNotFound",
    "CollectionNotFound",
    "AppNotFound",
    "UserNotFound",
    "BlobNotFound",
    "DocumentNotFound",
];

/// A completed exchange with the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub data: Option<Value>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status_code: StatusCode::EMPTY,
            headers: Headers::new(),
            data: None,
        }
    }
}

impl Response {
    pub fn new(status_code: u16, data: Option<Value>) -> Self {
        Self {
            status_code,
            headers: Headers::new(),
            data,
        }
    }

    /// Add a header; the name is stored lowercase.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// 2xx, 301 and 304 are successes; everything else is not.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
            || self.status_code == StatusCode::REDIRECT_TEMPORARILY
            || self.status_code == StatusCode::NOT_MODIFIED
    }

    /// The typed error for a non-success response, `None` on success.
    pub fn error(&self) -> Option<Error> {
        if self.is_success() {
            return None;
        }

        let empty = serde_json::Map::new();
        let data = self
            .data
            .as_ref()
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let name = string_field(data, "name").or_else(|| string_field(data, "error"));
        let message = string_field(data, "message")
            .or_else(|| string_field(data, "description"))
            .unwrap_or_default();
        let debug = data.get("debug").and_then(|debug| match debug {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });

        let kind = classify(name, self.status_code);
        Some(Error::remote(kind, message, debug, self.status_code))
    }

    /// Consume the response, yielding its body on success.
    pub fn into_result(self) -> crate::Result<Option<Value>> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }
}

fn string_field<'a>(data: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// First-match classification: explicit error name, then not-found names or
/// 404, then `ServerError` or 500, then the generic kind.
pub fn classify(name: Option<&str>, status_code: u16) -> ErrorKind {
    let by_name = match name {
        Some("FeatureUnavailableError") => Some(ErrorKind::FeatureUnavailable),
        Some("IncompleteRequestBodyError") => Some(ErrorKind::IncompleteRequestBody),
        Some("InsufficientCredentials") => Some(ErrorKind::InsufficientCredentials),
        Some("InvalidCredentials") => Some(ErrorKind::InvalidCredentials),
        Some("InvalidIdentifierError") => Some(ErrorKind::InvalidIdentifier),
        Some("InvalidQuerySyntaxError") => Some(ErrorKind::InvalidQuerySyntax),
        Some("JSONParseError") => Some(ErrorKind::JsonParse),
        Some("MissingQueryError") => Some(ErrorKind::MissingQuery),
        Some("MissingRequestHeaderError") => Some(ErrorKind::MissingRequestHeader),
        Some("MissingRequestParameterError") => Some(ErrorKind::MissingRequestParameter),
        Some("ParameterValueOutOfRangeError") => Some(ErrorKind::ParameterValueOutOfRange),
        _ => None,
    };
    if let Some(kind) = by_name {
        return kind;
    }

    if name.is_some_and(|n| NOT_FOUND_NAMES.contains(&n)) || status_code == StatusCode::NOT_FOUND
    {
        return ErrorKind::NotFound;
    }

    if name == Some("ServerError") || status_code == StatusCode::SERVER_ERROR {
        return ErrorKind::ServerError;
    }

    ErrorKind::Remote
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status_code: u16, data: Value) -> Response {
        Response::new(status_code, Some(data))
    }

    #[test]
    fn success_codes() {
        for code in [200, 201, 204, 299, 301, 304] {
            assert!(Response::new(code, None).is_success(), "{code}");
        }
        for code in [199, 300, 302, 308, 400, 404, 500] {
            assert!(!Response::new(code, None).is_success(), "{code}");
        }
    }

    #[test]
    fn not_found_by_status() {
        let err = response(404, json!({})).error().unwrap();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.status_code, Some(404));
    }

    #[test]
    fn not_found_by_name() {
        for name in NOT_FOUND_NAMES {
            let err = response(400, json!({ "name": name })).error().unwrap();
            assert_eq!(err.kind, ErrorKind::NotFound, "{name}");
        }
    }

    #[test]
    fn explicit_name_beats_status() {
        let err = response(500, json!({"name": "FeatureUnavailableError"}))
            .error()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::FeatureUnavailable);

        let err = response(404, json!({"error": "InvalidCredentials"}))
            .error()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials);
    }

    #[test]
    fn server_error() {
        assert_eq!(
            response(500, json!({})).error().unwrap().kind,
            ErrorKind::ServerError
        );
        assert_eq!(
            response(503, json!({"name": "ServerError"})).error().unwrap().kind,
            ErrorKind::ServerError
        );
    }

    #[test]
    fn generic_fallback() {
        let err = response(409, json!({"name": "SomethingElse"})).error().unwrap();
        assert_eq!(err.kind, ErrorKind::Remote);

        let err = Response::new(302, None).error().unwrap();
        assert_eq!(err.kind, ErrorKind::Remote);
    }

    #[test]
    fn message_and_debug() {
        let err = response(
            400,
            json!({"error": "JSONParseError", "description": "unable to parse", "debug": "line 1"}),
        )
        .error()
        .unwrap();
        assert_eq!(err.kind, ErrorKind::JsonParse);
        assert_eq!(err.message, "unable to parse");
        assert_eq!(err.debug.as_deref(), Some("line 1"));

        let err = response(400, json!({"message": "m", "description": "d"}))
            .error()
            .unwrap();
        assert_eq!(err.message, "m");

        let err = Response::new(400, Some(json!("not an object"))).error().unwrap();
        assert_eq!(err.message, "");
    }

    #[test]
    fn into_result() {
        let data = response(201, json!({"_id": "1"})).into_result().unwrap();
        assert_eq!(data, Some(json!({"_id": "1"})));
        assert!(response(404, json!({})).into_result().is_err());
    }

    #[test]
    fn headers_are_case_insensitive() {
        let res = Response::new(200, None).with_header("Content-Type", "application/json");
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.header("CONTENT-TYPE"), Some("application/json"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn success_range_has_no_error(code in 200u16..300) {
                prop_assert!(Response::new(code, None).error().is_none());
            }

            #[test]
            fn other_codes_have_an_error(code in 0u16..1000) {
                prop_assume!(!(200..300).contains(&code) && code != 301 && code != 304);
                let err = Response::new(code, Some(json!({}))).error();
                prop_assert!(err.is_some());
                let expected = match code {
                    404 => ErrorKind::NotFound,
                    500 => ErrorKind::ServerError,
                    _ => ErrorKind::Remote,
                };
                prop_assert_eq!(err.unwrap().kind, expected);
            }
        }
    }
}
