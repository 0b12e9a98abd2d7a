//! HTTP transport.
//!
//! Sends engine requests to `{api_hostname}/appdata/{app_key}{path}` with
//! reqwest and hands back the raw status, headers and body. Classification of
//! non-success replies stays in the engine.

use crate::config::ClientConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tether_engine::{Error, Headers, Method, Request, Response, Transport};
use url::Url;

/// [`Transport`] over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl HttpTransport {
    pub fn new(config: Arc<ClientConfig>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("tether/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, request: &Request) -> tether_engine::Result<Url> {
        let raw = format!("{}{}", self.config.appdata_url(), request.path);
        let mut url = Url::parse(&raw)
            .map_err(|e| Error::config(format!("invalid request URL '{raw}': {e}")))?;
        url.set_query(request.query.as_deref());
        Ok(url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let config = &self.config;
        if let Some(token) = &config.auth_token {
            return builder.header(reqwest::header::AUTHORIZATION, format!("Kinvey {token}"));
        }
        match (&config.master_secret, &config.app_secret) {
            (Some(secret), _) | (None, Some(secret)) => {
                builder.basic_auth(&config.app_key, Some(secret))
            }
            (None, None) => builder,
        }
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// JSON when it parses, the raw text otherwise, nothing when empty.
fn parse_body(text: String) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> tether_engine::Result<Response> {
        let url = self.url(&request)?;
        tracing::debug!(method = %request.method, url = %url, "Sending request");

        let mut builder = self
            .http
            .request(to_reqwest(request.method), url.clone())
            .header(reqwest::header::ACCEPT, "application/json");
        builder = self.authorize(builder);
        if let Some(version) = &self.config.app_version {
            builder = builder.header("X-Kinvey-Api-Version", version);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let reply = builder.send().await.map_err(|e| {
            tracing::warn!(method = %request.method, url = %url, error = %e, "Request failed");
            Error::network(e.to_string())
        })?;

        let status = reply.status().as_u16();
        let headers: Headers = reply
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let text = reply
            .text()
            .await
            .map_err(|e| Error::network(format!("failed to read response body: {e}")))?;

        tracing::debug!(method = %request.method, url = %url, status, "Received response");
        Ok(Response {
            status_code: status,
            headers,
            data: parse_body(text),
        })
    }
}
