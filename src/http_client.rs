//! Minimal request builder and response type, with a `reqwest`-backed
//! production transport and a trait seam for tests.

use crate::error::{InvalidUrlSnafu, RequestSnafu, TransportError};
use snafu::ResultExt;
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Option<String>,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// I/O seam the time-series client depends on, so response classification
/// can be unit-tested against an in-memory double instead of a real socket.
pub trait HttpTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
    fn post(&self, url: &str, body: Option<&str>) -> Result<HttpResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        ReqwestTransport {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .context(RequestSnafu { url: url.to_string() })?;
        to_response(response)
    }

    fn post(&self, url: &str, body: Option<&str>) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.body(body.to_string());
        }
        let response = request.send().context(RequestSnafu { url: url.to_string() })?;
        to_response(response)
    }
}

fn to_response(response: reqwest::blocking::Response) -> Result<HttpResponse, TransportError> {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let body = response.text().context(RequestSnafu { url })?;
    Ok(HttpResponse {
        status,
        body: Some(body),
    })
}

/// Accumulates query parameters and an optional body, then issues one
/// request through a [`HttpTransport`]. Query-string assembly and escaping
/// is delegated to [`url::Url`].
pub struct RequestBuilder {
    base_and_path: String,
    query: Vec<(String, String)>,
    body: Option<String>,
}

impl RequestBuilder {
    pub fn new(base_url: &str, path: &str) -> Self {
        RequestBuilder {
            base_and_path: format!("{base_url}{path}"),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn query_param(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    fn build_url(&self) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.base_and_path).context(InvalidUrlSnafu {
            url: self.base_and_path.clone(),
        })?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    pub fn get(self, transport: &dyn HttpTransport) -> Result<HttpResponse, TransportError> {
        let url = self.build_url()?;
        transport.get(url.as_str())
    }

    pub fn post(self, transport: &dyn HttpTransport) -> Result<HttpResponse, TransportError> {
        let url = self.build_url()?;
        transport.post(url.as_str(), self.body.as_deref())
    }
}
