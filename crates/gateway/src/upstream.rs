use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde_json::Value as JsonValue;

use crate::error::ProxyError;

/// A verbatim upstream response: status and headers are forwarded to the
/// caller unmodified except for `Content-Length`, which the response filter
/// rewrites if it edits the body.
#[derive(Debug)]
pub struct UpstreamResponse {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Bytes,
}

/// Forwards already-rewritten GraphQL requests to the Prefect-compatible
/// backend. A single shared `reqwest::Client` backs every call so connection
/// pooling is reused across requests.
#[derive(Clone)]
pub struct UpstreamClient {
	client: Client,
	api_url: String,
}

impl UpstreamClient {
	pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, ProxyError> {
		let client = Client::builder().timeout(timeout).build().map_err(ProxyError::Upstream)?;
		Ok(Self {
			client,
			api_url: api_url.into(),
		})
	}

	/// Sends `body` (a single operation object or a batch array) and returns
	/// the response verbatim: status, headers and raw bytes, none of which
	/// this call interprets. The caller decides whether the body needs
	/// parsing (response filtering) or can be streamed straight through.
	pub async fn forward(&self, body: &JsonValue) -> Result<UpstreamResponse, ProxyError> {
		let response = self.client.post(&self.api_url).json(body).send().await?;
		let status = response.status();
		let headers = response.headers().clone();
		let body = response.bytes().await?;
		Ok(UpstreamResponse { status, headers, body })
	}

	/// Issues a `{entity}_by_pk` probe for the Belonging Oracle and parses the
	/// response as JSON; any non-200 status or parse failure is the caller's
	/// responsibility to treat as a denial.
	pub async fn probe(&self, query: &str) -> Result<(StatusCode, JsonValue), ProxyError> {
		let response = self.forward(&serde_json::json!({ "query": query })).await?;
		let json = serde_json::from_slice(&response.body).unwrap_or(JsonValue::Null);
		Ok((response.status, json))
	}

	/// Forwards a CORS preflight verbatim to the upstream, returning its
	/// status and headers unmodified.
	pub async fn forward_options(&self) -> Result<(StatusCode, HeaderMap), ProxyError> {
		let response = self.client.request(reqwest::Method::OPTIONS, &self.api_url).send().await?;
		Ok((response.status(), response.headers().clone()))
	}
}
