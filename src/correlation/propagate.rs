//! Outbound trace propagation.
//!
//! Every downstream call made on behalf of a request carries the same trace id
//! and user id as the inbound request.

use reqwest::RequestBuilder;
use serde::Serialize;

use crate::correlation::context::{CorrelationContext, X_TRACE_ID, X_USER_ID};

/// Stamp correlation headers onto an outbound request.
pub trait CorrelatedRequest {
    fn correlated(self, ctx: &CorrelationContext) -> Self;
}

impl CorrelatedRequest for RequestBuilder {
    fn correlated(self, ctx: &CorrelationContext) -> Self {
        let builder = match ctx.trace_header() {
            Some(trace) => self.header(X_TRACE_ID, trace),
            None => self,
        };
        builder.header(X_USER_ID, ctx.user_id())
    }
}

/// HTTP client for calling a sibling service within a causal chain.
#[derive(Clone)]
pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(
        &self,
        ctx: &CorrelationContext,
        path: &str,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .correlated(ctx)
            .send()
            .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        ctx: &CorrelationContext,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .correlated(ctx)
            .json(body)
            .send()
            .await
    }

    /// Continue the chain returned by a response, falling back to `ctx`.
    ///
    /// A service answers with the trace id it used and, after login, the
    /// identified user.
    pub fn continue_from(ctx: &CorrelationContext, response: &reqwest::Response) -> CorrelationContext {
        let headers = response.headers();
        let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let trace = get(X_TRACE_ID).unwrap_or(ctx.trace_id());
        let user = get(X_USER_ID).unwrap_or(ctx.user_id());
        CorrelationContext::from_parts(Some(trace), Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlated_sets_headers() {
        let ctx = CorrelationContext::from_parts(Some("t-42"), Some("rahul"));
        let request = reqwest::Client::new()
            .get("http://localhost:1/health")
            .correlated(&ctx)
            .build()
            .unwrap();

        assert_eq!(request.headers()[X_TRACE_ID], "t-42");
        assert_eq!(request.headers()[X_USER_ID], "rahul");
    }

    #[test]
    fn test_correlated_forwards_inbound_trace_bytes() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(X_TRACE_ID, axum::http::HeaderValue::from_bytes(b"t-\xff").unwrap());
        let ctx = CorrelationContext::from_headers(&headers);

        let request = reqwest::Client::new()
            .get("http://localhost:1/health")
            .correlated(&ctx)
            .build()
            .unwrap();
        assert_eq!(request.headers()[X_TRACE_ID].as_bytes(), b"t-\xff");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ServiceClient::new(reqwest::Client::new(), "http://localhost:8001/");
        assert_eq!(client.base_url(), "http://localhost:8001");
    }
}
