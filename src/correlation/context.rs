//! Per-request correlation context.

use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Header carrying the trace id across service hops.
pub const X_TRACE_ID: &str = "x-trace-id";

/// Header carrying the caller's user id.
pub const X_USER_ID: &str = "x-user-id";

/// Sentinel user id for unidentified callers.
pub const UNKNOWN_USER: &str = "unknown";

/// Trace id, user id and start time of one request.
///
/// The trace id is never empty. A context is created per request and handed to
/// handlers and downstream clients by value; it has no shared storage.
///
/// An inbound `x-trace-id` that is not valid UTF-8 is logged lossily, but the
/// original header bytes are what gets echoed and forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    trace_id: String,
    trace_header: Option<HeaderValue>,
    user_id: String,
    started_at: DateTime<Utc>,
}

impl CorrelationContext {
    /// Build a context from an inbound trace id and user id.
    ///
    /// A missing or blank trace id starts a new chain; a present one is kept verbatim.
    pub fn from_parts(trace_id: Option<&str>, user_id: Option<&str>) -> Self {
        let trace_id = match trace_id {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => new_trace_id(),
        };
        let user_id = match user_id {
            Some(u) if !u.trim().is_empty() => u.to_string(),
            _ => UNKNOWN_USER.to_string(),
        };

        Self {
            trace_id,
            trace_header: None,
            user_id,
            started_at: Utc::now(),
        }
    }

    /// Build a context from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| headers.get(name).map(|v| String::from_utf8_lossy(v.as_bytes()));
        let trace = get(X_TRACE_ID);
        let user = get(X_USER_ID);

        let mut ctx = Self::from_parts(trace.as_deref(), user.as_deref());
        if trace.as_deref() == Some(ctx.trace_id.as_str()) {
            ctx.trace_header = headers.get(X_TRACE_ID).cloned();
        }
        ctx
    }

    /// Start a new chain for a known user (e.g., a client-side flow).
    pub fn root(user_id: Option<&str>) -> Self {
        Self::from_parts(None, user_id)
    }

    /// Same chain, identified caller.
    pub fn identified(&self, user_id: &str) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            trace_header: self.trace_header.clone(),
            user_id: user_id.to_string(),
            started_at: self.started_at,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Trace id as a header value: the inbound bytes when there were any.
    pub fn trace_header(&self) -> Option<HeaderValue> {
        self.trace_header
            .clone()
            .or_else(|| HeaderValue::from_str(&self.trace_id).ok())
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_identified(&self) -> bool {
        self.user_id != UNKNOWN_USER
    }
}

fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_inbound_trace_id_kept_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(X_TRACE_ID, HeaderValue::from_static("test-1234"));
        headers.insert(X_USER_ID, HeaderValue::from_static("sneha"));

        let ctx = CorrelationContext::from_headers(&headers);
        assert_eq!(ctx.trace_id(), "test-1234");
        assert_eq!(ctx.user_id(), "sneha");
        assert!(ctx.is_identified());
    }

    #[test]
    fn test_missing_headers_generate_trace_and_default_user() {
        let ctx = CorrelationContext::from_headers(&HeaderMap::new());
        assert!(Uuid::parse_str(ctx.trace_id()).is_ok());
        assert_eq!(ctx.user_id(), UNKNOWN_USER);
        assert!(!ctx.is_identified());
    }

    #[test]
    fn test_blank_trace_id_is_regenerated() {
        let ctx = CorrelationContext::from_parts(Some("   "), Some(""));
        assert!(!ctx.trace_id().trim().is_empty());
        assert_ne!(ctx.trace_id(), "   ");
        assert_eq!(ctx.user_id(), UNKNOWN_USER);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = CorrelationContext::root(None);
        let b = CorrelationContext::root(None);
        assert_ne!(a.trace_id(), b.trace_id());
    }

    #[test]
    fn test_non_utf8_trace_header_kept_byte_for_byte() {
        let raw = HeaderValue::from_bytes(b"trace-\xe9-1").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(X_TRACE_ID, raw.clone());

        let ctx = CorrelationContext::from_headers(&headers);
        assert_eq!(ctx.trace_id(), "trace-\u{fffd}-1");
        assert_eq!(ctx.trace_header(), Some(raw.clone()));
        assert_eq!(ctx.identified("alex").trace_header(), Some(raw));
    }

    #[test]
    fn test_generated_trace_has_header_form() {
        let ctx = CorrelationContext::root(None);
        assert_eq!(ctx.trace_header().unwrap().to_str().unwrap(), ctx.trace_id());
    }

    #[test]
    fn test_identified_keeps_chain() {
        let ctx = CorrelationContext::from_parts(Some("t-9"), None);
        let named = ctx.identified("alex");
        assert_eq!(named.trace_id(), "t-9");
        assert_eq!(named.user_id(), "alex");
        assert_eq!(named.started_at(), ctx.started_at());
    }
}
