//! Search index backend.
//!
//! Queries an Elasticsearch-compatible `_search` endpoint for recent records,
//! newest first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::logging::{LogLevel, LogRecord};
use crate::source::{LogSource, QueryError, SourceError};

/// Optional narrowing of a bulk query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilters {
    pub service: Option<String>,
    pub level: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub contains: Option<String>,
}

/// Bulk query client for an external log index.
pub struct IndexQuery {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
    timeout: Duration,
    filters: QueryFilters,
    lookback: Option<chrono::Duration>,
}

impl IndexQuery {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            username: username.into(),
            password: password.into(),
            timeout,
            filters: QueryFilters::default(),
            lookback: None,
        }
    }

    pub fn from_config(config: &SourceConfig, client: reqwest::Client, timeout: Duration) -> Self {
        let mut query = Self::new(
            client,
            config.index_url.as_str(),
            config.index_username.as_str(),
            config.index_password.as_str(),
            timeout,
        );
        query.filters.service = config.service_filter.clone();
        query.filters.level = config.level_filter.clone();
        query.lookback = config
            .lookback_secs
            .and_then(|secs| chrono::Duration::try_seconds(secs as i64));
        query
    }

    /// Filters applied by [`LogSource::fetch`].
    pub fn with_filters(mut self, filters: QueryFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Return up to `limit` records matching `filters`, newest first.
    pub async fn bulk_query(
        &self,
        filters: &QueryFilters,
        limit: usize,
    ) -> Result<Vec<LogRecord>, QueryError> {
        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .timeout(self.timeout)
            .json(&build_query(filters, limit))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(QueryError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| QueryError::Decode(e.to_string()))?;
        let hits = body
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .ok_or_else(|| QueryError::Decode("missing hits.hits".to_string()))?;

        let mut records = Vec::with_capacity(hits.len().min(limit));
        for hit in hits.iter().take(limit) {
            match hit.get("_source").and_then(record_from_source) {
                Some(record) => records.push(record),
                None => tracing::debug!(url = %self.url, "Skipping index hit without a message"),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl LogSource for IndexQuery {
    fn name(&self) -> &str {
        "index"
    }

    async fn fetch(&self, limit: usize) -> Result<Vec<LogRecord>, SourceError> {
        let mut filters = self.filters.clone();
        if let Some(lookback) = self.lookback {
            filters.since = Some(Utc::now() - lookback);
        }
        Ok(self.bulk_query(&filters, limit).await?)
    }
}

/// Build the `_search` request body.
pub fn build_query(filters: &QueryFilters, limit: usize) -> Value {
    let mut clauses = Vec::new();
    if let Some(service) = &filters.service {
        clauses.push(json!({ "term": { "service_name": service } }));
    }
    if let Some(level) = &filters.level {
        clauses.push(json!({ "term": { "level": level.to_uppercase() } }));
    }
    if let Some(since) = filters.since {
        clauses.push(json!({ "range": { "@timestamp": { "gte": since.to_rfc3339() } } }));
    }
    if let Some(text) = &filters.contains {
        clauses.push(json!({ "match_phrase": { "message": text } }));
    }

    json!({
        "size": limit,
        "_source": true,
        "sort": [{ "@timestamp": { "order": "desc" } }],
        "query": { "bool": { "filter": clauses } },
    })
}

/// Map an index document onto a record.
///
/// Documents shipped from our own sinks carry every field; documents from other
/// shippers may only have a message and a timestamp.
fn record_from_source(source: &Value) -> Option<LogRecord> {
    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| lookup(source, k).and_then(Value::as_str))
            .map(str::to_string)
    };

    let message = text(&["message", "event.original", "msg"])?;
    let timestamp = text(&["@timestamp", "timestamp"])
        .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default();
    let level = lookup(source, "level")
        .cloned()
        .and_then(|v| serde_json::from_value::<LogLevel>(v).ok())
        .unwrap_or(LogLevel::Info);

    let structured_fields = lookup(source, "structured_fields")
        .and_then(Value::as_object)
        .map(stringify_map)
        .unwrap_or_default();

    Some(LogRecord {
        timestamp,
        service_name: text(&["service_name", "service.name"]).unwrap_or_else(|| "unknown".to_string()),
        trace_id: text(&["trace_id", "trace.id"]).unwrap_or_default(),
        user_id: text(&["user_id", "user.id"]).unwrap_or_default(),
        route: text(&["route", "url.path"]).unwrap_or_default(),
        level,
        message,
        duration_ms: lookup(source, "duration_ms").and_then(Value::as_f64),
        structured_fields,
    })
}

/// Look up a flat key first, then the same key as a dotted path.
fn lookup<'a>(source: &'a Value, key: &str) -> Option<&'a Value> {
    if let Some(v) = source.get(key) {
        return Some(v);
    }
    if !key.contains('.') {
        return None;
    }
    key.split('.').try_fold(source, |v, part| v.get(part))
}

fn stringify_map(map: &Map<String, Value>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}
