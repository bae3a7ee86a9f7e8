//! Request context management
//!
//! `RequestContext` is assembled by the transport adapter for every call and
//! handed to the route handler by value. It exposes read-only accessors only.

use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::routing::PathParams;

/// Per-call state passed to route handlers
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Parameters extracted from the route template
    params: PathParams,

    /// Caller-supplied query values
    query: Map<String, Value>,

    /// Call body, `Value::Null` when absent
    data: Value,

    /// Cooperative deadline for persistence work
    deadline: Option<Instant>,

    /// When the adapter received the call
    received_at: Instant,
}

impl RequestContext {
    pub fn new(params: PathParams, query: Map<String, Value>, data: Value) -> Self {
        Self {
            params,
            query,
            data,
            deadline: None,
            received_at: Instant::now(),
        }
    }

    /// Sets a deadline relative to the time the call was received
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(self.received_at + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.received_at.elapsed()
    }

    /// Flattens the call into a single parameter object for the query bus.
    ///
    /// Precedence, lowest first: query values, fields of an object body, then
    /// path parameters. A non-object body is kept under the `data` key.
    pub fn to_query_params(&self) -> Value {
        let mut merged = self.query.clone();

        match &self.data {
            Value::Object(fields) => {
                merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Value::Null => {}
            other => {
                merged.insert("data".to_string(), other.clone());
            }
        }

        merged.extend(
            self.params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone()))),
        );

        Value::Object(merged)
    }
}
