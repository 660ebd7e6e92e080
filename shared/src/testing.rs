//! Scripted transports and response builders for unit tests.

use crate::github::{Transport, TransportError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Handler = dyn Fn(usize, &Value) -> Result<Value, TransportError> + Send + Sync;

/// Transport answering each call with a closure of `(call index, variables)`.
pub(crate) struct FnTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<Value>>,
}

impl FnTransport {
    pub(crate) fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(usize, &Value) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn variables(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FnTransport {
    async fn query(&self, _document: &str, variables: Value) -> Result<Value, TransportError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(variables.clone());
            calls.len() - 1
        };
        (self.handler)(index, &variables)
    }
}

/// A page of `count` items created `hours_old` hours before now.
pub(crate) fn page_json(count: usize, has_next: bool, cursor: &str, hours_old: i64) -> Value {
    let created = chrono::Utc::now() - chrono::Duration::hours(hours_old);
    let nodes: Vec<Value> = (0..count)
        .map(|i| json!({"id": format!("{cursor}-{i}"), "createdAt": created.to_rfc3339()}))
        .collect();
    page_of(nodes, has_next, cursor, 5000)
}

/// A page with explicit nodes.
pub(crate) fn page_of(nodes: Vec<Value>, has_next: bool, cursor: &str, remaining: i64) -> Value {
    json!({
        "rateLimit": {"remaining": remaining},
        "repository": {
            "collection": {
                "nodes": nodes,
                "pageInfo": {"endCursor": cursor, "hasNextPage": has_next}
            }
        }
    })
}

/// A count response.
pub(crate) fn count_json(total: u64, remaining: i64) -> Value {
    json!({
        "rateLimit": {"remaining": remaining},
        "repository": {"collection": {"totalCount": total}}
    })
}
