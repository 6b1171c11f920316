//! Search cluster client boundary.
//!
//! Everything the engine needs from the cluster goes through [`SearchClient`];
//! [`HttpClient`] is the REST implementation. All calls are synchronous and
//! propagate transport and cluster errors verbatim. Idempotence carve-outs
//! (index already exists, mapping already gone) live at the call sites that
//! want them, not here. No retries: the transport owns timeout policy.

use crate::error::{Result, SyncError};
use crate::types::{BulkResponse, OpType, WriteOperation};
use serde_json::{json, Value};
use std::time::Duration;

pub trait SearchClient: Send + Sync {
    /// Submit one batched request; returns the cluster's per-item results.
    fn bulk(&self, ops: &[WriteOperation], refresh: bool) -> Result<BulkResponse>;

    fn index_exists(&self, index: &str) -> Result<bool>;

    fn create_index(&self, index: &str, body: &Value) -> Result<()>;

    fn put_mapping(&self, index: &str, doc_type: &str, body: &Value) -> Result<()>;

    fn delete_mapping(&self, index: &str, doc_type: &str) -> Result<()>;

    fn delete_index(&self, index: &str) -> Result<()>;

    fn get_settings(&self, index: &str) -> Result<Value>;

    fn put_settings(&self, index: &str, body: &Value) -> Result<()>;

    fn close_index(&self, index: &str) -> Result<()>;

    fn open_index(&self, index: &str) -> Result<()>;

    /// Make pending writes visible to subsequent reads.
    fn refresh(&self, index: &str) -> Result<()>;

    fn validate_query(&self, index: &str, query: &Value) -> Result<bool>;
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking REST client for the search cluster.
pub struct HttpClient {
    base: String,
    http: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new(base_url: &str) -> Result<Self> {
        HttpClient::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(HttpClient {
            base: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    /// Non-2xx responses become `Cluster` errors carrying the body verbatim.
    fn check(resp: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let reason = resp.text().unwrap_or_default();
        Err(SyncError::Cluster {
            status: status.as_u16(),
            reason,
        })
    }
}

/// Render operations into the bulk API's newline-delimited body: an action
/// metadata line per operation, followed by the source line for index ops.
pub fn bulk_body(ops: &[WriteOperation]) -> Result<String> {
    let mut body = String::new();
    for op in ops {
        let verb = match op.op {
            OpType::Index => "index",
            OpType::Delete => "delete",
        };
        let meta = json!({
            (verb): {"_index": op.index, "_type": op.doc_type, "_id": op.id}
        });
        body.push_str(&serde_json::to_string(&meta)?);
        body.push('\n');
        if op.op == OpType::Index {
            if let Some(source) = &op.source {
                body.push_str(&serde_json::to_string(source)?);
                body.push('\n');
            }
        }
    }
    Ok(body)
}

impl SearchClient for HttpClient {
    fn bulk(&self, ops: &[WriteOperation], refresh: bool) -> Result<BulkResponse> {
        let body = bulk_body(ops)?;
        tracing::debug!(ops = ops.len(), refresh, "submitting bulk request");
        let mut req = self
            .http
            .post(self.url("_bulk"))
            .header("content-type", "application/x-ndjson")
            .body(body);
        if refresh {
            req = req.query(&[("refresh", "true")]);
        }
        let resp = Self::check(req.send()?)?;
        Ok(resp.json::<BulkResponse>()?)
    }

    fn index_exists(&self, index: &str) -> Result<bool> {
        let resp = self.http.head(self.url(index)).send()?;
        match resp.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(SyncError::Cluster {
                status,
                reason: "unexpected response to index existence check".into(),
            }),
        }
    }

    fn create_index(&self, index: &str, body: &Value) -> Result<()> {
        tracing::info!(index, "creating index");
        Self::check(self.http.put(self.url(index)).json(body).send()?)?;
        Ok(())
    }

    fn put_mapping(&self, index: &str, doc_type: &str, body: &Value) -> Result<()> {
        let path = format!("{index}/_mapping/{doc_type}");
        Self::check(self.http.put(self.url(&path)).json(body).send()?)?;
        Ok(())
    }

    fn delete_mapping(&self, index: &str, doc_type: &str) -> Result<()> {
        let path = format!("{index}/_mapping/{doc_type}");
        Self::check(self.http.delete(self.url(&path)).send()?)?;
        Ok(())
    }

    fn delete_index(&self, index: &str) -> Result<()> {
        Self::check(self.http.delete(self.url(index)).send()?)?;
        Ok(())
    }

    fn get_settings(&self, index: &str) -> Result<Value> {
        let path = format!("{index}/_settings");
        let resp = Self::check(self.http.get(self.url(&path)).send()?)?;
        Ok(resp.json::<Value>()?)
    }

    fn put_settings(&self, index: &str, body: &Value) -> Result<()> {
        let path = format!("{index}/_settings");
        Self::check(self.http.put(self.url(&path)).json(body).send()?)?;
        Ok(())
    }

    fn close_index(&self, index: &str) -> Result<()> {
        let path = format!("{index}/_close");
        Self::check(self.http.post(self.url(&path)).send()?)?;
        Ok(())
    }

    fn open_index(&self, index: &str) -> Result<()> {
        let path = format!("{index}/_open");
        Self::check(self.http.post(self.url(&path)).send()?)?;
        Ok(())
    }

    fn refresh(&self, index: &str) -> Result<()> {
        let path = format!("{index}/_refresh");
        Self::check(self.http.post(self.url(&path)).send()?)?;
        Ok(())
    }

    fn validate_query(&self, index: &str, query: &Value) -> Result<bool> {
        let path = format!("{index}/_validate/query");
        let resp = Self::check(self.http.get(self.url(&path)).json(query).send()?)?;
        let body: Value = resp.json()?;
        Ok(body.get("valid").and_then(Value::as_bool).unwrap_or(false))
    }
}
