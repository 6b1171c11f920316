//! Shared fixtures: an in-memory cluster double, record fixtures, and a
//! registry wired to the double.
#![allow(dead_code)] // each test binary uses a different slice of the fixtures

use searchsync::{
    BulkResponse, Connections, Node, Record, RecordSource, Result, SearchClient, SyncRegistry,
    WriteOperation,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Cluster double: records every call, serves canned settings, and can be
/// toggled between "index exists" and "index missing".
pub struct FakeCluster {
    pub calls: Mutex<Vec<String>>,
    pub bulks: Mutex<Vec<Vec<WriteOperation>>>,
    pub mappings: Mutex<Vec<(String, Value)>>,
    pub settings: Mutex<Value>,
    pub exists: AtomicBool,
}

impl FakeCluster {
    pub fn new() -> Arc<FakeCluster> {
        Arc::new(FakeCluster {
            calls: Mutex::new(Vec::new()),
            bulks: Mutex::new(Vec::new()),
            mappings: Mutex::new(Vec::new()),
            settings: Mutex::new(json!({})),
            exists: AtomicBool::new(true),
        })
    }

    pub fn missing_index() -> Arc<FakeCluster> {
        let cluster = FakeCluster::new();
        cluster.exists.store(false, Ordering::SeqCst);
        cluster
    }

    pub fn set_live_analysis(&self, index: &str, analysis: Value) {
        *self.settings.lock().unwrap() = json!({
            (index): {"settings": {"index": {"analysis": analysis}}}
        });
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl SearchClient for FakeCluster {
    fn bulk(&self, ops: &[WriteOperation], refresh: bool) -> Result<BulkResponse> {
        self.log(format!("bulk[{} refresh={refresh}]", ops.len()));
        self.bulks.lock().unwrap().push(ops.to_vec());
        Ok(BulkResponse::default())
    }
    fn index_exists(&self, _index: &str) -> Result<bool> {
        Ok(self.exists.load(Ordering::SeqCst))
    }
    fn create_index(&self, index: &str, body: &Value) -> Result<()> {
        self.log(format!("create_index[{index}]"));
        self.mappings
            .lock()
            .unwrap()
            .push(("create".into(), body.clone()));
        self.exists.store(true, Ordering::SeqCst);
        Ok(())
    }
    fn put_mapping(&self, _index: &str, doc_type: &str, body: &Value) -> Result<()> {
        self.log(format!("put_mapping[{doc_type}]"));
        self.mappings
            .lock()
            .unwrap()
            .push((doc_type.to_string(), body.clone()));
        Ok(())
    }
    fn delete_mapping(&self, _index: &str, doc_type: &str) -> Result<()> {
        self.log(format!("delete_mapping[{doc_type}]"));
        Ok(())
    }
    fn delete_index(&self, index: &str) -> Result<()> {
        self.log(format!("delete_index[{index}]"));
        self.exists.store(false, Ordering::SeqCst);
        Ok(())
    }
    fn get_settings(&self, _index: &str) -> Result<Value> {
        Ok(self.settings.lock().unwrap().clone())
    }
    fn put_settings(&self, _index: &str, body: &Value) -> Result<()> {
        self.log(format!("put_settings[{body}]"));
        Ok(())
    }
    fn close_index(&self, index: &str) -> Result<()> {
        self.log(format!("close_index[{index}]"));
        Ok(())
    }
    fn open_index(&self, index: &str) -> Result<()> {
        self.log(format!("open_index[{index}]"));
        Ok(())
    }
    fn refresh(&self, index: &str) -> Result<()> {
        self.log(format!("refresh[{index}]"));
        Ok(())
    }
    fn validate_query(&self, _index: &str, _query: &Value) -> Result<bool> {
        Ok(true)
    }
}

/// Install the log subscriber once per test binary; `RUST_LOG` filters.
pub fn init_tracing() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Registry with a single "default" connection onto the given double.
pub fn registry_over(cluster: Arc<FakeCluster>) -> SyncRegistry {
    let mut connections = Connections::new();
    connections.insert("default", cluster, "unit-test-db");
    SyncRegistry::with_connections(connections)
}

pub struct Car {
    pub pk: u64,
    pub name: String,
}

impl Car {
    pub fn new(pk: u64, name: &str) -> Car {
        Car {
            pk,
            name: name.to_string(),
        }
    }
}

impl Record for Car {
    fn record_type(&self) -> &str {
        "car"
    }
    fn id(&self) -> String {
        self.pk.to_string()
    }
    fn root(&self) -> Node {
        Node::data(json!({"name": self.name}))
    }
}

/// Record source over a fixed fleet of cars; ignores the date window.
pub struct Fleet(pub Vec<(u64, &'static str)>);

impl RecordSource for Fleet {
    fn select(
        &self,
        record_type: &str,
        _date_field: Option<&str>,
        _start: Option<DateTime<Utc>>,
        _end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Arc<dyn Record>>> {
        if record_type != "car" {
            return Ok(Vec::new());
        }
        Ok(self
            .0
            .iter()
            .map(|(pk, name)| Arc::new(Car::new(*pk, name)) as Arc<dyn Record>)
            .collect())
    }
}
