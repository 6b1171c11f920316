//! Named cluster connections.
//!
//! Each connection pairs a client handle with the physical index name it
//! writes to. Connections are built once at startup and shared read-only;
//! the clients are stateless.

use crate::client::{HttpClient, SearchClient};
use crate::error::{Result, SyncError};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Declarative configuration for one named connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Cluster endpoints. The client talks to the first one.
    pub servers: Vec<String>,
    /// Physical index this connection's definitions live in.
    pub index_name: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

pub struct Connection {
    pub client: Arc<dyn SearchClient>,
    pub index_name: String,
}

/// The full set of named connections, keyed by connection name.
#[derive(Default)]
pub struct Connections {
    map: HashMap<String, Connection>,
}

impl Connections {
    pub fn new() -> Self {
        Connections::default()
    }

    /// Register a pre-built client under a name. This is also the injection
    /// point for test doubles.
    pub fn insert(&mut self, name: &str, client: Arc<dyn SearchClient>, index_name: &str) {
        self.map.insert(
            name.to_string(),
            Connection {
                client,
                index_name: index_name.to_string(),
            },
        );
    }

    /// Build HTTP clients for every configured connection.
    pub fn from_settings(settings: &HashMap<String, ConnectionConfig>) -> Result<Self> {
        let mut connections = Connections::new();
        for (name, config) in settings {
            let server = config
                .servers
                .first()
                .ok_or_else(|| SyncError::NoServers(name.clone()))?;
            let client = match config.timeout_secs {
                Some(secs) => HttpClient::with_timeout(server, Duration::from_secs(secs))?,
                None => HttpClient::new(server)?,
            };
            tracing::info!(
                connection = %name,
                index = %config.index_name,
                "configured search connection"
            );
            connections.insert(name, Arc::new(client), &config.index_name);
        }
        Ok(connections)
    }

    pub fn get(&self, name: &str) -> Result<&Connection> {
        self.map
            .get(name)
            .ok_or_else(|| SyncError::UnknownConnection(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.map.keys().map(String::as_str).collect()
    }
}
