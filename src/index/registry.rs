//! Process-wide registry mapping record types to index definitions.
//!
//! Populated once during startup, read-mostly afterwards. One record type
//! commonly feeds several indexes; save/delete notifications fan out to all
//! of them. Membership is by definition identity (`Arc` pointer), never by
//! structural equality.

use crate::connections::{Connection, ConnectionConfig, Connections};
use crate::error::Result;
use crate::index::analysis::AnalysisSettings;
use crate::index::definition::IndexDefinition;
use crate::record::Record;
use crate::types::OpType;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct SyncRegistry {
    definitions: DashMap<String, Vec<Arc<IndexDefinition>>>,
    settings: HashMap<String, ConnectionConfig>,
    connections: OnceCell<Connections>,
    /// Per-connection union of registered definitions' analysis. Shared with
    /// the definitions' bindings so index creation carries all of it.
    connection_analysis: DashMap<String, Arc<RwLock<AnalysisSettings>>>,
}

impl SyncRegistry {
    /// A registry that will build its cluster connections from `settings`
    /// the first time a definition is registered.
    pub fn new(settings: HashMap<String, ConnectionConfig>) -> Self {
        SyncRegistry {
            definitions: DashMap::new(),
            settings,
            connections: OnceCell::new(),
            connection_analysis: DashMap::new(),
        }
    }

    /// A registry over pre-built connections (the injection point for tests).
    pub fn with_connections(connections: Connections) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(connections);
        SyncRegistry {
            definitions: DashMap::new(),
            settings: HashMap::new(),
            connections: cell,
            connection_analysis: DashMap::new(),
        }
    }

    /// Connection setup happens exactly once, on first use.
    fn connections(&self) -> Result<&Connections> {
        self.connections
            .get_or_try_init(|| Connections::from_settings(&self.settings))
    }

    pub(crate) fn connection(&self, using: &str) -> Result<&Connection> {
        self.connections()?.get(using)
    }

    /// Register a definition for its record type and bind it to its named
    /// connection. Registering the same definition twice is a no-op; distinct
    /// definitions for one record type accumulate (the fan-out case).
    pub fn register(&self, definition: Arc<IndexDefinition>) -> Result<()> {
        let connection = self.connection(definition.using())?;
        let shared_analysis = self
            .connection_analysis
            .entry(definition.using().to_string())
            .or_default()
            .clone();
        shared_analysis
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .extend(definition.analysis());
        definition.bind(
            Arc::clone(&connection.client),
            connection.index_name.clone(),
            shared_analysis,
        );
        tracing::debug!(
            record_type = %definition.record_type(),
            doc_type = %definition.document_type(),
            connection = %definition.using(),
            "registered index definition"
        );
        let mut entry = self
            .definitions
            .entry(definition.record_type().to_string())
            .or_default();
        if !entry.iter().any(|d| Arc::ptr_eq(d, &definition)) {
            entry.push(definition);
        }
        Ok(())
    }

    /// Index `record` in every definition registered for its type, except
    /// those that opted out of signals.
    pub fn notify_saved(&self, record: &dyn Record) -> Result<()> {
        self.fan_out(record, OpType::Index)
    }

    /// Delete `record`'s document from every definition registered for its
    /// type, except those that opted out of signals.
    pub fn notify_deleted(&self, record: &dyn Record) -> Result<()> {
        self.fan_out(record, OpType::Delete)
    }

    fn fan_out(&self, record: &dyn Record, op: OpType) -> Result<()> {
        for definition in self.definitions_for(record.record_type()) {
            if definition.ignore_signals() {
                continue;
            }
            definition.update(&[record], op, true)?;
        }
        Ok(())
    }

    pub fn definitions_for(&self, record_type: &str) -> Vec<Arc<IndexDefinition>> {
        self.definitions
            .get(record_type)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    pub fn all_definitions(&self) -> Vec<Arc<IndexDefinition>> {
        self.definitions
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    pub fn definitions_for_connection(&self, using: &str) -> Vec<Arc<IndexDefinition>> {
        self.all_definitions()
            .into_iter()
            .filter(|d| d.using() == using)
            .collect()
    }

    pub fn record_types(&self) -> Vec<String> {
        self.definitions.iter().map(|e| e.key().clone()).collect()
    }

    /// Names of every configured connection.
    pub fn connection_names(&self) -> Result<Vec<String>> {
        Ok(self
            .connections()?
            .names()
            .into_iter()
            .map(str::to_string)
            .collect())
    }
}
