//! Index definitions: which fields make up a document for a record type,
//! where the documents go, and the mapping lifecycle against the cluster.

use crate::client::SearchClient;
use crate::error::{Result, SyncError};
use crate::fields::Field;
use crate::index::analysis::AnalysisSettings;
use crate::index::suspend;
use crate::record::{Record, RecordSchema, RecordSource};
use crate::types::{BulkResponse, OpType, WriteOperation};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Policy for fields that appear in documents but not in the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DynamicPolicy {
    /// Unmapped fields are an error on the cluster side.
    #[default]
    Strict,
    /// The cluster adds unmapped fields to the mapping on the fly.
    True,
    /// Unmapped fields are stored but not indexed.
    False,
}

impl DynamicPolicy {
    fn as_json(self) -> Value {
        match self {
            DynamicPolicy::Strict => json!("strict"),
            DynamicPolicy::True => json!(true),
            DynamicPolicy::False => json!(false),
        }
    }
}

/// Per-field override hook, consulted instead of path resolution.
pub type PrepareHook = Arc<dyn Fn(&dyn Record) -> Result<Value> + Send + Sync>;

/// Connection binding populated by the registry at registration time. The
/// analysis cell is shared by every definition on the connection; the
/// registry grows it as definitions register.
struct Binding {
    client: Arc<dyn SearchClient>,
    index_name: String,
    connection_analysis: Arc<RwLock<AnalysisSettings>>,
}

/// Declarative mapping from one record type to a document shape and a
/// search-cluster target. Built once at startup via [`IndexDefinition::builder`],
/// immutable afterwards except for the registry-populated connection binding.
pub struct IndexDefinition {
    record_type: String,
    fields: Vec<Field>,
    document_type: String,
    using: String,
    dynamic: DynamicPolicy,
    date_field: Option<String>,
    ignore_signals: bool,
    analysis: AnalysisSettings,
    hooks: HashMap<String, PrepareHook>,
    binding: OnceCell<Binding>,
}

impl std::fmt::Debug for IndexDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexDefinition")
            .field("record_type", &self.record_type)
            .field("fields", &self.fields)
            .field("document_type", &self.document_type)
            .field("using", &self.using)
            .field("dynamic", &self.dynamic)
            .field("date_field", &self.date_field)
            .field("ignore_signals", &self.ignore_signals)
            .field("analysis", &self.analysis)
            .finish_non_exhaustive()
    }
}

impl IndexDefinition {
    pub fn builder(record_type: &str) -> IndexBuilder {
        IndexBuilder {
            record_type: record_type.to_string(),
            fields: Vec::new(),
            columns: Vec::new(),
            document_type: None,
            using: "default".to_string(),
            dynamic: DynamicPolicy::Strict,
            date_field: None,
            ignore_signals: false,
            analysis: AnalysisSettings::new(),
            hooks: HashMap::new(),
        }
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub fn using(&self) -> &str {
        &self.using
    }

    pub fn date_field(&self) -> Option<&str> {
        self.date_field.as_deref()
    }

    pub fn ignore_signals(&self) -> bool {
        self.ignore_signals
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Analyzer/tokenizer/filter settings this definition declares.
    pub fn analysis(&self) -> &AnalysisSettings {
        &self.analysis
    }

    /// Called by the registry when the definition is registered. Idempotent:
    /// re-registering keeps the first binding.
    pub(crate) fn bind(
        &self,
        client: Arc<dyn SearchClient>,
        index_name: String,
        connection_analysis: Arc<RwLock<AnalysisSettings>>,
    ) {
        let _ = self.binding.set(Binding {
            client,
            index_name,
            connection_analysis,
        });
    }

    fn binding(&self) -> Result<&Binding> {
        self.binding
            .get()
            .ok_or_else(|| SyncError::NotRegistered(self.document_type.clone()))
    }

    /// The physical index this definition writes to. Known only after
    /// registration resolves the connection.
    pub fn index_name(&self) -> Result<&str> {
        Ok(&self.binding()?.index_name)
    }

    pub(crate) fn client(&self) -> Result<&Arc<dyn SearchClient>> {
        Ok(&self.binding()?.client)
    }

    /// Build the flat document for one record. Each field goes through its
    /// prepare hook when one is declared, otherwise ordinary path resolution.
    /// A field that fails to resolve aborts this document; it never silently
    /// turns into a null.
    pub fn build_document(&self, record: &dyn Record) -> Result<Map<String, Value>> {
        let root = record.root();
        let mut data = Map::new();
        for field in &self.fields {
            // names are guaranteed resolved by the builder
            let name = field.name().ok_or(SyncError::UndefinedFieldName)?;
            let value = match self.hooks.get(name) {
                Some(hook) => hook(record)?,
                None => field.resolve(&root)?,
            };
            data.insert(name.to_string(), value);
        }
        Ok(data)
    }

    /// The doc-type mapping body: dynamic policy plus per-field descriptors.
    pub fn mapping(&self) -> Result<Value> {
        let mut properties = Map::new();
        for field in &self.fields {
            let name = field.name().ok_or(SyncError::UndefinedFieldName)?;
            properties.insert(name.to_string(), field.mapping()?);
        }
        Ok(json!({
            "dynamic": self.dynamic.as_json(),
            "properties": properties,
        }))
    }

    /// The records this definition indexes, optionally bounded to a window
    /// on `date_field` (`>= start`, `<= end`). Powers incremental reindex.
    pub fn select_records(
        &self,
        source: &dyn RecordSource,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Arc<dyn Record>>> {
        source.select(&self.record_type, self.date_field.as_deref(), start, end)
    }

    /// Create the index (if missing) and upsert this doc type's mapping.
    /// Creation applies the connection-wide union of every registered
    /// definition's analysis settings, not just this definition's own:
    /// creation happens once, so it has to carry the analyzers of index
    /// siblings too. Safe to call repeatedly;
    /// [`put_mapping_with_analysis`](Self::put_mapping_with_analysis) is the
    /// explicit override.
    pub fn put_mapping(&self) -> Result<()> {
        let analysis = self
            .binding()?
            .connection_analysis
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        self.put_mapping_with_analysis(&analysis)
    }

    pub fn put_mapping_with_analysis(&self, analysis: &AnalysisSettings) -> Result<()> {
        let binding = self.binding()?;
        if !binding.client.index_exists(&binding.index_name)? {
            let settings = if analysis.is_empty() {
                json!({})
            } else {
                json!({"settings": {"analysis": analysis.to_value()}})
            };
            if let Err(e) = binding.client.create_index(&binding.index_name, &settings) {
                // lost a creation race; the index being there is all we need
                if !binding.client.index_exists(&binding.index_name)? {
                    return Err(e);
                }
            }
        }
        tracing::info!(
            index = %binding.index_name,
            doc_type = %self.document_type,
            "putting mapping"
        );
        let mut body = Map::new();
        body.insert(self.document_type.clone(), self.mapping()?);
        let body = Value::Object(body);
        binding
            .client
            .put_mapping(&binding.index_name, &self.document_type, &body)
    }

    /// Remove this doc type's mapping. Best-effort: a missing index or
    /// missing doc type counts as success.
    pub fn delete_mapping(&self) -> Result<()> {
        let binding = self.binding()?;
        tracing::info!(
            index = %binding.index_name,
            doc_type = %self.document_type,
            "deleting mapping"
        );
        match binding
            .client
            .delete_mapping(&binding.index_name, &self.document_type)
        {
            Err(SyncError::Cluster { status: 404, .. }) => Ok(()),
            other => other,
        }
    }

    /// Write (or delete) the given records on the cluster.
    ///
    /// Builds one operation per record; deletes skip `build_document`
    /// entirely, the id alone suffices. Inside a suspension scope the
    /// operations are queued and `Ok(None)` is returned; otherwise they go
    /// out as one batched call, followed by a refresh when `refresh` is true.
    pub fn update(
        self: &Arc<Self>,
        records: &[&dyn Record],
        op: OpType,
        refresh: bool,
    ) -> Result<Option<BulkResponse>> {
        let binding = self.binding()?;
        let mut ops = Vec::with_capacity(records.len());
        for record in records {
            let source = match op {
                OpType::Delete => None,
                OpType::Index => Some(Value::Object(self.build_document(*record)?)),
            };
            ops.push(WriteOperation {
                op,
                index: binding.index_name.clone(),
                doc_type: self.document_type.clone(),
                id: record.id(),
                source,
            });
        }
        match suspend::enqueue(self, ops) {
            None => Ok(None), // queued for the scope's flush
            Some(ops) => Ok(Some(self.bulk(ops, refresh)?)),
        }
    }

    /// Submit operations directly, bypassing the suspension queue.
    pub fn bulk(&self, ops: Vec<WriteOperation>, refresh: bool) -> Result<BulkResponse> {
        let binding = self.binding()?;
        binding.client.bulk(&ops, refresh)
    }

    /// Index one record, refreshing so it is immediately searchable.
    pub fn save(self: &Arc<Self>, record: &dyn Record) -> Result<Option<BulkResponse>> {
        self.update(&[record], OpType::Index, true)
    }

    /// Delete one record's document by id.
    pub fn delete(self: &Arc<Self>, record: &dyn Record) -> Result<Option<BulkResponse>> {
        self.update(&[record], OpType::Delete, true)
    }
}

/// Builder for [`IndexDefinition`]. Field names must be unique across both
/// explicitly declared fields and schema-derived columns; duplicates are
/// rejected when `build` runs.
pub struct IndexBuilder {
    record_type: String,
    fields: Vec<Field>,
    columns: Vec<String>,
    document_type: Option<String>,
    using: String,
    dynamic: DynamicPolicy,
    date_field: Option<String>,
    ignore_signals: bool,
    analysis: AnalysisSettings,
    hooks: HashMap<String, PrepareHook>,
}

impl IndexBuilder {
    /// Declare a field under the given document key.
    pub fn field(mut self, name: &str, mut field: Field) -> Self {
        field.assign_name(name);
        self.fields.push(field);
        self
    }

    /// Derive fields for the named columns from the record schema given to
    /// [`build_with_schema`](Self::build_with_schema).
    pub fn columns(mut self, names: &[&str]) -> Self {
        self.columns.extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Document type identifier; defaults to the record type.
    pub fn document_type(mut self, doc_type: &str) -> Self {
        self.document_type = Some(doc_type.to_string());
        self
    }

    /// Named connection to write through; defaults to `"default"`.
    pub fn using(mut self, name: &str) -> Self {
        self.using = name.to_string();
        self
    }

    pub fn dynamic(mut self, policy: DynamicPolicy) -> Self {
        self.dynamic = policy;
        self
    }

    /// Record field used to bound incremental reindex windows.
    pub fn date_field(mut self, name: &str) -> Self {
        self.date_field = Some(name.to_string());
        self
    }

    /// Suppress automatic sync on save/delete notifications.
    pub fn ignore_signals(mut self) -> Self {
        self.ignore_signals = true;
        self
    }

    /// Declare an analysis item, e.g. `analysis("analyzer", "ngram_name", ...)`.
    pub fn analysis(mut self, section: &str, name: &str, config: Value) -> Self {
        self.analysis.insert(section, name, config);
        self
    }

    /// Override how the named field's value is prepared, instead of path
    /// resolution. The field itself must still be declared.
    pub fn prepare_with(
        mut self,
        field_name: &str,
        hook: impl Fn(&dyn Record) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.insert(field_name.to_string(), Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<Arc<IndexDefinition>> {
        self.build_inner(None)
    }

    /// Build, deriving any [`columns`](Self::columns) fields from `schema`.
    pub fn build_with_schema(self, schema: &RecordSchema) -> Result<Arc<IndexDefinition>> {
        self.build_inner(Some(schema))
    }

    fn build_inner(self, schema: Option<&RecordSchema>) -> Result<Arc<IndexDefinition>> {
        let mut fields = self.fields;
        let mut seen: HashSet<String> = HashSet::new();
        for field in &fields {
            let name = field.name().ok_or(SyncError::UndefinedFieldName)?;
            if !seen.insert(name.to_string()) {
                return Err(SyncError::RedeclaredField(name.to_string()));
            }
        }
        for column in &self.columns {
            if seen.contains(column) {
                return Err(SyncError::RedeclaredField(column.clone()));
            }
            let column_type = schema
                .and_then(|s| s.get(column))
                .ok_or_else(|| SyncError::UnmappedColumn(column.clone()))?;
            let mut field = Field::scalar(column_type.field_type());
            field.assign_name(column);
            seen.insert(column.clone());
            fields.push(field);
        }
        let document_type = self
            .document_type
            .unwrap_or_else(|| self.record_type.clone());
        Ok(Arc::new(IndexDefinition {
            record_type: self.record_type,
            fields,
            document_type,
            using: self.using,
            dynamic: self.dynamic,
            date_field: self.date_field,
            ignore_signals: self.ignore_signals,
            analysis: self.analysis,
            hooks: self.hooks,
            binding: OnceCell::new(),
        }))
    }
}
