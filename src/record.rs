//! Boundary traits for the backing datastore.
//!
//! The sync engine never talks to the datastore directly. It sees records
//! through [`Record`] (identity plus an object graph of [`Node`]s) and asks
//! for range-filtered batches through [`RecordSource`].

use crate::error::Result;
use crate::fields::FieldType;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// One node in a record's object graph, as seen by the path resolver.
#[derive(Clone)]
pub enum Node {
    /// Plain JSON data: scalars, arrays, objects.
    Data(Value),
    /// A domain object that answers key/attribute/index lookups itself.
    Object(Arc<dyn RecordObject>),
    /// A zero-argument computed property. The resolver invokes it after the
    /// segment that produced it and continues with the result.
    Computed(Arc<dyn Fn() -> Node + Send + Sync>),
}

impl Node {
    pub fn data(value: impl Into<Value>) -> Node {
        Node::Data(value.into())
    }

    pub fn object(obj: impl RecordObject + 'static) -> Node {
        Node::Object(Arc::new(obj))
    }

    pub fn computed(f: impl Fn() -> Node + Send + Sync + 'static) -> Node {
        Node::Computed(Arc::new(f))
    }

    pub fn null() -> Node {
        Node::Data(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Data(Value::Null))
    }

    /// Short description for error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Node::Data(v) => v.to_string(),
            Node::Object(_) => "<object>".to_string(),
            Node::Computed(_) => "<computed>".to_string(),
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Node {
        Node::Data(value)
    }
}

/// A domain object exposing the three lookup kinds the resolver tries, in
/// priority order: keyed, attribute, sequence-index. All default to `None`;
/// implementors opt in to whichever lookups make sense.
pub trait RecordObject: Send + Sync {
    /// Dictionary-style lookup by string key.
    fn key(&self, _key: &str) -> Option<Node> {
        None
    }

    /// Attribute-style lookup by name.
    fn attr(&self, _name: &str) -> Option<Node> {
        None
    }

    /// Sequence-index lookup.
    fn index(&self, _idx: usize) -> Option<Node> {
        None
    }

    /// The plain-data rendering of this object, if it has one. Needed only
    /// when a scalar field path terminates on the object itself.
    fn value(&self) -> Option<Value> {
        None
    }
}

/// One entity instance from the backing datastore.
pub trait Record: Send + Sync {
    /// The registry key for this record's type, e.g. `"car"`.
    fn record_type(&self) -> &str;

    /// Stable primary key, rendered as the document id.
    fn id(&self) -> String;

    /// Root of the object graph the field paths resolve against.
    fn root(&self) -> Node;
}

/// Query access to the backing datastore, used for full and windowed reindex.
///
/// When `date_field` is set, `start`/`end` bound the result to records where
/// `date_field >= start` and `date_field <= end`. The collaborator owns the
/// actual query building.
pub trait RecordSource: Send + Sync {
    fn select(
        &self,
        record_type: &str,
        date_field: Option<&str>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Arc<dyn Record>>>;

    fn count(
        &self,
        record_type: &str,
        date_field: Option<&str>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        Ok(self.select(record_type, date_field, start, end)?.len())
    }
}

/// Column type of the backing datastore, as far as field derivation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Auto,
    BigInteger,
    Boolean,
    Char,
    Date,
    DateTime,
    Float,
    Integer,
    SmallInteger,
    Slug,
    Text,
    Time,
    Url,
}

impl ColumnType {
    /// The search-engine primitive a column of this type maps to.
    pub fn field_type(self) -> FieldType {
        match self {
            ColumnType::Auto => FieldType::Integer,
            ColumnType::BigInteger => FieldType::Long,
            ColumnType::Boolean => FieldType::Boolean,
            ColumnType::Char => FieldType::String,
            ColumnType::Date => FieldType::Date,
            ColumnType::DateTime => FieldType::Date,
            // the datastore's float has the same precision as the cluster's double
            ColumnType::Float => FieldType::Double,
            ColumnType::Integer => FieldType::Integer,
            ColumnType::SmallInteger => FieldType::Short,
            ColumnType::Slug => FieldType::String,
            ColumnType::Text => FieldType::String,
            ColumnType::Time => FieldType::Long,
            ColumnType::Url => FieldType::String,
        }
    }
}

/// Column layout of one record type. Lets an index definition derive fields
/// from column names instead of declaring each one by hand.
#[derive(Debug, Clone, Default)]
pub struct RecordSchema {
    columns: Vec<(String, ColumnType)>,
}

impl RecordSchema {
    pub fn new() -> Self {
        RecordSchema::default()
    }

    pub fn column(mut self, name: &str, ty: ColumnType) -> Self {
        self.columns.push((name.to_string(), ty));
        self
    }

    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }
}
