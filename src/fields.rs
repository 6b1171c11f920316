//! Typed value extractors.
//!
//! A [`Field`] owns a dotted attribute path into a record's object graph plus
//! the abstract mapping descriptor sent to the search cluster. Resolution
//! walks the path one segment at a time, trying keyed lookup first, then
//! attribute lookup, then sequence-index lookup. The order is fixed.

use crate::error::{Result, SyncError};
use crate::record::Node;
use serde_json::{json, Map, Value};

/// Search-engine primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Float,
    Double,
    Byte,
    Short,
    Integer,
    Long,
    Date,
    Boolean,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Byte => "byte",
            FieldType::Short => "short",
            FieldType::Integer => "integer",
            FieldType::Long => "long",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone)]
enum FieldKind {
    Scalar(FieldType),
    Object(Vec<Field>),
    Nested(Vec<Field>),
    /// Wraps an inner field whose resolved value is treated as a sequence.
    /// Composition instead of patching the inner field's resolve at runtime.
    List(Box<Field>),
}

/// One document field: a path into the record graph and a mapping descriptor.
#[derive(Debug, Clone)]
pub struct Field {
    name: Option<String>,
    path: Vec<String>,
    kind: FieldKind,
    options: Map<String, Value>,
}

impl Field {
    fn new(kind: FieldKind) -> Field {
        Field {
            name: None,
            path: Vec::new(),
            kind,
            options: Map::new(),
        }
    }

    pub fn scalar(ty: FieldType) -> Field {
        Field::new(FieldKind::Scalar(ty))
    }

    pub fn string() -> Field {
        Field::scalar(FieldType::String)
    }

    pub fn float() -> Field {
        Field::scalar(FieldType::Float)
    }

    pub fn double() -> Field {
        Field::scalar(FieldType::Double)
    }

    pub fn byte() -> Field {
        Field::scalar(FieldType::Byte)
    }

    pub fn short() -> Field {
        Field::scalar(FieldType::Short)
    }

    pub fn integer() -> Field {
        Field::scalar(FieldType::Integer)
    }

    pub fn long() -> Field {
        Field::scalar(FieldType::Long)
    }

    pub fn date() -> Field {
        Field::scalar(FieldType::Date)
    }

    pub fn boolean() -> Field {
        Field::scalar(FieldType::Boolean)
    }

    /// An object field composed of child fields. Each child's name is the
    /// given key; a child with no path of its own resolves by that key.
    pub fn object(children: Vec<(&str, Field)>) -> Field {
        Field::new(FieldKind::Object(Self::name_children(children)))
    }

    /// Like [`Field::object`] but mapped as `nested` on the cluster.
    pub fn nested(children: Vec<(&str, Field)>) -> Field {
        Field::new(FieldKind::Nested(Self::name_children(children)))
    }

    /// A field whose resolved value is a sequence of the inner field's values.
    pub fn list(inner: Field) -> Field {
        Field::new(FieldKind::List(Box::new(inner)))
    }

    fn name_children(children: Vec<(&str, Field)>) -> Vec<Field> {
        children
            .into_iter()
            .map(|(name, mut field)| {
                field.assign_name(name);
                field
            })
            .collect()
    }

    /// Set the dotted attribute path this field resolves, e.g. `"owner.name"`.
    pub fn attr(mut self, path: &str) -> Field {
        self.path = path.split('.').map(str::to_string).collect();
        self
    }

    /// Attach an opaque mapping option, merged into the descriptor verbatim.
    pub fn option(mut self, key: &str, value: impl Into<Value>) -> Field {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Assign the document key. A field with no explicit path gets `[name]`,
    /// so a plain `Field::string()` declared under "color" resolves `color`.
    /// For list fields the name flows into the wrapped field as well.
    pub(crate) fn assign_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
        if self.path.is_empty() {
            self.path = vec![name.to_string()];
        }
        if let FieldKind::List(inner) = &mut self.kind {
            inner.assign_name(name);
        }
    }

    /// The abstract mapping descriptor: `{"type": ..., ...options}`, with a
    /// `properties` sub-mapping for object/nested fields. The field's name
    /// must be resolved first; the name is the caller's key for it.
    pub fn mapping(&self) -> Result<Value> {
        if self.name.is_none() {
            return Err(SyncError::UndefinedFieldName);
        }
        self.mapping_body()
    }

    fn mapping_body(&self) -> Result<Value> {
        let mut body = match &self.kind {
            FieldKind::Scalar(ty) => {
                let mut m = Map::new();
                m.insert("type".to_string(), json!(ty.as_str()));
                m
            }
            FieldKind::Object(children) | FieldKind::Nested(children) => {
                let mut props = Map::new();
                for child in children {
                    let name = child.name.as_ref().ok_or(SyncError::UndefinedFieldName)?;
                    props.insert(name.clone(), child.mapping()?);
                }
                let ty = if matches!(self.kind, FieldKind::Nested(_)) {
                    "nested"
                } else {
                    "object"
                };
                let mut m = Map::new();
                m.insert("type".to_string(), json!(ty));
                m.insert("properties".to_string(), Value::Object(props));
                m
            }
            // the cluster has no list type; the descriptor is the inner field's
            FieldKind::List(inner) => return inner.mapping_body(),
        };
        for (k, v) in &self.options {
            body.insert(k.clone(), v.clone());
        }
        Ok(Value::Object(body))
    }

    /// Resolve this field's value from a record graph.
    pub fn resolve(&self, root: &Node) -> Result<Value> {
        match &self.kind {
            FieldKind::Scalar(_) => {
                let node = resolve_path(root, &self.path)?;
                node_to_value(&node, &self.path)
            }
            FieldKind::Object(children) | FieldKind::Nested(children) => {
                let sub = resolve_path(root, &self.path)?;
                if sub.is_null() {
                    return Ok(Value::Null);
                }
                let mut data = Map::new();
                for child in children {
                    let name = child.name.as_ref().ok_or(SyncError::UndefinedFieldName)?;
                    data.insert(name.clone(), child.resolve(&sub)?);
                }
                Ok(Value::Object(data))
            }
            FieldKind::List(inner) => match inner.resolve(root)? {
                Value::Array(items) => Ok(Value::Array(items)),
                Value::Null => Ok(Value::Null),
                _ => Err(SyncError::NotASequence(inner.path.join("."))),
            },
        }
    }

    /// Materialize a list field's elements. Re-invocable: each call resolves
    /// the path again, so the sequence is restartable per document build.
    pub fn items(&self, root: &Node) -> Result<Vec<Value>> {
        match self.resolve(root)? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            _ => Err(SyncError::NotASequence(self.path.join("."))),
        }
    }
}

/// Walk `path` from `root`. For each segment try keyed lookup, then attribute
/// lookup, then sequence-index lookup; all three failing is a hard error. A
/// computed node is invoked as soon as it appears. A null intermediate value
/// short-circuits to null without touching the remaining segments.
fn resolve_path(root: &Node, path: &[String]) -> Result<Node> {
    let mut current = root.clone();
    for segment in path {
        current = step(current, segment)?;
        if let Node::Computed(f) = &current {
            current = f();
        } else if current.is_null() {
            return Ok(Node::null());
        }
    }
    Ok(current)
}

fn step(node: Node, segment: &str) -> Result<Node> {
    // keyed lookup
    match &node {
        Node::Data(Value::Object(map)) => {
            if let Some(v) = map.get(segment) {
                return Ok(Node::Data(v.clone()));
            }
        }
        Node::Object(obj) => {
            if let Some(n) = obj.key(segment) {
                return Ok(n);
            }
        }
        _ => {}
    }

    // attribute lookup
    if let Node::Object(obj) = &node {
        if let Some(n) = obj.attr(segment) {
            return Ok(n);
        }
    }

    // sequence-index lookup
    if let Ok(idx) = segment.parse::<usize>() {
        match &node {
            Node::Data(Value::Array(items)) => {
                if let Some(v) = items.get(idx) {
                    return Ok(Node::Data(v.clone()));
                }
            }
            Node::Object(obj) => {
                if let Some(n) = obj.index(idx) {
                    return Ok(n);
                }
            }
            _ => {}
        }
    }

    Err(SyncError::FieldResolution {
        segment: segment.to_string(),
        value: node.describe(),
    })
}

fn node_to_value(node: &Node, path: &[String]) -> Result<Value> {
    match node {
        Node::Data(v) => Ok(v.clone()),
        Node::Computed(f) => node_to_value(&f(), path),
        Node::Object(obj) => obj
            .value()
            .ok_or_else(|| SyncError::OpaqueValue(path.join("."))),
    }
}
