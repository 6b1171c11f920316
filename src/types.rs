use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bulk operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
    Index,
    Delete,
}

/// One bulk instruction in the cluster's action format.
///
/// This shape is the de facto wire contract with the cluster's bulk API and
/// is preserved bit-for-bit: `_source` is absent for deletes, never null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOperation {
    #[serde(rename = "_op_type")]
    pub op: OpType,
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type")]
    pub doc_type: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source", skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
}

/// Per-item result of one bulk submission, as the cluster reports it.
/// Never reduced to a single boolean; callers get every item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BulkItem>,
}

impl BulkResponse {
    /// Items the cluster rejected.
    pub fn failures(&self) -> Vec<&BulkItem> {
        self.items.iter().filter(|i| i.error().is_some()).collect()
    }
}

/// One item of a bulk response: `{"index": {"_id": ..., "status": 201}}` or
/// `{"delete": {...}}`, keyed by the operation that produced it.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkItem(pub Map<String, Value>);

impl BulkItem {
    fn body(&self) -> Option<&Map<String, Value>> {
        self.0.values().next().and_then(Value::as_object)
    }

    pub fn status(&self) -> Option<u16> {
        self.body()
            .and_then(|b| b.get("status"))
            .and_then(Value::as_u64)
            .map(|s| s as u16)
    }

    pub fn id(&self) -> Option<&str> {
        self.body().and_then(|b| b.get("_id")).and_then(Value::as_str)
    }

    pub fn error(&self) -> Option<&Value> {
        self.body().and_then(|b| b.get("error"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn index_operation_wire_shape() {
        let op = WriteOperation {
            op: OpType::Index,
            index: "unit-test-db".into(),
            doc_type: "car".into(),
            id: "5".into(),
            source: Some(json!({"name": "beep", "color": "blue"})),
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({
                "_op_type": "index",
                "_index": "unit-test-db",
                "_type": "car",
                "_id": "5",
                "_source": {"name": "beep", "color": "blue"},
            })
        );
    }

    #[test]
    fn delete_operation_omits_source() {
        let op = WriteOperation {
            op: OpType::Delete,
            index: "unit-test-db".into(),
            doc_type: "car".into(),
            id: "5".into(),
            source: None,
        };
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["_op_type"], json!("delete"));
        assert!(value.get("_source").is_none());
    }

    #[test]
    fn bulk_response_surfaces_per_item_failures() {
        let raw = json!({
            "took": 3,
            "errors": true,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"index": {"_id": "2", "status": 400, "error": {"type": "mapper_parsing_exception"}}},
                {"delete": {"_id": "3", "status": 200}},
            ]
        });
        let resp: BulkResponse = serde_json::from_value(raw).unwrap();
        assert!(resp.errors);
        assert_eq!(resp.items.len(), 3);
        let failures = resp.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id(), Some("2"));
        assert_eq!(failures[0].status(), Some(400));
        assert_eq!(resp.items[2].status(), Some(200));
    }
}
