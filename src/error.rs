use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error("Failed lookup for segment [{segment}] in {value}")]
    FieldResolution { segment: String, value: String },

    #[error("Field has no name; assign one or declare it under a key")]
    UndefinedFieldName,

    #[error("Cannot redeclare the field named '{0}'")]
    RedeclaredField(String),

    #[error("Record schema has no column named '{0}'")]
    UnmappedColumn(String),

    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    #[error("Connection '{0}' has no servers configured")]
    NoServers(String),

    #[error("Index definition '{0}' is not registered with any connection")]
    NotRegistered(String),

    #[error("Value at '{0}' is not a sequence")]
    NotASequence(String),

    #[error("Value at '{0}' cannot be rendered into a document")]
    OpaqueValue(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Cluster error ({status}): {reason}")]
    Cluster { status: u16, reason: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("'{0}' could not be interpreted as a timestamp or duration")]
    InvalidTimeToken(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Json(e.to_string())
    }
}

impl SyncError {
    /// True for errors that mean "the cluster said no", as opposed to
    /// configuration or per-document failures raised locally.
    pub fn is_cluster_error(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Cluster { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_resolution_names_segment_and_value() {
        let e = SyncError::FieldResolution {
            segment: "gamma".into(),
            value: "1".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("gamma"));
        assert!(msg.contains('1'));
    }

    #[test]
    fn redeclared_field_display() {
        let e = SyncError::RedeclaredField("name".into());
        assert!(e.to_string().contains("'name'"));
    }

    #[test]
    fn cluster_error_includes_status() {
        let e = SyncError::Cluster {
            status: 400,
            reason: "mapper_parsing_exception".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("mapper_parsing_exception"));
        assert!(e.is_cluster_error());
    }

    #[test]
    fn from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let e: SyncError = json_err.into();
        assert!(matches!(e, SyncError::Json(_)));
        assert!(!e.is_cluster_error());
    }

    #[test]
    fn config_errors_are_not_cluster_errors() {
        assert!(!SyncError::UndefinedFieldName.is_cluster_error());
        assert!(!SyncError::UnknownConnection("default".into()).is_cluster_error());
    }
}
