use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::StatusMapping;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PersistenceError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("TLS setup error: {0}")]
    Tls(String),

    #[error("Query error: {0}")]
    Query(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProgramError {
    /// The payload is not a JSON object.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A required field is absent or empty.
    #[error("Missing or empty field `{field}`")]
    Validation { field: &'static str },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Serialize)]
struct ErrorDetail<'a> {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

impl ProgramError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProgramError::MalformedInput(_) => "MalformedInput",
            ProgramError::Validation { .. } => "ValidationError",
            ProgramError::Persistence(_) => "PersistenceError",
        }
    }

    /// Serialized form placed under `result` in failure responses.
    pub fn detail(&self) -> Value {
        let field = match self {
            ProgramError::Validation { field } => Some(*field),
            _ => None,
        };
        serde_json::to_value(ErrorDetail {
            error: self.kind(),
            message: self.to_string(),
            field,
        })
        .unwrap_or_default()
    }

    pub fn status_code(&self, mapping: StatusMapping) -> u16 {
        match mapping {
            StatusMapping::Legacy => 500,
            StatusMapping::Split => match self {
                ProgramError::MalformedInput(_) | ProgramError::Validation { .. } => 400,
                ProgramError::Persistence(PersistenceError::Query(_)) => 502,
                ProgramError::Persistence(_) => 503,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_detail_names_field() {
        let detail = ProgramError::Validation { field: "title" }.detail();

        assert_eq!(detail["error"], "ValidationError");
        assert_eq!(detail["field"], "title");
        assert_eq!(detail["message"], "Missing or empty field `title`");
    }

    #[test]
    fn test_persistence_detail_carries_cause() {
        let err: ProgramError = PersistenceError::Connect("connection refused".to_string()).into();
        let detail = err.detail();

        assert_eq!(detail["error"], "PersistenceError");
        assert_eq!(detail["message"], "Connection error: connection refused");
        assert!(detail.get("field").is_none());
    }

    #[test]
    fn test_legacy_mapping_is_always_500() {
        let errors = [
            ProgramError::MalformedInput("eof".to_string()),
            ProgramError::Validation { field: "description" },
            PersistenceError::Query("duplicate key".to_string()).into(),
        ];
        for err in errors {
            assert_eq!(err.status_code(StatusMapping::Legacy), 500);
        }
    }

    #[test]
    fn test_split_mapping() {
        assert_eq!(
            ProgramError::MalformedInput("eof".to_string()).status_code(StatusMapping::Split),
            400
        );
        assert_eq!(
            ProgramError::Validation { field: "title" }.status_code(StatusMapping::Split),
            400
        );
        assert_eq!(
            ProgramError::from(PersistenceError::Connect("timeout".to_string()))
                .status_code(StatusMapping::Split),
            503
        );
        assert_eq!(
            ProgramError::from(PersistenceError::Tls("handshake".to_string()))
                .status_code(StatusMapping::Split),
            503
        );
        assert_eq!(
            ProgramError::from(PersistenceError::Query("constraint".to_string()))
                .status_code(StatusMapping::Split),
            502
        );
    }
}
