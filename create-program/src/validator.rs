use serde_json::{Map, Value};

use crate::error::ProgramError;

/// A request body that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramInput {
    pub title: String,
    pub description: String,
    /// Caller-supplied `time`, if present as an integer. Only used under the `request` time policy.
    pub time: Option<i64>,
}

/// Parses and validates a raw request body.
///
/// `title` is checked before `description`, so a body missing both reports `title`.
/// Fields other than `title`, `description` and `time` are ignored.
pub fn validate_program(payload: &str) -> Result<ProgramInput, ProgramError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| ProgramError::MalformedInput(e.to_string()))?;

    let Value::Object(object) = value else {
        return Err(ProgramError::MalformedInput(
            "expected a JSON object".to_string(),
        ));
    };

    let title = required_string(&object, "title")?;
    let description = required_string(&object, "description")?;
    let time = object.get("time").and_then(Value::as_i64);

    Ok(ProgramInput {
        title,
        description,
        time,
    })
}

fn required_string(object: &Map<String, Value>, field: &'static str) -> Result<String, ProgramError> {
    match object.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(ProgramError::Validation { field }),
    }
}
