//! Validation and interpretation of review-status payloads.
//!
//! The fetch step hands over a dynamic JSON value; everything past this
//! module works with typed values or a descriptive error.

use serde_json::Value;

use crate::error::PollError;

/// Review outcomes the service is allowed to report. Closed set: any other
/// status code on the wire is a data-quality failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Reviewing,
    Rejected,
}

impl Verdict {
    /// Resolve a wire status code against the verdict set.
    fn from_status(status: &str) -> Result<Self, PollError> {
        match status {
            "approved" => Ok(Self::Approved),
            "reviewing" => Ok(Self::Reviewing),
            "rejected" => Ok(Self::Rejected),
            other => Err(PollError::UnknownStatus {
                value: other.to_string(),
            }),
        }
    }

    /// Human-readable verdict text.
    pub fn text(self) -> &'static str {
        match self {
            Self::Approved => "Работа проверена: ревьюеру всё понравилось. Ура!",
            Self::Reviewing => "Работа взята на проверку ревьюером.",
            Self::Rejected => "Работа проверена: у ревьюера есть замечания.",
        }
    }
}

/// A validated homework record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Homework {
    pub name: String,
    pub verdict: Verdict,
}

impl Homework {
    /// Validate a raw record: `homework_name` and `status` must be present
    /// as strings, and the status must belong to the verdict set.
    pub fn from_value(raw: &Value) -> Result<Self, PollError> {
        let name = required_str(raw, "homework_name")?;
        let status = required_str(raw, "status")?;

        Ok(Self {
            name: name.to_string(),
            verdict: Verdict::from_status(status)?,
        })
    }

    /// Operator-facing message for the current verdict.
    pub fn status_message(&self) -> String {
        format!(
            "Изменился статус проверки работы \"{}\". {}",
            self.name,
            self.verdict.text()
        )
    }
}

/// Extract the homework sequence from a decoded payload.
///
/// Checks, in order: the payload is a JSON object, it has a `homeworks`
/// key, and the value under that key is an array. The input is never
/// mutated; an empty array is a valid result.
pub fn homeworks(payload: &Value) -> Result<&[Value], PollError> {
    let map = payload.as_object().ok_or_else(|| PollError::Schema {
        reason: format!("payload is {}, expected an object", json_type(payload)),
    })?;

    let list = map.get("homeworks").ok_or_else(|| PollError::Schema {
        reason: "payload has no \"homeworks\" key".to_string(),
    })?;

    list.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| PollError::Schema {
            reason: format!("\"homeworks\" is {}, expected an array", json_type(list)),
        })
}

fn required_str<'a>(record: &'a Value, field: &str) -> Result<&'a str, PollError> {
    record
        .get(field)
        .ok_or_else(|| PollError::Schema {
            reason: format!("homework record has no {field:?} field"),
        })?
        .as_str()
        .ok_or_else(|| PollError::Schema {
            reason: format!("homework record field {field:?} is not a string"),
        })
}

/// JSON type name for schema error messages.
fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
