//! `common_http` protocol.
//!
//! Body shape (binary mode, or the `data` of a structured-mode event):
//!
//! ```json
//! { "predicted": [1, 0, 1], "actual": [1, 1, 1], "task_type": "classification" }
//! ```
//!
//! `y_pred`, `y_true`, and `taskType` are accepted as aliases.

use serde_json::{Map, Value};

use crate::error::{RelayError, Result};
use crate::protocol::{ExtractedPayload, Extractor, WireProtocol};

const PREDICTED: (&str, &[&str]) = ("predicted", &["predicted", "y_pred"]);
const ACTUAL: (&str, &[&str]) = ("actual", &["actual", "y_true"]);
const TASK_TYPE: (&str, &[&str]) = ("task_type", &["task_type", "taskType"]);

#[derive(Debug, Default)]
pub struct CommonHttpExtractor;

impl CommonHttpExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for CommonHttpExtractor {
    fn protocol(&self) -> WireProtocol {
        WireProtocol::CommonHttp
    }

    fn validate(&self, body: &Value) -> Result<()> {
        let obj = payload_root(body).as_object().ok_or_else(|| {
            RelayError::BadRequest("common_http payload must be a JSON object".into())
        })?;

        for (name, aliases) in [PREDICTED, ACTUAL] {
            match field(obj, aliases) {
                Some(Value::Array(_)) => {}
                Some(_) => {
                    return Err(RelayError::BadRequest(format!("`{name}` must be an array")))
                }
                None => return Err(RelayError::BadRequest(format!("missing field `{name}`"))),
            }
        }

        let (name, aliases) = TASK_TYPE;
        match field(obj, aliases) {
            Some(Value::String(_)) => Ok(()),
            Some(_) => Err(RelayError::BadRequest(format!("`{name}` must be a string"))),
            None => Err(RelayError::BadRequest(format!("missing field `{name}`"))),
        }
    }

    fn extract(&self, body: &Value) -> Result<ExtractedPayload> {
        let obj = payload_root(body)
            .as_object()
            .ok_or_else(|| RelayError::Extraction("payload is not an object".into()))?;

        let predicted = numeric_array(obj, PREDICTED)?;
        let actual = numeric_array(obj, ACTUAL)?;

        if predicted.len() != actual.len() {
            return Err(RelayError::Extraction(format!(
                "`predicted` has {} values but `actual` has {}",
                predicted.len(),
                actual.len()
            )));
        }

        let (name, aliases) = TASK_TYPE;
        let task_type = field(obj, aliases)
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::Extraction(format!("`{name}` is missing or not a string")))?
            .to_string();

        Ok(ExtractedPayload {
            predicted,
            actual,
            task_type,
        })
    }
}

/// Structured-mode events carry the payload under `data`.
fn payload_root(body: &Value) -> &Value {
    if body.get("specversion").is_some() {
        body.get("data").unwrap_or(&Value::Null)
    } else {
        body
    }
}

fn field<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|k| obj.get(*k))
}

fn numeric_array(obj: &Map<String, Value>, (name, aliases): (&str, &[&str])) -> Result<Vec<f64>> {
    let items = field(obj, aliases)
        .and_then(Value::as_array)
        .ok_or_else(|| RelayError::Extraction(format!("`{name}` is missing or not an array")))?;

    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            as_number(v).ok_or_else(|| {
                RelayError::Extraction(format!("`{name}[{i}]` is not numeric: {v}"))
            })
        })
        .collect()
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
