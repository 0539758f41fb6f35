//! CloudEvents v1.0 envelope and its HTTP marshalling.
//!
//! Two HTTP modes exist:
//! - binary: context attributes travel as `ce-*` headers, the body is the data;
//! - structured: `Content-Type: application/cloudevents+json`, the body is a
//!   JSON object holding attributes and `data` side by side.
//!
//! Parsing is lenient about missing attributes (an empty `id` is legal here,
//! the relay mints a fresh one) but strict about shapes.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{RelayError, Result};

pub const SPEC_VERSION: &str = "1.0";
pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";
pub const JSON_CONTENT_TYPE: &str = "application/json";

const CE_PREFIX: &str = "ce-";

/// Lower-cased transport header names to values.
pub type Headers = BTreeMap<String, String>;

/// Attribute names with a dedicated field; everything else is an extension.
const CONTEXT_ATTRIBUTES: [&str; 8] = [
    "id",
    "source",
    "specversion",
    "type",
    "datacontenttype",
    "dataschema",
    "subject",
    "time",
];

/// A parsed (or freshly built) CloudEvent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub id: String,
    pub source: String,
    pub spec_version: String,
    pub event_type: String,
    pub data_content_type: Option<String>,
    pub data_schema: Option<String>,
    pub subject: Option<String>,
    /// RFC 3339 timestamp.
    pub time: Option<String>,
    pub extensions: BTreeMap<String, String>,
    pub data: Option<Value>,
}

impl Envelope {
    /// Rebuild the inbound event from transport headers and the (already
    /// JSON-decoded) request body, picking the mode from `content-type`.
    pub fn from_request(headers: &Headers, body: &Value) -> Result<Self> {
        let structured = headers
            .get("content-type")
            .map(|ct| ct.starts_with(STRUCTURED_CONTENT_TYPE))
            .unwrap_or(false);

        if structured {
            Self::from_structured(body)
        } else {
            Self::from_binary(headers, body)
        }
    }

    /// Binary mode: attributes from `ce-*` headers, body is the data.
    pub fn from_binary(headers: &Headers, body: &Value) -> Result<Self> {
        let mut env = Envelope {
            data_content_type: headers.get("content-type").cloned(),
            data: Some(body.clone()),
            ..Default::default()
        };

        for (name, value) in headers {
            let Some(attr) = name.strip_prefix(CE_PREFIX) else {
                continue;
            };
            if attr == "datacontenttype" {
                // binary mode carries this in content-type
                continue;
            }
            env.set_attribute(attr, value.clone());
        }

        env.check_spec_version()?;
        env.check_extensions()?;
        Ok(env)
    }

    /// Structured mode: the body is the whole event.
    pub fn from_structured(body: &Value) -> Result<Self> {
        let obj = body.as_object().ok_or_else(|| {
            RelayError::BadRequest("structured event must be a JSON object".into())
        })?;

        let mut env = Envelope::default();
        for (name, value) in obj {
            match name.as_str() {
                "data" => env.data = Some(value.clone()),
                "data_base64" => {
                    let s = value.as_str().ok_or_else(|| {
                        RelayError::BadRequest("`data_base64` must be a string".into())
                    })?;
                    env.data = Some(Value::String(s.to_string()));
                }
                attr if CONTEXT_ATTRIBUTES.contains(&attr) => {
                    let s = value.as_str().ok_or_else(|| {
                        RelayError::BadRequest(format!("attribute `{attr}` must be a string"))
                    })?;
                    env.set_attribute(attr, s.to_string());
                }
                ext => {
                    env.extensions.insert(ext.to_string(), attribute_string(value));
                }
            }
        }

        env.check_spec_version()?;
        env.check_extensions()?;
        Ok(env)
    }

    /// Binary-mode marshalling: `(headers, body)` ready for an HTTP POST.
    pub fn to_binary(&self) -> Result<(Vec<(String, String)>, Vec<u8>)> {
        let mut headers = vec![
            ("ce-specversion".to_string(), self.spec_version_or_default().to_string()),
            ("ce-id".to_string(), self.id.clone()),
            ("ce-source".to_string(), self.source.clone()),
            ("ce-type".to_string(), self.event_type.clone()),
            (
                "content-type".to_string(),
                self.data_content_type
                    .clone()
                    .unwrap_or_else(|| JSON_CONTENT_TYPE.to_string()),
            ),
        ];
        let optional = [
            ("ce-time", &self.time),
            ("ce-subject", &self.subject),
            ("ce-dataschema", &self.data_schema),
        ];
        for (name, value) in optional {
            if let Some(v) = value {
                headers.push((name.to_string(), v.clone()));
            }
        }
        for (k, v) in &self.extensions {
            headers.push((format!("{CE_PREFIX}{k}"), v.clone()));
        }

        let body = serde_json::to_vec(self.data.as_ref().unwrap_or(&Value::Null))
            .map_err(|e| RelayError::Internal(format!("encode event data failed: {e}")))?;

        Ok((headers, body))
    }

    /// Structured-mode JSON view (also used for debug logging).
    pub fn to_structured(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("specversion".into(), self.spec_version_or_default().into());
        obj.insert("id".into(), self.id.clone().into());
        obj.insert("source".into(), self.source.clone().into());
        obj.insert("type".into(), self.event_type.clone().into());
        let optional = [
            ("datacontenttype", &self.data_content_type),
            ("dataschema", &self.data_schema),
            ("subject", &self.subject),
            ("time", &self.time),
        ];
        for (name, value) in optional {
            if let Some(v) = value {
                obj.insert(name.into(), v.clone().into());
            }
        }
        for (k, v) in &self.extensions {
            obj.insert(k.clone(), v.clone().into());
        }
        if let Some(data) = &self.data {
            obj.insert("data".into(), data.clone());
        }
        Value::Object(obj)
    }

    fn set_attribute(&mut self, attr: &str, value: String) {
        match attr {
            "id" => self.id = value,
            "source" => self.source = value,
            "specversion" => self.spec_version = value,
            "type" => self.event_type = value,
            "datacontenttype" => self.data_content_type = Some(value),
            "dataschema" => self.data_schema = Some(value),
            "subject" => self.subject = Some(value),
            "time" => self.time = Some(value),
            ext => {
                self.extensions.insert(ext.to_string(), value);
            }
        }
    }

    fn spec_version_or_default(&self) -> &str {
        if self.spec_version.is_empty() {
            SPEC_VERSION
        } else {
            &self.spec_version
        }
    }

    fn check_spec_version(&self) -> Result<()> {
        if self.spec_version.is_empty() || self.spec_version == SPEC_VERSION {
            Ok(())
        } else {
            Err(RelayError::BadRequest(format!(
                "unsupported specversion: {}",
                self.spec_version
            )))
        }
    }

    // The id and extensions are relayed as `ce-*` headers.
    fn check_extensions(&self) -> Result<()> {
        if has_control(&self.id) {
            return Err(RelayError::BadRequest(
                "attribute `id` contains control characters".into(),
            ));
        }
        for (name, value) in &self.extensions {
            if !is_extension_name(name) {
                return Err(RelayError::BadRequest(format!(
                    "invalid extension attribute name {name:?}: must be lowercase a-z or 0-9"
                )));
            }
            if has_control(value) {
                return Err(RelayError::BadRequest(format!(
                    "extension attribute `{name}` contains control characters"
                )));
            }
        }
        Ok(())
    }
}

/// CloudEvents attribute naming: `[a-z0-9]+`.
pub fn is_extension_name(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

fn has_control(s: &str) -> bool {
    s.chars().any(|c| c.is_control() && c != '\t')
}

fn attribute_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
