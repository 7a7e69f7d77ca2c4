//! Explicit parameter schemas for tools.
//!
//! A schema is an ordered map from parameter name to [`ParamSpec`]. Order is
//! declaration order and is kept in the rendered JSON Schema and in the list of
//! violations reported by [`ParameterSchema::validate`].

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use super::error::{Violation, ViolationReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ScalarType {
    fn json_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Scalar(ScalarType),
    List(ScalarType),
}

impl ParamType {
    fn describe(self) -> String {
        match self {
            Self::Scalar(t) => t.json_name().to_string(),
            Self::List(t) => format!("array of {}", t.json_name()),
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Scalar(t) => t.accepts(value),
            Self::List(t) => value
                .as_array()
                .map(|items| items.iter().all(|item| t.accepts(item)))
                .unwrap_or(false),
        }
    }

    fn to_json_schema(self) -> Value {
        match self {
            Self::Scalar(t) => json!({ "type": t.json_name() }),
            Self::List(t) => json!({ "type": "array", "items": { "type": t.json_name() } }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub param_type: ParamType,
    pub required: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSchema {
    params: IndexMap<String, ParamSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.with(name, param_type, true, description)
    }

    pub fn optional(self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.with(name, param_type, false, description)
    }

    fn with(mut self, name: &str, param_type: ParamType, required: bool, description: &str) -> Self {
        self.params.insert(
            name.to_string(),
            ParamSpec {
                param_type,
                required,
                description: (!description.is_empty()).then(|| description.to_string()),
            },
        );
        self
    }

    /// Checks every declared parameter and reports all violations at once.
    ///
    /// A missing payload (`null`) is treated as an empty object. Parameters the
    /// schema does not declare are ignored. An optional parameter given as
    /// `null` counts as absent.
    pub fn validate(&self, arguments: &Value) -> Result<(), Vec<Violation>> {
        let empty = Map::new();
        let object = match arguments {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => {
                return Err(vec![Violation {
                    parameter: "arguments".to_string(),
                    reason: ViolationReason::NotAnObject {
                        found: json_type_name(other).to_string(),
                    },
                }])
            }
        };

        let violations: Vec<Violation> = self
            .params
            .iter()
            .filter_map(|(name, spec)| {
                let reason = match object.get(name) {
                    None => spec.required.then_some(ViolationReason::Missing),
                    Some(Value::Null) if !spec.required => None,
                    Some(value) if spec.param_type.accepts(value) => None,
                    Some(value) => Some(ViolationReason::TypeMismatch {
                        expected: spec.param_type.describe(),
                        found: json_type_name(value).to_string(),
                    }),
                };
                reason.map(|reason| Violation {
                    parameter: name.clone(),
                    reason,
                })
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// JSON Schema advertised in `tools/list`.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|(name, spec)| {
                let mut property = spec.param_type.to_json_schema();
                if let (Some(description), Some(obj)) =
                    (&spec.description, property.as_object_mut())
                {
                    obj.insert("description".to_string(), json!(description));
                }
                (name.clone(), property)
            })
            .collect();

        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
