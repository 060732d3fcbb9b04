//! Parameter schema — declared parameters checked before dispatch
//!
//! Parameters are declared as a small tagged-variant schema so that the
//! "missing with default" / "missing required" / "present but wrong type"
//! distinction is made deterministically before the handler ever runs,
//! rather than surfacing as a runtime type mismatch inside it.

use super::error::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type tag of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
    /// Accepts any JSON value
    Any,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
            ParamType::Any => "any",
        }
    }

    /// Whether `value` is acceptable for this type tag.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Float => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
            ParamType::Any => true,
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declared parameter of an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name
    pub name: String,
    /// Parameter description
    #[serde(default)]
    pub description: String,
    /// Type tag checked before dispatch
    #[serde(rename = "type")]
    pub ty: ParamType,
    /// Whether the parameter must be present when no default is declared
    pub required: bool,
    /// Default value used when the caller omits the parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    /// A parameter the caller must always supply.
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            ty,
            required: true,
            default: None,
        }
    }

    /// A parameter the caller may omit.
    pub fn optional(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            ty,
            required: false,
            default: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare a default. A defaulted parameter is filled in silently when
    /// omitted, so it is never reported as missing.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self.required = false;
        self
    }
}

/// Validate `params` against the declared specs, filling in defaults.
///
/// Order of checks per parameter:
/// 1. present but wrong type → [`ErrorCode::InvalidParameterType`]
/// 2. absent with a declared default → default inserted, no error
/// 3. absent and required → [`ErrorCode::MissingParameter`]
///
/// Undeclared parameters pass through untouched; providers that care reject
/// them in their own handlers.
///
/// [`ErrorCode::InvalidParameterType`]: super::error::ErrorCode::InvalidParameterType
/// [`ErrorCode::MissingParameter`]: super::error::ErrorCode::MissingParameter
pub fn validate_params(
    specs: &[ParamSpec],
    params: &mut serde_json::Map<String, Value>,
) -> Result<(), ToolError> {
    for spec in specs {
        match params.get(&spec.name) {
            Some(value) => {
                if !spec.ty.matches(value) {
                    return Err(ToolError::invalid_parameter_type(&spec.name, spec.ty.as_str()));
                }
            }
            None => {
                if let Some(default) = &spec.default {
                    params.insert(spec.name.clone(), default.clone());
                } else if spec.required {
                    return Err(ToolError::missing_parameter(&spec.name));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::error::ErrorCode;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> serde_json::Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_missing_required_parameter() {
        let specs = vec![ParamSpec::required("path", ParamType::String)];
        let mut p = params(&[]);

        let err = validate_params(&specs, &mut p).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParameter);
        assert!(err.message.contains("path"));
    }

    #[test]
    fn test_missing_defaulted_parameter_is_filled() {
        let specs = vec![ParamSpec::optional("limit", ParamType::Integer).with_default(10)];
        let mut p = params(&[]);

        validate_params(&specs, &mut p).unwrap();
        assert_eq!(p.get("limit"), Some(&json!(10)));
    }

    #[test]
    fn test_wrong_type_is_not_missing() {
        let specs = vec![ParamSpec::required("limit", ParamType::Integer)];
        let mut p = params(&[("limit", json!("ten"))]);

        let err = validate_params(&specs, &mut p).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameterType);
        assert_ne!(err.code, ErrorCode::MissingParameter);
    }

    #[test]
    fn test_optional_parameter_may_be_absent() {
        let specs = vec![ParamSpec::optional("pattern", ParamType::String)];
        let mut p = params(&[]);

        validate_params(&specs, &mut p).unwrap();
        assert!(p.is_empty());
    }

    #[test]
    fn test_type_matching() {
        assert!(ParamType::Integer.matches(&json!(3)));
        assert!(!ParamType::Integer.matches(&json!(3.5)));
        assert!(ParamType::Float.matches(&json!(3)));
        assert!(ParamType::Float.matches(&json!(3.5)));
        assert!(ParamType::Boolean.matches(&json!(true)));
        assert!(ParamType::Object.matches(&json!({"a": 1})));
        assert!(ParamType::Array.matches(&json!([1, 2])));
        assert!(ParamType::Any.matches(&json!(null)));
        assert!(!ParamType::String.matches(&json!(1)));
    }

    #[test]
    fn test_undeclared_parameters_pass_through() {
        let specs = vec![ParamSpec::optional("text", ParamType::String)];
        let mut p = params(&[("extra", json!(1))]);

        validate_params(&specs, &mut p).unwrap();
        assert_eq!(p.get("extra"), Some(&json!(1)));
    }
}
