use std::fmt;

use crowd_schema::GeometryRecord;
use serde_json::Value as JsonValue;

/// A resolved field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Enum { name: String, code: u8 },
    /// Numeric tuple selected out of a tagged sequence.
    Tuple(Vec<i64>),
    /// Tagged sequence; `[tag]` reference segments select into it.
    Geometry(Vec<GeometryRecord>),
}

impl Value {
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Value::Float(value) => Some(value),
            Value::Int(value) => Some(value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(value) => Some(value),
            _ => None,
        }
    }

    pub fn enum_code(&self) -> Option<u8> {
        match *self {
            Value::Enum { code, .. } => Some(code),
            _ => None,
        }
    }

    /// First tuple in the sequence carrying `tag`.
    pub fn select_tag(&self, tag: &str) -> Option<Value> {
        match self {
            Value::Geometry(records) => records
                .iter()
                .find(|record| record.tag.as_str() == tag)
                .map(|record| Value::Tuple(record.values.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Str(value) => write!(f, "'{value}'"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Enum { name, .. } => write!(f, "{name}"),
            Value::Tuple(values) => write!(f, "{values:?}"),
            Value::Geometry(records) => write!(f, "<{} geometry records>", records.len()),
        }
    }
}

/// Raw, not yet coerced field input.
#[derive(Debug, Clone)]
pub(crate) enum Raw<'a> {
    Json(&'a JsonValue),
    Value(Value),
}

impl Raw<'_> {
    pub(crate) fn describe(&self) -> String {
        match self {
            Raw::Json(json) => json.to_string(),
            Raw::Value(value) => value.to_string(),
        }
    }

    pub(crate) fn reference_expr(&self) -> Option<&str> {
        match self {
            Raw::Json(JsonValue::String(text)) => {
                crate::reference::is_reference(text).then_some(text.as_str())
            }
            Raw::Value(Value::Str(text)) => {
                crate::reference::is_reference(text).then_some(text.as_str())
            }
            _ => None,
        }
    }

    pub(crate) fn to_int(&self) -> Option<i64> {
        match self {
            Raw::Json(JsonValue::Number(number)) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|value| value.trunc() as i64)),
            Raw::Json(JsonValue::String(text)) => parse_int(text),
            Raw::Value(Value::Int(value)) => Some(*value),
            Raw::Value(Value::Float(value)) => Some(value.trunc() as i64),
            Raw::Value(Value::Str(text)) => parse_int(text),
            _ => None,
        }
    }

    pub(crate) fn to_float(&self) -> Option<f64> {
        match self {
            Raw::Json(JsonValue::Number(number)) => number.as_f64(),
            Raw::Json(JsonValue::String(text)) => parse_float(text),
            Raw::Value(Value::Str(text)) => parse_float(text),
            Raw::Value(value) => value.as_float(),
            _ => None,
        }
    }

    pub(crate) fn to_text(&self) -> Option<String> {
        match self {
            Raw::Json(JsonValue::String(text)) => Some(text.clone()),
            Raw::Json(JsonValue::Number(number)) => Some(number.to_string()),
            Raw::Json(JsonValue::Bool(flag)) => Some(flag.to_string()),
            Raw::Value(Value::Str(text)) => Some(text.clone()),
            Raw::Value(Value::Int(value)) => Some(value.to_string()),
            Raw::Value(Value::Float(value)) => Some(value.to_string()),
            Raw::Value(Value::Bool(flag)) => Some(flag.to_string()),
            Raw::Value(Value::Enum { name, .. }) => Some(name.clone()),
            _ => None,
        }
    }

    pub(crate) fn to_bool(&self) -> Option<bool> {
        match self {
            Raw::Json(JsonValue::Bool(flag)) => Some(*flag),
            Raw::Json(JsonValue::Number(number)) => number.as_f64().map(|value| value != 0.0),
            Raw::Json(JsonValue::String(text)) => parse_truthy(text),
            Raw::Value(Value::Bool(flag)) => Some(*flag),
            Raw::Value(Value::Int(value)) => Some(*value != 0),
            Raw::Value(Value::Float(value)) => Some(*value != 0.0),
            Raw::Value(Value::Str(text)) => parse_truthy(text),
            _ => None,
        }
    }

    pub(crate) fn enum_name(&self) -> Option<String> {
        match self {
            Raw::Json(JsonValue::String(text)) => Some(text.clone()),
            Raw::Value(Value::Str(text)) => Some(text.clone()),
            Raw::Value(Value::Enum { name, .. }) => Some(name.clone()),
            _ => None,
        }
    }
}

fn parse_int(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    trimmed.parse::<i64>().ok().or_else(|| {
        parse_float(trimmed)
            .filter(|value| value.is_finite())
            .map(|value| value.trunc() as i64)
    })
}

/// Accepts plain decimals as well as `inf`, `+infinity` and friends.
fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

fn parse_truthy(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowd_schema::GeometryTag;
    use serde_json::json;

    #[test]
    fn float_coercion_accepts_infinity_literals() {
        let json = json!("infinity");
        assert_eq!(Raw::Json(&json).to_float(), Some(f64::INFINITY));
        let json = json!("+Infinity");
        assert_eq!(Raw::Json(&json).to_float(), Some(f64::INFINITY));
        let json = json!(20);
        assert_eq!(Raw::Json(&json).to_float(), Some(20.0));
    }

    #[test]
    fn int_coercion_truncates() {
        let json = json!(7.9);
        assert_eq!(Raw::Json(&json).to_int(), Some(7));
        assert_eq!(Raw::Value(Value::Float(-2.5)).to_int(), Some(-2));
        let json = json!("12.7");
        assert_eq!(Raw::Json(&json).to_int(), Some(12));
    }

    #[test]
    fn bool_coercion_accepts_truthy_literals() {
        let json = json!("yes");
        assert_eq!(Raw::Json(&json).to_bool(), Some(true));
        let json = json!(0);
        assert_eq!(Raw::Json(&json).to_bool(), Some(false));
        let json = json!("maybe");
        assert_eq!(Raw::Json(&json).to_bool(), None);
    }

    #[test]
    fn select_tag_returns_first_match() {
        let geometry = Value::Geometry(vec![
            GeometryRecord::width(100),
            GeometryRecord::wall(0, 0, 10, 0),
            GeometryRecord::wall(5, 5, 5, 50),
        ]);
        assert_eq!(
            geometry.select_tag(GeometryTag::Wall.as_str()),
            Some(Value::Tuple(vec![0, 0, 10, 0]))
        );
        assert_eq!(geometry.select_tag("spawn-area"), None);
    }
}
