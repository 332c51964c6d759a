//! Query parameter values and sanitization.
//!
//! Parameters arrive as an arbitrary key/value mapping. Only string,
//! boolean and numeric scalars survive sanitization; everything else is
//! carried as [`ParamValue::Unsupported`] and silently dropped.

use crate::truncate_bytes;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Query parameters keyed by name.
pub type QueryParams = BTreeMap<String, ParamValue>;

/// A single query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// A value of a type that cannot be reported. Holds a short type label.
    Unsupported(&'static str),
}

impl ParamValue {
    /// Whether this value can be reported.
    pub fn is_supported(&self) -> bool {
        !matches!(self, ParamValue::Unsupported(_))
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::String(s) => serializer.serialize_str(s),
            ParamValue::Bool(b) => serializer.serialize_bool(*b),
            ParamValue::Int(n) => serializer.serialize_i64(*n),
            ParamValue::UInt(n) => serializer.serialize_u64(*n),
            ParamValue::Float(n) => serializer.serialize_f64(*n),
            ParamValue::Unsupported(_) => serializer.serialize_unit(),
        }
    }
}

macro_rules! impl_from_int {
    ($variant:ident, $target:ty => $($ty:ty),*) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(v: $ty) -> Self {
                    ParamValue::$variant(<$target>::from(v))
                }
            }
        )*
    };
}

impl_from_int!(Int, i64 => i8, i16, i32, i64);
impl_from_int!(UInt, u64 => u8, u16, u32, u64);

impl From<isize> for ParamValue {
    fn from(v: isize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::UInt(v as u64)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float(f64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;

        match v {
            Value::String(s) => ParamValue::String(s),
            Value::Bool(b) => ParamValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ParamValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    ParamValue::UInt(u)
                } else {
                    n.as_f64()
                        .map_or(ParamValue::Unsupported("number"), ParamValue::Float)
                }
            }
            Value::Null => ParamValue::Unsupported("null"),
            Value::Array(_) => ParamValue::Unsupported("array"),
            Value::Object(_) => ParamValue::Unsupported("object"),
        }
    }
}

/// Whether and how parameters are retained.
///
/// `key_limit` and `value_limit` count UTF-8 bytes, not characters: a key of
/// 200 `é` is 400 bytes and is dropped under the default limit of 255.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamPolicy {
    pub enabled: bool,
    pub high_security: bool,
    pub key_limit: usize,
    pub value_limit: usize,
}

impl ParamPolicy {
    pub fn from_config(config: &crate::TracerConfig) -> Self {
        Self {
            enabled: config.query_parameters_enabled,
            high_security: config.high_security,
            key_limit: config.param_key_limit,
            value_limit: config.param_value_limit,
        }
    }

    /// Whether parameters may be captured at all. High security mode wins.
    pub fn collects(&self) -> bool {
        self.enabled && !self.high_security
    }
}

/// Filter, truncate and redact query parameters.
///
/// Returns `None` when high security mode is on, when capture is disabled,
/// when there were no parameters, or when every entry was filtered out.
/// Keys over `key_limit` bytes and unsupported values are dropped; string
/// values over `value_limit` bytes are cut at the nearest char boundary.
pub fn sanitize_params(params: Option<&QueryParams>, policy: &ParamPolicy) -> Option<QueryParams> {
    if !policy.collects() {
        return None;
    }

    let sanitized: QueryParams = params?
        .iter()
        .filter(|(key, value)| key.len() <= policy.key_limit && value.is_supported())
        .map(|(key, value)| {
            let value = match value {
                ParamValue::String(s) if s.len() > policy.value_limit => {
                    ParamValue::String(truncate_bytes(s, policy.value_limit).to_string())
                }
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect();

    (!sanitized.is_empty()).then_some(sanitized)
}
