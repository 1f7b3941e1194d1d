//! Values stored in a generic entity's data map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamically typed value in [`super::GenericEntity`] data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataValue {
    /// Text.
    String(String),
    /// Signed integer.
    Integer(i64),
    /// Floating point number. Non-finite values are kept as the strings
    /// `"NaN"`, `"inf"` and `"-inf"`.
    #[serde(with = "double_repr")]
    Double(f64),
    /// Point in time.
    Date(DateTime<Utc>),
    /// Boolean.
    Bool(bool),
    /// Opaque bytes.
    Data(Vec<u8>),
}

mod double_repr {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub(super) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("invalid double {other:?}"))),
            },
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::String(s) => f.write_str(s),
            DataValue::Integer(n) => write!(f, "{n}"),
            DataValue::Double(d) => write!(f, "{d}"),
            DataValue::Date(t) => write!(f, "{}", t.to_rfc3339()),
            DataValue::Bool(b) => write!(f, "{b}"),
            DataValue::Data(bytes) => write!(f, "{} bytes", bytes.len()),
        }
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::String(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::String(value)
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::Integer(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Double(value)
    }
}

impl From<DateTime<Utc>> for DataValue {
    fn from(value: DateTime<Utc>) -> Self {
        DataValue::Date(value)
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        DataValue::Bool(value)
    }
}

impl From<Vec<u8>> for DataValue {
    fn from(value: Vec<u8>) -> Self {
        DataValue::Data(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape_is_tagged() {
        let json = serde_json::to_string(&DataValue::Integer(4)).unwrap();
        assert_eq!(json, r#"{"integer":4}"#);

        let back: DataValue = serde_json::from_str(r#"{"string":"hi"}"#).unwrap();
        assert_eq!(back, DataValue::from("hi"));
    }

    #[test]
    fn non_finite_doubles_survive_json() {
        let json = serde_json::to_string(&DataValue::Double(f64::NAN)).unwrap();
        assert_eq!(json, r#"{"double":"NaN"}"#);

        let back: DataValue = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, DataValue::Double(d) if d.is_nan()));

        for value in [f64::INFINITY, f64::NEG_INFINITY, -0.5] {
            let json = serde_json::to_string(&DataValue::Double(value)).unwrap();
            let back: DataValue = serde_json::from_str(&json).unwrap();
            assert_eq!(back, DataValue::Double(value));
        }

        assert!(serde_json::from_str::<DataValue>(r#"{"double":"many"}"#).is_err());
    }

    #[test]
    fn display() {
        assert_eq!(DataValue::from("x").to_string(), "x");
        assert_eq!(DataValue::from(true).to_string(), "true");
        assert_eq!(DataValue::from(vec![1u8, 2, 3]).to_string(), "3 bytes");
    }
}
