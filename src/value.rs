//! The cell value union and column type tags.
use crate::error::{EngineError, Result};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single cell. Every row, regardless of source, is a `Vec<Value>` keyed
/// by its schema.
#[derive(Clone, Debug)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

/// Grouping and join keys are rarely floating point; when they are, equality
/// and hashing fall back to the bit pattern (so `NaN != NaN`-style surprises
/// are possible, same as any bit-exact float key).
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Int(i) => {
                0u8.hash(state);
                i.hash(state);
            }
            Value::Float(f) => {
                1u8.hash(state);
                f.to_bits().hash(state);
            }
            Value::Str(s) => {
                2u8.hash(state);
                s.hash(state);
            }
        }
    }
}

/// The declared type of a column, used to parse raw text fields on load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    Str,
}

impl ColumnType {
    pub fn parse_name(name: &str) -> Result<ColumnType> {
        match name {
            "int" => Ok(ColumnType::Int),
            "float" => Ok(ColumnType::Float),
            "str" => Ok(ColumnType::Str),
            other => Err(EngineError::Config(format!("unknown column type '{other}'"))),
        }
    }

    pub fn parse(&self, raw: &str) -> Result<Value> {
        let raw = raw.trim();
        match self {
            ColumnType::Int => raw
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| EngineError::Schema(format!("'{raw}' is not a valid int: {e}"))),
            ColumnType::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| EngineError::Schema(format!("'{raw}' is not a valid float: {e}"))),
            ColumnType::Str => Ok(Value::Str(raw.to_string())),
        }
    }
}
