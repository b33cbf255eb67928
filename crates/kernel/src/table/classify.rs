//! Column value types and their search classification.
//!
//! A [`ValueType`] is what storage reports (or what the caller annotates) for
//! a projected column. [`classify`] maps it to the [`Classification`] that
//! decides which predicate and ordering primitives apply.

use std::fmt;

/// Declared value type of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    /// Whole numbers.
    Integer,
    /// Floating point or arbitrary precision numbers.
    Float,
    /// Character data.
    Text,
    /// Array of the element type.
    Array(Box<ValueType>),
    /// A concrete type without search support (boolean, date, json, ...).
    Other(String),
    /// Type could not be determined.
    Null,
}

impl ValueType {
    /// Map a PostgreSQL type name, as reported by statement metadata, to a
    /// value type. Array types are reported with a `[]` suffix or a leading
    /// underscore.
    pub fn from_pg_name(name: &str) -> Self {
        let name = name.trim();

        if let Some(element) = name.strip_suffix("[]") {
            return ValueType::Array(Box::new(Self::from_pg_name(element)));
        }
        if let Some(element) = name.strip_prefix('_') {
            return ValueType::Array(Box::new(Self::from_pg_name(element)));
        }

        match name.to_ascii_uppercase().as_str() {
            "INT2" | "INT4" | "INT8" | "SMALLINT" | "INTEGER" | "BIGINT" | "OID" => {
                ValueType::Integer
            }
            "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE PRECISION" | "NUMERIC" | "MONEY" => {
                ValueType::Float
            }
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => ValueType::Text,
            "" | "UNKNOWN" | "VOID" | "NULL" => ValueType::Null,
            other => ValueType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Integer => write!(f, "integer"),
            ValueType::Float => write!(f, "float"),
            ValueType::Text => write!(f, "text"),
            ValueType::Array(element) => write!(f, "{element}[]"),
            ValueType::Other(name) => write!(f, "{}", name.to_lowercase()),
            ValueType::Null => write!(f, "null"),
        }
    }
}

/// Numeric subtype, used to parse search tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Integer,
    Float,
}

/// Semantic category of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Numeric(NumericKind),
    Text,
    ListOf(Box<Classification>),
    /// Known type with no search semantics; searches are neutral.
    Unknown,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Numeric(NumericKind::Integer) => write!(f, "numeric(integer)"),
            Classification::Numeric(NumericKind::Float) => write!(f, "numeric(float)"),
            Classification::Text => write!(f, "text"),
            Classification::ListOf(element) => write!(f, "list({element})"),
            Classification::Unknown => write!(f, "unknown"),
        }
    }
}

/// Returned when a value type is [`ValueType::Null`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unclassifiable;

/// Classify a value type.
///
/// Fails only when the type cannot be determined at all. Callers turn that
/// into a [`ConfigError::UnknownType`](crate::ConfigError::UnknownType) at
/// registration time.
pub fn classify(value_type: &ValueType) -> Result<Classification, Unclassifiable> {
    match value_type {
        ValueType::Integer => Ok(Classification::Numeric(NumericKind::Integer)),
        ValueType::Float => Ok(Classification::Numeric(NumericKind::Float)),
        ValueType::Text => Ok(Classification::Text),
        ValueType::Array(element) => Ok(Classification::ListOf(Box::new(classify(element)?))),
        ValueType::Other(_) => Ok(Classification::Unknown),
        ValueType::Null => Err(Unclassifiable),
    }
}
