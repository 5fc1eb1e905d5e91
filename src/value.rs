//! Decoded values.

use std::fmt;

use crate::tree::DataTree;

/// A value produced by decoding, shaped by the declared property types.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Enum { type_name: String, constant: String },
    List(Vec<Value>),
    /// Entries in the key order of the source tree.
    Map(Vec<(Value, Value)>),
    Record(Record),
    /// A value built by a custom deserializer, carrying its own data.
    Opaque { type_name: String, data: DataTree },
}

impl Value {
    pub fn opaque(type_name: &str, data: impl Into<DataTree>) -> Self {
        Value::Opaque {
            type_name: type_name.to_string(),
            data: data.into(),
        }
    }

    pub fn enumeration(type_name: &str, constant: &str) -> Self {
        Value::Enum {
            type_name: type_name.to_string(),
            constant: constant.to_string(),
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Enum { .. } => "enum",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
            Value::Opaque { .. } => "opaque",
        }
    }
}

/// An instance of a configuration structure: property values by declared name.
///
/// Union values are records of the alternative that matched.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub structure: String,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(structure: &str) -> Self {
        Self {
            structure: structure.to_string(),
            fields: Vec::new(),
        }
    }

    /// Set `name`, replacing any earlier value.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Enum { constant, .. } => write!(f, "{constant}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                write!(f, "}}")
            }
            Value::Record(record) => write!(f, "{record}"),
            Value::Opaque { type_name, data } => write!(f, "{type_name}({data})"),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.structure)?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, "}}")
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_display_has_no_spaces_between_fields() {
        let record = Record::new("Server").with("host", "localhost").with("port", 8080);
        assert_eq!(record.to_string(), "Server{host=localhost,port=8080}");
    }

    #[test]
    fn with_replaces_existing_field() {
        let record = Record::new("A").with("x", 1).with("x", 2);
        assert_eq!(record.fields.len(), 1);
        assert_eq!(record.get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn nested_display() {
        let inner = Record::new("Inner").with("on", true);
        let value = Value::from(
            Record::new("Outer")
                .with("inner", inner)
                .with("tags", vec![Value::from("a"), Value::from("b")]),
        );
        assert_eq!(value.to_string(), "Outer{inner=Inner{on=true},tags=[a, b]}");
    }

    #[test]
    fn opaque_shows_its_data() {
        let value = Value::opaque("Colour", "red");
        assert_eq!(value.to_string(), "Colour(\"red\")");
        assert_eq!(value.kind(), "opaque");
    }
}
