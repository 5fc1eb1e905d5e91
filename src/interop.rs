//! Loading and writing trees in concrete formats.
//!
//! JSON and TOML values convert to a [`DataTree`] losslessly. The reverse
//! direction fails where the format has no equivalent: TOML has no null and
//! only string keys, JSON has no NaN or infinities and only string keys.
//! TOML datetimes arrive as strings.

use std::collections::BTreeMap;

use serde_json::Value as Json;
use toml::Value as Toml;

use crate::error::InteropError;
use crate::tree::DataTree;

fn unrepresentable(format: &'static str, what: impl Into<String>) -> InteropError {
    InteropError::Unrepresentable {
        format,
        what: what.into(),
    }
}

impl DataTree {
    /// Parse a TOML document. The root is always a map.
    pub fn parse_toml(text: &str) -> Result<DataTree, InteropError> {
        let table: toml::Table = toml::from_str(text)?;
        Ok(DataTree::from_toml(&Toml::Table(table)))
    }

    pub fn parse_json(text: &str) -> Result<DataTree, InteropError> {
        let value: Json = serde_json::from_str(text)?;
        DataTree::from_json(&value)
    }

    /// Render as a TOML document. Only maps can be the root.
    pub fn to_toml_string(&self) -> Result<String, InteropError> {
        match self.to_toml()? {
            Toml::Table(table) => Ok(toml::to_string(&table)?),
            _ => Err(unrepresentable("TOML", format!("a {} document root", self.kind()))),
        }
    }

    pub fn to_json_string(&self) -> Result<String, InteropError> {
        Ok(serde_json::to_string_pretty(&self.to_json()?)?)
    }

    pub fn from_toml(value: &Toml) -> DataTree {
        match value {
            Toml::String(s) => DataTree::String(s.clone()),
            Toml::Integer(i) => DataTree::Integer(*i),
            Toml::Float(f) => DataTree::Float(*f),
            Toml::Boolean(b) => DataTree::Boolean(*b),
            Toml::Datetime(dt) => DataTree::String(dt.to_string()),
            Toml::Array(items) => DataTree::Array(items.iter().map(DataTree::from_toml).collect()),
            Toml::Table(table) => DataTree::Map(
                table
                    .iter()
                    .map(|(k, v)| (DataTree::String(k.clone()), DataTree::from_toml(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_toml(&self) -> Result<Toml, InteropError> {
        Ok(match self {
            DataTree::Null => return Err(unrepresentable("TOML", "null")),
            DataTree::String(s) => Toml::String(s.clone()),
            DataTree::Integer(i) => Toml::Integer(*i),
            DataTree::Float(f) => Toml::Float(*f),
            DataTree::Boolean(b) => Toml::Boolean(*b),
            DataTree::Array(items) => {
                Toml::Array(items.iter().map(DataTree::to_toml).collect::<Result<_, _>>()?)
            }
            DataTree::Map(entries) => {
                let mut table = toml::Table::new();
                for (k, v) in entries {
                    let Some(key) = k.as_str() else {
                        return Err(unrepresentable("TOML", format!("{} key {k}", k.kind())));
                    };
                    table.insert(key.to_string(), v.to_toml()?);
                }
                Toml::Table(table)
            }
        })
    }

    /// Integers beyond `i64` are rejected rather than rounded to floats.
    pub fn from_json(value: &Json) -> Result<DataTree, InteropError> {
        Ok(match value {
            Json::Null => DataTree::Null,
            Json::Bool(b) => DataTree::Boolean(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DataTree::Integer(i)
                } else if n.is_u64() {
                    return Err(unrepresentable("a data tree", format!("integer {n}")));
                } else {
                    match n.as_f64() {
                        Some(f) => DataTree::Float(f),
                        None => return Err(unrepresentable("a data tree", format!("number {n}"))),
                    }
                }
            }
            Json::String(s) => DataTree::String(s.clone()),
            Json::Array(items) => DataTree::Array(
                items
                    .iter()
                    .map(DataTree::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            Json::Object(object) => DataTree::Map(
                object
                    .iter()
                    .map(|(k, v)| Ok((DataTree::String(k.clone()), DataTree::from_json(v)?)))
                    .collect::<Result<BTreeMap<_, _>, InteropError>>()?,
            ),
        })
    }

    pub fn to_json(&self) -> Result<Json, InteropError> {
        Ok(match self {
            DataTree::Null => Json::Null,
            DataTree::String(s) => Json::String(s.clone()),
            DataTree::Integer(i) => Json::from(*i),
            DataTree::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .ok_or_else(|| unrepresentable("JSON", format!("float {f}")))?,
            DataTree::Boolean(b) => Json::Bool(*b),
            DataTree::Array(items) => {
                Json::Array(items.iter().map(DataTree::to_json).collect::<Result<_, _>>()?)
            }
            DataTree::Map(entries) => {
                let mut object = serde_json::Map::new();
                for (k, v) in entries {
                    let Some(key) = k.as_str() else {
                        return Err(unrepresentable("JSON", format!("{} key {k}", k.kind())));
                    };
                    object.insert(key.to_string(), v.to_json()?);
                }
                Json::Object(object)
            }
        })
    }
}
