//! The generic data tree every loader produces and every writer consumes.
//!
//! [`DataTree`] is format-agnostic: a YAML document, a JSON file
//! or a TOML table all end up as the same closed set of variants. Map keys are
//! themselves trees, so non-string keys (YAML allows `1: one`) survive intact.
//!
//! Equality is structural and map ordering is irrelevant: maps are stored
//! sorted by a total order over trees, with floats compared by
//! [`f64::total_cmp`] so that every value (including NaN) equals itself.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A parsed, format-independent configuration value.
#[derive(Debug, Clone)]
pub enum DataTree {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Array(Vec<DataTree>),
    Map(BTreeMap<DataTree, DataTree>),
}

impl DataTree {
    /// Build a map node from key/value pairs. Later duplicates replace earlier ones.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<DataTree>,
        V: Into<DataTree>,
    {
        DataTree::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// An empty map node, the shape of an empty YAML document section.
    pub fn empty_map() -> Self {
        DataTree::Map(BTreeMap::new())
    }

    pub fn array<V: Into<DataTree>>(items: impl IntoIterator<Item = V>) -> Self {
        DataTree::Array(items.into_iter().map(Into::into).collect())
    }

    /// Look up a string key in a map node. Returns `None` for non-map nodes.
    pub fn get(&self, key: &str) -> Option<&DataTree> {
        match self {
            DataTree::Map(entries) => entries.get(&DataTree::String(key.to_string())),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataTree::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataTree::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DataTree::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataTree::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataTree::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DataTree]> {
        match self {
            DataTree::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<DataTree, DataTree>> {
        match self {
            DataTree::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Short name of the node kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            DataTree::Null => "null",
            DataTree::String(_) => "string",
            DataTree::Integer(_) => "integer",
            DataTree::Float(_) => "float",
            DataTree::Boolean(_) => "boolean",
            DataTree::Array(_) => "array",
            DataTree::Map(_) => "map",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            DataTree::Null => 0,
            DataTree::Boolean(_) => 1,
            DataTree::Integer(_) => 2,
            DataTree::Float(_) => 3,
            DataTree::String(_) => 4,
            DataTree::Array(_) => 5,
            DataTree::Map(_) => 6,
        }
    }
}

impl Ord for DataTree {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DataTree::Null, DataTree::Null) => Ordering::Equal,
            (DataTree::Boolean(a), DataTree::Boolean(b)) => a.cmp(b),
            (DataTree::Integer(a), DataTree::Integer(b)) => a.cmp(b),
            (DataTree::Float(a), DataTree::Float(b)) => a.total_cmp(b),
            (DataTree::String(a), DataTree::String(b)) => a.cmp(b),
            (DataTree::Array(a), DataTree::Array(b)) => a.cmp(b),
            (DataTree::Map(a), DataTree::Map(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for DataTree {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DataTree {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DataTree {}

impl Hash for DataTree {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            DataTree::Null => {}
            DataTree::Boolean(b) => b.hash(state),
            DataTree::Integer(i) => i.hash(state),
            // total_cmp equality is bit equality
            DataTree::Float(f) => f.to_bits().hash(state),
            DataTree::String(s) => s.hash(state),
            DataTree::Array(items) => items.hash(state),
            DataTree::Map(entries) => {
                state.write_usize(entries.len());
                for (k, v) in entries {
                    k.hash(state);
                    v.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for DataTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataTree::Null => write!(f, "null"),
            DataTree::String(s) => write!(f, "{s:?}"),
            DataTree::Integer(i) => write!(f, "{i}"),
            DataTree::Float(v) => write!(f, "{v:?}"),
            DataTree::Boolean(b) => write!(f, "{b}"),
            DataTree::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            DataTree::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for DataTree {
    fn from(value: &str) -> Self {
        DataTree::String(value.to_string())
    }
}

impl From<String> for DataTree {
    fn from(value: String) -> Self {
        DataTree::String(value)
    }
}

impl From<i64> for DataTree {
    fn from(value: i64) -> Self {
        DataTree::Integer(value)
    }
}

impl From<i32> for DataTree {
    fn from(value: i32) -> Self {
        DataTree::Integer(value.into())
    }
}

impl From<u32> for DataTree {
    fn from(value: u32) -> Self {
        DataTree::Integer(value.into())
    }
}

impl From<f64> for DataTree {
    fn from(value: f64) -> Self {
        DataTree::Float(value)
    }
}

impl From<bool> for DataTree {
    fn from(value: bool) -> Self {
        DataTree::Boolean(value)
    }
}

impl From<Vec<DataTree>> for DataTree {
    fn from(value: Vec<DataTree>) -> Self {
        DataTree::Array(value)
    }
}

impl From<BTreeMap<DataTree, DataTree>> for DataTree {
    fn from(value: BTreeMap<DataTree, DataTree>) -> Self {
        DataTree::Map(value)
    }
}

impl<T: Into<DataTree>> From<Option<T>> for DataTree {
    fn from(value: Option<T>) -> Self {
        value.map_or(DataTree::Null, Into::into)
    }
}
