//! The generated codec: decodes [`DataTree`]s into [`Value`]s and encodes them
//! back, driven by the per-structure plans the pipeline compiled.
//!
//! Decoding a record walks its properties in order and stops at the first
//! failure. For each property:
//!
//! 1. Look up the effective key. A missing key or an explicit null falls back
//!    to the declared default, then to null for nullable properties, and is
//!    otherwise [`DecodeError::PropertyNotFound`].
//! 2. If a regular custom deserializer applies, its result is the result.
//! 3. Otherwise decode structurally. When that fails and a fallback
//!    deserializer applies, the fallback's result replaces the failure.
//!
//! Unions try each alternative in order against the same input. Alternatives
//! are decoded strictly (keys the alternative does not declare reject it), so
//! `{}` selects an empty alternative while `{value: 1}` moves on to one that
//! declares `value`. The first success wins; if all fail, every attempt's
//! failure is reported.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{DecodeError, DecodeResult, EncodeError, Error};
use crate::model::{ConfigStructure, FloatKind, IntKind, PropertyType};
use crate::pipeline::{CompiledStructure, Member, Pipeline};
use crate::plain;
use crate::policy::{self, EnumScheme};
use crate::registry::RegisteredDeserializer;
use crate::schema::Schema;
use crate::tree::DataTree;
use crate::value::{Record, Value};

// -- Plans --------------------------------------------------------------------

/// How one value of a declared type is decoded.
#[derive(Debug, Clone)]
pub(crate) struct Plan {
    pub(crate) ty: PropertyType,
    pub(crate) kind: PlanKind,
    pub(crate) custom: Option<RegisteredDeserializer>,
    pub(crate) fallback: Option<RegisteredDeserializer>,
}

#[derive(Debug, Clone)]
pub(crate) enum PlanKind {
    Bool,
    Int(IntKind),
    Float(FloatKind),
    String,
    Enum {
        name: String,
        constants: Vec<String>,
        scheme: EnumScheme,
    },
    Structure(String),
    List(Box<Plan>),
    Map(Box<Plan>, Box<Plan>),
    Custom(String),
}

#[derive(Debug, Clone)]
pub(crate) struct PropertyPlan {
    pub(crate) name: String,
    pub(crate) key: String,
    /// `key` as a map node, built once for lookups.
    pub(crate) lookup: DataTree,
    pub(crate) nullable: bool,
    pub(crate) default: Option<DataTree>,
    pub(crate) plan: Plan,
}

#[derive(Debug, Clone)]
pub(crate) enum DecodePlan {
    Record(Vec<PropertyPlan>),
    Union(Vec<String>),
}

#[derive(Debug, Clone)]
pub(crate) struct FieldEncoding {
    pub(crate) name: String,
    pub(crate) key: String,
    pub(crate) ty: PropertyType,
    pub(crate) optional: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum EncodePlan {
    Record(Vec<FieldEncoding>),
    Union(Vec<String>),
}

// -- Decode context -----------------------------------------------------------

/// What a custom deserializer sees: the value under the property's key plus
/// enough context to delegate back to the structural decoder.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    data: &'a DataTree,
    codec: &'a Codec,
    structure: &'a str,
    property: &'a str,
    target: &'a PropertyType,
}

impl<'a> DecodeContext<'a> {
    pub fn data(&self) -> &'a DataTree {
        self.data
    }

    /// Structure owning the property being decoded.
    pub fn structure(&self) -> &'a str {
        self.structure
    }

    pub fn property(&self) -> &'a str {
        self.property
    }

    /// Declared type being produced.
    pub fn target(&self) -> &'a PropertyType {
        self.target
    }

    pub fn codec(&self) -> &'a Codec {
        self.codec
    }

    /// The same context over different data.
    pub fn with_data(&self, data: &'a DataTree) -> DecodeContext<'a> {
        DecodeContext { data, ..*self }
    }

    /// Decode the current data as the named structure.
    pub fn decode_as(&self, structure: &str) -> DecodeResult<Value> {
        self.codec.decode(structure, self.data)
    }

    /// Read the current data into any serde type.
    pub fn load_as<T: DeserializeOwned>(&self) -> DecodeResult<T> {
        self.data
            .to_plain()
            .map_err(|e| DecodeError::custom(e.to_string()))
    }
}

/// Position of a value being decoded, for diagnostics.
#[derive(Clone, Copy)]
struct Site<'a> {
    structure: &'a str,
    property: &'a str,
}

impl Site<'_> {
    fn invalid(&self, expected: &PropertyType, data: &DataTree) -> DecodeError {
        DecodeError::InvalidPropertyType {
            structure: self.structure.to_string(),
            property: self.property.to_string(),
            expected: expected.to_string(),
            actual: data.to_string(),
            actual_kind: data.kind().to_string(),
        }
    }
}

// -- Codec --------------------------------------------------------------------

/// Decoder/encoder for every structure of a [`Schema`].
///
/// Immutable once built; share it freely across threads.
#[derive(Debug, Clone)]
pub struct Codec {
    entries: BTreeMap<String, CompiledStructure>,
    sources: BTreeMap<String, String>,
    strict: bool,
}

impl Codec {
    pub(crate) fn from_entries(
        entries: BTreeMap<String, CompiledStructure>,
        sources: BTreeMap<String, String>,
    ) -> Self {
        Self {
            entries,
            sources,
            strict: false,
        }
    }

    /// Run the standard pipeline over `schema`. Fails on the first declaration
    /// the pipeline rejects.
    pub fn compile(schema: &Schema) -> Result<Codec, Error> {
        Pipeline::standard().generate(schema).into_result()
    }

    /// Reject unknown keys in every record, not only in union alternatives
    /// (default: `false`).
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn structure(&self, name: &str) -> Option<&ConfigStructure> {
        self.entries.get(name).map(|e| &e.structure)
    }

    /// Names of every compiled structure, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Members the pipeline generated for `name`.
    pub fn members(&self, name: &str) -> Option<&[Member]> {
        self.entries.get(name).map(|e| e.members.as_slice())
    }

    /// The structure bound to a configuration file name.
    pub fn structure_for_source(&self, source: &str) -> Option<&ConfigStructure> {
        self.sources
            .get(source)
            .and_then(|name| self.structure(name))
    }

    fn entry(&self, name: &str) -> DecodeResult<&CompiledStructure> {
        self.entries
            .get(name)
            .ok_or_else(|| DecodeError::UnknownStructure(name.to_string()))
    }

    /// Decode `data` as the structure `name`.
    pub fn decode(&self, name: &str, data: &DataTree) -> DecodeResult<Value> {
        self.decode_with(name, data, self.strict)
    }

    fn decode_with(&self, name: &str, data: &DataTree, strict: bool) -> DecodeResult<Value> {
        let entry = self.entry(name)?;
        match &entry.decode {
            DecodePlan::Record(properties) => self.decode_record(name, properties, data, strict),
            DecodePlan::Union(alternatives) => {
                let mut attempts = Vec::with_capacity(alternatives.len());
                for alternative in alternatives {
                    match self.decode_with(alternative, data, true) {
                        Ok(value) => {
                            trace!("{name}: matched alternative {alternative}");
                            return Ok(value);
                        }
                        Err(e) => {
                            trace!("{name}: alternative {alternative} rejected: {e}");
                            attempts.push((alternative.clone(), e));
                        }
                    }
                }
                Err(DecodeError::NoUnionAlternativeMatched {
                    union: name.to_string(),
                    attempts,
                })
            }
        }
    }

    fn decode_record(
        &self,
        name: &str,
        properties: &[PropertyPlan],
        data: &DataTree,
        strict: bool,
    ) -> DecodeResult<Value> {
        let Some(entries) = data.as_map() else {
            return Err(DecodeError::NotAMap {
                structure: name.to_string(),
                found: data.kind().to_string(),
            });
        };
        if strict {
            let known: BTreeSet<&str> = properties.iter().map(|p| p.key.as_str()).collect();
            let unknown: Vec<String> = entries
                .keys()
                .filter(|k| k.as_str().is_none_or(|k| !known.contains(k)))
                .map(|k| k.as_str().map_or_else(|| k.to_string(), str::to_string))
                .collect();
            if !unknown.is_empty() {
                return Err(DecodeError::UnknownKeys {
                    structure: name.to_string(),
                    keys: unknown,
                });
            }
        }
        let mut record = Record::new(name);
        for property in properties {
            let value = self.decode_property(name, property, entries)?;
            record.fields.push((property.name.clone(), value));
        }
        Ok(Value::Record(record))
    }

    fn decode_property(
        &self,
        structure: &str,
        property: &PropertyPlan,
        entries: &BTreeMap<DataTree, DataTree>,
    ) -> DecodeResult<Value> {
        let site = Site {
            structure,
            property: &property.name,
        };
        let raw = match entries.get(&property.lookup).filter(|v| !v.is_null()) {
            Some(raw) => raw,
            None => match &property.default {
                Some(default) => default,
                None if property.nullable => return Ok(Value::Null),
                None => {
                    return Err(DecodeError::PropertyNotFound {
                        structure: structure.to_string(),
                        property: property.name.clone(),
                        ty: property.plan.ty.to_string(),
                        key: property.key.clone(),
                    });
                }
            },
        };
        self.decode_value(site, &property.plan, raw)
    }

    fn decode_value(&self, site: Site<'_>, plan: &Plan, data: &DataTree) -> DecodeResult<Value> {
        let ctx = DecodeContext {
            data,
            codec: self,
            structure: site.structure,
            property: site.property,
            target: &plan.ty,
        };
        if let Some(custom) = &plan.custom {
            return custom.decoder.decode(&ctx);
        }
        match (self.decode_structural(site, plan, data), &plan.fallback) {
            (Err(e), Some(fallback)) => {
                trace!("{}.{}: falling back after {e}", site.structure, site.property);
                fallback.decoder.decode(&ctx)
            }
            (result, _) => result,
        }
    }

    fn decode_structural(&self, site: Site<'_>, plan: &Plan, data: &DataTree) -> DecodeResult<Value> {
        let invalid = || site.invalid(&plan.ty, data);
        match &plan.kind {
            PlanKind::Bool => data.as_bool().map(Value::Bool).ok_or_else(invalid),
            PlanKind::Int(kind) => data
                .as_i64()
                .filter(|i| kind.contains(*i))
                .map(Value::Int)
                .ok_or_else(invalid),
            PlanKind::Float(kind) => {
                let value = match data {
                    DataTree::Float(f) => *f,
                    DataTree::Integer(i) => *i as f64,
                    _ => return Err(invalid()),
                };
                if kind.contains(value) {
                    Ok(Value::Float(value))
                } else {
                    Err(invalid())
                }
            }
            PlanKind::String => data
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(invalid),
            PlanKind::Enum {
                name,
                constants,
                scheme,
            } => {
                let input = data.as_str().ok_or_else(invalid)?;
                match scheme.parse(input, constants) {
                    Some(constant) => Ok(Value::enumeration(name, constant)),
                    None => Err(DecodeError::InvalidEnumValue {
                        enum_type: name.clone(),
                        property: site.property.to_string(),
                        value: input.to_string(),
                        valid: constants.clone(),
                        suggestion: policy::suggest(input, constants),
                    }),
                }
            }
            PlanKind::Structure(name) => {
                if data.as_map().is_none() {
                    return Err(invalid());
                }
                self.decode(name, data)
            }
            PlanKind::List(element) => {
                let items = data.as_array().ok_or_else(invalid)?;
                items
                    .iter()
                    .map(|item| self.decode_value(site, element, item))
                    .collect::<DecodeResult<Vec<_>>>()
                    .map(Value::List)
            }
            PlanKind::Map(key, value) => {
                let entries = data.as_map().ok_or_else(invalid)?;
                entries
                    .iter()
                    .map(|(k, v)| {
                        Ok((
                            self.decode_value(site, key, k)?,
                            self.decode_value(site, value, v)?,
                        ))
                    })
                    .collect::<DecodeResult<Vec<_>>>()
                    .map(Value::Map)
            }
            PlanKind::Custom(name) => Err(DecodeError::custom(format!(
                "{name} has no structural decoding"
            ))),
        }
    }

    /// Encode `value` as the structure `name`, under the same effective keys
    /// decoding reads.
    pub fn encode(&self, name: &str, value: &Value) -> Result<DataTree, EncodeError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| EncodeError::UnknownStructure(name.to_string()))?;
        match (&entry.encode, value) {
            (_, Value::Opaque { data, .. }) => Ok(data.clone()),
            (EncodePlan::Union(alternatives), Value::Record(record)) => {
                if alternatives.contains(&record.structure)
                    || self.alternative_path(name, &record.structure).is_some()
                {
                    self.encode(&record.structure, value)
                } else {
                    Err(EncodeError::WrongRecord {
                        structure: name.to_string(),
                        found: record.structure.clone(),
                    })
                }
            }
            (EncodePlan::Record(fields), Value::Record(record)) if record.structure == name => {
                let mut out = BTreeMap::new();
                for field in fields {
                    match record.get(&field.name) {
                        None | Some(Value::Null) if field.optional => continue,
                        None | Some(Value::Null) => {
                            return Err(EncodeError::MissingField {
                                structure: name.to_string(),
                                property: field.name.clone(),
                            });
                        }
                        Some(v) => {
                            let encoded = self.encode_value(name, &field.name, &field.ty, v)?;
                            out.insert(DataTree::String(field.key.clone()), encoded);
                        }
                    }
                }
                Ok(DataTree::Map(out))
            }
            (_, Value::Record(record)) => Err(EncodeError::WrongRecord {
                structure: name.to_string(),
                found: record.structure.clone(),
            }),
            (_, other) => Err(EncodeError::WrongRecord {
                structure: name.to_string(),
                found: other.kind().to_string(),
            }),
        }
    }

    fn encode_value(
        &self,
        structure: &str,
        property: &str,
        ty: &PropertyType,
        value: &Value,
    ) -> Result<DataTree, EncodeError> {
        let mismatch = || EncodeError::ValueMismatch {
            structure: structure.to_string(),
            property: property.to_string(),
            expected: ty.to_string(),
            found: value.kind().to_string(),
        };
        match (ty, value) {
            (_, Value::Opaque { data, .. }) => Ok(data.clone()),
            (PropertyType::Bool, Value::Bool(b)) => Ok(DataTree::Boolean(*b)),
            (PropertyType::Int(kind), Value::Int(i)) if kind.contains(*i) => Ok(DataTree::Integer(*i)),
            (PropertyType::Float(_), Value::Float(f)) => Ok(DataTree::Float(*f)),
            (PropertyType::Float(_), Value::Int(i)) => Ok(DataTree::Float(*i as f64)),
            (PropertyType::String, Value::String(s)) => Ok(DataTree::String(s.clone())),
            (PropertyType::Enum(name), Value::Enum { type_name, constant }) if name == type_name => {
                Ok(DataTree::String(constant.clone()))
            }
            (PropertyType::Structure(name), Value::Record(_)) => self.encode(name, value),
            (PropertyType::List(element), Value::List(items)) => items
                .iter()
                .map(|item| self.encode_value(structure, property, element, item))
                .collect::<Result<Vec<_>, _>>()
                .map(DataTree::Array),
            (PropertyType::Map(key, val), Value::Map(entries)) => entries
                .iter()
                .map(|(k, v)| {
                    Ok((
                        self.encode_value(structure, property, key, k)?,
                        self.encode_value(structure, property, val, v)?,
                    ))
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(DataTree::Map),
            (PropertyType::Custom(_), other) => self.encode_untyped(other),
            _ => Err(mismatch()),
        }
    }

    /// Encoding for values of custom types, which carry no declared shape.
    fn encode_untyped(&self, value: &Value) -> Result<DataTree, EncodeError> {
        Ok(match value {
            Value::Null => DataTree::Null,
            Value::Bool(b) => DataTree::Boolean(*b),
            Value::Int(i) => DataTree::Integer(*i),
            Value::Float(f) => DataTree::Float(*f),
            Value::String(s) => DataTree::String(s.clone()),
            Value::Enum { constant, .. } => DataTree::String(constant.clone()),
            Value::List(items) => DataTree::Array(
                items
                    .iter()
                    .map(|i| self.encode_untyped(i))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(entries) => DataTree::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((self.encode_untyped(k)?, self.encode_untyped(v)?)))
                    .collect::<Result<_, EncodeError>>()?,
            ),
            Value::Record(record) => self.encode(&record.structure, value)?,
            Value::Opaque { data, .. } => data.clone(),
        })
    }

    /// Tree of every defaulted property under its effective key, nested
    /// structures included when they contribute defaults of their own.
    ///
    /// A structure that refers back to itself contributes its defaults once.
    pub fn defaults(&self, name: &str) -> Result<DataTree, EncodeError> {
        self.defaults_within(name, &mut Vec::new())
    }

    fn defaults_within<'s>(
        &'s self,
        name: &str,
        visiting: &mut Vec<&'s str>,
    ) -> Result<DataTree, EncodeError> {
        let (name, entry) = self
            .entries
            .get_key_value(name)
            .ok_or_else(|| EncodeError::UnknownStructure(name.to_string()))?;
        let mut out = BTreeMap::new();
        let DecodePlan::Record(properties) = &entry.decode else {
            return Ok(DataTree::Map(out));
        };
        visiting.push(name.as_str());
        for property in properties {
            if let Some(default) = &property.default {
                out.insert(DataTree::String(property.key.clone()), default.clone());
            } else if let PropertyType::Structure(nested) = &property.plan.ty {
                if visiting.contains(&nested.as_str()) {
                    continue;
                }
                let nested = self.defaults_within(nested, visiting)?;
                if nested.as_map().is_some_and(|m| !m.is_empty()) {
                    out.insert(DataTree::String(property.key.clone()), nested);
                }
            }
        }
        visiting.pop();
        Ok(DataTree::Map(out))
    }

    /// `Name{prop=value,...}` for records whose structure asked for a generated
    /// string representation.
    pub fn describe(&self, value: &Value) -> Option<String> {
        let record = value.as_record()?;
        let entry = self.entries.get(&record.structure)?;
        entry.display.then(|| value.to_string())
    }

    // -- Typed bridge ---------------------------------------------------------

    /// Decode, then read the result into a plain Rust type. Fields are
    /// property names; union values are externally tagged by alternative.
    pub fn decode_typed<T: DeserializeOwned>(&self, name: &str, data: &DataTree) -> Result<T, Error> {
        let value = self.decode(name, data)?;
        let plain = self.plain_of(name, &value);
        Ok(plain.to_plain()?)
    }

    /// Inverse of [`decode_typed`](Self::decode_typed): serialize `value`,
    /// map property names to keys, and check the result decodes.
    pub fn encode_typed<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<DataTree, Error> {
        let plain = plain::load_from(value)?;
        let tree = self.keyed(name, &plain)?;
        self.decode(name, &tree)?;
        Ok(tree)
    }

    fn is_union(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .is_some_and(|e| matches!(e.decode, DecodePlan::Union(_)))
    }

    fn field_type(&self, structure: &str, field: &str) -> Option<&PropertyType> {
        self.entries
            .get(structure)?
            .structure
            .property(field)
            .map(|p| &p.ty)
    }

    fn plain_of(&self, declared: &str, value: &Value) -> DataTree {
        let Value::Record(record) = value else {
            return self.plain_value(value, None);
        };
        let fields: BTreeMap<DataTree, DataTree> = record
            .fields
            .iter()
            .map(|(name, v)| {
                let ty = self.field_type(&record.structure, name);
                (DataTree::String(name.clone()), self.plain_value(v, ty))
            })
            .collect();
        if !self.is_union(declared) {
            return DataTree::Map(fields);
        }
        let path = self
            .alternative_path(declared, &record.structure)
            .unwrap_or_else(|| vec![record.structure.as_str()]);
        path.iter().rev().fold(DataTree::Map(fields), |inner, tag| {
            DataTree::map([(DataTree::String(tag.to_string()), inner)])
        })
    }

    /// Alternatives leading from the union `name` down to `structure`,
    /// outermost first. Unions nested as alternatives are walked through.
    fn alternative_path(&self, name: &str, structure: &str) -> Option<Vec<&str>> {
        self.path_within(name, structure, &mut Vec::new())
    }

    fn path_within<'s>(
        &'s self,
        name: &str,
        structure: &str,
        visiting: &mut Vec<&'s str>,
    ) -> Option<Vec<&'s str>> {
        let (name, entry) = self.entries.get_key_value(name)?;
        let DecodePlan::Union(alternatives) = &entry.decode else {
            return None;
        };
        if visiting.contains(&name.as_str()) {
            return None;
        }
        visiting.push(name.as_str());
        let found = alternatives.iter().find_map(|alternative| {
            if alternative == structure {
                return Some(vec![alternative.as_str()]);
            }
            let mut path = self.path_within(alternative, structure, visiting)?;
            path.insert(0, alternative.as_str());
            Some(path)
        });
        visiting.pop();
        found
    }

    fn plain_value(&self, value: &Value, ty: Option<&PropertyType>) -> DataTree {
        match (value, ty) {
            (Value::Record(_), Some(PropertyType::Structure(name))) => self.plain_of(name, value),
            (Value::Record(record), _) => self.plain_of(&record.structure, value),
            (Value::List(items), Some(PropertyType::List(element))) => DataTree::Array(
                items.iter().map(|i| self.plain_value(i, Some(element))).collect(),
            ),
            (Value::Map(entries), Some(PropertyType::Map(key, val))) => DataTree::Map(
                entries
                    .iter()
                    .map(|(k, v)| (self.plain_value(k, Some(key)), self.plain_value(v, Some(val))))
                    .collect(),
            ),
            (Value::List(items), _) => {
                DataTree::Array(items.iter().map(|i| self.plain_value(i, None)).collect())
            }
            (Value::Map(entries), _) => DataTree::Map(
                entries
                    .iter()
                    .map(|(k, v)| (self.plain_value(k, None), self.plain_value(v, None)))
                    .collect(),
            ),
            (Value::Null, _) => DataTree::Null,
            (Value::Bool(b), _) => DataTree::Boolean(*b),
            (Value::Int(i), _) => DataTree::Integer(*i),
            (Value::Float(f), _) => DataTree::Float(*f),
            (Value::String(s), _) => DataTree::String(s.clone()),
            (Value::Enum { constant, .. }, _) => DataTree::String(constant.clone()),
            (Value::Opaque { data, .. }, _) => data.clone(),
        }
    }

    /// Rename plain field names to effective keys, unwrapping union tags.
    fn keyed(&self, name: &str, plain: &DataTree) -> Result<DataTree, EncodeError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| EncodeError::UnknownStructure(name.to_string()))?;
        match &entry.decode {
            DecodePlan::Union(alternatives) => {
                let tagged = plain
                    .as_map()
                    .filter(|m| m.len() == 1)
                    .and_then(|m| m.iter().next())
                    .and_then(|(k, v)| Some((k.as_str()?, v)));
                match tagged {
                    Some((alternative, inner))
                        if alternatives.iter().any(|a| a == alternative)
                            || self.alternative_path(name, alternative).is_some() =>
                    {
                        self.keyed(alternative, inner)
                    }
                    _ => Err(EncodeError::WrongRecord {
                        structure: name.to_string(),
                        found: plain.to_string(),
                    }),
                }
            }
            DecodePlan::Record(properties) => {
                let Some(fields) = plain.as_map() else {
                    return Err(EncodeError::WrongRecord {
                        structure: name.to_string(),
                        found: plain.kind().to_string(),
                    });
                };
                let mut out = BTreeMap::new();
                for property in properties {
                    let Some(v) = fields.get(&DataTree::String(property.name.clone())) else {
                        continue;
                    };
                    if v.is_null() {
                        continue;
                    }
                    out.insert(
                        DataTree::String(property.key.clone()),
                        self.keyed_value(&property.plan.ty, v)?,
                    );
                }
                Ok(DataTree::Map(out))
            }
        }
    }

    fn keyed_value(&self, ty: &PropertyType, plain: &DataTree) -> Result<DataTree, EncodeError> {
        match (ty, plain) {
            (PropertyType::Structure(name), _) => self.keyed(name, plain),
            (PropertyType::List(element), DataTree::Array(items)) => items
                .iter()
                .map(|i| self.keyed_value(element, i))
                .collect::<Result<Vec<_>, _>>()
                .map(DataTree::Array),
            (PropertyType::Map(key, val), DataTree::Map(entries)) => entries
                .iter()
                .map(|(k, v)| Ok((self.keyed_value(key, k)?, self.keyed_value(val, v)?)))
                .collect::<Result<BTreeMap<_, _>, EncodeError>>()
                .map(DataTree::Map),
            _ => Ok(plain.clone()),
        }
    }
}
