//! Lossless bridge between [`DataTree`] and plain Rust values through serde.
//!
//! The serde data model stands in for plain Rust values:
//!
//! - [`load_from`] serializes any `Serialize` value into a tree using a custom
//!   [`Serializer`](ser::Serializer). Structs and string-keyed maps become map
//!   nodes, sequences and tuples become arrays, `None` and `()` become
//!   [`DataTree::Null`].
//! - [`DataTree::to_plain`] treats the tree itself as a
//!   [`Deserializer`](de::Deserializer), so any `DeserializeOwned` type can be
//!   read straight out of it.
//!
//! `DataTree` also implements `Serialize`/`Deserialize`, which makes the pair a
//! true inverse: `load_from(&tree.to_plain::<DataTree>()?) == tree` for every
//! tree, non-string map keys and NaN floats included.
//!
//! Enums follow serde's externally tagged convention: unit variants are plain
//! strings, every other variant is a single-entry map `{variant: content}`.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::value::{MapDeserializer, SeqDeserializer, StringDeserializer};
use serde::de::{self, DeserializeOwned, IntoDeserializer, Visitor};
use serde::ser::{self, Serialize};
use thiserror::Error;

use crate::tree::DataTree;

/// Failure while moving a value across the serde bridge.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("plain conversion error: {0}")]
pub struct PlainError(String);

impl PlainError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        PlainError(msg.into())
    }
}

impl ser::Error for PlainError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        PlainError(msg.to_string())
    }
}

impl de::Error for PlainError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        PlainError(msg.to_string())
    }
}

/// Convert any `Serialize` value into a [`DataTree`].
pub fn load_from<T: Serialize + ?Sized>(value: &T) -> Result<DataTree, PlainError> {
    value.serialize(TreeSerializer)
}

impl DataTree {
    /// Read a plain Rust value out of this tree. Inverse of [`load_from`].
    pub fn to_plain<T: DeserializeOwned>(&self) -> Result<T, PlainError> {
        T::deserialize(self.clone())
    }

    /// Convert any `Serialize` value into a tree. See [`load_from`].
    pub fn load_from<T: Serialize + ?Sized>(value: &T) -> Result<DataTree, PlainError> {
        load_from(value)
    }
}

// -- Serialize / Deserialize for DataTree -------------------------------------

impl Serialize for DataTree {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use ser::{SerializeMap, SerializeSeq};
        match self {
            DataTree::Null => serializer.serialize_unit(),
            DataTree::String(s) => serializer.serialize_str(s),
            DataTree::Integer(i) => serializer.serialize_i64(*i),
            DataTree::Float(f) => serializer.serialize_f64(*f),
            DataTree::Boolean(b) => serializer.serialize_bool(*b),
            DataTree::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            DataTree::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

struct DataTreeVisitor;

impl<'de> Visitor<'de> for DataTreeVisitor {
    type Value = DataTree;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "any configuration value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<DataTree, E> {
        Ok(DataTree::Boolean(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<DataTree, E> {
        Ok(DataTree::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<DataTree, E> {
        i64::try_from(v)
            .map(DataTree::Integer)
            .map_err(|_| E::custom(format!("integer {v} does not fit in 64 signed bits")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<DataTree, E> {
        Ok(DataTree::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<DataTree, E> {
        Ok(DataTree::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<DataTree, E> {
        Ok(DataTree::String(v))
    }

    fn visit_none<E: de::Error>(self) -> Result<DataTree, E> {
        Ok(DataTree::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<DataTree, E> {
        Ok(DataTree::Null)
    }

    fn visit_some<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<DataTree, D::Error> {
        de::Deserialize::deserialize(deserializer)
    }

    fn visit_newtype_struct<D: de::Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<DataTree, D::Error> {
        de::Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<DataTree, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(DataTree::Array(items))
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<DataTree, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some((k, v)) = map.next_entry::<DataTree, DataTree>()? {
            entries.insert(k, v);
        }
        Ok(DataTree::Map(entries))
    }
}

impl<'de> de::Deserialize<'de> for DataTree {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DataTreeVisitor)
    }
}

// -- DataTree as a Deserializer -----------------------------------------------

impl<'de> IntoDeserializer<'de, PlainError> for DataTree {
    type Deserializer = DataTree;

    fn into_deserializer(self) -> DataTree {
        self
    }
}

impl<'de> de::Deserializer<'de> for DataTree {
    type Error = PlainError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, PlainError> {
        match self {
            DataTree::Null => visitor.visit_unit(),
            DataTree::String(s) => visitor.visit_string(s),
            DataTree::Integer(i) => visitor.visit_i64(i),
            DataTree::Float(f) => visitor.visit_f64(f),
            DataTree::Boolean(b) => visitor.visit_bool(b),
            DataTree::Array(items) => {
                let mut seq = SeqDeserializer::new(items.into_iter());
                let value = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(value)
            }
            DataTree::Map(entries) => {
                let mut map = MapDeserializer::new(entries.into_iter());
                let value = visitor.visit_map(&mut map)?;
                map.end()?;
                Ok(value)
            }
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, PlainError> {
        match self {
            DataTree::Null => visitor.visit_none(),
            other => visitor.visit_some(other),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, PlainError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, PlainError> {
        match self {
            DataTree::String(variant) => {
                let access: StringDeserializer<PlainError> = variant.into_deserializer();
                visitor.visit_enum(access)
            }
            DataTree::Map(entries) if entries.len() == 1 => {
                let Some((DataTree::String(variant), content)) = entries.into_iter().next() else {
                    return Err(PlainError::new("enum variant key must be a string"));
                };
                visitor.visit_enum(VariantTree { variant, content })
            }
            other => Err(PlainError::new(format!(
                "expected a variant name or a single-entry map, found {}",
                other.kind()
            ))),
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, PlainError> {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct identifier
    }
}

struct VariantTree {
    variant: String,
    content: DataTree,
}

impl<'de> de::EnumAccess<'de> for VariantTree {
    type Error = PlainError;
    type Variant = DataTree;

    fn variant_seed<V: de::DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, DataTree), PlainError> {
        let name: StringDeserializer<PlainError> = self.variant.into_deserializer();
        let value = seed.deserialize(name)?;
        Ok((value, self.content))
    }
}

impl<'de> de::VariantAccess<'de> for DataTree {
    type Error = PlainError;

    fn unit_variant(self) -> Result<(), PlainError> {
        match self {
            DataTree::Null => Ok(()),
            DataTree::Map(entries) if entries.is_empty() => Ok(()),
            other => Err(PlainError::new(format!(
                "unit variant cannot carry a {}",
                other.kind()
            ))),
        }
    }

    fn newtype_variant_seed<T: de::DeserializeSeed<'de>>(
        self,
        seed: T,
    ) -> Result<T::Value, PlainError> {
        seed.deserialize(self)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, PlainError> {
        de::Deserializer::deserialize_any(self, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, PlainError> {
        de::Deserializer::deserialize_any(self, visitor)
    }
}

// -- Serializer producing a DataTree ------------------------------------------

/// Serializer whose output is a [`DataTree`].
pub struct TreeSerializer;

fn tagged(variant: &'static str, content: DataTree) -> DataTree {
    let mut entries = BTreeMap::new();
    entries.insert(DataTree::String(variant.to_string()), content);
    DataTree::Map(entries)
}

impl ser::Serializer for TreeSerializer {
    type Ok = DataTree;
    type Error = PlainError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = SeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = MapBuilder;

    fn serialize_bool(self, v: bool) -> Result<DataTree, PlainError> {
        Ok(DataTree::Boolean(v))
    }

    fn serialize_i8(self, v: i8) -> Result<DataTree, PlainError> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<DataTree, PlainError> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<DataTree, PlainError> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<DataTree, PlainError> {
        Ok(DataTree::Integer(v))
    }

    fn serialize_u8(self, v: u8) -> Result<DataTree, PlainError> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u16(self, v: u16) -> Result<DataTree, PlainError> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u32(self, v: u32) -> Result<DataTree, PlainError> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u64(self, v: u64) -> Result<DataTree, PlainError> {
        i64::try_from(v)
            .map(DataTree::Integer)
            .map_err(|_| PlainError::new(format!("integer {v} does not fit in 64 signed bits")))
    }

    fn serialize_f32(self, v: f32) -> Result<DataTree, PlainError> {
        self.serialize_f64(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<DataTree, PlainError> {
        Ok(DataTree::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<DataTree, PlainError> {
        Ok(DataTree::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<DataTree, PlainError> {
        Ok(DataTree::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<DataTree, PlainError> {
        Ok(DataTree::Array(
            v.iter().map(|b| DataTree::Integer(*b as i64)).collect(),
        ))
    }

    fn serialize_none(self) -> Result<DataTree, PlainError> {
        Ok(DataTree::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<DataTree, PlainError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<DataTree, PlainError> {
        Ok(DataTree::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<DataTree, PlainError> {
        Ok(DataTree::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<DataTree, PlainError> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<DataTree, PlainError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<DataTree, PlainError> {
        Ok(tagged(variant, value.serialize(TreeSerializer)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, PlainError> {
        Ok(SeqBuilder {
            variant: None,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, PlainError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, PlainError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, PlainError> {
        Ok(SeqBuilder {
            variant: Some(variant),
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder, PlainError> {
        Ok(MapBuilder {
            variant: None,
            entries: BTreeMap::new(),
            pending_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<MapBuilder, PlainError> {
        self.serialize_map(None)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<MapBuilder, PlainError> {
        Ok(MapBuilder {
            variant: Some(variant),
            entries: BTreeMap::new(),
            pending_key: None,
        })
    }
}

pub struct SeqBuilder {
    variant: Option<&'static str>,
    items: Vec<DataTree>,
}

impl SeqBuilder {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), PlainError> {
        self.items.push(value.serialize(TreeSerializer)?);
        Ok(())
    }

    fn finish(self) -> DataTree {
        let array = DataTree::Array(self.items);
        match self.variant {
            Some(variant) => tagged(variant, array),
            None => array,
        }
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = DataTree;
    type Error = PlainError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), PlainError> {
        self.push(value)
    }

    fn end(self) -> Result<DataTree, PlainError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = DataTree;
    type Error = PlainError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), PlainError> {
        self.push(value)
    }

    fn end(self) -> Result<DataTree, PlainError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = DataTree;
    type Error = PlainError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), PlainError> {
        self.push(value)
    }

    fn end(self) -> Result<DataTree, PlainError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SeqBuilder {
    type Ok = DataTree;
    type Error = PlainError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), PlainError> {
        self.push(value)
    }

    fn end(self) -> Result<DataTree, PlainError> {
        Ok(self.finish())
    }
}

pub struct MapBuilder {
    variant: Option<&'static str>,
    entries: BTreeMap<DataTree, DataTree>,
    pending_key: Option<DataTree>,
}

impl MapBuilder {
    fn insert<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<(), PlainError> {
        self.entries
            .insert(DataTree::String(key.to_string()), value.serialize(TreeSerializer)?);
        Ok(())
    }

    fn finish(self) -> DataTree {
        let map = DataTree::Map(self.entries);
        match self.variant {
            Some(variant) => tagged(variant, map),
            None => map,
        }
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = DataTree;
    type Error = PlainError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), PlainError> {
        self.pending_key = Some(key.serialize(TreeSerializer)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), PlainError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| PlainError::new("map value serialized before its key"))?;
        self.entries.insert(key, value.serialize(TreeSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<DataTree, PlainError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = DataTree;
    type Error = PlainError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), PlainError> {
        self.insert(key, value)
    }

    fn end(self) -> Result<DataTree, PlainError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for MapBuilder {
    type Ok = DataTree;
    type Error = PlainError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), PlainError> {
        self.insert(key, value)
    }

    fn end(self) -> Result<DataTree, PlainError> {
        Ok(self.finish())
    }
}
