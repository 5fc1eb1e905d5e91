//! Structural configuration schemas. Declare your configuration types once,
//! then decode loosely-typed data trees into typed values and encode them
//! back.
//!
//! Structfig sits between a format loader (TOML, JSON, YAML, anything that
//! produces a [`DataTree`]) and your program. Types are described at run time
//! through a builder API, validated into a [`Schema`], and compiled into a
//! [`Codec`] by a staged generation [`Pipeline`].
//!
//! ```ignore
//! let schema = Schema::builder()
//!     .declare(
//!         Declaration::new("Server")
//!             .naming(NamingPattern::LowerSnakeCase)
//!             .property(PropertyDecl::new("host", PropertyType::String))
//!             .property(PropertyDecl::new("listenPort", PropertyType::int())),
//!     )
//!     .build()?;
//! let codec = Codec::compile(&schema)?;
//! let server = codec.decode("Server", &DataTree::parse_toml(text)?)?;
//! ```
//!
//! # Shapes
//!
//! Every declaration is classified when the schema is built:
//!
//! - **Atomic**: no parents. Decodes from a map, one key per property.
//! - **Intersection**: one or more parents. Ancestor properties are flattened
//!   in, depth-first in declared parent order, then the type's own. A property
//!   declared twice with the same type collapses into one, and the nearest
//!   declaration's settings win. Different types are a build error.
//! - **Union**: a closed set of alternatives, being the types enclosed in the
//!   union or extending it, in registration order. Decoding tries each in
//!   turn and keeps the first that succeeds. Alternatives are matched
//!   strictly: a key the alternative does not declare rejects it, so an empty
//!   alternative only matches an empty map.
//!
//! # Keys and enums
//!
//! A property is read from its *effective key*: an explicit
//! [`rename`](PropertyDecl::rename) verbatim, otherwise the declared name
//! formatted by a [`NamingPattern`]. Patterns and [`EnumScheme`]s cascade:
//!
//! ```text
//! property setting
//!        ↓ falls back to
//! declaring type
//!        ↓ falls back to
//! enclosing types, nearest first
//!        ↓ falls back to
//! built-in default (identity naming, exact enum matching)
//! ```
//!
//! A missing key, or an explicit null, takes the property's default, then
//! null if the property is nullable, and otherwise fails with
//! [`DecodeError::PropertyNotFound`] naming the key that was expected.
//!
//! # Custom deserializers
//!
//! Types the structural decoder cannot build, or should build differently,
//! get a [`DeserializerCandidate`]: a plain function or a
//! [`CustomDeserializer`] implementation, tagged with one target type.
//!
//! - A **regular** deserializer replaces structural decoding for its target.
//! - A **fallback** deserializer only runs once structural decoding failed,
//!   and its result replaces the failure. Handy for shorthand forms.
//! - A **global** deserializer applies to every property of its target;
//!   otherwise properties opt in with
//!   [`use_custom_deserializer`](PropertyDecl::use_custom_deserializer).
//!
//! Deserializers receive a [`DecodeContext`] and may delegate back to the
//! codec with [`decode_as`](DecodeContext::decode_as).
//!
//! # Generation
//!
//! [`Codec::compile`] runs the standard pipeline. Build your own with
//! [`Pipeline::standard`] plus [`with_stage`](Pipeline::with_stage) to add
//! checks or members; a stage that fails drops only the structure it failed
//! on, reported as a [`ProcessingError`].
//!
//! # Plain Rust types
//!
//! [`Codec::decode_typed`] and [`Codec::encode_typed`] bridge to serde types,
//! with property names as field names and unions as externally tagged enums.
//! The [`plain`] module does the same for raw trees.
//!
//! # Error handling
//!
//! Each tier has its own error: [`BuildError`] for declarations,
//! [`ProcessingError`] for generation, [`DecodeError`] and [`EncodeError`] at
//! run time, [`InteropError`] for formats. [`Error`] wraps them all. With the
//! `rich-errors` feature the build and decode errors carry `miette`
//! diagnostic codes.

pub mod error;
pub mod plain;

mod codec;
mod interop;
mod model;
mod naming;
mod pipeline;
mod policy;
mod registry;
mod schema;
mod tree;
mod value;

#[cfg(test)]
mod fixtures;

pub use codec::{Codec, DecodeContext};
pub use error::{
    BuildError, DecodeError, DecodeResult, EncodeError, Error, InteropError, PlainError,
    ProcessingError,
};
pub use model::{
    ConfigStructure, Declaration, EnclosingRef, EnumDecl, FloatKind, IntKind, Property,
    PropertyDecl, PropertySettings, PropertySource, PropertyType, Shape, StructureSource,
    TypeSettings,
};
pub use naming::{NamingPattern, format};
pub use pipeline::{
    Accessors, BaseShape, CompiledStructure, DecodeLogic, DerivedBehaviour, EncodeLogic,
    EntryBuilder, Generation, Manifest, Member, Pipeline, Registration, Stage,
};
pub use plain::load_from;
pub use policy::{EnumScheme, effective_name};
pub use registry::{
    CustomDeserializer, DecodeFn, DecodeOperation, DeserializerCandidate, RegisteredDeserializer,
    Registry,
};
pub use schema::{Schema, SchemaBuilder};
pub use tree::DataTree;
pub use value::{Record, Value};
