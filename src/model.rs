//! The structural model.
//!
//! Two layers live here:
//!
//! - **Declarations** ([`Declaration`], [`PropertyDecl`], [`EnumDecl`]) are what
//!   callers describe through chained builder methods.
//! - **Structures** ([`ConfigStructure`], [`Property`]) are what the
//!   [`SchemaBuilder`](crate::SchemaBuilder) produces from them: classified into a
//!   [`Shape`], with inherited properties flattened and every cascading setting
//!   already resolved.

use std::fmt;

use crate::naming::NamingPattern;
use crate::policy::EnumScheme;
use crate::tree::DataTree;

/// Width of an integer property. Values outside the range are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntKind {
    pub fn contains(self, value: i64) -> bool {
        let (min, max) = match self {
            IntKind::I8 => (i8::MIN as i64, i8::MAX as i64),
            IntKind::I16 => (i16::MIN as i64, i16::MAX as i64),
            IntKind::I32 => (i32::MIN as i64, i32::MAX as i64),
            IntKind::I64 => (i64::MIN, i64::MAX),
            IntKind::U8 => (0, u8::MAX as i64),
            IntKind::U16 => (0, u16::MAX as i64),
            IntKind::U32 => (0, u32::MAX as i64),
            // the tree stores i64, so that is the ceiling here too
            IntKind::U64 => (0, i64::MAX),
        };
        (min..=max).contains(&value)
    }

    fn name(self) -> &'static str {
        match self {
            IntKind::I8 => "i8",
            IntKind::I16 => "i16",
            IntKind::I32 => "i32",
            IntKind::I64 => "i64",
            IntKind::U8 => "u8",
            IntKind::U16 => "u16",
            IntKind::U32 => "u32",
            IntKind::U64 => "u64",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind {
    F32,
    F64,
}

impl FloatKind {
    pub fn contains(self, value: f64) -> bool {
        match self {
            FloatKind::F64 => true,
            FloatKind::F32 => !value.is_finite() || value.abs() <= f32::MAX as f64,
        }
    }
}

/// Declared type of a property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Bool,
    Int(IntKind),
    Float(FloatKind),
    String,
    /// A declared enum, by name.
    Enum(String),
    /// A declared structure, by name.
    Structure(String),
    List(Box<PropertyType>),
    Map(Box<PropertyType>, Box<PropertyType>),
    /// A type only custom deserializers know how to build.
    Custom(String),
}

impl PropertyType {
    pub fn list(element: PropertyType) -> Self {
        PropertyType::List(Box::new(element))
    }

    pub fn map(key: PropertyType, value: PropertyType) -> Self {
        PropertyType::Map(Box::new(key), Box::new(value))
    }

    pub fn int() -> Self {
        PropertyType::Int(IntKind::I32)
    }

    pub fn structure(name: &str) -> Self {
        PropertyType::Structure(name.to_string())
    }

    pub fn enumeration(name: &str) -> Self {
        PropertyType::Enum(name.to_string())
    }

    pub fn custom(name: &str) -> Self {
        PropertyType::Custom(name.to_string())
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, PropertyType::Enum(_))
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Bool => write!(f, "bool"),
            PropertyType::Int(kind) => write!(f, "{}", kind.name()),
            PropertyType::Float(FloatKind::F32) => write!(f, "f32"),
            PropertyType::Float(FloatKind::F64) => write!(f, "f64"),
            PropertyType::String => write!(f, "string"),
            PropertyType::Enum(name)
            | PropertyType::Structure(name)
            | PropertyType::Custom(name) => write!(f, "{name}"),
            PropertyType::List(element) => write!(f, "list<{element}>"),
            PropertyType::Map(key, value) => write!(f, "map<{key}, {value}>"),
        }
    }
}

/// Where a property was declared. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertySource {
    #[default]
    Field,
    Accessor,
}

/// Per-type settings. Unset values fall through to the enclosing type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeSettings {
    pub naming: Option<NamingPattern>,
    pub enum_scheme: Option<EnumScheme>,
    pub generate_to_string: bool,
    /// File this type is loaded from, if it is a top-level configuration.
    pub source: Option<String>,
}

/// Per-property settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertySettings {
    pub rename: Option<String>,
    pub naming: Option<NamingPattern>,
    pub enum_scheme: Option<EnumScheme>,
    pub nullable: bool,
    pub default: Option<DataTree>,
    pub use_custom_deserializer: bool,
}

/// A property as declared on a type.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub(crate) name: String,
    pub(crate) ty: PropertyType,
    pub(crate) source: PropertySource,
    pub(crate) settings: PropertySettings,
}

impl PropertyDecl {
    pub fn new(name: &str, ty: PropertyType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            source: PropertySource::Field,
            settings: PropertySettings::default(),
        }
    }

    /// Read this property from `key` exactly, ignoring naming patterns.
    pub fn rename(mut self, key: &str) -> Self {
        self.settings.rename = Some(key.to_string());
        self
    }

    pub fn naming(mut self, pattern: NamingPattern) -> Self {
        self.settings.naming = Some(pattern);
        self
    }

    /// Only valid on enum-typed properties.
    pub fn enum_scheme(mut self, scheme: EnumScheme) -> Self {
        self.settings.enum_scheme = Some(scheme);
        self
    }

    /// A missing or null value decodes to [`Value::Null`](crate::Value::Null).
    pub fn nullable(mut self) -> Self {
        self.settings.nullable = true;
        self
    }

    /// Value used when the key is missing. It is decoded like any other input.
    pub fn default_value(mut self, value: impl Into<DataTree>) -> Self {
        self.settings.default = Some(value.into());
        self
    }

    /// Opt in to non-global custom deserializers for this property's type.
    pub fn use_custom_deserializer(mut self) -> Self {
        self.settings.use_custom_deserializer = true;
        self
    }

    pub fn accessor(mut self) -> Self {
        self.source = PropertySource::Accessor;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A declared configuration type.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub(crate) name: String,
    pub(crate) parents: Vec<String>,
    pub(crate) union_root: bool,
    pub(crate) enclosing: Option<String>,
    pub(crate) settings: TypeSettings,
    pub(crate) properties: Vec<PropertyDecl>,
}

impl Declaration {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parents: Vec::new(),
            union_root: false,
            enclosing: None,
            settings: TypeSettings::default(),
            properties: Vec::new(),
        }
    }

    /// A union root. Its alternatives are the types enclosed in it and the
    /// types that extend it, in registration order.
    pub fn union(name: &str) -> Self {
        let mut declaration = Self::new(name);
        declaration.union_root = true;
        declaration
    }

    pub fn extends(mut self, parent: &str) -> Self {
        self.parents.push(parent.to_string());
        self
    }

    /// Nest this type lexically inside `outer`. Settings cascade from it.
    pub fn enclosed_in(mut self, outer: &str) -> Self {
        self.enclosing = Some(outer.to_string());
        self
    }

    pub fn settings(mut self, settings: TypeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn naming(mut self, pattern: NamingPattern) -> Self {
        self.settings.naming = Some(pattern);
        self
    }

    pub fn enum_scheme(mut self, scheme: EnumScheme) -> Self {
        self.settings.enum_scheme = Some(scheme);
        self
    }

    pub fn generate_to_string(mut self) -> Self {
        self.settings.generate_to_string = true;
        self
    }

    pub fn source(mut self, file: &str) -> Self {
        self.settings.source = Some(file.to_string());
        self
    }

    pub fn property(mut self, property: PropertyDecl) -> Self {
        self.properties.push(property);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A declared enum and its constants, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDecl {
    pub name: String,
    pub constants: Vec<String>,
}

impl EnumDecl {
    pub fn new<S: Into<String>>(name: &str, constants: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.to_string(),
            constants: constants.into_iter().map(Into::into).collect(),
        }
    }
}

// -- Built structures ---------------------------------------------------------

/// Lexically enclosing structure, by name, with its own enclosing chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclosingRef {
    pub name: String,
    pub enclosing: Option<Box<EnclosingRef>>,
}

impl EnclosingRef {
    /// Names from this reference outward.
    pub fn chain(&self) -> Vec<&str> {
        let mut names = vec![self.name.as_str()];
        let mut current = self.enclosing.as_deref();
        while let Some(outer) = current {
            names.push(&outer.name);
            current = outer.enclosing.as_deref();
        }
        names
    }
}

/// Originating declaration of a structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureSource {
    pub declaration: String,
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Atomic,
    Intersection { parents: Vec<String> },
    Union { alternatives: Vec<String> },
}

/// A resolved property: key, enum scheme and inherited origin are final.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub ty: PropertyType,
    pub source: PropertySource,
    /// Effective key in the data tree.
    pub key: String,
    pub enum_scheme: EnumScheme,
    pub nullable: bool,
    pub default: Option<DataTree>,
    pub use_custom_deserializer: bool,
    /// Declaration the property was inherited from (or the structure itself).
    pub declared_in: String,
}

/// One built configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigStructure {
    pub name: String,
    pub source: StructureSource,
    pub settings: TypeSettings,
    pub enclosing: Option<EnclosingRef>,
    pub enclosed: Vec<String>,
    pub properties: Vec<Property>,
    pub shape: Shape,
}

impl ConfigStructure {
    pub fn is_union(&self) -> bool {
        matches!(self.shape, Shape::Union { .. })
    }

    pub fn alternatives(&self) -> &[String] {
        match &self.shape {
            Shape::Union { alternatives } => alternatives,
            _ => &[],
        }
    }

    /// Structures nested in this one. For a union these are its alternatives.
    pub fn enclosed(&self) -> &[String] {
        match &self.shape {
            Shape::Union { alternatives } => alternatives,
            _ => &self.enclosed,
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}
