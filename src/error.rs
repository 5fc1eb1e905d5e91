use thiserror::Error;

pub use crate::plain::PlainError;

/// Result carrier for every decode step, including custom deserializers.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Problems found while turning declarations into a [`Schema`](crate::Schema).
///
/// Each declaration is validated independently; the builder reports every
/// failure at once through [`BuildError::Multiple`].
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum BuildError {
    #[error("'{alternative}' is an alternative of union '{union}' but does not extend it")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(structfig::union_alternative_not_extending_union),
            help("add '{union}' to the parents of '{alternative}'")
        )
    )]
    UnionAlternativeNotExtendingUnion { union: String, alternative: String },

    #[error("Enum scheme set on '{declaration}.{property}', but its type {ty} is not an enum")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(code(structfig::enum_scheme_not_enum))
    )]
    EnumSchemeNotEnum {
        declaration: String,
        property: String,
        ty: String,
    },

    #[error(
        "Custom deserializer '{deserializer}' produces {produces} but is registered for {target}"
    )]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(code(structfig::custom_deserializer_invalid_signature))
    )]
    CustomDeserializerInvalidSignature {
        deserializer: String,
        target: String,
        produces: String,
    },

    #[error("Custom deserializer '{deserializer}' has no target type")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(structfig::missing_custom_deserializer_target),
            help("call .target(..) on the candidate")
        )
    )]
    MissingDeserializerTarget { deserializer: String },

    #[error(
        "Custom deserializer '{deserializer}' names more than one target: {}",
        .targets.join(", ")
    )]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(code(structfig::ambiguous_custom_deserializer_target))
    )]
    AmbiguousDeserializerTarget {
        deserializer: String,
        targets: Vec<String>,
    },

    #[error("Custom deserializer '{deserializer}' has no decode operation")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(code(structfig::invalid_custom_deserializer_structure))
    )]
    InvalidDeserializerStructure { deserializer: String },

    #[error(
        "Multiple {kind} deserializers for {target}: '{first}' and '{second}'",
        kind = registration_kind(.fallback)
    )]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(code(structfig::multiple_deserializers))
    )]
    MultipleDeserializers {
        target: String,
        fallback: bool,
        first: String,
        second: String,
    },

    #[error("'{declaration}' is enclosed in an unnamed scope")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(code(structfig::unnamed_enclosing_scope))
    )]
    UnnamedEnclosingScope { declaration: String },

    #[error("'{declaration}' is enclosed in unknown type '{enclosing}'")]
    UnknownEnclosing {
        declaration: String,
        enclosing: String,
    },

    #[error("'{declaration}' extends unknown type '{parent}'")]
    UnknownParent { declaration: String, parent: String },

    #[error("Property '{declaration}.{property}' has unknown type '{ty}'")]
    UnknownPropertyType {
        declaration: String,
        property: String,
        ty: String,
    },

    #[error("Inheritance cycle: {}", .path.join(" -> "))]
    InheritanceCycle { path: Vec<String> },

    #[error(
        "Property '{property}' of '{declaration}' is inherited as both {first} and {second}"
    )]
    ConflictingPropertyTypes {
        declaration: String,
        property: String,
        first: String,
        second: String,
    },

    #[error("Type '{name}' is declared more than once")]
    DuplicateDeclaration { name: String },

    #[error("{} build errors:\n{}", .0.len(), list(.0))]
    Multiple(Vec<BuildError>),
}

fn registration_kind(fallback: &bool) -> &'static str {
    if *fallback { "fallback" } else { "custom" }
}

fn list(errors: &[BuildError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run-time failure while mapping a [`DataTree`](crate::DataTree) to a value.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum DecodeError {
    #[error(
        "Missing property '{property}' ({ty}) in {structure}: expected key '{key}'"
    )]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(structfig::property_not_found),
            help("add '{key}: <{ty}>' to the configuration, or mark the property nullable")
        )
    )]
    PropertyNotFound {
        structure: String,
        property: String,
        ty: String,
        key: String,
    },

    #[error(
        "Invalid type for '{property}' in {structure}: expected {expected}, found {actual_kind} {actual}"
    )]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(code(structfig::invalid_property_type))
    )]
    InvalidPropertyType {
        structure: String,
        property: String,
        expected: String,
        actual: String,
        actual_kind: String,
    },

    #[error(
        "Invalid value '{value}' for '{property}' ({enum_type}); valid values: {}{}",
        .valid.join(", "),
        did_you_mean(.suggestion)
    )]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(code(structfig::invalid_enum_value))
    )]
    InvalidEnumValue {
        enum_type: String,
        property: String,
        value: String,
        valid: Vec<String>,
        suggestion: Option<String>,
    },

    #[error("No alternative of union {union} matched:\n{}", list_attempts(.attempts))]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(structfig::no_union_match),
            help("the data must match the shape of at least one alternative")
        )
    )]
    NoUnionAlternativeMatched {
        union: String,
        attempts: Vec<(String, DecodeError)>,
    },

    #[error("{structure} expects a map, found {found}")]
    NotAMap { structure: String, found: String },

    #[error("Unknown keys for {structure}: {}", .keys.join(", "))]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(code(structfig::unknown_keys))
    )]
    UnknownKeys { structure: String, keys: Vec<String> },

    #[error("Custom deserializer failed: {0}")]
    Custom(String),

    #[error("Unknown structure '{0}'")]
    UnknownStructure(String),
}

impl DecodeError {
    /// Failure raised from inside a custom deserializer.
    pub fn custom(msg: impl Into<String>) -> Self {
        DecodeError::Custom(msg.into())
    }
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{s}'?)"),
        None => String::new(),
    }
}

fn list_attempts(attempts: &[(String, DecodeError)]) -> String {
    attempts
        .iter()
        .map(|(alt, e)| format!("  - {alt}: {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Failure while turning a [`Value`](crate::Value) back into a tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("Unknown structure '{0}'")]
    UnknownStructure(String),

    #[error("Cannot encode {found} as {structure}")]
    WrongRecord { structure: String, found: String },

    #[error("Record {structure} has no value for required property '{property}'")]
    MissingField { structure: String, property: String },

    #[error("Property '{property}' of {structure} expects {expected}, found {found}")]
    ValueMismatch {
        structure: String,
        property: String,
        expected: String,
        found: String,
    },
}

/// Failure converting between a [`DataTree`](crate::DataTree) and an external
/// format.
#[derive(Debug, Error)]
pub enum InteropError {
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to write TOML: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{format} cannot represent {what}")]
    Unrepresentable { format: &'static str, what: String },
}

/// A pipeline stage rejected one declaration.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Stage '{stage}' failed for '{declaration}': {reason}")]
pub struct ProcessingError {
    pub stage: String,
    pub declaration: String,
    pub reason: String,
}

fn list_failures(failures: &[ProcessingError]) -> String {
    failures
        .iter()
        .map(|f| format!("  - {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Umbrella error for operations that cross tiers, such as the typed bridge.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("{} structures failed to generate:\n{}", .0.len(), list_failures(.0))]
    Generation(Vec<ProcessingError>),

    #[error(transparent)]
    Plain(#[from] PlainError),

    #[error(transparent)]
    Interop(#[from] InteropError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_not_found_names_key() {
        let err = DecodeError::PropertyNotFound {
            structure: "Server".into(),
            property: "listenPort".into(),
            ty: "int".into(),
            key: "listen_port".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("listenPort"));
        assert!(msg.contains("'listen_port'"));
        assert!(msg.contains("Server"));
    }

    #[test]
    fn enum_error_lists_values_and_suggestion() {
        let err = DecodeError::InvalidEnumValue {
            enum_type: "Level".into(),
            property: "level".into(),
            value: "HIHG".into(),
            valid: vec!["LOW".into(), "HIGH".into()],
            suggestion: Some("HIGH".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("LOW, HIGH"));
        assert!(msg.contains("did you mean 'HIGH'"));
    }

    #[test]
    fn union_error_lists_every_attempt() {
        let err = DecodeError::NoUnionAlternativeMatched {
            union: "Shape".into(),
            attempts: vec![
                ("Circle".into(), DecodeError::custom("no radius")),
                ("Square".into(), DecodeError::custom("no side")),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("Circle: Custom deserializer failed: no radius"));
        assert!(msg.contains("Square"));
    }

    #[test]
    fn multiple_build_errors_are_listed() {
        let err = BuildError::Multiple(vec![
            BuildError::DuplicateDeclaration { name: "A".into() },
            BuildError::InheritanceCycle {
                path: vec!["B".into(), "C".into(), "B".into()],
            },
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("2 build errors"));
        assert!(msg.contains("B -> C -> B"));
    }

    #[test]
    fn generation_failures_are_listed() {
        let failure = |declaration: &str| ProcessingError {
            stage: "decode-logic".into(),
            declaration: declaration.into(),
            reason: "no deserializer".into(),
        };
        let msg = Error::Generation(vec![failure("A"), failure("B")]).to_string();
        assert!(msg.starts_with("2 structures failed to generate"));
        assert!(msg.contains("  - Stage 'decode-logic' failed for 'B': no deserializer"));
    }

    #[test]
    fn fallback_duplicates_say_so() {
        let err = BuildError::MultipleDeserializers {
            target: "Colour".into(),
            fallback: true,
            first: "a".into(),
            second: "b".into(),
        };
        assert!(err.to_string().contains("fallback deserializers"));
    }
}
