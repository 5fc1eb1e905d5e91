//! Custom deserializers: an extension point for types the structural decoder
//! cannot build on its own, or builds differently than wanted.
//!
//! A [`DeserializerCandidate`] names one target type and supplies a decode
//! operation, either a plain function or a [`CustomDeserializer`]
//! implementation. Two flags refine when it runs:
//!
//! - **fallback**: only invoked after default decoding has failed; its result
//!   replaces the failure.
//! - **global**: applies to every property of the target type. Non-global
//!   deserializers only apply to properties that opt in with
//!   [`PropertyDecl::use_custom_deserializer`](crate::PropertyDecl::use_custom_deserializer).
//!
//! A target may have at most one regular and one fallback deserializer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::codec::DecodeContext;
use crate::error::{BuildError, DecodeResult};
use crate::value::Value;

/// The decode capability. Implement this for stateful deserializers.
pub trait CustomDeserializer: Send + Sync {
    fn decode(&self, ctx: &DecodeContext<'_>) -> DecodeResult<Value>;
}

/// Plain-function form of a deserializer.
pub type DecodeFn = fn(&DecodeContext<'_>) -> DecodeResult<Value>;

#[derive(Clone)]
pub enum DecodeOperation {
    Static(DecodeFn),
    Capability(Arc<dyn CustomDeserializer>),
}

impl DecodeOperation {
    pub fn decode(&self, ctx: &DecodeContext<'_>) -> DecodeResult<Value> {
        match self {
            DecodeOperation::Static(f) => f(ctx),
            DecodeOperation::Capability(d) => d.decode(ctx),
        }
    }
}

impl fmt::Debug for DecodeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeOperation::Static(_) => write!(f, "Static(..)"),
            DecodeOperation::Capability(_) => write!(f, "Capability(..)"),
        }
    }
}

/// A deserializer offered for registration. Validated when the schema is built.
#[derive(Debug, Clone)]
pub struct DeserializerCandidate {
    name: String,
    targets: Vec<String>,
    decoder: Option<DecodeOperation>,
    produces: Option<String>,
    fallback: bool,
    global: bool,
}

impl DeserializerCandidate {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            targets: Vec::new(),
            decoder: None,
            produces: None,
            fallback: false,
            global: false,
        }
    }

    /// Type name this deserializer builds: a structure, enum or custom type
    /// name, or a primitive's display name such as `string`.
    pub fn target(mut self, type_name: &str) -> Self {
        self.targets.push(type_name.to_string());
        self
    }

    pub fn function(mut self, f: DecodeFn) -> Self {
        self.decoder = Some(DecodeOperation::Static(f));
        self
    }

    pub fn capability<D: CustomDeserializer + 'static>(mut self, deserializer: D) -> Self {
        self.decoder = Some(DecodeOperation::Capability(Arc::new(deserializer)));
        self
    }

    /// Declared result type. When set it must equal the target.
    pub fn produces(mut self, type_name: &str) -> Self {
        self.produces = Some(type_name.to_string());
        self
    }

    pub fn fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    fn validate(self) -> Result<RegisteredDeserializer, BuildError> {
        let target = match self.targets.as_slice() {
            [] => {
                return Err(BuildError::MissingDeserializerTarget {
                    deserializer: self.name,
                });
            }
            [one] => one.clone(),
            _ => {
                return Err(BuildError::AmbiguousDeserializerTarget {
                    deserializer: self.name,
                    targets: self.targets,
                });
            }
        };
        let Some(decoder) = self.decoder else {
            return Err(BuildError::InvalidDeserializerStructure {
                deserializer: self.name,
            });
        };
        if let Some(produces) = self.produces
            && produces != target
        {
            return Err(BuildError::CustomDeserializerInvalidSignature {
                deserializer: self.name,
                target,
                produces,
            });
        }
        Ok(RegisteredDeserializer {
            name: self.name,
            target,
            decoder,
            fallback: self.fallback,
            global: self.global,
        })
    }
}

/// A validated deserializer registration.
#[derive(Debug, Clone)]
pub struct RegisteredDeserializer {
    pub name: String,
    pub target: String,
    pub decoder: DecodeOperation,
    pub fallback: bool,
    pub global: bool,
}

impl RegisteredDeserializer {
    pub fn is_static(&self) -> bool {
        matches!(self.decoder, DecodeOperation::Static(_))
    }

    fn applies(&self, opted_in: bool) -> bool {
        self.global || opted_in
    }
}

/// All registered deserializers, indexed by target type.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    regular: BTreeMap<String, RegisteredDeserializer>,
    fallbacks: BTreeMap<String, RegisteredDeserializer>,
}

impl Registry {
    /// Validate every candidate, collecting all problems rather than stopping at
    /// the first.
    pub fn from_candidates(candidates: Vec<DeserializerCandidate>) -> Result<Self, Vec<BuildError>> {
        let mut registry = Registry::default();
        let mut errors = Vec::new();
        for candidate in candidates {
            let registration = match candidate.validate() {
                Ok(r) => r,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let slot = if registration.fallback {
                &mut registry.fallbacks
            } else {
                &mut registry.regular
            };
            if let Some(existing) = slot.get(&registration.target) {
                errors.push(BuildError::MultipleDeserializers {
                    target: registration.target.clone(),
                    fallback: registration.fallback,
                    first: existing.name.clone(),
                    second: registration.name,
                });
                continue;
            }
            debug!(
                "registered {} deserializer '{}' for {}",
                if registration.fallback { "fallback" } else { "custom" },
                registration.name,
                registration.target
            );
            slot.insert(registration.target.clone(), registration);
        }
        if errors.is_empty() {
            Ok(registry)
        } else {
            Err(errors)
        }
    }

    /// Regular deserializer for `target`, if one applies to the property.
    pub fn regular_for(&self, target: &str, opted_in: bool) -> Option<&RegisteredDeserializer> {
        self.regular.get(target).filter(|r| r.applies(opted_in))
    }

    pub fn fallback_for(&self, target: &str, opted_in: bool) -> Option<&RegisteredDeserializer> {
        self.fallbacks.get(target).filter(|r| r.applies(opted_in))
    }

    pub fn is_empty(&self) -> bool {
        self.regular.is_empty() && self.fallbacks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &DecodeContext<'_>) -> DecodeResult<Value> {
        Ok(Value::Null)
    }

    struct Fixed;

    impl CustomDeserializer for Fixed {
        fn decode(&self, _: &DecodeContext<'_>) -> DecodeResult<Value> {
            Ok(Value::Int(7))
        }
    }

    fn errors(candidates: Vec<DeserializerCandidate>) -> Vec<BuildError> {
        Registry::from_candidates(candidates).unwrap_err()
    }

    #[test]
    fn valid_candidates_register() {
        let registry = Registry::from_candidates(vec![
            DeserializerCandidate::new("a").target("Colour").function(noop).global(),
            DeserializerCandidate::new("b").target("Colour").capability(Fixed).fallback(),
        ])
        .unwrap();
        let regular = registry.regular_for("Colour", false).unwrap();
        assert!(regular.is_static());
        assert!(registry.fallback_for("Colour", true).is_some());
        assert!(!registry.fallback_for("Colour", true).unwrap().is_static());
    }

    #[test]
    fn non_global_requires_opt_in() {
        let registry = Registry::from_candidates(vec![
            DeserializerCandidate::new("a").target("Colour").function(noop),
        ])
        .unwrap();
        assert!(registry.regular_for("Colour", false).is_none());
        assert!(registry.regular_for("Colour", true).is_some());
    }

    #[test]
    fn missing_target() {
        let errs = errors(vec![DeserializerCandidate::new("a").function(noop)]);
        assert!(matches!(&errs[0], BuildError::MissingDeserializerTarget { deserializer } if deserializer == "a"));
    }

    #[test]
    fn several_targets_are_ambiguous() {
        let errs = errors(vec![
            DeserializerCandidate::new("a").target("X").target("Y").function(noop),
        ]);
        assert!(matches!(&errs[0], BuildError::AmbiguousDeserializerTarget { .. }));
    }

    #[test]
    fn missing_decode_operation() {
        let errs = errors(vec![DeserializerCandidate::new("a").target("X")]);
        assert!(matches!(&errs[0], BuildError::InvalidDeserializerStructure { .. }));
    }

    #[test]
    fn produced_type_must_match_target() {
        let errs = errors(vec![
            DeserializerCandidate::new("a").target("X").produces("Y").function(noop),
        ]);
        assert!(matches!(
            &errs[0],
            BuildError::CustomDeserializerInvalidSignature { target, produces, .. }
                if target == "X" && produces == "Y"
        ));
    }

    #[test]
    fn duplicates_are_rejected_per_kind() {
        let errs = errors(vec![
            DeserializerCandidate::new("a").target("X").function(noop),
            DeserializerCandidate::new("b").target("X").function(noop),
            DeserializerCandidate::new("c").target("X").function(noop).fallback(),
            DeserializerCandidate::new("d").target("X").function(noop).fallback(),
        ]);
        assert_eq!(errs.len(), 2);
        assert!(matches!(
            &errs[0],
            BuildError::MultipleDeserializers { fallback: false, first, second, .. }
                if first == "a" && second == "b"
        ));
        assert!(matches!(&errs[1], BuildError::MultipleDeserializers { fallback: true, .. }));
    }

    #[test]
    fn one_regular_and_one_fallback_coexist() {
        let registry = Registry::from_candidates(vec![
            DeserializerCandidate::new("a").target("X").function(noop).global(),
            DeserializerCandidate::new("b").target("X").function(noop).fallback().global(),
        ]);
        assert!(registry.is_ok());
    }
}
