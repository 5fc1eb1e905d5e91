//! Turns declarations into validated [`ConfigStructure`]s.
//!
//! ```text
//! SchemaBuilder::new()
//!     .enumeration(EnumDecl::new("Level", ["LOW", "HIGH"]))
//!     .declare(Declaration::new("Server").property(...))
//!     .deserializer(DeserializerCandidate::new("colour").target("Colour")...)
//!     .build()?  →  Schema
//! ```
//!
//! Classification: a union root becomes [`Shape::Union`], a declaration
//! without parents [`Shape::Atomic`], anything else [`Shape::Intersection`]
//! with inherited properties flattened in. Every declaration is validated on
//! its own; the first problem in a declaration is reported and the rest carry
//! on, so one build surfaces every broken declaration.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::error::BuildError;
use crate::model::{
    ConfigStructure, Declaration, EnclosingRef, EnumDecl, Property, PropertyDecl, PropertyType,
    Shape, StructureSource, TypeSettings,
};
use crate::policy;
use crate::registry::{DeserializerCandidate, Registry};

/// Collects declarations, enums and custom deserializers.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    declarations: Vec<Declaration>,
    enums: Vec<EnumDecl>,
    deserializers: Vec<DeserializerCandidate>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a structure declaration. Registration order is union match order.
    pub fn declare(mut self, declaration: Declaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn enumeration(mut self, declaration: EnumDecl) -> Self {
        self.enums.push(declaration);
        self
    }

    pub fn deserializer(mut self, candidate: DeserializerCandidate) -> Self {
        self.deserializers.push(candidate);
        self
    }

    /// Validate everything and build the schema.
    ///
    /// A single problem is returned as-is; several come back as
    /// [`BuildError::Multiple`], registry problems first, then declarations in
    /// name order.
    pub fn build(self) -> Result<Schema, BuildError> {
        let mut errors = Vec::new();

        let registry = Registry::from_candidates(self.deserializers).unwrap_or_else(|e| {
            errors.extend(e);
            Registry::default()
        });

        let mut index: BTreeMap<&str, (usize, &Declaration)> = BTreeMap::new();
        let mut enums: BTreeMap<&str, &EnumDecl> = BTreeMap::new();
        let mut duplicates = BTreeSet::new();
        for (position, declaration) in self.declarations.iter().enumerate() {
            if index.insert(&declaration.name, (position, declaration)).is_some() {
                duplicates.insert(declaration.name.clone());
            }
        }
        for declaration in &self.enums {
            if enums.insert(&declaration.name, declaration).is_some()
                || index.contains_key(declaration.name.as_str())
            {
                duplicates.insert(declaration.name.clone());
            }
        }
        errors.extend(
            duplicates
                .into_iter()
                .map(|name| BuildError::DuplicateDeclaration { name }),
        );

        let resolver = Resolver { index, enums };
        let mut structures = BTreeMap::new();
        for (name, (_, declaration)) in &resolver.index {
            match resolver.build(*declaration) {
                Ok(structure) => {
                    debug!("built {name} as {}", shape_name(&structure.shape));
                    structures.insert(name.to_string(), structure);
                }
                Err(e) => errors.push(e),
            }
        }

        match errors.len() {
            0 => Ok(Schema {
                structures,
                enums: self
                    .enums
                    .into_iter()
                    .map(|e| (e.name.clone(), e))
                    .collect(),
                registry,
            }),
            1 => Err(errors.remove(0)),
            _ => Err(BuildError::Multiple(errors)),
        }
    }
}

fn shape_name(shape: &Shape) -> &'static str {
    match shape {
        Shape::Atomic => "atomic",
        Shape::Intersection { .. } => "intersection",
        Shape::Union { .. } => "union",
    }
}

/// The validated model: every declared structure, enum and deserializer.
#[derive(Debug, Clone)]
pub struct Schema {
    structures: BTreeMap<String, ConfigStructure>,
    enums: BTreeMap<String, EnumDecl>,
    registry: Registry,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn structure(&self, name: &str) -> Option<&ConfigStructure> {
        self.structures.get(name)
    }

    /// All structures in name order.
    pub fn structures(&self) -> impl Iterator<Item = &ConfigStructure> {
        self.structures.values()
    }

    pub fn enumeration(&self, name: &str) -> Option<&EnumDecl> {
        self.enums.get(name)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// One occurrence of a property along the inheritance graph.
struct Occurrence<'a> {
    owner: &'a Declaration,
    property: &'a PropertyDecl,
    depth: usize,
}

struct Resolver<'a> {
    index: BTreeMap<&'a str, (usize, &'a Declaration)>,
    enums: BTreeMap<&'a str, &'a EnumDecl>,
}

impl<'a> Resolver<'a> {
    fn build(&self, declaration: &'a Declaration) -> Result<ConfigStructure, BuildError> {
        let enclosing = self.enclosing_ref(declaration)?;
        self.check_own_properties(declaration)?;

        let mut occurrences = Vec::new();
        self.collect(declaration, 0, &mut Vec::new(), &mut occurrences)?;
        let properties = self.merge(declaration, occurrences)?;

        let shape = if declaration.union_root {
            Shape::Union {
                alternatives: self.alternatives(declaration, !properties.is_empty())?,
            }
        } else if declaration.parents.is_empty() {
            Shape::Atomic
        } else {
            Shape::Intersection {
                parents: declaration.parents.clone(),
            }
        };

        Ok(ConfigStructure {
            name: declaration.name.clone(),
            source: StructureSource {
                declaration: declaration.name.clone(),
                parents: declaration.parents.clone(),
            },
            settings: declaration.settings.clone(),
            enclosing,
            enclosed: self.enclosed_in(&declaration.name),
            properties,
            shape,
        })
    }

    fn lookup(&self, name: &str) -> Option<&'a Declaration> {
        self.index.get(name).map(|(_, d)| *d)
    }

    /// Enclosing chain by name, nearest first. Also rejects unnamed scopes.
    fn enclosing_ref(&self, declaration: &Declaration) -> Result<Option<EnclosingRef>, BuildError> {
        if declaration.name.is_empty() {
            return Err(BuildError::UnnamedEnclosingScope {
                declaration: declaration.name.clone(),
            });
        }
        let mut chain = Vec::new();
        let mut seen = vec![declaration.name.clone()];
        let mut current = declaration;
        while let Some(outer) = &current.enclosing {
            if outer.is_empty() {
                return Err(BuildError::UnnamedEnclosingScope {
                    declaration: declaration.name.clone(),
                });
            }
            if seen.contains(outer) {
                seen.push(outer.clone());
                return Err(BuildError::InheritanceCycle { path: seen });
            }
            let Some(next) = self.lookup(outer) else {
                return Err(BuildError::UnknownEnclosing {
                    declaration: current.name.clone(),
                    enclosing: outer.clone(),
                });
            };
            seen.push(outer.clone());
            chain.push(outer.clone());
            current = next;
        }
        Ok(chain.into_iter().rev().fold(None, |inner, name| {
            Some(EnclosingRef {
                name,
                enclosing: inner.map(Box::new),
            })
        }))
    }

    fn check_own_properties(&self, declaration: &Declaration) -> Result<(), BuildError> {
        for property in &declaration.properties {
            if let Some(name) = self.unknown_reference(&property.ty) {
                return Err(BuildError::UnknownPropertyType {
                    declaration: declaration.name.clone(),
                    property: property.name.clone(),
                    ty: name.to_string(),
                });
            }
            if property.settings.enum_scheme.is_some() && !property.ty.is_enum() {
                return Err(BuildError::EnumSchemeNotEnum {
                    declaration: declaration.name.clone(),
                    property: property.name.clone(),
                    ty: property.ty.to_string(),
                });
            }
        }
        Ok(())
    }

    fn unknown_reference<'t>(&self, ty: &'t PropertyType) -> Option<&'t str> {
        match ty {
            PropertyType::Enum(name) => {
                (!self.enums.contains_key(name.as_str())).then_some(name.as_str())
            }
            PropertyType::Structure(name) => {
                (!self.index.contains_key(name.as_str())).then_some(name.as_str())
            }
            PropertyType::List(element) => self.unknown_reference(element),
            PropertyType::Map(key, value) => self
                .unknown_reference(key)
                .or_else(|| self.unknown_reference(value)),
            _ => None,
        }
    }

    /// Depth-first over parents in declared order, then own properties.
    fn collect(
        &self,
        declaration: &'a Declaration,
        depth: usize,
        path: &mut Vec<String>,
        out: &mut Vec<Occurrence<'a>>,
    ) -> Result<(), BuildError> {
        path.push(declaration.name.clone());
        for parent in &declaration.parents {
            if path.contains(parent) {
                let mut cycle = path.clone();
                cycle.push(parent.clone());
                return Err(BuildError::InheritanceCycle { path: cycle });
            }
            let Some(parent_decl) = self.lookup(parent) else {
                return Err(BuildError::UnknownParent {
                    declaration: declaration.name.clone(),
                    parent: parent.clone(),
                });
            };
            self.collect(parent_decl, depth + 1, path, out)?;
        }
        path.pop();
        out.extend(declaration.properties.iter().map(|property| Occurrence {
            owner: declaration,
            property,
            depth,
        }));
        Ok(())
    }

    /// Deduplicate by name. The shallowest occurrence supplies the settings;
    /// the first occurrence fixes the position.
    fn merge(
        &self,
        declaration: &Declaration,
        occurrences: Vec<Occurrence<'a>>,
    ) -> Result<Vec<Property>, BuildError> {
        let mut merged: Vec<Occurrence<'a>> = Vec::new();
        for occurrence in occurrences {
            match merged
                .iter_mut()
                .find(|m| m.property.name == occurrence.property.name)
            {
                Some(existing) => {
                    if existing.property.ty != occurrence.property.ty {
                        return Err(BuildError::ConflictingPropertyTypes {
                            declaration: declaration.name.clone(),
                            property: occurrence.property.name.clone(),
                            first: existing.property.ty.to_string(),
                            second: occurrence.property.ty.to_string(),
                        });
                    }
                    if occurrence.depth < existing.depth {
                        *existing = occurrence;
                    }
                }
                None => merged.push(occurrence),
            }
        }
        Ok(merged.into_iter().map(|o| self.resolve(o)).collect())
    }

    /// Settings scopes for `owner`: itself, then its enclosing types outward.
    fn scopes(&self, owner: &'a Declaration) -> Vec<&'a TypeSettings> {
        let mut scopes = vec![&owner.settings];
        let mut seen = BTreeSet::from([owner.name.as_str()]);
        let mut current = owner;
        while let Some(outer) = current.enclosing.as_deref()
            && seen.insert(outer)
            && let Some(next) = self.lookup(outer)
        {
            scopes.push(&next.settings);
            current = next;
        }
        scopes
    }

    fn resolve(&self, occurrence: Occurrence<'a>) -> Property {
        let Occurrence { owner, property, .. } = occurrence;
        let scopes = self.scopes(owner);
        let settings = &property.settings;
        let naming = policy::cascade(settings.naming, scopes.iter().map(|s| s.naming));
        let enum_scheme = policy::cascade(settings.enum_scheme, scopes.iter().map(|s| s.enum_scheme));
        Property {
            name: property.name.clone(),
            ty: property.ty.clone(),
            source: property.source,
            key: policy::effective_name(&property.name, settings.rename.as_deref(), naming),
            enum_scheme,
            nullable: settings.nullable,
            default: settings.default.clone(),
            use_custom_deserializer: settings.use_custom_deserializer,
            declared_in: owner.name.clone(),
        }
    }

    /// Declarations enclosed in `name`, in registration order.
    fn enclosed_in(&self, name: &str) -> Vec<String> {
        let mut found: Vec<(usize, &str)> = self
            .index
            .values()
            .filter(|(_, d)| d.enclosing.as_deref() == Some(name))
            .map(|(position, d)| (*position, d.name.as_str()))
            .collect();
        found.sort();
        found.into_iter().map(|(_, n)| n.to_string()).collect()
    }

    fn alternatives(&self, union: &Declaration, has_base: bool) -> Result<Vec<String>, BuildError> {
        let mut found: Vec<(usize, &str)> = self
            .index
            .values()
            .filter(|(_, d)| {
                d.name != union.name
                    && (d.enclosing.as_deref() == Some(union.name.as_str())
                        || d.parents.contains(&union.name))
            })
            .map(|(position, d)| (*position, d.name.as_str()))
            .collect();
        found.sort();
        for (_, alternative) in &found {
            if has_base && !self.extends(*alternative, &union.name, &mut BTreeSet::new()) {
                return Err(BuildError::UnionAlternativeNotExtendingUnion {
                    union: union.name.clone(),
                    alternative: alternative.to_string(),
                });
            }
        }
        Ok(found.into_iter().map(|(_, n)| n.to_string()).collect())
    }

    fn extends<'s>(&'s self, name: &'s str, ancestor: &str, seen: &mut BTreeSet<&'s str>) -> bool {
        if !seen.insert(name) {
            return false;
        }
        let Some(declaration) = self.lookup(name) else {
            return false;
        };
        declaration
            .parents
            .iter()
            .any(|p| p == ancestor || self.extends(p, ancestor, seen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{shop_schema, shapes_schema};
    use crate::model::PropertySource;
    use crate::naming::NamingPattern;
    use crate::policy::EnumScheme;

    fn keys(structure: &ConfigStructure) -> Vec<&str> {
        structure.properties.iter().map(|p| p.key.as_str()).collect()
    }

    #[test]
    fn atomic_without_parents() {
        let schema = shop_schema();
        let server = schema.structure("Server").unwrap();
        assert_eq!(server.shape, Shape::Atomic);
        assert_eq!(keys(server), vec!["host", "listen_port"]);
    }

    #[test]
    fn intersection_flattens_ancestors_first() {
        let schema = SchemaBuilder::new()
            .declare(Declaration::new("Named").property(PropertyDecl::new("name", PropertyType::String)))
            .declare(Declaration::new("Aged").property(PropertyDecl::new("age", PropertyType::int())))
            .declare(
                Declaration::new("Person")
                    .extends("Named")
                    .extends("Aged")
                    .property(PropertyDecl::new("email", PropertyType::String)),
            )
            .build()
            .unwrap();
        let person = schema.structure("Person").unwrap();
        assert_eq!(
            person.shape,
            Shape::Intersection {
                parents: vec!["Named".into(), "Aged".into()]
            }
        );
        assert_eq!(keys(person), vec!["name", "age", "email"]);
        assert_eq!(person.property("age").unwrap().declared_in, "Aged");
    }

    #[test]
    fn nearest_declaration_settings_win() {
        let schema = SchemaBuilder::new()
            .declare(Declaration::new("Base").property(PropertyDecl::new("port", PropertyType::int())))
            .declare(
                Declaration::new("Child")
                    .extends("Base")
                    .property(PropertyDecl::new("port", PropertyType::int()).rename("PORT").accessor()),
            )
            .build()
            .unwrap();
        let child = schema.structure("Child").unwrap();
        assert_eq!(child.properties.len(), 1);
        assert_eq!(child.properties[0].key, "PORT");
        assert_eq!(child.properties[0].source, PropertySource::Accessor);
        assert_eq!(child.properties[0].declared_in, "Child");
    }

    #[test]
    fn diamond_inheritance_dedupes() {
        let schema = SchemaBuilder::new()
            .declare(Declaration::new("Root").property(PropertyDecl::new("id", PropertyType::int())))
            .declare(Declaration::new("Left").extends("Root"))
            .declare(Declaration::new("Right").extends("Root"))
            .declare(Declaration::new("Both").extends("Left").extends("Right"))
            .build()
            .unwrap();
        assert_eq!(keys(schema.structure("Both").unwrap()), vec!["id"]);
    }

    #[test]
    fn conflicting_types_are_rejected() {
        let err = SchemaBuilder::new()
            .declare(Declaration::new("A").property(PropertyDecl::new("x", PropertyType::int())))
            .declare(Declaration::new("B").property(PropertyDecl::new("x", PropertyType::String)))
            .declare(Declaration::new("C").extends("A").extends("B"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::ConflictingPropertyTypes { declaration, property, .. }
                if declaration == "C" && property == "x"
        ));
    }

    #[test]
    fn naming_cascades_from_enclosing_type() {
        let schema = SchemaBuilder::new()
            .declare(Declaration::new("Outer").naming(NamingPattern::LowerKebabCase))
            .declare(
                Declaration::new("Inner")
                    .enclosed_in("Outer")
                    .property(PropertyDecl::new("maxSize", PropertyType::int()))
                    .property(
                        PropertyDecl::new("minSize", PropertyType::int())
                            .naming(NamingPattern::UpperSnakeCase),
                    ),
            )
            .build()
            .unwrap();
        let inner = schema.structure("Inner").unwrap();
        assert_eq!(keys(inner), vec!["max-size", "Min_Size"]);
        assert_eq!(inner.enclosing.as_ref().unwrap().name, "Outer");
        assert_eq!(schema.structure("Outer").unwrap().enclosed, vec!["Inner".to_string()]);
    }

    #[test]
    fn type_setting_beats_enclosing() {
        let schema = SchemaBuilder::new()
            .enumeration(EnumDecl::new("Level", ["LOW"]))
            .declare(Declaration::new("Outer").enum_scheme(EnumScheme::ExactMatch))
            .declare(
                Declaration::new("Inner")
                    .enclosed_in("Outer")
                    .enum_scheme(EnumScheme::CaseInsensitive)
                    .property(PropertyDecl::new("level", PropertyType::enumeration("Level"))),
            )
            .build()
            .unwrap();
        let level = schema.structure("Inner").unwrap().property("level").unwrap();
        assert_eq!(level.enum_scheme, EnumScheme::CaseInsensitive);
    }

    #[test]
    fn union_alternatives_in_registration_order() {
        let schema = shapes_schema();
        let shape = schema.structure("Shape").unwrap();
        assert_eq!(
            shape.alternatives(),
            ["Circle".to_string(), "Square".to_string()]
        );
        assert_eq!(shape.enclosed(), shape.alternatives());
    }

    #[test]
    fn union_alternative_must_extend_base_with_properties() {
        let err = SchemaBuilder::new()
            .declare(Declaration::union("Shape").property(PropertyDecl::new("colour", PropertyType::String)))
            .declare(Declaration::new("Circle").enclosed_in("Shape"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::UnionAlternativeNotExtendingUnion { union, alternative }
                if union == "Shape" && alternative == "Circle"
        ));
    }

    #[test]
    fn enclosed_alternative_may_skip_empty_base() {
        let schema = SchemaBuilder::new()
            .declare(Declaration::union("Marker"))
            .declare(Declaration::new("A").enclosed_in("Marker"))
            .build()
            .unwrap();
        assert_eq!(schema.structure("Marker").unwrap().alternatives(), ["A".to_string()]);
    }

    #[test]
    fn enum_scheme_on_non_enum_property() {
        let err = SchemaBuilder::new()
            .declare(
                Declaration::new("A").property(
                    PropertyDecl::new("name", PropertyType::String).enum_scheme(EnumScheme::CaseInsensitive),
                ),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::EnumSchemeNotEnum { ty, .. } if ty == "string"));
    }

    #[test]
    fn unknown_references() {
        let err = SchemaBuilder::new()
            .declare(Declaration::new("A").extends("Missing"))
            .declare(Declaration::new("B").property(PropertyDecl::new("x", PropertyType::structure("Nope"))))
            .declare(Declaration::new("C").enclosed_in("Ghost"))
            .build()
            .unwrap_err();
        let BuildError::Multiple(errors) = err else {
            panic!("expected several errors");
        };
        assert!(matches!(&errors[0], BuildError::UnknownParent { parent, .. } if parent == "Missing"));
        assert!(matches!(&errors[1], BuildError::UnknownPropertyType { ty, .. } if ty == "Nope"));
        assert!(matches!(&errors[2], BuildError::UnknownEnclosing { enclosing, .. } if enclosing == "Ghost"));
    }

    #[test]
    fn enum_used_as_structure_is_unknown() {
        let err = SchemaBuilder::new()
            .enumeration(EnumDecl::new("Level", ["LOW"]))
            .declare(Declaration::new("A").property(PropertyDecl::new("x", PropertyType::structure("Level"))))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::UnknownPropertyType { .. }));
    }

    #[test]
    fn inheritance_cycle() {
        let err = SchemaBuilder::new()
            .declare(Declaration::new("A").extends("B"))
            .declare(Declaration::new("B").extends("A"))
            .build()
            .unwrap_err();
        let BuildError::Multiple(errors) = err else {
            panic!("expected one error per declaration");
        };
        assert!(matches!(
            &errors[0],
            BuildError::InheritanceCycle { path } if path == &["A", "B", "A"]
        ));
    }

    #[test]
    fn unnamed_scope() {
        let err = SchemaBuilder::new()
            .declare(Declaration::new("A").enclosed_in(""))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::UnnamedEnclosingScope { declaration } if declaration == "A"));
    }

    #[test]
    fn duplicates_are_reported() {
        let err = SchemaBuilder::new()
            .declare(Declaration::new("A"))
            .declare(Declaration::new("A"))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateDeclaration { name } if name == "A"));
    }

    #[test]
    fn registry_errors_come_first() {
        let err = SchemaBuilder::new()
            .deserializer(DeserializerCandidate::new("broken"))
            .declare(Declaration::new("A").extends("Missing"))
            .build()
            .unwrap_err();
        let BuildError::Multiple(errors) = err else {
            panic!("expected two errors");
        };
        assert!(matches!(&errors[0], BuildError::MissingDeserializerTarget { .. }));
        assert!(matches!(&errors[1], BuildError::UnknownParent { .. }));
    }
}
