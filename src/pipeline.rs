//! Generation: turns each built structure into a compiled codec entry by
//! running an ordered list of named [`Stage`]s.
//!
//! Every stage sees the structure, the entry under construction and the
//! members the previous stage generated. The standard order is
//!
//! ```text
//! base-shape → accessors → decode-logic → encode-logic → derived-behaviour → registration
//! ```
//!
//! A failing stage drops that one structure from the codec and is reported as
//! a [`ProcessingError`]; the rest still generate.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, warn};

use crate::codec::{
    Codec, DecodePlan, EncodePlan, FieldEncoding, Plan, PlanKind, PropertyPlan,
};
use crate::error::{Error, ProcessingError};
use crate::model::{ConfigStructure, PropertyType};
use crate::policy::EnumScheme;
use crate::schema::Schema;
use crate::tree::DataTree;

/// One generated member of a compiled structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    Field(String),
    Accessor(String),
    Decoder,
    Encoder,
    Equality,
    Display,
    /// Binding to a configuration source file.
    Export(String),
}

/// Output of one stage, handed to the next.
pub type Manifest = Vec<Member>;

/// A compiled structure as held by the [`Codec`].
#[derive(Debug, Clone)]
pub struct CompiledStructure {
    pub(crate) structure: ConfigStructure,
    pub(crate) decode: DecodePlan,
    pub(crate) encode: EncodePlan,
    pub(crate) display: bool,
    pub(crate) members: Vec<Member>,
}

impl CompiledStructure {
    /// Structures this one decodes through: property types and union
    /// alternatives.
    fn references(&self) -> Vec<&str> {
        fn walk<'p>(plan: &'p Plan, out: &mut Vec<&'p str>) {
            match &plan.kind {
                PlanKind::Structure(name) => out.push(name.as_str()),
                PlanKind::List(element) => walk(element, out),
                PlanKind::Map(key, value) => {
                    walk(key, out);
                    walk(value, out);
                }
                _ => {}
            }
        }
        let mut out = Vec::new();
        match &self.decode {
            DecodePlan::Record(properties) => {
                for property in properties {
                    walk(&property.plan, &mut out);
                }
            }
            DecodePlan::Union(alternatives) => out.extend(alternatives.iter().map(String::as_str)),
        }
        out
    }
}

/// The entry a pipeline run is accumulating for one structure.
#[derive(Debug, Default)]
pub struct EntryBuilder {
    decode: Option<DecodePlan>,
    encode: Option<EncodePlan>,
    display: bool,
    export: Option<String>,
    members: Vec<Member>,
}

impl EntryBuilder {
    /// Every member generated so far, in stage order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn has_decoder(&self) -> bool {
        self.decode.is_some()
    }

    pub fn has_encoder(&self) -> bool {
        self.encode.is_some()
    }

    fn finish(self, structure: &ConfigStructure) -> Result<CompiledStructure, String> {
        let (Some(decode), Some(encode)) = (self.decode, self.encode) else {
            return Err("entry is missing its decoder or encoder".to_string());
        };
        Ok(CompiledStructure {
            structure: structure.clone(),
            decode,
            encode,
            display: self.display,
            members: self.members,
        })
    }
}

/// A named generation step.
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// Generate this stage's members. An `Err` reason aborts the structure.
    fn apply(
        &self,
        structure: &ConfigStructure,
        schema: &Schema,
        entry: &mut EntryBuilder,
        previous: &Manifest,
    ) -> Result<Manifest, String>;
}

/// Result of a generation run: the codec for everything that generated, and
/// one error per structure that did not.
#[derive(Debug)]
pub struct Generation {
    pub codec: Codec,
    pub failures: Vec<ProcessingError>,
}

impl Generation {
    /// The codec, or every failure if anything was dropped. A single failure
    /// comes back as [`Error::Processing`].
    pub fn into_result(mut self) -> Result<Codec, Error> {
        match self.failures.len() {
            0 => Ok(self.codec),
            1 => Err(Error::Processing(self.failures.remove(0))),
            _ => Err(Error::Generation(self.failures)),
        }
    }
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}

impl Pipeline {
    /// A pipeline with no stages. Nothing it generates is complete until a
    /// decode and an encode stage are added.
    pub fn empty() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn standard() -> Self {
        Self::empty()
            .with_stage(BaseShape)
            .with_stage(Accessors)
            .with_stage(DecodeLogic)
            .with_stage(EncodeLogic)
            .with_stage(DerivedBehaviour)
            .with_stage(Registration)
    }

    /// Append a stage to the end of the pipeline.
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage over every structure of `schema`, in name order.
    pub fn generate(&self, schema: &Schema) -> Generation {
        let mut entries = BTreeMap::new();
        let mut sources: BTreeMap<String, String> = BTreeMap::new();
        let mut failures = Vec::new();

        for structure in schema.structures() {
            let (compiled, export) = match self.run(structure, schema) {
                Ok(done) => done,
                Err(failure) => {
                    warn!("dropping {}: {failure}", structure.name);
                    failures.push(failure);
                    continue;
                }
            };
            if let Some(source) = export {
                if let Some(bound) = sources.get(&source) {
                    let failure = ProcessingError {
                        stage: Registration.name().to_string(),
                        declaration: structure.name.clone(),
                        reason: format!("source '{source}' is already bound to {bound}"),
                    };
                    warn!("dropping {}: {failure}", structure.name);
                    failures.push(failure);
                    continue;
                }
                sources.insert(source, structure.name.clone());
            }
            entries.insert(structure.name.clone(), compiled);
        }

        // Anything that decodes through a dropped structure goes with it.
        loop {
            let dangling: Vec<(String, String)> = entries
                .iter()
                .filter_map(|(name, compiled)| {
                    compiled
                        .references()
                        .into_iter()
                        .find(|r| !entries.contains_key(*r))
                        .map(|missing| (name.clone(), missing.to_string()))
                })
                .collect();
            if dangling.is_empty() {
                break;
            }
            for (name, missing) in dangling {
                entries.remove(&name);
                sources.retain(|_, bound| *bound != name);
                let failure = ProcessingError {
                    stage: "pipeline".to_string(),
                    declaration: name.clone(),
                    reason: format!("depends on dropped structure '{missing}'"),
                };
                warn!("dropping {name}: {failure}");
                failures.push(failure);
            }
        }

        Generation {
            codec: Codec::from_entries(entries, sources),
            failures,
        }
    }

    fn run(
        &self,
        structure: &ConfigStructure,
        schema: &Schema,
    ) -> Result<(CompiledStructure, Option<String>), ProcessingError> {
        let failure = |stage: &str, reason: String| ProcessingError {
            stage: stage.to_string(),
            declaration: structure.name.clone(),
            reason,
        };
        let mut entry = EntryBuilder::default();
        let mut previous = Manifest::new();
        for stage in &self.stages {
            let generated = stage
                .apply(structure, schema, &mut entry, &previous)
                .map_err(|reason| failure(stage.name(), reason))?;
            debug!(
                "{}: stage {} generated {} members",
                structure.name,
                stage.name(),
                generated.len()
            );
            entry.members.extend(generated.iter().cloned());
            previous = generated;
        }
        let export = entry.export.clone();
        let compiled = entry
            .finish(structure)
            .map_err(|reason| failure("pipeline", reason))?;
        Ok((compiled, export))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

// -- Standard stages ----------------------------------------------------------

/// One field per property.
pub struct BaseShape;

impl Stage for BaseShape {
    fn name(&self) -> &str {
        "base-shape"
    }

    fn apply(
        &self,
        structure: &ConfigStructure,
        _schema: &Schema,
        _entry: &mut EntryBuilder,
        _previous: &Manifest,
    ) -> Result<Manifest, String> {
        Ok(structure
            .properties
            .iter()
            .map(|p| Member::Field(p.name.clone()))
            .collect())
    }
}

/// One accessor per field of the previous stage.
pub struct Accessors;

impl Stage for Accessors {
    fn name(&self) -> &str {
        "accessors"
    }

    fn apply(
        &self,
        _structure: &ConfigStructure,
        _schema: &Schema,
        _entry: &mut EntryBuilder,
        previous: &Manifest,
    ) -> Result<Manifest, String> {
        Ok(previous
            .iter()
            .filter_map(|m| match m {
                Member::Field(name) => Some(Member::Accessor(name.clone())),
                _ => None,
            })
            .collect())
    }
}

/// Compiles the decode plan, resolving enums and custom deserializers.
pub struct DecodeLogic;

impl Stage for DecodeLogic {
    fn name(&self) -> &str {
        "decode-logic"
    }

    fn apply(
        &self,
        structure: &ConfigStructure,
        schema: &Schema,
        entry: &mut EntryBuilder,
        _previous: &Manifest,
    ) -> Result<Manifest, String> {
        let plan = if structure.is_union() {
            DecodePlan::Union(structure.alternatives().to_vec())
        } else {
            let properties = structure
                .properties
                .iter()
                .map(|p| {
                    Ok(PropertyPlan {
                        name: p.name.clone(),
                        key: p.key.clone(),
                        lookup: DataTree::String(p.key.clone()),
                        nullable: p.nullable,
                        default: p.default.clone(),
                        plan: plan_for(schema, &p.ty, p.enum_scheme, p.use_custom_deserializer)
                            .map_err(|e| format!("property '{}': {e}", p.name))?,
                    })
                })
                .collect::<Result<Vec<_>, String>>()?;
            DecodePlan::Record(properties)
        };
        entry.decode = Some(plan);
        Ok(vec![Member::Decoder])
    }
}

fn plan_for(
    schema: &Schema,
    ty: &PropertyType,
    scheme: EnumScheme,
    opted_in: bool,
) -> Result<Plan, String> {
    let target = ty.to_string();
    let registry = schema.registry();
    let custom = registry.regular_for(&target, opted_in).cloned();
    let fallback = registry.fallback_for(&target, opted_in).cloned();
    let kind = match ty {
        PropertyType::Bool => PlanKind::Bool,
        PropertyType::Int(kind) => PlanKind::Int(*kind),
        PropertyType::Float(kind) => PlanKind::Float(*kind),
        PropertyType::String => PlanKind::String,
        PropertyType::Enum(name) => {
            let declaration = schema
                .enumeration(name)
                .ok_or_else(|| format!("enum {name} is not declared"))?;
            PlanKind::Enum {
                name: name.clone(),
                constants: declaration.constants.clone(),
                scheme,
            }
        }
        PropertyType::Structure(name) => PlanKind::Structure(name.clone()),
        PropertyType::List(element) => {
            PlanKind::List(Box::new(plan_for(schema, element, scheme, opted_in)?))
        }
        PropertyType::Map(key, value) => PlanKind::Map(
            Box::new(plan_for(schema, key, scheme, opted_in)?),
            Box::new(plan_for(schema, value, scheme, opted_in)?),
        ),
        PropertyType::Custom(name) => {
            if custom.is_none() && fallback.is_none() {
                return Err(format!("no custom deserializer applies to {name}"));
            }
            PlanKind::Custom(name.clone())
        }
    };
    Ok(Plan {
        ty: ty.clone(),
        kind,
        custom,
        fallback,
    })
}

/// Compiles the encode plan.
pub struct EncodeLogic;

impl Stage for EncodeLogic {
    fn name(&self) -> &str {
        "encode-logic"
    }

    fn apply(
        &self,
        structure: &ConfigStructure,
        _schema: &Schema,
        entry: &mut EntryBuilder,
        _previous: &Manifest,
    ) -> Result<Manifest, String> {
        let plan = if structure.is_union() {
            EncodePlan::Union(structure.alternatives().to_vec())
        } else {
            EncodePlan::Record(
                structure
                    .properties
                    .iter()
                    .map(|p| FieldEncoding {
                        name: p.name.clone(),
                        key: p.key.clone(),
                        ty: p.ty.clone(),
                        optional: p.nullable || p.default.is_some(),
                    })
                    .collect(),
            )
        };
        entry.encode = Some(plan);
        Ok(vec![Member::Encoder])
    }
}

/// Equality always; a string representation when the type asks for one.
pub struct DerivedBehaviour;

impl Stage for DerivedBehaviour {
    fn name(&self) -> &str {
        "derived-behaviour"
    }

    fn apply(
        &self,
        structure: &ConfigStructure,
        _schema: &Schema,
        entry: &mut EntryBuilder,
        _previous: &Manifest,
    ) -> Result<Manifest, String> {
        let mut members = vec![Member::Equality];
        if structure.settings.generate_to_string {
            entry.display = true;
            members.push(Member::Display);
        }
        Ok(members)
    }
}

/// Checks the entry is complete and exports its source binding.
pub struct Registration;

impl Stage for Registration {
    fn name(&self) -> &str {
        "registration"
    }

    fn apply(
        &self,
        structure: &ConfigStructure,
        _schema: &Schema,
        entry: &mut EntryBuilder,
        _previous: &Manifest,
    ) -> Result<Manifest, String> {
        if !entry.has_decoder() || !entry.has_encoder() {
            return Err("cannot register an entry without decoder and encoder".to_string());
        }
        let Some(source) = &structure.settings.source else {
            return Ok(Vec::new());
        };
        entry.export = Some(source.clone());
        Ok(vec![Member::Export(source.clone())])
    }
}
