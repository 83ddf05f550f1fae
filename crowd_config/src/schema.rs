//! Field registry: static descriptor tables per section type.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crowd_schema::SectionId;
use thiserror::Error;

use crate::value::Value;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("section '{section}' declares field '{field}' twice")]
    DuplicateField {
        section: &'static str,
        field: &'static str,
    },
    #[error("section '{0}' is registered twice")]
    DuplicateSection(&'static str),
    #[error("field '{field}' of section '{section}' emits records but the section has no wire id")]
    MissingSectionId {
        section: &'static str,
        field: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Int(i64),
    Float(f64),
    Str(&'static str),
    Bool(bool),
    /// `ref:` expression evaluated against the root when the default is needed.
    Reference(&'static str),
}

impl DefaultValue {
    pub(crate) fn literal(&self) -> Option<Value> {
        match *self {
            DefaultValue::Int(value) => Some(Value::Int(value)),
            DefaultValue::Float(value) => Some(Value::Float(value)),
            DefaultValue::Str(value) => Some(Value::Str(value.to_string())),
            DefaultValue::Bool(value) => Some(Value::Bool(value)),
            DefaultValue::Reference(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumVariant {
    pub name: &'static str,
    pub code: u8,
}

/// Named transforms available to `Custom` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomParser {
    /// Ingests the scene document named by the field. The field value is the
    /// path as written; the parser stashes `scene_file` (same path) and
    /// `geometry` (the ingested tagged records) on the node.
    SceneFile,
}

/// Binary coordinate plus per-field fallbacks of a distribution field.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionSlot {
    pub section: SectionId,
    pub element: u16,
    pub fallbacks: Vec<(&'static str, DefaultValue)>,
}

impl DistributionSlot {
    pub fn new(section: SectionId, element: u16) -> Self {
        Self {
            section,
            element,
            fallbacks: Vec::new(),
        }
    }

    pub fn fallback(mut self, field: &'static str, default: DefaultValue) -> Self {
        self.fallbacks.push((field, default));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Int,
    Float,
    String,
    Bool,
    Enum(&'static [EnumVariant]),
    /// Nested section; the payload names its registered schema.
    Descendant(&'static str),
    Distribution(DistributionSlot),
    Custom(CustomParser),
}

impl FieldKind {
    pub fn is_nested(&self) -> bool {
        matches!(self, FieldKind::Descendant(_) | FieldKind::Distribution(_))
    }
}

/// How a scalar field shows up in the section's own records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    Skip,
    /// Bare enum code at the very start of the document.
    LeadingByte,
    /// Single byte 0/1.
    Flag(u16),
    /// Little-endian f64.
    Float(u16),
    /// Seconds rounded to a big-endian u32; `+inf` maps to the sentinel.
    Seconds(u16),
    /// Stashed scene geometry records, then the length-prefixed file name.
    SceneFile { name_element: u16 },
}

impl Wire {
    fn needs_section(self) -> bool {
        !matches!(self, Wire::Skip | Wire::LeadingByte)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: Option<DefaultValue>,
    pub wire: Wire,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            default: None,
            wire: Wire::Skip,
        }
    }

    pub fn int(name: &'static str) -> Self {
        Self::new(name, FieldKind::Int)
    }

    pub fn float(name: &'static str) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn enumeration(name: &'static str, table: &'static [EnumVariant]) -> Self {
        Self::new(name, FieldKind::Enum(table))
    }

    pub fn descendant(name: &'static str, section: &'static str) -> Self {
        Self::new(name, FieldKind::Descendant(section))
    }

    pub fn distribution(name: &'static str, slot: DistributionSlot) -> Self {
        Self::new(name, FieldKind::Distribution(slot))
    }

    pub fn custom(name: &'static str, parser: CustomParser) -> Self {
        Self::new(name, FieldKind::Custom(parser))
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn emit(mut self, wire: Wire) -> Self {
        self.wire = wire;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionSchema {
    name: &'static str,
    section: Option<SectionId>,
    fields: Vec<FieldDescriptor>,
}

impl SectionSchema {
    pub fn builder(name: &'static str) -> SchemaBuilder {
        SchemaBuilder {
            schema: SectionSchema {
                name,
                section: None,
                fields: Vec::new(),
            },
            error: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn section(&self) -> Option<SectionId> {
        self.section
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<(usize, &FieldDescriptor)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, field)| field.name == name)
    }

    /// Index of the custom field whose parser stashes `name`.
    pub fn stash_owner(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| match field.kind {
            FieldKind::Custom(parser) => parser.stashed_fields().iter().any(|field| *field == name),
            _ => false,
        })
    }
}

pub struct SchemaBuilder {
    schema: SectionSchema,
    error: Option<SchemaError>,
}

impl SchemaBuilder {
    pub fn section(mut self, section: SectionId) -> Self {
        self.schema.section = Some(section);
        self
    }

    /// Register a field. Declaration order is encoding order.
    pub fn declare_field(mut self, field: FieldDescriptor) -> Self {
        if self.error.is_none() && self.schema.field(field.name).is_some() {
            self.error = Some(SchemaError::DuplicateField {
                section: self.schema.name,
                field: field.name,
            });
        }
        self.schema.fields.push(field);
        self
    }

    pub fn build(self) -> Result<SectionSchema, SchemaError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.schema.section.is_none() {
            if let Some(field) = self
                .schema
                .fields
                .iter()
                .find(|field| field.wire.needs_section())
            {
                return Err(SchemaError::MissingSectionId {
                    section: self.schema.name,
                    field: field.name,
                });
            }
        }
        Ok(self.schema)
    }
}

/// All section schemas known to a compiler, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    sections: BTreeMap<&'static str, SectionSchema>,
}

impl SchemaRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            registry: SchemaRegistry::default(),
        }
    }

    /// Built-in crowd simulation schemas, built once per process.
    pub fn standard() -> &'static SchemaRegistry {
        static STANDARD: OnceLock<SchemaRegistry> = OnceLock::new();
        STANDARD.get_or_init(|| {
            crate::sections::standard_registry().expect("builtin section schemas should register")
        })
    }

    pub fn schema(&self, name: &str) -> Option<&SectionSchema> {
        self.sections.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sections.keys().copied()
    }
}

pub struct RegistryBuilder {
    registry: SchemaRegistry,
}

impl RegistryBuilder {
    pub fn register(mut self, schema: SectionSchema) -> Result<Self, SchemaError> {
        let name = schema.name();
        if self.registry.sections.insert(name, schema).is_some() {
            return Err(SchemaError::DuplicateSection(name));
        }
        Ok(self)
    }

    pub fn build(self) -> SchemaRegistry {
        self.registry
    }
}
