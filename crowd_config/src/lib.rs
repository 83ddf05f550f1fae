//! Crowd simulation parameter compiler.
//!
//! A [`SimulationDescription`] (JSON) is turned into a tree of [`SectionNode`]s
//! driven by the static tables of a [`SchemaRegistry`]. Fields resolve lazily
//! (author input, slot fallbacks, declared defaults, `ref:` expressions) and
//! are cached per node. The [`Compiler`] then walks the tree in declaration
//! order and writes the binary document defined by `crowd_schema`.

pub mod compiler;
pub mod custom;
pub mod description;
pub mod distribution;
mod encode;
pub mod error;
pub mod hashing;
pub mod ingest;
pub mod node;
pub mod reference;
pub mod schema;
pub mod sections;
pub mod settings;
pub mod value;

pub use compiler::{CompileEnv, CompiledDocument, Compiler};
pub use description::{DescriptionError, SimulationDescription};
pub use distribution::DistributionNode;
pub use error::CompileError;
pub use hashing::{document_digest, FnvHasher};
pub use ingest::{GeometryIngestor, IngestError, StaticIngestor, SvgIngestor};
pub use node::{Child, SectionNode};
pub use reference::{is_reference, Reference, Resolver, Segment};
pub use schema::{
    CustomParser, DefaultValue, DistributionSlot, EnumVariant, FieldDescriptor, FieldKind,
    SchemaError, SchemaRegistry, SectionSchema, Wire,
};
pub use settings::{
    load_settings, load_settings_from_env, CompilerSettings, SettingsError, SettingsMetadata,
};
pub use value::Value;
