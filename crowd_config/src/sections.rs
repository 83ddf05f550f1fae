//! Built-in section schemas of the crowd simulation description.

use crowd_schema::{density_map, fov, forces, scene, spawn, time, SectionId, SimulationType};

use crate::schema::{
    CustomParser, DefaultValue, DistributionSlot, EnumVariant, FieldDescriptor, SchemaError,
    SchemaRegistry, SectionSchema, Wire,
};

pub const ROOT: &str = "root";
pub const SCENE: &str = "scene";
pub const TIME: &str = "time";
pub const SPAWN: &str = "spawn";
pub const FORCES: &str = "forces";
pub const FORCE_TARGET: &str = "force.target";
pub const FORCE_REPULSION: &str = "force.repulsion";
pub const FOV: &str = "fov";
pub const DENSITY_MAP: &str = "density_map";
pub const DISTRIBUTION: &str = "distribution";

pub const SIMULATION_TYPES: &[EnumVariant] = &[
    EnumVariant {
        name: "flow",
        code: SimulationType::Flow as u8,
    },
    EnumVariant {
        name: "escape",
        code: SimulationType::Escape as u8,
    },
];

pub(crate) fn standard_registry() -> Result<SchemaRegistry, SchemaError> {
    Ok(SchemaRegistry::builder()
        .register(root()?)?
        .register(scene()?)?
        .register(time()?)?
        .register(spawn()?)?
        .register(forces()?)?
        .register(force_target()?)?
        .register(force_repulsion()?)?
        .register(fov()?)?
        .register(density_map()?)?
        .register(distribution()?)?
        .build())
}

/// Sections are all optional; `type` always leads the document.
pub fn root() -> Result<SectionSchema, SchemaError> {
    SectionSchema::builder(ROOT)
        .declare_field(
            FieldDescriptor::enumeration("type", SIMULATION_TYPES)
                .with_default(DefaultValue::Str("flow"))
                .emit(Wire::LeadingByte),
        )
        .declare_field(FieldDescriptor::descendant("scene", SCENE))
        .declare_field(FieldDescriptor::descendant("time", TIME))
        .declare_field(FieldDescriptor::descendant("spawn", SPAWN))
        .declare_field(FieldDescriptor::descendant("forces", FORCES))
        .declare_field(FieldDescriptor::descendant("fov", FOV))
        .declare_field(FieldDescriptor::descendant("density_map", DENSITY_MAP))
        .build()
}

pub fn scene() -> Result<SectionSchema, SchemaError> {
    SectionSchema::builder(SCENE)
        .section(SectionId::Scene)
        .declare_field(
            FieldDescriptor::custom("file", CustomParser::SceneFile).emit(Wire::SceneFile {
                name_element: scene::FILE_NAME,
            }),
        )
        .declare_field(FieldDescriptor::float("scale").emit(Wire::Float(scene::SCALE)))
        .build()
}

pub fn time() -> Result<SectionSchema, SchemaError> {
    SectionSchema::builder(TIME)
        .section(SectionId::Time)
        .declare_field(FieldDescriptor::float("end_time").emit(Wire::Seconds(time::END_TIME)))
        .declare_field(FieldDescriptor::float("tick").emit(Wire::Float(time::TICK)))
        .build()
}

pub fn spawn() -> Result<SectionSchema, SchemaError> {
    let arrival = DistributionSlot::new(SectionId::Spawn, spawn::TIME)
        .fallback("from", DefaultValue::Float(0.0))
        .fallback("to", DefaultValue::Reference("ref:time.end_time"));
    SectionSchema::builder(SPAWN)
        .section(SectionId::Spawn)
        .declare_field(FieldDescriptor::float("rate").emit(Wire::Float(spawn::RATE)))
        .declare_field(FieldDescriptor::distribution("time", arrival))
        .build()
}

pub fn forces() -> Result<SectionSchema, SchemaError> {
    SectionSchema::builder(FORCES)
        .section(SectionId::Forces)
        .declare_field(FieldDescriptor::descendant("target", FORCE_TARGET))
        .declare_field(FieldDescriptor::descendant("repulsion", FORCE_REPULSION))
        .build()
}

pub fn force_target() -> Result<SectionSchema, SchemaError> {
    SectionSchema::builder(FORCE_TARGET)
        .section(SectionId::Forces)
        .declare_field(FieldDescriptor::distribution(
            "speed",
            DistributionSlot::new(SectionId::Forces, forces::TARGET_SPEED),
        ))
        .build()
}

pub fn force_repulsion() -> Result<SectionSchema, SchemaError> {
    SectionSchema::builder(FORCE_REPULSION)
        .section(SectionId::Forces)
        .declare_field(FieldDescriptor::distribution(
            "coeff",
            DistributionSlot::new(SectionId::Forces, forces::REPULSION_COEFF),
        ))
        .build()
}

pub fn fov() -> Result<SectionSchema, SchemaError> {
    SectionSchema::builder(FOV)
        .section(SectionId::Fov)
        .declare_field(FieldDescriptor::distribution(
            "forward",
            DistributionSlot::new(SectionId::Fov, fov::FORWARD),
        ))
        .declare_field(FieldDescriptor::distribution(
            "backward",
            DistributionSlot::new(SectionId::Fov, fov::BACKWARD),
        ))
        .build()
}

pub fn density_map() -> Result<SectionSchema, SchemaError> {
    SectionSchema::builder(DENSITY_MAP)
        .section(SectionId::DensityMap)
        .declare_field(FieldDescriptor::boolean("enabled").emit(Wire::Flag(density_map::ENABLED)))
        .declare_field(
            FieldDescriptor::float("min_threshold").emit(Wire::Float(density_map::MIN_THRESHOLD)),
        )
        .declare_field(
            FieldDescriptor::float("max_threshold").emit(Wire::Float(density_map::MAX_THRESHOLD)),
        )
        .build()
}

/// Parameters of every distribution kind; the slot supplies the wire coordinate.
pub fn distribution() -> Result<SectionSchema, SchemaError> {
    SectionSchema::builder(DISTRIBUTION)
        .declare_field(FieldDescriptor::string("distribution"))
        .declare_field(FieldDescriptor::float("from").with_default(DefaultValue::Float(0.0)))
        .declare_field(FieldDescriptor::float("to").with_default(DefaultValue::Float(0.0)))
        .declare_field(FieldDescriptor::float("mean").with_default(DefaultValue::Float(0.0)))
        .declare_field(
            FieldDescriptor::float("std_deviation").with_default(DefaultValue::Float(0.0)),
        )
        .declare_field(FieldDescriptor::float("avg_rate").with_default(DefaultValue::Float(0.0)))
        .declare_field(
            FieldDescriptor::float("rate_deviation").with_default(DefaultValue::Float(0.0)),
        )
        .build()
}
