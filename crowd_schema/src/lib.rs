//! Wire contract shared by the parameter compiler and its consumers.
//!
//! Every record starts with a one byte section id followed by a big-endian
//! `u16` element id. Integer and coordinate payloads are big-endian, floating
//! payloads are little-endian IEEE-754 doubles. A compiled document begins
//! with a single byte holding the [`SimulationType`] code.

use serde::{Deserialize, Serialize};

mod decode;
mod wire;

pub use decode::{decode_document, DecodeError, DecodedDocument, EndTime, Record};
pub use wire::{RecordWriter, WireError};

/// Top-level section identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum SectionId {
    Scene = 0x01,
    Time = 0x02,
    Spawn = 0x03,
    Forces = 0x04,
    Fov = 0x05,
    DensityMap = 0x06,
}

impl SectionId {
    pub const ALL: [SectionId; 6] = [
        SectionId::Scene,
        SectionId::Time,
        SectionId::Spawn,
        SectionId::Forces,
        SectionId::Fov,
        SectionId::DensityMap,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            SectionId::Scene => "scene",
            SectionId::Time => "time",
            SectionId::Spawn => "spawn",
            SectionId::Forces => "forces",
            SectionId::Fov => "fov",
            SectionId::DensityMap => "density_map",
        }
    }
}

pub mod scene {
    pub const WALL: u16 = 0x01;
    pub const SPAWN_AREA: u16 = 0x02;
    pub const TARGET_AREA: u16 = 0x03;
    pub const PANIC_SOURCE: u16 = 0x04;
    pub const WIDTH: u16 = 0x11;
    pub const HEIGHT: u16 = 0x12;
    pub const SCALE: u16 = 0x13;
    pub const FILE_NAME: u16 = 0xFF;
}

pub mod time {
    pub const END_TIME: u16 = 0x01;
    pub const TICK: u16 = 0x02;
    /// `end_time` payload meaning "run forever".
    pub const END_TIME_INFINITE: u32 = u32::MAX;
}

pub mod spawn {
    pub const RATE: u16 = 0x01;
    pub const TIME: u16 = 0x02;
}

/// Forces elements carry the subsection in the high byte.
pub mod forces {
    pub const REPULSION: u8 = 0x01;
    pub const TARGET: u8 = 0x02;

    pub const REPULSION_COEFF: u16 = element(REPULSION, 0x01);
    pub const TARGET_SPEED: u16 = element(TARGET, 0x01);

    pub const fn element(subsection: u8, field: u8) -> u16 {
        ((subsection as u16) << 8) | field as u16
    }

    pub const fn subsection(element: u16) -> u8 {
        (element >> 8) as u8
    }
}

pub mod fov {
    pub const FORWARD: u16 = 0x01;
    pub const BACKWARD: u16 = 0x02;
}

pub mod density_map {
    pub const ENABLED: u16 = 0x01;
    pub const MIN_THRESHOLD: u16 = 0x02;
    pub const MAX_THRESHOLD: u16 = 0x03;
}

/// Every (section, element) pair whose payload is a distribution record.
pub const DISTRIBUTION_SLOTS: [(SectionId, u16); 5] = [
    (SectionId::Spawn, spawn::TIME),
    (SectionId::Forces, forces::REPULSION_COEFF),
    (SectionId::Forces, forces::TARGET_SPEED),
    (SectionId::Fov, fov::FORWARD),
    (SectionId::Fov, fov::BACKWARD),
];

pub fn is_distribution_slot(section: SectionId, element: u16) -> bool {
    DISTRIBUTION_SLOTS
        .iter()
        .any(|&(slot_section, slot_element)| slot_section == section && slot_element == element)
}

/// Leading document byte. Zero is reserved so an empty or zeroed buffer is
/// never mistaken for a valid document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SimulationType {
    Flow = 0x01,
    Escape = 0x02,
}

impl SimulationType {
    pub const ALL: [SimulationType; 2] = [SimulationType::Flow, SimulationType::Escape];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            SimulationType::Flow => "flow",
            SimulationType::Escape => "escape",
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl Default for SimulationType {
    fn default() -> Self {
        SimulationType::Flow
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DistributionKind {
    Uniform = 0x01,
    Normal = 0x02,
    TimeInfinite = 0x03,
}

impl DistributionKind {
    pub const ALL: [DistributionKind; 3] = [
        DistributionKind::Uniform,
        DistributionKind::Normal,
        DistributionKind::TimeInfinite,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            DistributionKind::Uniform => "uniform",
            DistributionKind::Normal => "normal",
            DistributionKind::TimeInfinite => "time_infinite",
        }
    }

    /// Parameter names in wire order.
    pub fn parameters(self) -> [&'static str; 2] {
        match self {
            DistributionKind::Uniform => ["from", "to"],
            DistributionKind::Normal => ["mean", "std_deviation"],
            DistributionKind::TimeInfinite => ["avg_rate", "rate_deviation"],
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// A fully resolved random-parameter distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum DistributionValue {
    Uniform { from: f64, to: f64 },
    Normal { mean: f64, std_deviation: f64 },
    TimeInfinite { avg_rate: f64, rate_deviation: f64 },
}

impl DistributionValue {
    pub fn new(kind: DistributionKind, first: f64, second: f64) -> Self {
        match kind {
            DistributionKind::Uniform => DistributionValue::Uniform {
                from: first,
                to: second,
            },
            DistributionKind::Normal => DistributionValue::Normal {
                mean: first,
                std_deviation: second,
            },
            DistributionKind::TimeInfinite => DistributionValue::TimeInfinite {
                avg_rate: first,
                rate_deviation: second,
            },
        }
    }

    pub fn kind(&self) -> DistributionKind {
        match self {
            DistributionValue::Uniform { .. } => DistributionKind::Uniform,
            DistributionValue::Normal { .. } => DistributionKind::Normal,
            DistributionValue::TimeInfinite { .. } => DistributionKind::TimeInfinite,
        }
    }

    pub fn parameters(&self) -> (f64, f64) {
        match *self {
            DistributionValue::Uniform { from, to } => (from, to),
            DistributionValue::Normal {
                mean,
                std_deviation,
            } => (mean, std_deviation),
            DistributionValue::TimeInfinite {
                avg_rate,
                rate_deviation,
            } => (avg_rate, rate_deviation),
        }
    }
}

/// Width of a single geometry tuple member on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    U8,
    U16,
}

impl FieldWidth {
    pub fn max(self) -> i64 {
        match self {
            FieldWidth::U8 => u8::MAX as i64,
            FieldWidth::U16 => u16::MAX as i64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryTag {
    #[serde(rename = "width")]
    Width,
    #[serde(rename = "height")]
    Height,
    #[serde(rename = "panic-source")]
    PanicSource,
    #[serde(rename = "wall")]
    Wall,
    #[serde(rename = "spawn-area")]
    SpawnArea,
    #[serde(rename = "target-area")]
    TargetArea,
}

impl GeometryTag {
    pub const ALL: [GeometryTag; 6] = [
        GeometryTag::Width,
        GeometryTag::Height,
        GeometryTag::PanicSource,
        GeometryTag::Wall,
        GeometryTag::SpawnArea,
        GeometryTag::TargetArea,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GeometryTag::Width => "width",
            GeometryTag::Height => "height",
            GeometryTag::PanicSource => "panic-source",
            GeometryTag::Wall => "wall",
            GeometryTag::SpawnArea => "spawn-area",
            GeometryTag::TargetArea => "target-area",
        }
    }

    pub fn from_str_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == tag)
    }

    pub fn element(self) -> u16 {
        match self {
            GeometryTag::Width => scene::WIDTH,
            GeometryTag::Height => scene::HEIGHT,
            GeometryTag::PanicSource => scene::PANIC_SOURCE,
            GeometryTag::Wall => scene::WALL,
            GeometryTag::SpawnArea => scene::SPAWN_AREA,
            GeometryTag::TargetArea => scene::TARGET_AREA,
        }
    }

    pub fn from_element(element: u16) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.element() == element)
    }

    /// Wire width of every tuple member, in order.
    pub fn layout(self) -> &'static [FieldWidth] {
        use FieldWidth::{U16, U8};
        match self {
            GeometryTag::Width | GeometryTag::Height => &[U16],
            GeometryTag::PanicSource => &[U16, U16, U16, U8],
            GeometryTag::Wall => &[U16, U16, U16, U16],
            GeometryTag::SpawnArea => &[U16, U16, U16, U16, U8],
            GeometryTag::TargetArea => &[U16, U16, U16, U16, U8, U8],
        }
    }

    pub fn arity(self) -> usize {
        self.layout().len()
    }
}

/// One tagged geometry tuple as produced by scene ingestion.
///
/// Target areas pack their ordering sequence number and the "is last" flag
/// into the final member as `seq << 1 | last`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryRecord {
    pub tag: GeometryTag,
    pub values: Vec<i64>,
}

impl GeometryRecord {
    pub fn new(tag: GeometryTag, values: Vec<i64>) -> Self {
        Self { tag, values }
    }

    pub fn width(width: i64) -> Self {
        Self::new(GeometryTag::Width, vec![width])
    }

    pub fn height(height: i64) -> Self {
        Self::new(GeometryTag::Height, vec![height])
    }

    pub fn wall(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        Self::new(GeometryTag::Wall, vec![x0, y0, x1, y1])
    }

    pub fn panic_source(x: i64, y: i64, radius: i64, power: i64) -> Self {
        Self::new(GeometryTag::PanicSource, vec![x, y, radius, power])
    }

    pub fn spawn_area(x0: i64, y0: i64, x1: i64, y1: i64, id: i64) -> Self {
        Self::new(GeometryTag::SpawnArea, vec![x0, y0, x1, y1, id])
    }

    pub fn target_area(
        x0: i64,
        y0: i64,
        x1: i64,
        y1: i64,
        id: i64,
        sequence_no: i64,
        last: bool,
    ) -> Self {
        let packed = (sequence_no << 1) | i64::from(last);
        Self::new(GeometryTag::TargetArea, vec![x0, y0, x1, y1, id, packed])
    }

    /// Copy with every member clamped into its wire width.
    pub fn clamped(&self) -> Self {
        let values = self
            .values
            .iter()
            .zip(self.tag.layout())
            .map(|(&value, width)| value.clamp(0, width.max()))
            .collect();
        Self::new(self.tag, values)
    }

    /// Sequence number and last flag of a target area.
    pub fn target_sequence(&self) -> Option<(u8, bool)> {
        if self.tag != GeometryTag::TargetArea {
            return None;
        }
        let packed = *self.values.get(5)? as u8;
        Some((packed >> 1, packed & 0x01 == 0x01))
    }
}
