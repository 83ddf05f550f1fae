//! Reader for compiled documents, used by inspection tooling and tests.

use serde::Serialize;
use thiserror::Error;

use crate::{
    density_map, is_distribution_slot, scene, spawn, time, DistributionKind, DistributionValue,
    FieldWidth, GeometryRecord, GeometryTag, SectionId, SimulationType,
};

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("document is empty")]
    Empty,
    #[error("truncated record at offset {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },
    #[error("unknown simulation type code {code:#04x}")]
    UnknownSimulationType { code: u8 },
    #[error("unknown section {section:#04x} at offset {offset}")]
    UnknownSection { section: u8, offset: usize },
    #[error("unknown element {element:#06x} in section {section:?}")]
    UnknownElement { section: SectionId, element: u16 },
    #[error("unknown distribution code {code:#04x} at offset {offset}")]
    UnknownDistribution { code: u8, offset: usize },
    #[error("invalid UTF-8 in text at offset {offset}")]
    InvalidText { offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndTime {
    Finite(u32),
    Infinite,
}

/// A single decoded record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum Record {
    Geometry(GeometryRecord),
    SceneFile { name: String },
    SceneScale { scale: f64 },
    EndTime { end_time: EndTime },
    Tick { tick: f64 },
    SpawnRate { rate: f64 },
    Distribution {
        section: SectionId,
        element: u16,
        value: DistributionValue,
    },
    DensityMapEnabled { enabled: bool },
    DensityMapMinThreshold { threshold: f64 },
    DensityMapMaxThreshold { threshold: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedDocument {
    pub simulation_type: SimulationType,
    pub records: Vec<Record>,
}

impl DecodedDocument {
    pub fn distribution(&self, section: SectionId, element: u16) -> Option<DistributionValue> {
        self.records.iter().find_map(|record| match record {
            Record::Distribution {
                section: found_section,
                element: found_element,
                value,
            } if *found_section == section && *found_element == element => Some(*value),
            _ => None,
        })
    }

    pub fn geometry(&self) -> impl Iterator<Item = &GeometryRecord> {
        self.records.iter().filter_map(|record| match record {
            Record::Geometry(geometry) => Some(geometry),
            _ => None,
        })
    }
}

pub fn decode_document(bytes: &[u8]) -> Result<DecodedDocument, DecodeError> {
    let mut cursor = Cursor { bytes, offset: 0 };
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let type_code = cursor.u8()?;
    let simulation_type = SimulationType::from_code(type_code)
        .ok_or(DecodeError::UnknownSimulationType { code: type_code })?;

    let mut records = Vec::new();
    while !cursor.is_done() {
        records.push(decode_record(&mut cursor)?);
    }

    Ok(DecodedDocument {
        simulation_type,
        records,
    })
}

fn decode_record(cursor: &mut Cursor<'_>) -> Result<Record, DecodeError> {
    let offset = cursor.offset;
    let section_code = cursor.u8()?;
    let section = SectionId::from_code(section_code).ok_or(DecodeError::UnknownSection {
        section: section_code,
        offset,
    })?;
    let element = cursor.u16()?;

    if is_distribution_slot(section, element) {
        let value = cursor.distribution()?;
        return Ok(Record::Distribution {
            section,
            element,
            value,
        });
    }

    let unknown = DecodeError::UnknownElement { section, element };
    let record = match (section, element) {
        (SectionId::Scene, scene::FILE_NAME) => Record::SceneFile {
            name: cursor.text()?,
        },
        (SectionId::Scene, scene::SCALE) => Record::SceneScale {
            scale: cursor.f64()?,
        },
        (SectionId::Scene, element) => {
            let tag = GeometryTag::from_element(element).ok_or(unknown)?;
            let values = tag
                .layout()
                .iter()
                .map(|width| match width {
                    FieldWidth::U8 => cursor.u8().map(i64::from),
                    FieldWidth::U16 => cursor.u16().map(i64::from),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Record::Geometry(GeometryRecord::new(tag, values))
        }
        (SectionId::Time, time::END_TIME) => {
            let raw = cursor.u32()?;
            let end_time = if raw == time::END_TIME_INFINITE {
                EndTime::Infinite
            } else {
                EndTime::Finite(raw)
            };
            Record::EndTime { end_time }
        }
        (SectionId::Time, time::TICK) => Record::Tick {
            tick: cursor.f64()?,
        },
        (SectionId::Spawn, spawn::RATE) => Record::SpawnRate {
            rate: cursor.f64()?,
        },
        (SectionId::DensityMap, density_map::ENABLED) => Record::DensityMapEnabled {
            enabled: cursor.u8()? != 0,
        },
        (SectionId::DensityMap, density_map::MIN_THRESHOLD) => Record::DensityMapMinThreshold {
            threshold: cursor.f64()?,
        },
        (SectionId::DensityMap, density_map::MAX_THRESHOLD) => Record::DensityMapMaxThreshold {
            threshold: cursor.f64()?,
        },
        _ => return Err(unknown),
    };
    Ok(record)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn is_done(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.bytes.len() - self.offset;
        if remaining < len {
            return Err(DecodeError::Truncated {
                offset: self.offset,
                needed: len - remaining,
            });
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn text(&mut self) -> Result<String, DecodeError> {
        let len = self.u16()? as usize;
        let offset = self.offset;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidText { offset })
    }

    fn distribution(&mut self) -> Result<DistributionValue, DecodeError> {
        let offset = self.offset;
        let code = self.u8()?;
        let kind = DistributionKind::from_code(code)
            .ok_or(DecodeError::UnknownDistribution { code, offset })?;
        let first = self.f64()?;
        let second = self.f64()?;
        Ok(DistributionValue::new(kind, first, second))
    }
}
