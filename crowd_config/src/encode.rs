//! Serialises a resolved section tree into the binary document.

use crowd_schema::{time::END_TIME_INFINITE, GeometryRecord, RecordWriter};

use crate::custom::GEOMETRY;
use crate::error::CompileError;
use crate::node::{Child, SectionNode};
use crate::reference::Resolver;
use crate::schema::Wire;
use crate::value::Value;

/// Own records in declaration order, then every supplied child in declaration order.
pub(crate) fn encode_node(
    node: &SectionNode<'_>,
    resolver: &Resolver<'_>,
    writer: &mut RecordWriter,
) -> Result<(), CompileError> {
    let schema = node.schema();
    for (index, field) in schema.fields().iter().enumerate() {
        if field.wire == Wire::Skip {
            continue;
        }
        let path = node.field_path(field.name);
        let value = node.resolve_index(index, resolver)?;

        if field.wire == Wire::LeadingByte {
            let code = value.enum_code().ok_or_else(|| invalid(&path, "enum", &value))?;
            writer.put_u8(code);
            continue;
        }

        let section = schema.section().ok_or_else(|| CompileError::InvalidValue {
            path: path.clone(),
            expected: "section with a wire id",
            found: schema.name().to_string(),
        })?;
        match field.wire {
            Wire::Flag(element) => {
                let flag = value.as_bool().ok_or_else(|| invalid(&path, "boolean", &value))?;
                writer.flag(section, element, flag);
            }
            Wire::Float(element) => {
                let number = value.as_float().ok_or_else(|| invalid(&path, "number", &value))?;
                writer.float(section, element, number);
            }
            Wire::Seconds(element) => {
                let number = value.as_float().ok_or_else(|| invalid(&path, "number", &value))?;
                writer.seconds(section, element, seconds_payload(&path, number)?);
            }
            Wire::SceneFile { name_element } => {
                let name = value.as_str().ok_or_else(|| invalid(&path, "string", &value))?;
                encode_geometry(node, resolver, writer)?;
                writer
                    .text(section, name_element, name)
                    .map_err(|source| CompileError::Encode { path, source })?;
            }
            Wire::Skip | Wire::LeadingByte => {}
        }
    }

    for child in node.children() {
        match child {
            Child::Section(section) => encode_node(section, resolver, writer)?,
            Child::Distribution(distribution) => distribution.encode(resolver, writer)?,
        }
    }
    Ok(())
}

fn encode_geometry(
    node: &SectionNode<'_>,
    resolver: &Resolver<'_>,
    writer: &mut RecordWriter,
) -> Result<(), CompileError> {
    let Some(Value::Geometry(records)) = node.stashed(GEOMETRY) else {
        return Ok(());
    };
    let path = node.field_path(GEOMETRY);
    let clamp = resolver.env().settings.scene.clamp_coordinates;
    for record in &records {
        let record = if clamp { clamp_record(&path, record) } else { record.clone() };
        writer
            .geometry(&record)
            .map_err(|source| CompileError::Encode {
                path: path.clone(),
                source,
            })?;
    }
    Ok(())
}

fn clamp_record(path: &str, record: &GeometryRecord) -> GeometryRecord {
    let clamped = record.clamped();
    if clamped != *record {
        tracing::warn!(
            target: "crowd_sim::scene",
            field = path,
            tag = record.tag.as_str(),
            original = ?record.values,
            clamped = ?clamped.values,
            "geometry.clamped"
        );
    }
    clamped
}

/// `+inf` is the sentinel; anything else must round into `0..sentinel`.
fn seconds_payload(path: &str, seconds: f64) -> Result<u32, CompileError> {
    if seconds == f64::INFINITY {
        return Ok(END_TIME_INFINITE);
    }
    let rounded = seconds.round();
    if !(0.0..f64::from(END_TIME_INFINITE)).contains(&rounded) {
        return Err(CompileError::ValueOutOfRange {
            path: path.to_string(),
            value: seconds.to_string(),
            detail: "seconds must round into 0..4294967295 or be infinity",
        });
    }
    Ok(rounded as u32)
}

fn invalid(path: &str, expected: &'static str, found: &Value) -> CompileError {
    CompileError::InvalidValue {
        path: path.to_string(),
        expected,
        found: found.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_round_half_away_from_zero() {
        assert_eq!(seconds_payload("time.end_time", 20.0).unwrap(), 20);
        assert_eq!(seconds_payload("time.end_time", 19.5).unwrap(), 20);
        assert_eq!(seconds_payload("time.end_time", 19.49).unwrap(), 19);
        assert_eq!(
            seconds_payload("time.end_time", f64::INFINITY).unwrap(),
            END_TIME_INFINITE
        );
    }

    #[test]
    fn seconds_outside_the_payload_are_rejected() {
        for seconds in [-1.0, f64::NEG_INFINITY, f64::NAN, 4_294_967_295.0] {
            let err = seconds_payload("time.end_time", seconds).unwrap_err();
            assert!(matches!(err, CompileError::ValueOutOfRange { .. }), "{seconds}");
        }
        assert_eq!(
            seconds_payload("time.end_time", 4_294_967_294.0).unwrap(),
            4_294_967_294
        );
    }
}
