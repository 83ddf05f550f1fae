use thiserror::Error;

use crate::{DistributionValue, FieldWidth, GeometryRecord, GeometryTag, SectionId, SimulationType};

#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    #[error("text of {len} bytes exceeds the u16 length prefix")]
    TextTooLong { len: usize },
    #[error("{tag:?} expects {expected} values, found {found}")]
    ArityMismatch {
        tag: GeometryTag,
        expected: usize,
        found: usize,
    },
    #[error("{tag:?} value #{index} = {value} does not fit in {width:?}")]
    OutOfRange {
        tag: GeometryTag,
        index: usize,
        value: i64,
        width: FieldWidth,
    },
}

/// Append-only builder for a compiled document.
#[derive(Debug, Default)]
pub struct RecordWriter {
    buffer: Vec<u8>,
    records: usize,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            records: 0,
        }
    }

    /// Number of section records written so far (the leading type byte is not
    /// a record).
    pub fn record_count(&self) -> usize {
        self.records
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }

    pub fn simulation_type(&mut self, kind: SimulationType) -> &mut Self {
        self.buffer.push(kind.code());
        self
    }

    /// Start a record; the payload follows through the `put_*` calls.
    pub fn begin(&mut self, section: SectionId, element: u16) -> &mut Self {
        self.records += 1;
        self.buffer.push(section.code());
        self.buffer.extend_from_slice(&element.to_be_bytes());
        self
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_f64(&mut self, value: f64) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_text(&mut self, text: &str) -> Result<&mut Self, WireError> {
        let len = u16::try_from(text.len())
            .map_err(|_| WireError::TextTooLong { len: text.len() })?;
        self.put_u16(len);
        self.buffer.extend_from_slice(text.as_bytes());
        Ok(self)
    }

    pub fn flag(&mut self, section: SectionId, element: u16, value: bool) -> &mut Self {
        self.begin(section, element).put_u8(u8::from(value))
    }

    pub fn float(&mut self, section: SectionId, element: u16, value: f64) -> &mut Self {
        self.begin(section, element).put_f64(value)
    }

    pub fn seconds(&mut self, section: SectionId, element: u16, value: u32) -> &mut Self {
        self.begin(section, element).put_u32(value)
    }

    pub fn text(
        &mut self,
        section: SectionId,
        element: u16,
        text: &str,
    ) -> Result<&mut Self, WireError> {
        // Validate before the header goes out so a failure leaves no stray bytes.
        if text.len() > u16::MAX as usize {
            return Err(WireError::TextTooLong { len: text.len() });
        }
        self.begin(section, element).put_text(text)
    }

    pub fn distribution(
        &mut self,
        section: SectionId,
        element: u16,
        value: &DistributionValue,
    ) -> &mut Self {
        let (first, second) = value.parameters();
        self.begin(section, element)
            .put_u8(value.kind().code())
            .put_f64(first)
            .put_f64(second)
    }

    /// Write one scene geometry record, checking arity and member widths.
    pub fn geometry(&mut self, record: &GeometryRecord) -> Result<&mut Self, WireError> {
        let layout = record.tag.layout();
        if record.values.len() != layout.len() {
            return Err(WireError::ArityMismatch {
                tag: record.tag,
                expected: layout.len(),
                found: record.values.len(),
            });
        }
        for (index, (&value, &width)) in record.values.iter().zip(layout).enumerate() {
            if !(0..=width.max()).contains(&value) {
                return Err(WireError::OutOfRange {
                    tag: record.tag,
                    index,
                    value,
                    width,
                });
            }
        }

        self.begin(SectionId::Scene, record.tag.element());
        for (&value, &width) in record.values.iter().zip(layout) {
            match width {
                FieldWidth::U8 => self.put_u8(value as u8),
                FieldWidth::U16 => self.put_u16(value as u16),
            };
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{forces, time, DistributionKind};

    #[test]
    fn header_is_section_byte_and_big_endian_element() {
        let mut writer = RecordWriter::new();
        writer.seconds(SectionId::Time, time::END_TIME, 20);
        assert_eq!(writer.as_bytes(), &[0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x14]);
        assert_eq!(writer.record_count(), 1);
    }

    #[test]
    fn floats_are_little_endian_doubles() {
        let mut writer = RecordWriter::new();
        writer.float(SectionId::Spawn, 0x01, 0.5);
        assert_eq!(
            writer.as_bytes(),
            &[0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xE0, 0x3F]
        );
    }

    #[test]
    fn distribution_record_layout() {
        let mut writer = RecordWriter::new();
        let value = DistributionValue::new(DistributionKind::Uniform, 0.0, 5.0);
        writer.distribution(SectionId::Forces, forces::TARGET_SPEED, &value);
        let bytes = writer.finish();
        assert_eq!(&bytes[..4], &[0x04, 0x02, 0x01, 0x01]);
        assert_eq!(bytes.len(), 4 + 16);
        assert_eq!(&bytes[12..], &5.0f64.to_le_bytes());
    }

    #[test]
    fn text_is_length_prefixed() {
        let mut writer = RecordWriter::new();
        writer
            .text(SectionId::Scene, 0xFF, "a.svg")
            .expect("short text");
        assert_eq!(
            writer.as_bytes(),
            &[0x01, 0x00, 0xFF, 0x00, 0x05, b'a', b'.', b's', b'v', b'g']
        );
    }

    #[test]
    fn overlong_text_leaves_buffer_untouched() {
        let mut writer = RecordWriter::new();
        let text = "x".repeat(70_000);
        let err = writer.text(SectionId::Scene, 0xFF, &text).unwrap_err();
        assert_eq!(err, WireError::TextTooLong { len: 70_000 });
        assert!(writer.is_empty());
        assert_eq!(writer.record_count(), 0);
    }

    #[test]
    fn geometry_checks_member_widths() {
        let mut writer = RecordWriter::new();
        let err = writer
            .geometry(&GeometryRecord::spawn_area(0, 0, 10, 10, 300))
            .unwrap_err();
        assert!(matches!(err, WireError::OutOfRange { index: 4, .. }));
        assert!(writer.is_empty());

        writer
            .geometry(&GeometryRecord::wall(0, 0, 10, 0))
            .expect("wall fits");
        assert_eq!(
            writer.as_bytes(),
            &[0x01, 0x00, 0x01, 0, 0, 0, 0, 0, 10, 0, 0]
        );
    }
}
