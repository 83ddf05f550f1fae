//! Scene geometry ingestion.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crowd_schema::GeometryRecord;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read scene document {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed scene document {path:?}: {detail}")]
    Malformed { path: PathBuf, detail: String },
    #[error("scene document {path:?} has no <svg> root element")]
    MissingRoot { path: PathBuf },
}

/// Turns a scene document into tagged geometry records.
pub trait GeometryIngestor {
    fn ingest(&self, path: &Path) -> Result<Vec<GeometryRecord>, IngestError>;
}

/// Serves a fixed record list and counts how often it was asked.
#[derive(Debug, Default)]
pub struct StaticIngestor {
    records: Vec<GeometryRecord>,
    calls: Cell<usize>,
    last_path: RefCell<Option<PathBuf>>,
}

impl StaticIngestor {
    pub fn new(records: Vec<GeometryRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Path passed to the most recent `ingest` call.
    pub fn last_path(&self) -> Option<PathBuf> {
        self.last_path.borrow().clone()
    }
}

impl GeometryIngestor for StaticIngestor {
    fn ingest(&self, path: &Path) -> Result<Vec<GeometryRecord>, IngestError> {
        self.calls.set(self.calls.get() + 1);
        self.last_path.replace(Some(path.to_path_buf()));
        Ok(self.records.clone())
    }
}

const CLASS: &str = "x_csim_class";

/// Reads scene geometry out of an annotated SVG document.
///
/// Recognised shapes carry an `x_csim_class` attribute: `circle` for panic
/// sources, `line` for walls, `rect` for spawn and target areas. Anything else
/// is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgIngestor;

impl SvgIngestor {
    pub fn parse(source: &str, origin: &Path) -> Result<Vec<GeometryRecord>, IngestError> {
        let malformed = |detail: String| IngestError::Malformed {
            path: origin.to_path_buf(),
            detail,
        };

        let mut reader = Reader::from_str(source);
        let mut scene = SceneBuckets::default();
        let mut seen_root = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                    let attributes = attributes_of(&element).map_err(malformed)?;
                    let class = attributes.get(CLASS).map(String::as_str);
                    match (element.local_name().as_ref(), class) {
                        (b"svg", _) if !seen_root => {
                            seen_root = true;
                            scene.dimensions = vec![
                                GeometryRecord::width(leading_int(&attributes, "width")),
                                GeometryRecord::height(leading_int(&attributes, "height")),
                            ];
                        }
                        (b"circle", Some("panic-source")) => {
                            scene.panic_sources.push(GeometryRecord::panic_source(
                                leading_int(&attributes, "cx"),
                                leading_int(&attributes, "cy"),
                                leading_int(&attributes, "r"),
                                leading_int(&attributes, "x_csim_power"),
                            ));
                        }
                        (b"line", Some("wall")) => {
                            scene.walls.push(GeometryRecord::wall(
                                leading_int(&attributes, "x1"),
                                leading_int(&attributes, "y1"),
                                leading_int(&attributes, "x2"),
                                leading_int(&attributes, "y2"),
                            ));
                        }
                        (b"rect", Some("spawn-area")) => {
                            let [x0, y0, x1, y1] = rect_corners(&attributes).map_err(malformed)?;
                            scene.spawn_areas.push(GeometryRecord::spawn_area(
                                x0,
                                y0,
                                x1,
                                y1,
                                leading_int(&attributes, "x_csim_id"),
                            ));
                        }
                        (b"rect", Some("target-area")) => {
                            let [x0, y0, x1, y1] = rect_corners(&attributes).map_err(malformed)?;
                            let last = attributes
                                .get("x_csim_last")
                                .is_some_and(|value| value.trim() == "true");
                            scene.target_areas.push(GeometryRecord::target_area(
                                x0,
                                y0,
                                x1,
                                y1,
                                leading_int(&attributes, "x_csim_id"),
                                leading_int(&attributes, "x_csim_seq_no"),
                                last,
                            ));
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(malformed(format!(
                        "at byte {}: {err}",
                        reader.buffer_position()
                    )))
                }
            }
        }

        if !seen_root {
            return Err(IngestError::MissingRoot {
                path: origin.to_path_buf(),
            });
        }
        Ok(scene.into_records())
    }
}

impl GeometryIngestor for SvgIngestor {
    fn ingest(&self, path: &Path) -> Result<Vec<GeometryRecord>, IngestError> {
        let source = fs::read_to_string(path).map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let records = Self::parse(&source, path)?;
        tracing::debug!(
            target: "crowd_sim::scene",
            path = %path.display(),
            records = records.len(),
            "scene.parsed"
        );
        Ok(records)
    }
}

#[derive(Default)]
struct SceneBuckets {
    dimensions: Vec<GeometryRecord>,
    panic_sources: Vec<GeometryRecord>,
    walls: Vec<GeometryRecord>,
    spawn_areas: Vec<GeometryRecord>,
    target_areas: Vec<GeometryRecord>,
}

impl SceneBuckets {
    fn into_records(self) -> Vec<GeometryRecord> {
        let mut records = self.dimensions;
        records.extend(self.panic_sources);
        records.extend(self.walls);
        records.extend(self.spawn_areas);
        records.extend(self.target_areas);
        records
    }
}

fn attributes_of(element: &BytesStart<'_>) -> Result<HashMap<String, String>, String> {
    element
        .attributes()
        .map(|attribute| {
            let attribute = attribute.map_err(|err| err.to_string())?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|err| err.to_string())?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

fn rect_corners(attributes: &HashMap<String, String>) -> Result<[i64; 4], String> {
    let far = |origin: &str, extent: &str| {
        leading_int(attributes, origin)
            .checked_add(leading_int(attributes, extent))
            .ok_or_else(|| format!("rect `{origin}` + `{extent}` overflows"))
    };
    Ok([
        leading_int(attributes, "x"),
        leading_int(attributes, "y"),
        far("x", "width")?,
        far("y", "height")?,
    ])
}

/// Integer prefix of an attribute: `"12.7px"` reads as 12, missing or
/// non-numeric as 0.
fn leading_int(attributes: &HashMap<String, String>, name: &str) -> i64 {
    let Some(text) = attributes.get(name) else {
        return 0;
    };
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, digit| {
            acc.saturating_mul(10).saturating_add(i64::from(digit - b'0'))
        });
    if negative {
        -magnitude
    } else {
        magnitude
    }
}
