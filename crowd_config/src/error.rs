use crowd_schema::WireError;
use thiserror::Error;

use crate::ingest::IngestError;

/// Fatal compilation failures. Every variant names the offending path.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unknown section type '{name}' requested by {path}")]
    UnknownSectionType { name: String, path: String },
    #[error("unknown distribution '{kind}' at {path}")]
    UnknownDistribution { kind: String, path: String },
    #[error("unknown value '{value}' for {path}")]
    UnknownEnumValue { value: String, path: String },
    #[error("reference '{expr}' in {path} does not resolve")]
    UnresolvedReference { expr: String, path: String },
    #[error("malformed reference '{expr}' in {path}")]
    MalformedReference { expr: String, path: String },
    #[error("cyclic reference while resolving {path}")]
    CyclicReference { path: String },
    #[error("unknown field '{field}' in {section}")]
    UnknownField { field: String, section: String },
    #[error("missing required field {path}")]
    MissingField { path: String },
    #[error("invalid value for {path}: expected {expected}, found {found}")]
    InvalidValue {
        path: String,
        expected: &'static str,
        found: String,
    },
    #[error("value {value} for {path} is out of range: {detail}")]
    ValueOutOfRange {
        path: String,
        value: String,
        detail: &'static str,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: WireError,
    },
    #[error("failed to ingest scene for {path}: {source}")]
    Ingest {
        path: String,
        #[source]
        source: IngestError,
    },
}

/// Join a section path and a field name.
pub(crate) fn field_path(section: &str, field: &str) -> String {
    if section.is_empty() {
        field.to_string()
    } else {
        format!("{section}.{field}")
    }
}
