use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("failed to parse simulation description: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read simulation description from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("simulation description must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },
}

/// An author's simulation description: the root block plus the directory
/// relative scene paths are looked up in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationDescription {
    root: JsonMap<String, JsonValue>,
    base_dir: Option<PathBuf>,
}

impl SimulationDescription {
    pub fn new(root: JsonMap<String, JsonValue>) -> Self {
        Self {
            root,
            base_dir: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, DescriptionError> {
        match serde_json::from_str(json)? {
            JsonValue::Object(root) => Ok(Self::new(root)),
            other => Err(DescriptionError::NotAnObject {
                found: json_kind(&other),
            }),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, DescriptionError> {
        let contents = fs::read_to_string(path).map_err(|source| DescriptionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let description = Self::from_json_str(&contents)?;
        Ok(description.with_base_dir(path.parent().map(Path::to_path_buf)))
    }

    pub fn with_base_dir(mut self, base_dir: Option<PathBuf>) -> Self {
        self.base_dir = base_dir;
        self
    }

    pub fn root(&self) -> &JsonMap<String, JsonValue> {
        &self.root
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
