//! Named field transforms and the side values they stash.

use crate::compiler::CompileEnv;
use crate::error::CompileError;
use crate::schema::CustomParser;
use crate::value::{Raw, Value};

pub const SCENE_FILE: &str = "scene_file";
pub const GEOMETRY: &str = "geometry";

pub(crate) struct CustomOutput {
    pub value: Value,
    pub stash: Vec<(&'static str, Value)>,
}

impl CustomParser {
    /// Side values written to the node when the parser runs.
    pub fn stashed_fields(self) -> &'static [&'static str] {
        match self {
            CustomParser::SceneFile => &[SCENE_FILE, GEOMETRY],
        }
    }

    pub(crate) fn invoke(
        self,
        path: &str,
        raw: &Raw<'_>,
        env: &CompileEnv<'_>,
    ) -> Result<CustomOutput, CompileError> {
        match self {
            CustomParser::SceneFile => read_scene_file(path, raw, env),
        }
    }
}

fn read_scene_file(
    path: &str,
    raw: &Raw<'_>,
    env: &CompileEnv<'_>,
) -> Result<CustomOutput, CompileError> {
    let file = raw.to_text().ok_or_else(|| CompileError::InvalidValue {
        path: path.to_string(),
        expected: "scene file path",
        found: raw.describe(),
    })?;
    let location = env.scene_path(&file);
    let records = env
        .ingestor
        .ingest(&location)
        .map_err(|source| CompileError::Ingest {
            path: path.to_string(),
            source,
        })?;
    tracing::debug!(
        target: "crowd_sim::scene",
        file = %location.display(),
        records = records.len(),
        "scene.ingested"
    );
    Ok(CustomOutput {
        value: Value::Str(file.clone()),
        stash: vec![(SCENE_FILE, Value::Str(file)), (GEOMETRY, Value::Geometry(records))],
    })
}
