use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crowd_schema::RecordWriter;

use crate::description::SimulationDescription;
use crate::encode::encode_node;
use crate::error::CompileError;
use crate::hashing::document_digest;
use crate::ingest::GeometryIngestor;
use crate::node::SectionNode;
use crate::reference::Resolver;
use crate::schema::SchemaRegistry;
use crate::sections::ROOT;
use crate::settings::CompilerSettings;

/// Everything a compilation reads besides the tree itself.
#[derive(Clone, Copy)]
pub struct CompileEnv<'a> {
    pub settings: &'a CompilerSettings,
    pub ingestor: &'a dyn GeometryIngestor,
    /// Directory of the description file, when it came from one.
    pub base_dir: Option<&'a Path>,
}

impl CompileEnv<'_> {
    /// Where the ingestor should look for `file`.
    pub fn scene_path(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        match self.base_dir {
            Some(base) if path.is_relative() && self.settings.scene.resolve_relative_to_document => {
                base.join(path)
            }
            _ => path.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDocument {
    pub bytes: Vec<u8>,
    /// Section records, not counting the leading type byte.
    pub record_count: usize,
    pub digest: u64,
}

/// Compiles simulation descriptions into binary documents.
///
/// Holds no per-run state: each `compile` builds a fresh tree and drops it.
pub struct Compiler<'i> {
    settings: Arc<CompilerSettings>,
    registry: &'i SchemaRegistry,
    ingestor: &'i dyn GeometryIngestor,
}

impl<'i> Compiler<'i> {
    pub fn new(ingestor: &'i dyn GeometryIngestor) -> Self {
        Self {
            settings: Arc::new(CompilerSettings::default()),
            registry: SchemaRegistry::standard(),
            ingestor,
        }
    }

    pub fn with_settings(mut self, settings: Arc<CompilerSettings>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_registry(mut self, registry: &'i SchemaRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Root node of a fresh tree; nested blocks are instantiated, fields are not.
    pub fn build<'a>(
        &'a self,
        description: &'a SimulationDescription,
    ) -> Result<SectionNode<'a>, CompileError> {
        let schema = self
            .registry
            .schema(ROOT)
            .ok_or_else(|| CompileError::UnknownSectionType {
                name: ROOT.to_string(),
                path: "<document>".to_string(),
            })?;
        SectionNode::build(
            self.registry,
            schema,
            String::new(),
            Cow::Borrowed(description.root()),
            &[],
        )
    }

    pub fn env<'a>(&'a self, description: &'a SimulationDescription) -> CompileEnv<'a> {
        CompileEnv {
            settings: &self.settings,
            ingestor: self.ingestor,
            base_dir: description.base_dir(),
        }
    }

    pub fn compile(
        &self,
        description: &SimulationDescription,
    ) -> Result<CompiledDocument, CompileError> {
        let root = self.build(description)?;
        let resolver = Resolver::new(&root, self.env(description));
        let mut writer = RecordWriter::with_capacity(256);
        if let Err(err) = encode_node(&root, &resolver, &mut writer) {
            tracing::warn!(
                target: "crowd_sim::compiler",
                error = %err,
                discarded_bytes = writer.len(),
                "document.failed"
            );
            return Err(err);
        }

        let record_count = writer.record_count();
        let bytes = writer.finish();
        let digest = document_digest(&bytes);
        tracing::info!(
            target: "crowd_sim::compiler",
            bytes = bytes.len(),
            records = record_count,
            digest = %format_args!("{digest:016x}"),
            "document.compiled"
        );
        Ok(CompiledDocument {
            bytes,
            record_count,
            digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::StaticIngestor;
    use crowd_schema::{
        decode_document, fov, forces, spawn, DistributionValue, EndTime, GeometryRecord, Record,
        SectionId, SimulationType,
    };
    use serde_json::json;

    fn description(value: serde_json::Value) -> SimulationDescription {
        SimulationDescription::from_json_str(&value.to_string()).expect("description")
    }

    fn office_geometry() -> Vec<GeometryRecord> {
        vec![
            GeometryRecord::width(640),
            GeometryRecord::height(480),
            GeometryRecord::wall(0, 0, 10, 0),
            GeometryRecord::wall(5, 5, 5, 50),
            GeometryRecord::spawn_area(10, 20, 40, 60, 3),
        ]
    }

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    #[test]
    fn time_only_document_layout() {
        let ingestor = StaticIngestor::default();
        let compiled = Compiler::new(&ingestor)
            .compile(&description(json!({ "time": { "end_time": 20, "tick": 0.5 } })))
            .expect("compiles");
        insta::assert_snapshot!(hex(&compiled.bytes), @"0102000100000014020002000000000000e03f");
        assert_eq!(compiled.record_count, 2);
    }

    #[test]
    fn empty_description_is_just_the_type_byte() {
        let ingestor = StaticIngestor::default();
        let compiled = Compiler::new(&ingestor)
            .compile(&description(json!({})))
            .expect("compiles");
        assert_eq!(compiled.bytes, vec![SimulationType::Flow.code()]);
        assert_eq!(compiled.record_count, 0);
    }

    #[test]
    fn escape_type_leads_the_document() {
        let ingestor = StaticIngestor::default();
        let compiled = Compiler::new(&ingestor)
            .compile(&description(json!({ "type": "escape" })))
            .expect("compiles");
        assert_eq!(compiled.bytes, vec![SimulationType::Escape.code()]);
    }

    #[test]
    fn unknown_type_is_fatal() {
        let ingestor = StaticIngestor::default();
        let err = Compiler::new(&ingestor)
            .compile(&description(json!({ "type": "stampede" })))
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnknownEnumValue { ref value, ref path } if value == "stampede" && path == "type"
        ));
    }

    #[test]
    fn infinite_end_time_uses_sentinel() {
        let ingestor = StaticIngestor::default();
        let compiled = Compiler::new(&ingestor)
            .compile(&description(json!({ "time": { "end_time": "infinity" } })))
            .expect("compiles");
        let document = decode_document(&compiled.bytes).expect("decodes");
        assert!(document.records.contains(&Record::EndTime {
            end_time: EndTime::Infinite
        }));
    }

    #[test]
    fn spawn_arrival_defaults_to_end_time() {
        let ingestor = StaticIngestor::default();
        let compiled = Compiler::new(&ingestor)
            .compile(&description(json!({
                "time": { "end_time": 20.0 },
                "spawn": { "rate": 1.5, "time": { "distribution": "uniform" } }
            })))
            .expect("compiles");
        let document = decode_document(&compiled.bytes).expect("decodes");
        assert_eq!(
            document.distribution(SectionId::Spawn, spawn::TIME),
            Some(DistributionValue::Uniform { from: 0.0, to: 20.0 })
        );
        assert!(document.records.contains(&Record::SpawnRate { rate: 1.5 }));
    }

    #[test]
    fn scene_records_precede_name_and_scale() {
        let ingestor = StaticIngestor::new(office_geometry());
        let compiled = Compiler::new(&ingestor)
            .compile(&description(json!({ "scene": { "file": "office.svg", "scale": 0.25 } })))
            .expect("compiles");
        let document = decode_document(&compiled.bytes).expect("decodes");
        let mut expected: Vec<Record> = office_geometry().into_iter().map(Record::Geometry).collect();
        expected.push(Record::SceneFile {
            name: "office.svg".to_string(),
        });
        expected.push(Record::SceneScale { scale: 0.25 });
        assert_eq!(document.records, expected);
    }

    #[test]
    fn geometry_references_select_first_tagged_tuple() {
        let ingestor = StaticIngestor::new(office_geometry());
        let compiler = Compiler::new(&ingestor);
        let described = description(json!({ "scene": { "file": "office.svg" } }));
        let root = compiler.build(&described).expect("builds");
        let resolver = Resolver::new(&root, compiler.env(&described));
        assert_eq!(
            resolver.must_resolve("ref:scene.geometry.[wall]").expect("wall"),
            crate::Value::Tuple(vec![0, 0, 10, 0])
        );
        assert_eq!(
            resolver.try_resolve("ref:scene.geometry.[panic-source]").expect("walks"),
            None
        );
        assert!(matches!(
            resolver.must_resolve("ref:scene.geometry.[target-area]"),
            Err(CompileError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn custom_parser_runs_once() {
        let ingestor = StaticIngestor::new(office_geometry());
        let compiler = Compiler::new(&ingestor);
        let described = description(json!({ "scene": { "file": "office.svg" } }));
        let root = compiler.build(&described).expect("builds");
        let resolver = Resolver::new(&root, compiler.env(&described));
        let scene = root.child("scene").expect("scene");
        let first = scene.resolve("file", &resolver).expect("file");
        let second = scene.resolve("file", &resolver).expect("file");
        assert_eq!(first, second);
        resolver.must_resolve("ref:scene.geometry").expect("geometry");
        resolver.must_resolve("ref:scene.scene_file").expect("scene file");
        assert_eq!(ingestor.calls(), 1);
    }

    #[test]
    fn compile_ingests_once_even_when_referenced() {
        let ingestor = StaticIngestor::new(office_geometry());
        let compiled = Compiler::new(&ingestor).compile(&description(json!({
            "time": { "end_time": "ref:scene.geometry.[width]" },
            "scene": { "file": "office.svg" }
        })));
        // tuples do not coerce to numbers
        assert!(matches!(compiled, Err(CompileError::InvalidValue { .. })));
        assert_eq!(ingestor.calls(), 1);
    }

    #[test]
    fn unknown_distribution_aborts_without_output() {
        let ingestor = StaticIngestor::default();
        let err = Compiler::new(&ingestor)
            .compile(&description(json!({
                "time": { "end_time": 20 },
                "forces": { "target": { "speed": { "distribution": "poisson", "mean": 1 } } }
            })))
            .unwrap_err();
        match err {
            CompileError::UnknownDistribution { kind, path } => {
                assert_eq!(kind, "poisson");
                assert_eq!(path, "forces.target.speed");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn forces_and_fov_encode_in_declaration_order() {
        let ingestor = StaticIngestor::default();
        let compiled = Compiler::new(&ingestor)
            .compile(&description(json!({
                "fov": { "backward": 1.0, "forward": { "distribution": "normal", "mean": 5.0, "std_deviation": 0.5 } },
                "forces": {
                    "repulsion": { "coeff": { "distribution": "uniform", "from": 1, "to": 2 } },
                    "target": { "speed": { "distribution": "normal", "mean": 1.3, "std_deviation": 0.2 } }
                }
            })))
            .expect("compiles");
        let document = decode_document(&compiled.bytes).expect("decodes");
        let slots: Vec<(SectionId, u16)> = document
            .records
            .iter()
            .filter_map(|record| match record {
                Record::Distribution {
                    section, element, ..
                } => Some((*section, *element)),
                _ => None,
            })
            .collect();
        assert_eq!(
            slots,
            vec![
                (SectionId::Forces, forces::TARGET_SPEED),
                (SectionId::Forces, forces::REPULSION_COEFF),
                (SectionId::Fov, fov::FORWARD),
                (SectionId::Fov, fov::BACKWARD),
            ]
        );
        assert_eq!(
            document.distribution(SectionId::Fov, fov::BACKWARD),
            Some(DistributionValue::Normal {
                mean: 1.0,
                std_deviation: 0.0
            })
        );
    }

    #[test]
    fn fixed_fov_entries_may_reference_each_other() {
        let ingestor = StaticIngestor::default();
        let compiled = Compiler::new(&ingestor)
            .compile(&description(json!({
                "fov": { "forward": 5.0, "backward": "ref:fov.forward.mean" }
            })))
            .expect("compiles");
        let document = decode_document(&compiled.bytes).expect("decodes");
        assert_eq!(
            document.distribution(SectionId::Fov, fov::BACKWARD),
            Some(DistributionValue::Normal {
                mean: 5.0,
                std_deviation: 0.0
            })
        );
    }

    #[test]
    fn custom_registry_drives_compilation() {
        use crate::schema::{DefaultValue, FieldDescriptor, SectionSchema, Wire};
        use crate::sections;

        let time = SectionSchema::builder(sections::TIME)
            .section(SectionId::Time)
            .declare_field(
                FieldDescriptor::float("end_time")
                    .with_default(DefaultValue::Float(30.0))
                    .emit(Wire::Seconds(crowd_schema::time::END_TIME)),
            )
            .build()
            .expect("time schema");
        let registry = SchemaRegistry::builder()
            .register(sections::root().expect("root schema"))
            .and_then(|builder| builder.register(time))
            .expect("registers")
            .build();

        let ingestor = StaticIngestor::default();
        let compiler = Compiler::new(&ingestor).with_registry(&registry);
        let compiled = compiler
            .compile(&description(json!({ "time": {} })))
            .expect("compiles");
        assert_eq!(hex(&compiled.bytes), "010200010000001e");

        let err = compiler
            .compile(&description(json!({ "time": { "tick": 0.5 } })))
            .unwrap_err();
        assert!(matches!(err, CompileError::UnknownField { ref field, .. } if field == "tick"));
    }

    #[test]
    fn relative_scene_paths_follow_the_description() {
        let ingestor = StaticIngestor::new(office_geometry());
        let described = description(json!({ "scene": { "file": "office.svg" } }))
            .with_base_dir(Some(PathBuf::from("/scenarios/office")));
        Compiler::new(&ingestor).compile(&described).expect("compiles");
        assert_eq!(
            ingestor.last_path(),
            Some(PathBuf::from("/scenarios/office/office.svg"))
        );
    }

    #[test]
    fn out_of_range_geometry_fails_unless_clamped() {
        let geometry = vec![GeometryRecord::spawn_area(0, 0, 70_000, 10, 2)];
        let ingestor = StaticIngestor::new(geometry);
        let described = description(json!({ "scene": { "file": "big.svg" } }));

        let err = Compiler::new(&ingestor).compile(&described).unwrap_err();
        assert!(matches!(err, CompileError::Encode { ref path, .. } if path == "scene.geometry"));

        let mut settings = CompilerSettings::default();
        settings.scene.clamp_coordinates = true;
        let compiled = Compiler::new(&ingestor)
            .with_settings(Arc::new(settings))
            .compile(&described)
            .expect("clamps");
        let document = decode_document(&compiled.bytes).expect("decodes");
        assert_eq!(
            document.geometry().next(),
            Some(&GeometryRecord::spawn_area(0, 0, 65_535, 10, 2))
        );
    }

    #[test]
    fn missing_scene_file_is_fatal() {
        let ingestor = StaticIngestor::default();
        let err = Compiler::new(&ingestor)
            .compile(&description(json!({ "scene": { "scale": 1.0 } })))
            .unwrap_err();
        assert!(matches!(err, CompileError::MissingField { ref path } if path == "scene.file"));
    }

    #[test]
    fn compilation_is_deterministic() {
        let ingestor = StaticIngestor::new(office_geometry());
        let compiler = Compiler::new(&ingestor);
        let described = description(json!({
            "type": "escape",
            "scene": { "file": "office.svg", "scale": 0.1 },
            "time": { "end_time": 120, "tick": 0.05 },
            "spawn": { "rate": 2, "time": { "distribution": "normal", "mean": 10, "std_deviation": 2 } },
            "density_map": { "enabled": true, "min_threshold": 0.5, "max_threshold": 3 }
        }));
        let first = compiler.compile(&described).expect("compiles");
        let second = compiler.compile(&described).expect("compiles");
        assert_eq!(first, second);
    }
}
