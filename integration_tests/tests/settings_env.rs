mod common;

use crowd_config::{load_settings_from_env, Compiler, SimulationDescription, StaticIngestor};
use crowd_schema::{decode_document, GeometryRecord, Record};

#[test]
fn env_override_relaxes_references_and_clamps_geometry() {
    common::ensure_test_settings();
    let (settings, metadata) = load_settings_from_env();
    assert_eq!(
        metadata.path(),
        Some(&common::fixture("test_compiler_settings.json"))
    );
    assert!(!settings.references.strict);
    assert!(settings.scene.clamp_coordinates);
    assert!(settings.scene.resolve_relative_to_document);

    let description = SimulationDescription::from_json_str(
        r#"{
            "scene": { "file": "wide.svg" },
            "spawn": { "rate": "ref:time.tick" }
        }"#,
    )
    .expect("description");
    let ingestor = StaticIngestor::new(vec![
        GeometryRecord::width(90_000),
        GeometryRecord::wall(0, 0, 70_000, 0),
    ]);
    let compiled = Compiler::new(&ingestor)
        .with_settings(settings)
        .compile(&description)
        .expect("lenient settings compile");
    let document = decode_document(&compiled.bytes).expect("decodes");

    assert_eq!(
        document.geometry().cloned().collect::<Vec<_>>(),
        vec![
            GeometryRecord::width(65_535),
            GeometryRecord::wall(0, 0, 65_535, 0),
        ]
    );
    assert!(document.records.contains(&Record::SpawnRate { rate: 0.0 }));
}
