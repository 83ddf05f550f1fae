mod common;

use crowd_config::{CompiledDocument, Compiler, SimulationDescription, SvgIngestor};

fn compile(description: &SimulationDescription) -> CompiledDocument {
    let ingestor = SvgIngestor;
    Compiler::new(&ingestor)
        .compile(description)
        .expect("compiles")
}

#[test]
fn repeated_compilations_match() {
    let description = SimulationDescription::from_file(&common::fixture("hole_fixed/params.json"))
        .expect("fixture description");

    let document_a = compile(&description);
    let document_b = compile(&description);

    assert_eq!(document_a.digest, document_b.digest);
    assert_eq!(document_a.bytes, document_b.bytes);
    assert_eq!(document_a.record_count, document_b.record_count);
}

#[test]
fn author_key_order_does_not_change_output() {
    let forward = SimulationDescription::from_json_str(
        r#"{
            "time": { "end_time": 30, "tick": 0.1 },
            "spawn": { "rate": 2, "time": { "distribution": "uniform", "from": 1 } },
            "fov": { "forward": 4.0, "backward": 0.5 }
        }"#,
    )
    .expect("description");
    let reversed = SimulationDescription::from_json_str(
        r#"{
            "fov": { "backward": 0.5, "forward": 4.0 },
            "spawn": { "time": { "from": 1, "distribution": "uniform" }, "rate": 2 },
            "time": { "tick": 0.1, "end_time": 30 }
        }"#,
    )
    .expect("description");

    assert_eq!(compile(&forward), compile(&reversed));
}

#[test]
fn digest_is_fnv_of_the_bytes() {
    let description = SimulationDescription::from_file(&common::fixture("corridor/params.json"))
        .expect("fixture description");
    let compiled = compile(&description);
    assert_eq!(compiled.digest, crowd_config::document_digest(&compiled.bytes));
}
