use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use crowd_config::{Compiler, SimulationDescription, StaticIngestor};
use crowd_schema::GeometryRecord;
use serde_json::json;

fn scene(walls: i64) -> Vec<GeometryRecord> {
    let mut records = vec![GeometryRecord::width(4_000), GeometryRecord::height(4_000)];
    records.extend((0..walls).map(|i| GeometryRecord::wall(i, 0, i, 3_000)));
    records.push(GeometryRecord::spawn_area(0, 0, 100, 100, 1));
    records.push(GeometryRecord::target_area(3_900, 3_900, 4_000, 4_000, 2, 0, true));
    records
}

fn description() -> SimulationDescription {
    let document = json!({
        "type": "escape",
        "scene": { "file": "bench.svg", "scale": 0.1 },
        "time": { "end_time": 600, "tick": 0.05 },
        "spawn": { "rate": 4.0, "time": { "distribution": "uniform" } },
        "forces": {
            "target": { "speed": { "distribution": "normal", "mean": 1.34, "std_deviation": 0.26 } },
            "repulsion": { "coeff": { "distribution": "uniform", "from": 1.5, "to": "ref:spawn.rate" } }
        },
        "fov": { "forward": 5.0, "backward": 1.0 },
        "density_map": { "enabled": true, "min_threshold": 0.5, "max_threshold": 4.0 }
    });
    SimulationDescription::from_json_str(&document.to_string()).expect("bench description")
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let description = description();

    for walls in [0i64, 64, 512, 4_096] {
        group.bench_with_input(BenchmarkId::new("walls", walls), &walls, |b, &walls| {
            b.iter_batched(
                || StaticIngestor::new(scene(walls)),
                |ingestor| {
                    Compiler::new(&ingestor)
                        .compile(&description)
                        .expect("bench compiles")
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(compile_benches, bench_compile);
criterion_main!(compile_benches);
