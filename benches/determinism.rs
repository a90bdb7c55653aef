//! Step and replay throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rockslide::game::{
    input::parse_script,
    replay::Recorder,
    step::run_inputs,
    PuzzleState, StepConfig,
};

const LEVEL: &str = r#"{
    "name": "bench",
    "base": [0, 0, 0],
    "size": [10, 8, 2],
    "map": [
        1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1, 1,

        1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 0, 0, 0, 0, 0, 0, 0, 0, 1,
        1, 0, 0, 0, 0, 0, 0, 0, 0, 1,
        1, 0, 0, 0, 0, 0, 0, 0, 0, 1,
        1, 0, 0, 0, 0, 0, 0, 0, 0, 1,
        1, 0, 0, 0, 0, 0, 0, 0, 0, 1,
        1, 0, 0, 0, 0, 0, 0, 0, 0, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1, 1
    ],
    "entities": [
        { "kind": { "type": "Player" }, "position": [1, 1, 1], "direction": [1, 0, 0] },
        { "kind": { "type": "PushBlock" }, "position": [2, 2, 1] },
        { "kind": { "type": "PushBlock" }, "position": [3, 2, 1] },
        { "kind": { "type": "PushBlock" }, "position": [4, 4, 1] },
        { "kind": { "type": "Rock" }, "position": [8, 6, 1] },
        { "kind": { "type": "Rock" }, "position": [6, 1, 1] },
        { "kind": { "type": "Brittle" }, "position": [7, 3, 1] },
        { "kind": { "type": "Goal" }, "position": [8, 1, 1] }
    ]
}"#;

const SCRIPT: &str = "DRRRUURRDDLLz.yRRDDDLLUU!RRRRDDDD.....zzzzRRULLDDRRUU";

fn bench_step(c: &mut Criterion) {
    let config = StepConfig::default();
    let inputs = parse_script(SCRIPT).unwrap();
    let initial = PuzzleState::from_json(LEVEL, config.timing).unwrap();

    c.bench_function("step_script", |b| {
        b.iter(|| {
            let mut state = initial.clone();
            let events = run_inputs(&mut state, black_box(&inputs), &config);
            black_box((events.len(), state.compute_hash()))
        })
    });

    c.bench_function("structural_hash", |b| {
        b.iter(|| black_box(initial.compute_hash()))
    });
}

fn bench_replay(c: &mut Criterion) {
    let config = StepConfig::default();
    let mut recorder = Recorder::new(LEVEL, config).unwrap();
    for input in parse_script(SCRIPT).unwrap() {
        recorder.step(input);
    }
    let (_, transcript) = recorder.finish();
    let bytes = transcript.to_bytes().unwrap();

    c.bench_function("replay_transcript", |b| {
        b.iter(|| {
            let state = transcript.replay().unwrap();
            black_box(state.turn)
        })
    });

    c.bench_function("decode_transcript", |b| {
        b.iter(|| black_box(rockslide::game::replay::Transcript::from_bytes(black_box(&bytes)).unwrap()))
    });
}

criterion_group!(benches, bench_step, bench_replay);
criterion_main!(benches);
