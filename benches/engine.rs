//! Benchmarks for the rollback engine's hot paths.
//!
//! Run with: cargo bench --bench engine

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::{Deserialize, Serialize};
use web_time::Duration;

use netplay_rollback::{
    codec, Config, EngineBuilder, Frame, Locality, Message, Participant, PlayerHandle,
    PlayerInputs, Role, RollbackEngine, Simulation,
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct BenchInput {
    axis: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct BenchState {
    frame: i32,
    positions: [i64; 2],
}

impl Simulation<BenchInput> for BenchState {
    fn initial() -> Self {
        BenchState {
            frame: 0,
            positions: [0, 0],
        }
    }

    fn timestep() -> Duration {
        Duration::from_micros(16_667)
    }

    fn step(&self, inputs: &PlayerInputs<BenchInput>, _dt: Duration) -> Self {
        let mut next = self.clone();
        next.frame += 1;
        for (handle, record) in inputs.iter() {
            next.positions[handle.as_usize()] += i64::from(record.input.axis);
        }
        next
    }
}

struct BenchConfig;

impl Config for BenchConfig {
    type Input = BenchInput;
    type State = BenchState;
}

const REMOTE: PlayerHandle = PlayerHandle::new(1);

fn make_engine(max_predicted_frames: usize) -> RollbackEngine<BenchConfig> {
    EngineBuilder::new()
        .add_participant(Participant::new(
            PlayerHandle::new(0),
            Locality::Local,
            Role::Authoritative,
        ))
        .add_participant(Participant::new(REMOTE, Locality::Remote, Role::NonAuthoritative))
        .with_max_predicted_frames(max_predicted_frames)
        .with_sender(|message: Message<BenchConfig>| {
            black_box(&message);
        })
        .start()
        .expect("bench engine should start")
}

fn bench_advance_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance_frame");

    group.bench_function("confirmed_lockstep", |b| {
        let mut engine = make_engine(8);
        let mut frame = 0i32;
        b.iter(|| {
            frame += 1;
            engine
                .on_remote_input(REMOTE, Frame::new(frame), BenchInput { axis: 1 })
                .expect("buffered input");
            engine
                .advance_frame(black_box(BenchInput { axis: -1 }))
                .expect("tick");
        });
    });

    group.bench_function("speculative", |b| {
        let mut engine = make_engine(8);
        let mut frame = 0i32;
        b.iter(|| {
            frame += 1;
            if engine.advance_frame(black_box(BenchInput { axis: -1 })).is_err() {
                // Confirm the whole window and keep ticking.
                for confirm in (frame - 8)..frame {
                    engine
                        .on_remote_input(REMOTE, Frame::new(confirm), BenchInput { axis: 0 })
                        .expect("confirmation");
                }
                engine
                    .advance_frame(black_box(BenchInput { axis: -1 }))
                    .expect("tick after confirmations");
            }
        });
    });

    group.finish();
}

fn bench_rollback_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("rollback");

    for depth in [2usize, 4, 8, 16] {
        group.bench_with_input(BenchmarkId::new("resimulate", depth), &depth, |b, &depth| {
            b.iter_batched(
                || {
                    let mut engine = make_engine(depth + 1);
                    for _ in 0..depth {
                        engine
                            .advance_frame(BenchInput { axis: 1 })
                            .expect("setup tick");
                    }
                    engine
                },
                |mut engine| {
                    // The correction lands on the oldest speculative frame
                    // and forces a full-window resimulation.
                    engine
                        .on_remote_input(REMOTE, Frame::new(1), BenchInput { axis: 3 })
                        .expect("correction");
                    black_box(engine.current_frame())
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let message = Message::<BenchConfig>::Input {
        frame: Frame::new(1234),
        input: BenchInput { axis: 7 },
    };
    group.bench_function("encode_input", |b| {
        b.iter(|| codec::encode(black_box(&message)).expect("encode"));
    });

    let bytes = codec::encode(&message).expect("encode");
    group.bench_function("decode_input", |b| {
        b.iter(|| {
            let decoded: Message<BenchConfig> =
                codec::decode(black_box(&bytes)).expect("decode");
            decoded
        });
    });

    group.finish();
}

criterion_group!(benches, bench_advance_frame, bench_rollback_depth, bench_codec);
criterion_main!(benches);
