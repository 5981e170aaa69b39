use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use strata_pacer::{ManualClock, Pacer, PacerConfig, PacketSink, Priority};

struct NullSink;

impl PacketSink for NullSink {
    fn send_now(&self, stream_id: u32, sequence: u16, capture_time_ms: i64) {
        black_box((stream_id, sequence, capture_time_ms));
    }

    fn produce_padding(&self, max_bytes: usize) -> usize {
        max_bytes
    }
}

fn bench_pacer(config: PacerConfig) -> (Pacer<Arc<NullSink>, ManualClock>, ManualClock) {
    let clock = ManualClock::new(0);
    let pacer = Pacer::with_clock(Arc::new(NullSink), clock.clone(), config);
    pacer.set_enabled(true);
    (pacer, clock)
}

/// Benchmark submission: the producer-side hot path.
fn bench_enqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue");
    group.throughput(Throughput::Elements(1));

    group.bench_function("enqueue_queued", |b| {
        let (pacer, clock) = bench_pacer(PacerConfig::default());
        let mut seq: u16 = 0;
        b.iter(|| {
            pacer.enqueue_or_send_now(Priority::Normal, 1, black_box(seq), -1, 1200);
            seq = seq.wrapping_add(1);
            if seq == 0 {
                clock.advance_ms(30);
                pacer.tick();
            }
        });
    });

    group.bench_function("enqueue_disabled", |b| {
        let (pacer, _clock) = bench_pacer(PacerConfig::default());
        pacer.set_enabled(false);
        b.iter(|| pacer.enqueue_or_send_now(Priority::Normal, 1, black_box(1), 0, 1200));
    });

    group.finish();
}

/// Benchmark a tick draining a frame-sized burst.
fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    group.throughput(Throughput::Elements(64));

    group.bench_function("drain_64_packets", |b| {
        let config = PacerConfig {
            initial_target_kbps: 1_000_000,
            ..PacerConfig::default()
        };
        let (pacer, clock) = bench_pacer(config);
        b.iter(|| {
            for seq in 0..64u16 {
                pacer.enqueue_or_send_now(Priority::Normal, 1, seq, -1, 1200);
            }
            clock.advance_ms(5);
            pacer.tick();
        });
    });

    group.bench_function("idle_tick_with_padding", |b| {
        let (pacer, clock) = bench_pacer(PacerConfig::default());
        pacer.update_rates(300, 600);
        b.iter(|| {
            clock.advance_ms(5);
            pacer.tick();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_enqueue, bench_tick);
criterion_main!(benches);
