use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use logweave::record::epoch_seconds;
use logweave::{Dialect, MergeResult, Merger, Record, Resequencer};

fn ok_stream<T>(items: Vec<T>) -> std::vec::IntoIter<MergeResult<T>> {
    items.into_iter().map(Ok).collect::<Vec<_>>().into_iter()
}

/// `0..n` with values arriving up to 500 positions late
fn jittered(n: u32) -> Vec<u32> {
    let mut rng = fastrand::Rng::with_seed(7);
    let mut values: Vec<u32> = (0..n).collect();
    for chunk in values.chunks_mut(500) {
        rng.shuffle(chunk);
    }
    values
}

fn bench_resequencer_windows(c: &mut Criterion) {
    let input = jittered(100_000);
    let mut group = c.benchmark_group("resequencer");
    for window in [100usize, 1_000, 5_000] {
        group.bench_with_input(BenchmarkId::from_parameter(window), &window, |b, &window| {
            b.iter(|| {
                let resequencer = Resequencer::new(ok_stream(input.clone()), window).unwrap();
                black_box(resequencer.count())
            });
        });
    }
    group.finish();
}

fn bench_merger_fan_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("merger");
    for streams in [2usize, 8, 32] {
        let inputs: Vec<Vec<Record<String>>> = (0..streams)
            .map(|s| {
                (0..20_000u64)
                    .map(|i| Record::new(epoch_seconds((i * streams as u64 + s as u64) as i64), i + 1, String::new()))
                    .collect()
            })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(streams), &inputs, |b, inputs| {
            b.iter(|| {
                let merger = Merger::new(inputs.iter().cloned().map(ok_stream).collect()).unwrap();
                black_box(merger.count())
            });
        });
    }
    group.finish();
}

fn bench_parse_combined(c: &mut Criterion) {
    let line = r#"10.0.0.1, 172.16.0.3 - - [24/Apr/2010:10:00:00 +0100] "GET /index.html?q=1 HTTP/1.1" 200 5120 "http://example.com/" "Mozilla/5.0 (X11; Linux x86_64)""#;
    c.bench_function("parse_combined_line", |b| {
        b.iter(|| black_box(Dialect::Combined.parse_line(black_box(line)).unwrap()));
    });
}

criterion_group!(
    ordering_benches,
    bench_resequencer_windows,
    bench_merger_fan_in,
    bench_parse_combined
);
criterion_main!(ordering_benches);
