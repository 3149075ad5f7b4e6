use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pulse_meter::collectors::TrafficCounters;
use pulse_meter::collectors::platform::privileged::parse_proc_net_dev;
use pulse_meter::display::{format_speed_compact, format_speed_line};
use pulse_meter::sampler::{SamplerCore, SpeedReading, TrafficSample, compute_rate};
use pulse_meter::settings::SamplerConfig;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

/// Benchmark the per-tick state machine with alternating busy and quiet traffic
fn benchmark_sampler_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampler_tick");
    let config = SamplerConfig::default();

    group.bench_function("tick_steady", |b| {
        let mut core = SamplerCore::new();
        let origin = Instant::now();
        let mut step: u64 = 0;
        b.iter(|| {
            step += 1;
            let at = origin + Duration::from_millis(step * 1500);
            let sample = TrafficSample::new(TrafficCounters::new(step * 150_000, step * 30_000), at);
            black_box(core.tick(Some(sample), at, &config));
        });
    });

    group.bench_function("tick_alternating", |b| {
        let mut core = SamplerCore::new();
        let origin = Instant::now();
        let mut step: u64 = 0;
        let mut rx: u64 = 0;
        b.iter(|| {
            step += 1;
            rx += if step % 2 == 0 { 500_000 } else { 10 };
            let at = origin + Duration::from_millis(step * 1500);
            let sample = TrafficSample::new(TrafficCounters::new(rx, rx / 4), at);
            black_box(core.tick(Some(sample), at, &config));
        });
    });

    group.finish();
}

/// Benchmark rate computation and formatting of a single reading
fn benchmark_rate_and_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_and_formatting");
    let origin = Instant::now();
    let previous = TrafficSample::new(TrafficCounters::new(1_000_000, 200_000), origin);
    let current = TrafficSample::new(
        TrafficCounters::new(9_000_000, 900_000),
        origin + Duration::from_millis(1500),
    );

    group.bench_function("compute_rate", |b| {
        b.iter(|| black_box(compute_rate(black_box(&previous), black_box(&current))));
    });

    let reading = SpeedReading::new(5 * 1024 * 1024, 300 * 1024);
    group.bench_function("format_speed_line", |b| {
        b.iter(|| black_box(format_speed_line(black_box(reading.download_bps))));
    });
    group.bench_function("format_speed_compact", |b| {
        b.iter(|| black_box(format_speed_compact(black_box(reading.total_bps()))));
    });

    group.finish();
}

/// Benchmark parsing of a kernel counter table with a few dozen interfaces
fn benchmark_table_parsing(c: &mut Criterion) {
    let mut table = String::from(
        "Inter-|   Receive                                                |  Transmit\n \
         face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n",
    );
    for index in 0..32 {
        table.push_str(&format!(
            "  eth{index}: {} 9000 0 0 0 0 0 0 {} 3000 0 0 0 0 0 0\n",
            1_000_000 + index,
            250_000 + index
        ));
    }

    c.bench_function("parse_proc_net_dev", |b| {
        b.iter(|| black_box(parse_proc_net_dev(black_box(&table), Path::new("/proc/net/dev"))));
    });
}

criterion_group!(
    benches,
    benchmark_sampler_tick,
    benchmark_rate_and_formatting,
    benchmark_table_parsing
);
criterion_main!(benches);
