use std::sync::Arc;
use std::time::Duration;

use windowed_metrics::{Clock, Collector, ManualClock, MetricsConfig, Recorder, Registry};

const START: i64 = 1_700_000_040 * 1_000_000_000;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // a manual clock lets the demo replay ten minutes of traffic instantly
    let clock = Arc::new(ManualClock::new(START));
    let registry = Arc::new(Registry::with_clock(clock.clone()));
    registry
        .configure(MetricsConfig::default())
        .expect("default config is valid");

    let recorder = Recorder::new(registry.client("api", ""));
    let client = registry.client("worker", "jobs");

    println!("=== Sliding Window Metrics Example ===\n");

    let response_times = [12.5, 45.2, 78.9, 156.3, 234.7, 456.1, 789.5, 1234.7];
    let memory_readings = [128.5, 256.0, 512.3, 1024.7, 2048.1, 4096.5, 8192.0];

    metrics::with_local_recorder(&recorder, || {
        for minute in 0..10 {
            for (i, time) in response_times.iter().enumerate() {
                let time = time * (1.0 + minute as f64 * 0.1);
                metrics::histogram!("response_time_ms", "route" => "/orders").record(time);
                metrics::counter!("requests_total").increment(1);

                if time > 500.0 {
                    metrics::counter!("slow_requests_total").increment(1);
                }

                metrics::gauge!("memory_mb").set(memory_readings[i % memory_readings.len()]);
            }

            let timer = client.bump_time("batch");
            clock.advance(Duration::from_millis(150 + minute * 20));
            timer.end();
            client.bump_sum("processed", 100.0);

            clock.advance(Duration::from_secs(60));
        }
    });

    println!("--- Last 5 minutes ---");
    for snapshot in registry.snapshot("*", "*") {
        let aggr = snapshot.counter.aggr_in(Duration::from_secs(300));
        println!(
            "  {}/{}: count={} sum={:.1} min={:.1} max={:.1} avg={:.1}",
            snapshot.pkg, snapshot.name, aggr.count, aggr.sum, aggr.min, aggr.max, aggr.avg
        );

        if let Some(histogram) = &snapshot.histogram {
            let (values, count) = histogram.percentiles(&[0.5, 0.9, 0.99]);
            println!(
                "    p50={:.1} p90={:.1} p99={:.1} over {} samples",
                values[0], values[1], values[2], count
            );
        }
    }

    println!("\n--- Per-minute requests ---");
    for snapshot in registry.snapshot("api", "requests_total") {
        for bucket in snapshot.counter.slice_in(Duration::from_secs(600)) {
            println!("  {} .. {}: {}", bucket.start, bucket.end, bucket.count);
        }
    }

    println!("\n--- Collector report ---");
    let collector = Collector::spawn(registry.clone(), Duration::from_secs(5), vec![0.5, 0.99]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    for (key, report) in collector.reports().await {
        println!(
            "  {key}: samples={} percentiles={:?}",
            report.samples, report.percentiles
        );
    }

    println!("\nPackages: {:?}", registry.packages(false));
    println!("Clock: {}", clock.now());
}
