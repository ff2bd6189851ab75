//! Quick latency runner (prints p50/p95/p99) - useful for local checks.
//! Run with: cargo run --example bench_latency

use std::time::Instant;

use rfseeker::html_loader::load_document;
use rfseeker::{CoreConfig, DocumentContext};

fn sample_document() -> String {
    let mut rows = String::new();
    for i in 0..500 {
        rows.push_str(&format!("<li class=\"row\" data-testid=\"row-{i}\">Item {i}</li>"));
    }
    format!("<html><body><ul id=\"list\">{rows}</ul></body></html>")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let html = sample_document();
    let dom = load_document(&html);
    let root = dom.root();
    let ctx = DocumentContext::new(CoreConfig::default());

    let iterations: usize = std::env::var("BENCH_ITERATIONS").ok().and_then(|s| s.parse().ok()).unwrap_or(200);
    let warmup = 5usize;
    let threshold_ms: u64 = std::env::var("PERF_P95_THRESHOLD_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(50);

    let selector = "css=#list >> css=li.row >> nth=250";

    for _ in 0..warmup {
        let _ = ctx.query_selector(&dom, root, selector, true)?;
    }

    let mut samples = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let t0 = Instant::now();
        let _ = ctx.query_selector(&dom, root, selector, true)?;
        samples.push(t0.elapsed().as_micros() as u64);
    }

    samples.sort_unstable();

    let p50 = percentile(&samples, 50.0);
    let p95 = percentile(&samples, 95.0);
    let p99 = percentile(&samples, 99.0);

    println!("selector: {selector}");
    println!("p50={p50}us p95={p95}us p99={p99}us (p95 threshold={threshold_ms}ms)");

    if p95 > threshold_ms * 1000 {
        eprintln!("Performance regression: p95 {p95}us > threshold {}us", threshold_ms * 1000);
        std::process::exit(1);
    }

    Ok(())
}

fn percentile(samples: &[u64], pct: f64) -> u64 {
    if samples.is_empty() {
        return 0;
    }
    let n = samples.len();
    let rank = ((pct / 100.0) * (n as f64)).ceil() as usize;
    let idx = if rank == 0 { 0 } else { rank.saturating_sub(1).min(n - 1) };
    samples[idx]
}
