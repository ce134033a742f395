use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Options;
use crate::types::BenchResult;

/// Label of the name column in the header row.
pub const HEADER_LABEL: &str = "Benchmarks:";

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Format a duration with a unit chosen by magnitude, e.g. `"123ns"`,
/// `"1.3µs"`, `"180.3s"`, `"5m07.2s"`, `"100d 3h05m07s"`.
pub fn pretty_print(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{:.1}µs", nanos as f64 / 1e3);
    }
    if nanos < 1_000_000_000 {
        return format!("{:.1}ms", nanos as f64 / 1e6);
    }

    let secs = d.as_secs();
    if secs < 5 * MINUTE {
        return format!("{:.1}s", d.as_secs_f64());
    }
    if secs < HOUR {
        let minutes = secs / MINUTE;
        let seconds = d.as_secs_f64() - (minutes * MINUTE) as f64;
        return format!("{}m{:04.1}s", minutes, seconds);
    }
    if secs < DAY {
        let hours = secs / HOUR;
        let minutes = secs % HOUR / MINUTE;
        let seconds = secs % MINUTE;
        return format!("{}h{:02}m{:02}s", hours, minutes, seconds);
    }

    let days = secs / DAY;
    let hours = secs % DAY / HOUR;
    let minutes = secs % HOUR / MINUTE;
    let seconds = secs % MINUTE;
    format!("{}d {}h{:02}m{:02}s", days, hours, minutes, seconds)
}

/// Column header for a percentile, e.g. `"99%-tile"`.
pub fn quantile_label(percent: u32) -> String {
    format!("{}%-tile", percent)
}

/// Header of the count column: `"Count"`, or `"Runs(x<repeats>)"` when the
/// functions repeat their work internally.
pub fn count_label(inner_repeats: u32) -> String {
    if inner_repeats > 1 {
        format!("Runs(x{})", inner_repeats)
    } else {
        "Count".to_string()
    }
}

/// Width of the name column: the longest name in chars, never narrower than
/// the header label.
pub fn name_column_width<'a>(names: impl IntoIterator<Item = &'a str>) -> usize {
    names
        .into_iter()
        .map(|name| name.chars().count())
        .fold(HEADER_LABEL.chars().count(), usize::max)
}

/// Header row, including the trailing newline.
pub fn format_header(name_width: usize, options: &Options) -> String {
    let size = options.column_size();
    let mut line = format!(
        "{:<name_width$}\t{:>size$}\t{:>size$}",
        HEADER_LABEL, "Mean", "Median"
    );
    for &percent in options.quantiles() {
        line.push_str(&format!("\t{:>size$}", quantile_label(percent)));
    }
    line.push_str(&format!("\t{:>size$}\n", count_label(options.inner_repeats())));
    line
}

/// One result row, including the trailing newline.
pub fn format_row(result: &BenchResult, name_width: usize, options: &Options) -> String {
    let size = options.column_size();
    let mut line = format!(
        "{:<name_width$}\t{:>size$}\t{:>size$}",
        result.name,
        options.pretty_print(result.mean),
        options.pretty_print(result.median)
    );
    // Cells follow the configured percentiles so a row always matches the header.
    for i in 0..options.quantiles().len() {
        let cell = result
            .quantiles
            .get(i)
            .map(|&q| options.pretty_print(q))
            .unwrap_or_default();
        line.push_str(&format!("\t{:>size$}", cell));
    }
    line.push_str(&format!("\t{:>size$}\n", result.count));
    line
}

/// JSON output format.
#[derive(Serialize)]
struct JsonReport {
    started_at: String,
    duration_ns: u128,
    warm_ups: u32,
    inner_repeats: u32,
    tolerance: f64,
    benchmarks: Vec<JsonBenchmark>,
}

#[derive(Serialize)]
struct JsonBenchmark {
    name: String,
    mean_ns: u128,
    median_ns: u128,
    quantiles: Vec<JsonQuantile>,
    count: u64,
    mean: String,
    median: String,
}

#[derive(Serialize)]
struct JsonQuantile {
    percent: u32,
    value_ns: u128,
    value: String,
}

pub fn format_json(results: &[BenchResult], options: &Options, started_at: DateTime<Utc>) -> String {
    let report = JsonReport {
        started_at: started_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        duration_ns: options.duration().as_nanos(),
        warm_ups: options.warm_ups(),
        inner_repeats: options.inner_repeats(),
        tolerance: options.tolerance(),
        benchmarks: results
            .iter()
            .map(|r| JsonBenchmark {
                name: r.name.clone(),
                mean_ns: r.mean.as_nanos(),
                median_ns: r.median.as_nanos(),
                quantiles: options
                    .quantiles()
                    .iter()
                    .zip(&r.quantiles)
                    .map(|(&percent, &value)| JsonQuantile {
                        percent,
                        value_ns: value.as_nanos(),
                        value: options.pretty_print(value),
                    })
                    .collect(),
                count: r.count,
                mean: options.pretty_print(r.mean),
                median: options.pretty_print(r.median),
            })
            .collect(),
    };

    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
}
