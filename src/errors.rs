use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("Quantile {quantile} is out of range, it must lie strictly between 0 and 1")]
    InvalidQuantile { quantile: f64 },

    #[error("Percentile {percent} is out of range (1\u{2013}99)")]
    InvalidPercentile { percent: i64 },

    #[error("Invalid percentile list '{input}', expected comma-separated integers like \"5,50,99\"")]
    InvalidPercentileList { input: String },

    #[error("Quantile {quantile} is configured more than once")]
    DuplicateQuantile { quantile: f64 },

    #[error("Tolerance {tolerance} is out of range, it must lie strictly between 0 and 1")]
    InvalidTolerance { tolerance: f64 },

    #[error("An estimator needs at least one quantile target")]
    NoTargets,

    #[error("Quantile {quantile} was not configured on this estimator")]
    UnconfiguredQuantile { quantile: f64 },

    #[error("Inner repeats must be at least 1, got {repeats}")]
    InvalidInnerRepeats { repeats: i64 },

    #[error("Warm-up count must not be negative, got {warm_ups}")]
    InvalidWarmUps { warm_ups: i64 },

    #[error("Column size must not be negative, got {size}")]
    InvalidColumnSize { size: i64 },

    #[error("Invalid duration '{input}': {detail}")]
    InvalidDuration { input: String, detail: String },

    #[error("Benchmark '{name}' collected no samples; the collection duration is too short")]
    NoSamples { name: String },

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    #[error("Empty command line")]
    EmptyCommand,

    #[error("Failed to start '{command}': {source}")]
    CommandSpawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
