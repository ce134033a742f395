use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::display;
use crate::errors::{BenchError, Result};
use crate::quantile::Target;

/// Percentiles reported when none are configured.
pub const DEFAULT_QUANTILES: &[u32] = &[5, 99];
pub const DEFAULT_WARM_UPS: u32 = 5;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(1);
pub const DEFAULT_TOLERANCE: f64 = 0.001;
pub const DEFAULT_COLUMN_SIZE: usize = 10;

/// Quantile always estimated alongside the configured percentiles.
pub const MEDIAN: f64 = 0.5;

pub type PrettyPrintFn = Box<dyn Fn(Duration) -> String>;

/// Settings shared by every function of a benchmark run.
pub struct Options {
    pretty_print: PrettyPrintFn,
    quantiles: Vec<u32>,
    warm_ups: u32,
    inner_repeats: u32,
    duration: Duration,
    tolerance: f64,
    column_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            pretty_print: Box::new(display::pretty_print),
            quantiles: DEFAULT_QUANTILES.to_vec(),
            warm_ups: DEFAULT_WARM_UPS,
            inner_repeats: 1,
            duration: DEFAULT_DURATION,
            tolerance: DEFAULT_TOLERANCE,
            column_size: DEFAULT_COLUMN_SIZE,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("quantiles", &self.quantiles)
            .field("warm_ups", &self.warm_ups)
            .field("inner_repeats", &self.inner_repeats)
            .field("duration", &self.duration)
            .field("tolerance", &self.tolerance)
            .field("column_size", &self.column_size)
            .finish_non_exhaustive()
    }
}

impl Options {
    /// Replace the function that turns durations into table cells.
    pub fn with_pretty_print_fn(mut self, f: impl Fn(Duration) -> String + 'static) -> Self {
        self.pretty_print = Box::new(f);
        self
    }

    /// Percentiles to report, as integers in `1..=99`. May be empty.
    pub fn with_quantiles(mut self, quantiles: &[u32]) -> Self {
        self.quantiles = quantiles.to_vec();
        self
    }

    /// Untimed calls made before collection starts.
    pub fn with_warm_ups(mut self, warm_ups: u32) -> Self {
        self.warm_ups = warm_ups;
        self
    }

    /// Number of times each benchmarked function repeats its own work.
    ///
    /// The harness never repeats calls itself. Reported durations are divided
    /// by this number, so changing it should not change the reported mean.
    /// Useful for work that runs below a few microseconds, where the cost of
    /// the call itself would otherwise dominate.
    pub fn with_inner_repeats(mut self, inner_repeats: u32) -> Self {
        self.inner_repeats = inner_repeats;
        self
    }

    /// Collection window per function. Each function runs for at least this
    /// long, overrunning by at most one call.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Rank error allowed for the quantile estimates, as a fraction of the
    /// number of samples. Smaller values use more memory.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Width in chars of the value columns. Values below 9 may misalign the
    /// header row.
    pub fn with_column_size(mut self, column_size: usize) -> Self {
        self.column_size = column_size;
        self
    }

    pub fn quantiles(&self) -> &[u32] {
        &self.quantiles
    }

    pub fn warm_ups(&self) -> u32 {
        self.warm_ups
    }

    pub fn inner_repeats(&self) -> u32 {
        self.inner_repeats
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn column_size(&self) -> usize {
        self.column_size
    }

    pub fn pretty_print(&self, d: Duration) -> String {
        (self.pretty_print)(d)
    }

    /// Check everything that could make a run fail before any timing starts.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(BenchError::InvalidTolerance {
                tolerance: self.tolerance,
            });
        }
        for (i, &percent) in self.quantiles.iter().enumerate() {
            if !(1..=99).contains(&percent) {
                return Err(BenchError::InvalidPercentile {
                    percent: i64::from(percent),
                });
            }
            if self.quantiles[..i].contains(&percent) {
                return Err(BenchError::DuplicateQuantile {
                    quantile: f64::from(percent) / 100.0,
                });
            }
        }
        if self.inner_repeats == 0 {
            return Err(BenchError::InvalidInnerRepeats { repeats: 0 });
        }
        Ok(())
    }

    /// Estimator targets: the median plus every configured percentile, all at
    /// the configured tolerance. A requested 50th percentile shares the
    /// median's target.
    pub fn targets(&self) -> Vec<Target> {
        let mut targets = vec![Target::new(MEDIAN, self.tolerance)];
        targets.extend(
            self.quantiles
                .iter()
                .map(|&p| percent_to_quantile(p))
                .filter(|&q| q != MEDIAN)
                .map(|q| Target::new(q, self.tolerance)),
        );
        targets
    }
}

pub fn percent_to_quantile(percent: u32) -> f64 {
    f64::from(percent) / 100.0
}

/// Benchmark defaults read from a TOML file.
///
/// ```toml
/// duration = "2s"
/// warm_ups = 10
/// quantiles = [5, 50, 99]
/// tolerance = 0.001
/// column_size = 12
/// inner_repeats = 1
/// ```
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub duration: Option<String>,
    pub warm_ups: Option<i64>,
    pub quantiles: Option<Vec<i64>>,
    pub tolerance: Option<f64>,
    pub column_size: Option<i64>,
    pub inner_repeats: Option<i64>,
}

impl FileConfig {
    /// `{config_dir}/quantbench/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("quantbench").join("config.toml"))
    }

    /// Load `explicit` when given (it must exist), otherwise the default path
    /// when a file is there, otherwise an empty config.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| BenchError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text, path)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| BenchError::ConfigParse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Overlay the values present in the file onto `options`.
    pub fn apply(&self, mut options: Options) -> Result<Options> {
        if let Some(ref text) = self.duration {
            options = options.with_duration(parse_duration(text)?);
        }
        if let Some(warm_ups) = self.warm_ups {
            let warm_ups =
                u32::try_from(warm_ups).map_err(|_| BenchError::InvalidWarmUps { warm_ups })?;
            options = options.with_warm_ups(warm_ups);
        }
        if let Some(ref quantiles) = self.quantiles {
            let percents = quantiles
                .iter()
                .map(|&p| match u32::try_from(p) {
                    Ok(percent) if (1..=99).contains(&percent) => Ok(percent),
                    _ => Err(BenchError::InvalidPercentile { percent: p }),
                })
                .collect::<Result<Vec<u32>>>()?;
            options = options.with_quantiles(&percents);
        }
        if let Some(tolerance) = self.tolerance {
            options = options.with_tolerance(tolerance);
        }
        if let Some(size) = self.column_size {
            let size = usize::try_from(size).map_err(|_| BenchError::InvalidColumnSize { size })?;
            options = options.with_column_size(size);
        }
        if let Some(repeats) = self.inner_repeats {
            let repeats = u32::try_from(repeats)
                .ok()
                .filter(|&r| r >= 1)
                .ok_or(BenchError::InvalidInnerRepeats { repeats })?;
            options = options.with_inner_repeats(repeats);
        }
        Ok(options)
    }
}

/// Parse a comma-separated percentile list such as `"5,50,99"`. Blank
/// entries are skipped, so `""` yields an empty list.
pub fn parse_percentiles(input: &str) -> Result<Vec<u32>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map_err(|_| BenchError::InvalidPercentileList {
                    input: input.to_string(),
                })
        })
        .collect()
}

/// Parse a duration such as `"500ms"`, `"2s"`, `"1.5m"` or `"1m30s"`.
///
/// Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`. Every number needs a unit.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = |detail: &str| BenchError::InvalidDuration {
        input: input.to_string(),
        detail: detail.to_string(),
    };

    let text = input.trim();
    if text.is_empty() {
        return Err(invalid("empty duration"));
    }
    if text.starts_with('-') {
        return Err(invalid("negative durations are not allowed"));
    }

    let mut total_nanos = 0f64;
    let mut rest = text;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(invalid("expected a number"));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| invalid("malformed number"))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3_600e9,
            "" => return Err(invalid("missing unit")),
            _ => return Err(invalid("unknown unit")),
        };
        rest = &rest[unit_len..];
        total_nanos += value * nanos_per_unit;
    }

    if !total_nanos.is_finite() || total_nanos >= u64::MAX as f64 {
        return Err(invalid("too large"));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // --- parse_duration ---

    #[test]
    fn duration_seconds() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn duration_milliseconds() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn duration_micro_spellings() {
        assert_eq!(parse_duration("15us").unwrap(), Duration::from_micros(15));
        assert_eq!(parse_duration("15µs").unwrap(), Duration::from_micros(15));
    }

    #[test]
    fn duration_fractional() {
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn duration_compound() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h2m").unwrap(), Duration::from_secs(3720));
    }

    #[test]
    fn duration_zero_is_allowed() {
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn duration_negative_rejected() {
        let err = parse_duration("-1s").unwrap_err();
        assert!(matches!(err, BenchError::InvalidDuration { .. }));
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn duration_missing_unit_rejected() {
        assert!(parse_duration("10").is_err());
    }

    #[test]
    fn duration_unknown_unit_rejected() {
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("1..2s").is_err());
    }

    // --- parse_percentiles ---

    #[test]
    fn percentiles_list() {
        assert_eq!(parse_percentiles("5, 50,99").unwrap(), vec![5, 50, 99]);
    }

    #[test]
    fn percentiles_empty() {
        assert!(parse_percentiles("").unwrap().is_empty());
        assert!(parse_percentiles(" , ").unwrap().is_empty());
    }

    #[test]
    fn percentiles_not_numbers() {
        let err = parse_percentiles("5,p99").unwrap_err();
        assert!(matches!(err, BenchError::InvalidPercentileList { .. }));
        assert!(parse_percentiles("-5").is_err());
    }

    // --- Options ---

    #[test]
    fn defaults() {
        let options = Options::default();
        assert_eq!(options.quantiles(), &[5, 99]);
        assert_eq!(options.warm_ups(), 5);
        assert_eq!(options.inner_repeats(), 1);
        assert_eq!(options.duration(), Duration::from_secs(1));
        assert_eq!(options.tolerance(), 0.001);
        assert_eq!(options.column_size(), 10);
        assert_eq!(options.pretty_print(Duration::from_nanos(123)), "123ns");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn empty_quantile_list_is_valid() {
        let options = Options::default().with_quantiles(&[]);
        assert!(options.validate().is_ok());
        assert_eq!(options.targets(), vec![Target::new(0.5, 0.001)]);
    }

    #[test]
    fn invalid_tolerance_rejected() {
        for tolerance in [0.0, 1.0, -0.01, f64::NAN] {
            let err = Options::default()
                .with_tolerance(tolerance)
                .validate()
                .unwrap_err();
            assert!(matches!(err, BenchError::InvalidTolerance { .. }));
        }
    }

    #[test]
    fn percentile_out_of_range_rejected() {
        for percent in [0, 100, 150] {
            let err = Options::default()
                .with_quantiles(&[percent])
                .validate()
                .unwrap_err();
            assert!(matches!(err, BenchError::InvalidPercentile { .. }));
        }
    }

    #[test]
    fn duplicate_percentile_rejected() {
        let err = Options::default()
            .with_quantiles(&[5, 99, 5])
            .validate()
            .unwrap_err();
        assert!(matches!(err, BenchError::DuplicateQuantile { .. }));
    }

    #[test]
    fn zero_inner_repeats_rejected() {
        let err = Options::default()
            .with_inner_repeats(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, BenchError::InvalidInnerRepeats { repeats: 0 }));
    }

    #[test]
    fn targets_include_median_first() {
        let options = Options::default()
            .with_quantiles(&[1, 90])
            .with_tolerance(0.01);
        assert_eq!(
            options.targets(),
            vec![
                Target::new(0.5, 0.01),
                Target::new(0.01, 0.01),
                Target::new(0.9, 0.01)
            ]
        );
    }

    #[test]
    fn fiftieth_percentile_shares_median_target() {
        let options = Options::default().with_quantiles(&[50, 99]);
        let targets = options.targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].quantile, 0.5);
        assert_eq!(targets[1].quantile, 0.99);
    }

    #[test]
    fn custom_pretty_print() {
        let options = Options::default().with_pretty_print_fn(|d| format!("{}!", d.as_nanos()));
        assert_eq!(options.pretty_print(Duration::from_micros(2)), "2000!");
    }

    // --- FileConfig ---

    #[test]
    fn file_config_parses_all_keys() {
        let text = r#"
duration = "250ms"
warm_ups = 2
quantiles = [10, 90]
tolerance = 0.01
column_size = 12
inner_repeats = 4
"#;
        let config = FileConfig::parse(text, Path::new("test.toml")).unwrap();
        let options = config.apply(Options::default()).unwrap();
        assert_eq!(options.duration(), Duration::from_millis(250));
        assert_eq!(options.warm_ups(), 2);
        assert_eq!(options.quantiles(), &[10, 90]);
        assert_eq!(options.tolerance(), 0.01);
        assert_eq!(options.column_size(), 12);
        assert_eq!(options.inner_repeats(), 4);
    }

    #[test]
    fn file_config_missing_keys_keep_defaults() {
        let config = FileConfig::parse("warm_ups = 0\n", Path::new("test.toml")).unwrap();
        let options = config.apply(Options::default()).unwrap();
        assert_eq!(options.warm_ups(), 0);
        assert_eq!(options.quantiles(), DEFAULT_QUANTILES);
        assert_eq!(options.duration(), DEFAULT_DURATION);
    }

    #[test]
    fn file_config_rejects_negative_warm_ups() {
        let config = FileConfig::parse("warm_ups = -3\n", Path::new("test.toml")).unwrap();
        let err = config.apply(Options::default()).unwrap_err();
        assert!(matches!(err, BenchError::InvalidWarmUps { warm_ups: -3 }));
    }

    #[test]
    fn file_config_rejects_negative_duration() {
        let config = FileConfig::parse("duration = \"-5s\"\n", Path::new("test.toml")).unwrap();
        let err = config.apply(Options::default()).unwrap_err();
        assert!(matches!(err, BenchError::InvalidDuration { .. }));
    }

    #[test]
    fn file_config_rejects_zero_inner_repeats() {
        let config = FileConfig::parse("inner_repeats = 0\n", Path::new("test.toml")).unwrap();
        let err = config.apply(Options::default()).unwrap_err();
        assert!(matches!(err, BenchError::InvalidInnerRepeats { repeats: 0 }));
    }

    #[test]
    fn file_config_rejects_bad_percentile() {
        let config = FileConfig::parse("quantiles = [5, -1]\n", Path::new("test.toml")).unwrap();
        let err = config.apply(Options::default()).unwrap_err();
        assert!(matches!(err, BenchError::InvalidPercentile { percent: -1 }));
    }

    #[test]
    fn file_config_rejects_unknown_keys() {
        let err = FileConfig::parse("durations = \"1s\"\n", Path::new("test.toml")).unwrap_err();
        assert!(matches!(err, BenchError::ConfigParse { .. }));
    }

    #[test]
    fn file_config_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "duration = \"10ms\"").unwrap();
        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.duration.as_deref(), Some("10ms"));
    }

    #[test]
    fn file_config_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, BenchError::ConfigRead { .. }));
    }

    #[test]
    fn discover_with_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "column_size = 14").unwrap();
        let config = FileConfig::discover(Some(file.path())).unwrap();
        assert_eq!(config.column_size, Some(14));
    }
}
