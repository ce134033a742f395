use std::io::{self, Write};
use std::time::Duration;

use tracing::{debug, info};

use crate::clock::{Clock, MonotonicClock};
use crate::config::{MEDIAN, Options, percent_to_quantile};
use crate::display;
use crate::errors::{BenchError, Result};
use crate::quantile::Estimator;
use crate::types::{BenchResult, NamedFunction};

/// A set of named functions and the options they are benchmarked with.
///
/// ```no_run
/// use quantbench::runner::Benchmark;
/// use quantbench::types::NamedFunction;
///
/// const REPEATS: u32 = 1000;
/// let sum = NamedFunction::new("SumTo100", || {
///     for _ in 0..REPEATS {
///         std::hint::black_box((0..100u64).sum::<u64>());
///     }
/// });
/// Benchmark::new([sum]).with_inner_repeats(REPEATS).run().unwrap();
/// ```
#[derive(Debug)]
pub struct Benchmark {
    functions: Vec<NamedFunction>,
    options: Options,
}

impl Benchmark {
    pub fn new(functions: impl IntoIterator<Item = NamedFunction>) -> Self {
        Self {
            functions: functions.into_iter().collect(),
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn with_pretty_print_fn(mut self, f: impl Fn(Duration) -> String + 'static) -> Self {
        self.options = self.options.with_pretty_print_fn(f);
        self
    }

    pub fn with_quantiles(mut self, quantiles: &[u32]) -> Self {
        self.options = self.options.with_quantiles(quantiles);
        self
    }

    pub fn with_warm_ups(mut self, warm_ups: u32) -> Self {
        self.options = self.options.with_warm_ups(warm_ups);
        self
    }

    pub fn with_inner_repeats(mut self, inner_repeats: u32) -> Self {
        self.options = self.options.with_inner_repeats(inner_repeats);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.options = self.options.with_duration(duration);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.options = self.options.with_tolerance(tolerance);
        self
    }

    pub fn with_column_size(mut self, column_size: usize) -> Self {
        self.options = self.options.with_column_size(column_size);
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Benchmark every function and print the table to stdout.
    pub fn run(&mut self) -> Result<Vec<BenchResult>> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.run_to(&mut out, &MonotonicClock::new())
    }

    /// Benchmark every function in order, writing the header first and one
    /// row as soon as each function finishes.
    ///
    /// Options are validated before anything runs. The first failing function
    /// aborts the batch; rows already written are kept.
    pub fn run_to<W: Write, C: Clock>(
        &mut self,
        out: &mut W,
        clock: &C,
    ) -> Result<Vec<BenchResult>> {
        self.options.validate()?;

        let name_width =
            display::name_column_width(self.functions.iter().map(|f| f.name.as_str()));
        out.write_all(display::format_header(name_width, &self.options).as_bytes())?;
        out.flush()?;

        info!(
            functions = self.functions.len(),
            duration = ?self.options.duration(),
            "starting benchmark run"
        );

        let mut results = Vec::with_capacity(self.functions.len());
        for function in &mut self.functions {
            let result = benchmark_one(&self.options, function, clock)?;
            out.write_all(display::format_row(&result, name_width, &self.options).as_bytes())?;
            out.flush()?;
            results.push(result);
        }

        Ok(results)
    }
}

/// Warm up and time a single function.
///
/// Fails with [`BenchError::NoSamples`] when the collection window closes
/// before one call completes.
pub fn benchmark_one<C: Clock>(
    options: &Options,
    function: &mut NamedFunction,
    clock: &C,
) -> Result<BenchResult> {
    options.validate()?;

    for _ in 0..options.warm_ups() {
        function.call();
    }

    let mut estimator = Estimator::new(options.targets())?;
    let mut total = Duration::ZERO;
    let mut count = 0u64;

    let deadline = clock.now() + options.duration();
    loop {
        let start = clock.now();
        if start >= deadline {
            break;
        }
        function.call();
        let elapsed = clock.now().saturating_sub(start);
        estimator.add(elapsed.as_nanos() as f64);
        total += elapsed;
        count += 1;
    }

    if count == 0 {
        return Err(BenchError::NoSamples {
            name: function.name.clone(),
        });
    }

    let mut mean = Duration::from_nanos((total.as_nanos() / u128::from(count)) as u64);
    let mut median = nanos_to_duration(estimator.query(MEDIAN)?);
    let mut quantiles = options
        .quantiles()
        .iter()
        .map(|&p| estimator.query(percent_to_quantile(p)).map(nanos_to_duration))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        name = %function.name,
        count,
        retained = estimator.retained(),
        total = ?total,
        "collection window closed"
    );

    let repeats = options.inner_repeats();
    if repeats > 1 {
        mean /= repeats;
        median /= repeats;
        for q in &mut quantiles {
            *q /= repeats;
        }
    }

    Ok(BenchResult {
        name: function.name.clone(),
        mean,
        median,
        quantiles,
        count,
    })
}

fn nanos_to_duration(nanos: f64) -> Duration {
    Duration::from_nanos(nanos.max(0.0) as u64)
}
