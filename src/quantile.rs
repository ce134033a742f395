//! Single-pass quantile estimation over a fixed set of targets.
//!
//! The estimator keeps a sorted list of tuples `(value, g, delta)` in the
//! style of Greenwald-Khanna / CKMS summaries: `g` counts the observations a
//! tuple stands for and `delta` bounds how far the true rank of its value may
//! sit above the sum of `g` up to and including the tuple. Neighbouring tuples
//! are merged whenever the merged tuple still fits the rank band every target
//! allows at that position, so memory grows with `log(n) / tolerance` instead
//! of `n`.
//!
//! Incoming values are buffered and merged into the tuple list in sorted
//! batches, followed by one compression pass.

use crate::errors::{BenchError, Result};

/// Number of values buffered before they are merged into the summary.
const BUFFER_CAPACITY: usize = 512;

/// A quantile to estimate together with the rank error allowed for it,
/// expressed as a fraction of the number of observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub quantile: f64,
    pub tolerance: f64,
}

impl Target {
    pub fn new(quantile: f64, tolerance: f64) -> Self {
        Self {
            quantile,
            tolerance,
        }
    }

    /// Largest `g + delta` this target tolerates for a tuple preceded by
    /// `rank` observations out of `n`.
    ///
    /// Flat at `2 * tolerance * n` around `quantile * n` and growing linearly
    /// away from it. The slopes keep the band from shrinking as observations
    /// are appended, whether they land before or after the tuple.
    fn band(&self, rank: f64, n: f64) -> f64 {
        let (q, eps) = (self.quantile, self.tolerance);
        let low = (q - eps) * n;
        let high = (q + eps) * n;
        let mut width = 2.0 * eps * n;
        if rank < low {
            width += 2.0 * eps / (1.0 - q + eps) * (low - rank);
        } else if rank > high {
            width += 2.0 * eps / (q + eps) * (rank - high);
        }
        width
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tuple {
    value: f64,
    g: u64,
    delta: u64,
}

/// Streaming estimator for a fixed set of quantile targets.
///
/// # Example
///
/// ```
/// use quantbench::quantile::{Estimator, Target};
///
/// let mut estimator = Estimator::new([Target::new(0.5, 0.01), Target::new(0.99, 0.01)]).unwrap();
/// for i in 1..=10_000 {
///     estimator.add(i as f64);
/// }
/// let median = estimator.query(0.5).unwrap();
/// assert!((median - 5_000.0).abs() <= 100.0);
/// ```
#[derive(Debug, Clone)]
pub struct Estimator {
    targets: Vec<Target>,
    tuples: Vec<Tuple>,
    buffer: Vec<f64>,
    count: u64,
}

impl Estimator {
    /// Build an estimator for `targets`.
    ///
    /// Every quantile and tolerance must lie strictly inside `(0, 1)` and no
    /// quantile may appear twice.
    pub fn new(targets: impl IntoIterator<Item = Target>) -> Result<Self> {
        let targets: Vec<Target> = targets.into_iter().collect();
        if targets.is_empty() {
            return Err(BenchError::NoTargets);
        }

        for (i, target) in targets.iter().enumerate() {
            if !(target.quantile > 0.0 && target.quantile < 1.0) {
                return Err(BenchError::InvalidQuantile {
                    quantile: target.quantile,
                });
            }
            if !(target.tolerance > 0.0 && target.tolerance < 1.0) {
                return Err(BenchError::InvalidTolerance {
                    tolerance: target.tolerance,
                });
            }
            if targets[..i].iter().any(|t| t.quantile == target.quantile) {
                return Err(BenchError::DuplicateQuantile {
                    quantile: target.quantile,
                });
            }
        }

        Ok(Self {
            targets,
            tuples: Vec::new(),
            buffer: Vec::with_capacity(BUFFER_CAPACITY),
            count: 0,
        })
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Number of observations ingested so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Number of tuples held by the summary once pending values are merged.
    pub fn retained(&mut self) -> usize {
        self.flush();
        self.tuples.len()
    }

    /// Ingest one observation. NaN is ignored.
    pub fn add(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.buffer.push(value);
        self.count += 1;
        if self.buffer.len() >= BUFFER_CAPACITY {
            self.flush();
        }
    }

    /// Estimated value at `quantile`, which must be one of the configured
    /// targets. An estimator without observations answers `0.0`.
    ///
    /// The returned value's true rank lies within `tolerance * count` of
    /// `quantile * count`.
    pub fn query(&mut self, quantile: f64) -> Result<f64> {
        if !self.targets.iter().any(|t| t.quantile == quantile) {
            return Err(BenchError::UnconfiguredQuantile { quantile });
        }
        self.flush();

        let wanted = quantile * self.count as f64;
        let mut best: Option<(f64, f64)> = None;
        let mut rmin = 0u64;
        for tuple in &self.tuples {
            rmin += tuple.g;
            let rmax = rmin + tuple.delta;
            let miss = (wanted - rmin as f64).max(rmax as f64 - wanted);
            match best {
                Some((best_miss, _)) if rmin as f64 - wanted > best_miss => break,
                // Equal misses prefer the later tuple, so an even split
                // resolves upwards.
                Some((best_miss, _)) if miss > best_miss => {}
                _ => best = Some((miss, tuple.value)),
            }
        }

        Ok(best.map_or(0.0, |(_, value)| value))
    }

    /// Smallest band over all targets at `rank`.
    fn allowed(&self, rank: f64, n: f64) -> f64 {
        self.targets
            .iter()
            .map(|t| t.band(rank, n))
            .fold(f64::INFINITY, f64::min)
    }

    /// Merge the sorted buffer into the tuple list, then compress.
    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        self.buffer.sort_unstable_by(f64::total_cmp);

        let n = self.count as f64;
        let old = std::mem::take(&mut self.tuples);
        let mut merged: Vec<Tuple> = Vec::with_capacity(old.len() + self.buffer.len());
        // Observations covered by every tuple of `merged` except the last.
        let mut rank = 0u64;
        let mut next = 0;

        for &value in &self.buffer {
            while next < old.len() && old[next].value <= value {
                push(&mut merged, &mut rank, old[next]);
                next += 1;
            }

            // An equal value can join the preceding tuple if the band allows it.
            let len = merged.len();
            if let Some(last) = merged.last_mut()
                && last.value == value
                && (len == 1
                    || (last.g + 1 + last.delta) as f64 <= self.allowed(rank as f64, n).max(1.0))
            {
                last.g += 1;
                continue;
            }

            // Below the first or above the last old tuple the rank is exact;
            // otherwise it is bounded by the successor's rank range.
            let delta = if next == 0 || next == old.len() {
                0
            } else {
                old[next].g + old[next].delta - 1
            };
            push(
                &mut merged,
                &mut rank,
                Tuple {
                    value,
                    g: 1,
                    delta,
                },
            );
        }
        for &tuple in &old[next..] {
            push(&mut merged, &mut rank, tuple);
        }

        self.buffer.clear();
        self.tuples = merged;
        self.compress();
    }

    /// Fold tuples into their successor wherever the band allows it. The
    /// first and last tuples are never folded away, which keeps the minimum
    /// and maximum exact.
    fn compress(&mut self) {
        let n = self.count as f64;
        let old = std::mem::take(&mut self.tuples);
        let last = old.len().saturating_sub(1);
        let mut kept: Vec<Tuple> = Vec::with_capacity(old.len());
        // Observations covered by `kept`.
        let mut rank = 0u64;
        let mut carry = 0u64;

        for (i, tuple) in old.iter().enumerate() {
            let mut tuple = *tuple;
            tuple.g += carry;
            carry = 0;

            if i != 0 && i != last {
                let succ = &old[i + 1];
                if (tuple.g + succ.g + succ.delta) as f64 <= self.allowed(rank as f64, n) {
                    carry = tuple.g;
                    continue;
                }
            }
            rank += tuple.g;
            kept.push(tuple);
        }

        self.tuples = kept;
    }
}

fn push(tuples: &mut Vec<Tuple>, rank: &mut u64, tuple: Tuple) {
    if let Some(last) = tuples.last() {
        *rank += last.g;
    }
    tuples.push(tuple);
}
