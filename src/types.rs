use std::fmt;
use std::time::Duration;

/// A function to benchmark and the name it is reported under.
pub struct NamedFunction {
    pub name: String,
    pub func: Box<dyn FnMut()>,
}

impl NamedFunction {
    pub fn new(name: impl Into<String>, func: impl FnMut() + 'static) -> Self {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn call(&mut self) {
        (self.func)()
    }
}

impl fmt::Debug for NamedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Statistics collected for one benchmarked function.
///
/// Durations are already divided by the inner-repeat multiplier; `count` is
/// the number of timed calls.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchResult {
    pub name: String,
    pub mean: Duration,
    pub median: Duration,
    /// One value per configured percentile, in configured order.
    pub quantiles: Vec<Duration>,
    pub count: u64,
}
