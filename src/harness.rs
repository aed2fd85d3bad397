use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;
use std::time::{Duration, Instant};

use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::dataset::{self, InputFill};
use crate::error::{BenchError, CalibrationError};
use crate::layout::Layout;
use crate::tiles::DEFAULT_MEMORY_SIZE;
use crate::TableMode;

/// A timed batch must last at least this long before it is trusted.
pub const DEFAULT_MIN_SECONDS: f64 = 1.0;

/// Attempt 40 runs 10^13 iterations; anything still under threshold is broken.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 40;

pub const DEFAULT_COLLISION_TABLE_SIZE: usize = 16_384;

const LEADING_DIGITS: [u64; 3] = [1, 2, 5];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationConfig {
    pub min_seconds: f64,
    pub max_attempts: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_seconds: DEFAULT_MIN_SECONDS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub seed: u64,
    pub input_fill: InputFill,
    pub calibration: CalibrationConfig,
    pub memory_size: usize,
    pub collision_table_size: usize,
    pub table_mode: TableMode,
    pub layout: Layout,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            input_fill: InputFill::default(),
            calibration: CalibrationConfig::default(),
            memory_size: DEFAULT_MEMORY_SIZE,
            collision_table_size: DEFAULT_COLLISION_TABLE_SIZE,
            table_mode: TableMode::default(),
            layout: Layout::default(),
        }
    }
}

impl BenchConfig {
    /// Input stream for the scenario at `index` in the run.
    pub fn rng(&self, index: usize) -> ChaCha8Rng {
        dataset::scenario_rng(self.seed, index)
    }
}

/// Monotonic time source, read as the offset from a fixed origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same time, so a simulated workload can hold one handle and
/// advance it per call while the harness reads another. An optional `tick` is
/// added after every reading.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
    tick: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tick(tick: Duration) -> Self {
        Self {
            now: Rc::default(),
            tick,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        let t = self.now.get();
        self.now.set(t + self.tick);
        t
    }
}

/// One repeatable call of the function under test.
pub trait Workload {
    /// Per-attempt buffers, allocated inside the timed region and dropped at its end.
    type Scratch;

    fn scratch(&mut self) -> Self::Scratch;

    fn call(&mut self, scratch: &mut Self::Scratch) -> Result<(), BenchError>;

    /// Errors recorded by calls that did not stop them.
    fn check(&self) -> Result<(), BenchError> {
        Ok(())
    }

    /// State worth reporting after calibration, e.g. table occupancy.
    fn stats(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Wall-clock seconds to run `workload` exactly `iterations` times back to back.
///
/// Nothing is subtracted for timer overhead. A result of `0.0` is possible for
/// short batches on coarse clocks.
pub fn measure<C: Clock, W: Workload>(
    clock: &C,
    iterations: u64,
    workload: &mut W,
) -> Result<f64, BenchError> {
    let start = clock.now();
    {
        let mut scratch = workload.scratch();
        for _ in 0..iterations {
            workload.call(black_box(&mut scratch))?;
        }
        black_box(&scratch);
    }
    let end = clock.now();
    Ok(end.saturating_sub(start).as_secs_f64())
}

/// Iteration count probed by calibration attempt `attempt`: 1, 2, 5, 10, 20, 50, ...
///
/// `None` once the count no longer fits in a `u64` (attempt 57 onwards).
pub fn iterations_for_attempt(attempt: u32) -> Option<u64> {
    let digit = LEADING_DIGITS[(attempt % 3) as usize];
    10u64.checked_pow(attempt / 3)?.checked_mul(digit)
}

/// The 1-2-5 progression as an iterator, starting at attempt 0.
#[derive(Clone, Debug, Default)]
pub struct IterationSchedule {
    attempt: u32,
}

impl IterationSchedule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Iterator for IterationSchedule {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let n = iterations_for_attempt(self.attempt)?;
        self.attempt += 1;
        Some(n)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationResult {
    /// Seconds taken by exactly `iterations` calls, from the final attempt.
    pub elapsed_s: f64,
    pub iterations: u64,
    /// Number of attempts run, including the final one.
    pub attempts: u32,
}

impl CalibrationResult {
    pub fn ns_per_call(&self) -> f64 {
        self.elapsed_s * 1e9 / self.iterations as f64
    }
}

/// Probe the 1-2-5 schedule with `measure` until one batch takes at least
/// `config.min_seconds`.
///
/// The returned `elapsed_s` and `iterations` always come from the same attempt.
pub fn calibrate_with<E>(
    config: &CalibrationConfig,
    mut measure: impl FnMut(u64) -> Result<f64, E>,
) -> Result<CalibrationResult, E>
where
    E: From<CalibrationError>,
{
    let mut last = (0u32, 0u64, 0.0f64);

    let schedule = IterationSchedule::new().take(config.max_attempts as usize);
    for (attempt, iterations) in (1u32..).zip(schedule) {
        let elapsed_s = measure(iterations)?;
        debug!(attempt, iterations, elapsed_s, "calibration attempt");

        if elapsed_s >= config.min_seconds {
            return Ok(CalibrationResult {
                elapsed_s,
                iterations,
                attempts: attempt,
            });
        }
        last = (attempt, iterations, elapsed_s);
    }

    let (attempts, last_iterations, last_elapsed_s) = last;
    Err(CalibrationError::DidNotConverge {
        attempts,
        last_iterations,
        last_elapsed_s,
    }
    .into())
}

/// Calibrate `workload` against `clock`.
pub fn calibrate<C: Clock, W: Workload>(
    clock: &C,
    config: &CalibrationConfig,
    workload: &mut W,
) -> Result<CalibrationResult, BenchError> {
    calibrate_with(config, |iterations| measure(clock, iterations, &mut *workload))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Advances a shared clock by a fixed cost per call.
    struct FixedCost {
        clock: ManualClock,
        per_call: Duration,
        calls: u64,
        attempts: Vec<u64>,
    }

    impl FixedCost {
        fn new(clock: &ManualClock, per_call: Duration) -> Self {
            Self {
                clock: clock.clone(),
                per_call,
                calls: 0,
                attempts: Vec::new(),
            }
        }
    }

    impl Workload for FixedCost {
        type Scratch = u64;

        fn scratch(&mut self) -> u64 {
            self.attempts.push(0);
            0
        }

        fn call(&mut self, scratch: &mut u64) -> Result<(), BenchError> {
            *scratch += 1;
            self.calls += 1;
            if let Some(last) = self.attempts.last_mut() {
                *last += 1;
            }
            self.clock.advance(self.per_call);
            Ok(())
        }
    }

    #[test]
    fn test_schedule_prefix() {
        let got: Vec<u64> = (0..12).filter_map(iterations_for_attempt).collect();
        assert_eq!(
            got,
            vec![1, 2, 5, 10, 20, 50, 100, 200, 500, 1_000, 2_000, 5_000]
        );
    }

    #[test]
    fn test_schedule_strictly_increasing_and_pure() {
        let seq: Vec<u64> = IterationSchedule::new().collect();
        assert_eq!(seq.len(), 57);
        assert!(seq.windows(2).all(|w| w[0] < w[1]));
        for (attempt, &n) in seq.iter().enumerate() {
            assert_eq!(iterations_for_attempt(attempt as u32), Some(n));
            assert_eq!(iterations_for_attempt(attempt as u32), Some(n));
        }
    }

    #[test]
    fn test_schedule_ends_on_overflow() {
        assert_eq!(iterations_for_attempt(56), Some(5_000_000_000_000_000_000));
        assert_eq!(iterations_for_attempt(57), None);
        assert_eq!(iterations_for_attempt(u32::MAX), None);
    }

    #[test]
    fn test_measure_counts_calls_and_time() {
        let clock = ManualClock::new();
        let mut w = FixedCost::new(&clock, Duration::from_micros(3));
        let elapsed = measure(&clock, 7, &mut w).unwrap();
        assert_eq!(w.calls, 7);
        assert_eq!(w.attempts, vec![7]);
        assert_eq!(elapsed, Duration::from_micros(21).as_secs_f64());
    }

    #[test]
    fn test_measure_tolerates_zero_elapsed() {
        let clock = ManualClock::new();
        let mut w = FixedCost::new(&clock, Duration::ZERO);
        assert_eq!(measure(&clock, 1, &mut w).unwrap(), 0.0);
    }

    #[test]
    fn test_calibrate_with_converges_at_threshold() {
        let mut probed = Vec::new();
        let result = calibrate_with(&CalibrationConfig::default(), |n| {
            probed.push(n);
            Ok::<_, BenchError>(Duration::from_millis(10 * n).as_secs_f64())
        })
        .unwrap();
        assert_eq!(result.iterations, 100);
        assert_eq!(result.elapsed_s, 1.0);
        assert_eq!(result.attempts, 7);
        assert_eq!(probed, vec![1, 2, 5, 10, 20, 50, 100]);
    }

    #[test]
    fn test_slow_first_attempt_returns_one_iteration() {
        let result = calibrate_with(&CalibrationConfig::default(), |n| {
            Ok::<_, BenchError>(1.5 * n as f64)
        })
        .unwrap();
        assert_eq!(result.iterations, 1);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.elapsed_s, 1.5);
    }

    #[test]
    fn test_result_pairs_iterations_with_their_elapsed() {
        // Noisy measurement: the final elapsed must belong to the final count.
        let result = calibrate_with(&CalibrationConfig::default(), |n| {
            Ok::<_, BenchError>(if n == 20 { 1.25 } else { 0.1 })
        })
        .unwrap();
        assert_eq!(result.iterations, 20);
        assert_eq!(result.elapsed_s, 1.25);
    }

    #[test]
    fn test_zero_cost_does_not_converge() {
        let config = CalibrationConfig {
            max_attempts: 5,
            ..Default::default()
        };
        let err = calibrate_with(&config, |_| Ok::<_, BenchError>(0.0)).unwrap_err();
        match err {
            BenchError::Calibration(CalibrationError::DidNotConverge {
                attempts,
                last_iterations,
                last_elapsed_s,
            }) => {
                assert_eq!(attempts, 5);
                assert_eq!(last_iterations, 20);
                assert_eq!(last_elapsed_s, 0.0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_measurement_error_propagates() {
        let err = calibrate_with(&CalibrationConfig::default(), |_| {
            Err::<f64, _>(BenchError::Io(std::io::Error::other("boom")))
        })
        .unwrap_err();
        assert!(matches!(err, BenchError::Io(_)));
    }

    #[test]
    fn test_calibrate_allocates_scratch_once_per_attempt() {
        let clock = ManualClock::new();
        let mut w = FixedCost::new(&clock, Duration::from_millis(10));
        let result = calibrate(&clock, &CalibrationConfig::default(), &mut w).unwrap();
        assert_eq!(result.iterations, 100);
        assert_eq!(w.attempts, vec![1, 2, 5, 10, 20, 50, 100]);
        assert_eq!(w.calls, 188);
    }

    #[test]
    fn test_ns_per_call() {
        let r = CalibrationResult {
            elapsed_s: 1.0,
            iterations: 500,
            attempts: 9,
        };
        assert_eq!(r.ns_per_call(), 2_000_000.0);
        assert!(r.ns_per_call().is_finite());
    }

    #[test]
    fn test_manual_clock_tick() {
        let clock = ManualClock::with_tick(Duration::from_secs(2));
        let shared = clock.clone();
        assert_eq!(clock.now(), Duration::ZERO);
        shared.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_secs(3));
    }

    #[test]
    fn test_monotonic_clock_never_goes_back() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
