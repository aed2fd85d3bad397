//! Benchmark scenarios: a label plus the shape of one tile-coder call.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BenchmarkScenario {
    pub name: Cow<'static, str>,
    /// Number of real-valued inputs per call.
    pub input_size: usize,
    /// Number of tilings, i.e. indices produced per call.
    pub num_tilings: usize,
}

impl BenchmarkScenario {
    pub const fn new(name: &'static str, input_size: usize, num_tilings: usize) -> Self {
        Self {
            name: Cow::Borrowed(name),
            input_size,
            num_tilings,
        }
    }
}

/// Reference scenarios, run in this order when none are given.
pub const DEFAULT_SCENARIOS: &[BenchmarkScenario] = &[
    BenchmarkScenario::new("1x1", 1, 1),
    BenchmarkScenario::new("4x16", 4, 16),
    BenchmarkScenario::new("20x128", 20, 128),
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScenarioParseError {
    #[error("expected NAME:INPUTS:TILINGS, got {0:?}")]
    Shape(String),
    #[error("scenario name is empty")]
    EmptyName,
    #[error("{field} must be a positive integer, got {value:?}")]
    NotPositive { field: &'static str, value: String },
}

fn positive(field: &'static str, value: &str) -> Result<usize, ScenarioParseError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ScenarioParseError::NotPositive {
            field,
            value: value.to_string(),
        }),
    }
}

impl FromStr for BenchmarkScenario {
    type Err = ScenarioParseError;

    /// Parse `NAME:INPUTS:TILINGS`, e.g. `4x16:4:16`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [name, inputs, tilings] = parts[..] else {
            return Err(ScenarioParseError::Shape(s.to_string()));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(ScenarioParseError::EmptyName);
        }
        Ok(Self {
            name: Cow::Owned(name.to_string()),
            input_size: positive("INPUTS", inputs)?,
            num_tilings: positive("TILINGS", tilings)?,
        })
    }
}

impl fmt::Display for BenchmarkScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.input_size, self.num_tilings)
    }
}
