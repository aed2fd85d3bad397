use std::io;

/// Misuse of the tile coder or exhaustion of a collision table.
#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("output buffer holds no tilings")]
    NoTilings,
    #[error("{0} tilings do not fit in an i32")]
    TooManyTilings(usize),
    #[error("input {index} is not a finite number")]
    NonFiniteInput { index: usize },
    #[error("no input groups to tile")]
    NoGroups,
    #[error("input dimension {index} out of range for {inputs} inputs")]
    DimensionOutOfRange { index: usize, inputs: usize },
    #[error("{outputs} output slots cannot be split evenly across {groups} groups")]
    UnevenTilings { outputs: usize, groups: usize },
    #[error("more than {capacity} tile indices were used, so one is being overwritten")]
    IndexOverflow { capacity: usize },
    #[error("memory size must be positive")]
    EmptyIndexSpace,
    #[error("collision table size {0} is not a power of two")]
    TableSizeNotPowerOfTwo(usize),
    #[error("collision table out of memory after {probes} probes")]
    CollisionTableFull { probes: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error(
        "calibration did not converge after {attempts} attempts \
         (last: {last_iterations} iterations in {last_elapsed_s:.9}s)"
    )]
    DidNotConverge {
        attempts: u32,
        last_iterations: u64,
        last_elapsed_s: f64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("tiles: {0}")]
    Tiles(#[from] TileError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<BenchError> for io::Error {
    fn from(err: BenchError) -> Self {
        match err {
            BenchError::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}
