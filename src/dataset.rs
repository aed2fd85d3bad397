//! Synthetic inputs for the tile coder.
//!
//! One input vector is generated per scenario and then held fixed for every
//! call of every calibration attempt of that scenario, so generation cost never
//! lands inside a timed batch.

use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

/// Value written to every slot by [`InputFill::Constant`].
pub const CONSTANT_INPUT: f32 = 0.884_727_2 * 10.0;

/// Upper bound (exclusive) of values drawn by [`InputFill::Random`].
pub const RANDOM_INPUT_RANGE: f32 = 10.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum InputFill {
    /// Uniform values in [0, 10) from a seeded ChaCha8 stream.
    #[default]
    Random,
    /// The same constant in every slot.
    Constant,
}

/// Seed for the input stream of the scenario at `index` within a run.
pub fn per_scenario_seed(master_seed: u64, index: usize) -> u64 {
    master_seed
        .wrapping_add(index as u64)
        .wrapping_mul(0x517cc1b727220a95)
}

pub fn scenario_rng(master_seed: u64, index: usize) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(per_scenario_seed(master_seed, index))
}

/// Generate `size` input values.
pub fn generate_inputs(size: usize, fill: InputFill, rng: &mut ChaCha8Rng) -> Vec<f32> {
    match fill {
        InputFill::Constant => vec![CONSTANT_INPUT; size],
        InputFill::Random => (0..size)
            .map(|_| rng.gen_range(0.0..RANDOM_INPUT_RANGE))
            .collect(),
    }
}
