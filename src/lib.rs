use clap::ValueEnum;
use serde::Serialize;

pub mod dataset;
pub mod error;
pub mod harness;
pub mod layout;
pub mod scenario;
pub mod schema;
pub mod tiles;

pub use error::{BenchError, CalibrationError, TileError};
pub use layout::Layout;

/// How tile hashes are mapped onto indices during a benchmark.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableMode {
    /// Hash modulo the memory size (the reference configuration).
    #[default]
    Modulo,
    /// Route hashes through a safe collision table.
    Collision,
    /// Number tiles sequentially, wrapping once the memory size is used up.
    Indexed,
    /// Run every scenario once per mode.
    All,
}

impl TableMode {
    /// Concrete modes to run, in reporting order.
    pub fn expand(self) -> &'static [TableMode] {
        match self {
            TableMode::Modulo => &[TableMode::Modulo],
            TableMode::Collision => &[TableMode::Collision],
            TableMode::Indexed => &[TableMode::Indexed],
            TableMode::All => &[TableMode::Modulo, TableMode::Collision, TableMode::Indexed],
        }
    }

    /// Appended to the reported function name.
    pub fn suffix(self) -> &'static str {
        match self {
            TableMode::Collision => "_ct",
            TableMode::Indexed => "_idx",
            TableMode::Modulo | TableMode::All => "",
        }
    }
}

/// Name of the benchmarked call as printed in report lines: `tiles` for the
/// reference configuration, with layout and table suffixes otherwise.
pub fn function_name(layout: Layout, mode: TableMode) -> String {
    format!("tiles{}{}", layout.suffix(), mode.suffix())
}
