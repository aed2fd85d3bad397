use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub seed: u64,
    pub input_fill: String,
    pub min_seconds: f64,
    pub max_attempts: u32,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub function: String,
    pub unit: String,

    pub iterations: u64,
    pub attempts: u32,

    pub elapsed_s: f64,
    pub ns_per_call: f64,

    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilesBenchReport {
    pub run: RunMeta,
    pub measurements: Vec<Measurement>,
}
