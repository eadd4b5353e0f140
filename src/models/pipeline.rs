//! PipelineResult: the terminal payload of a processed question (spec §3).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::chart::ChartSpec;
use super::process::ProcessFlow;
use super::sql::{QueryResult, SQLQuery};

/// One generation/validation/execution attempt inside the self-correction
/// loop (spec §4.8), kept for observability even when it failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub sql: SQLQuery,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub sql: SQLQuery,
    pub attempts: Vec<AttemptRecord>,
    pub result: QueryResult,
    pub chart: ChartSpec,
    pub process: Option<ProcessFlow>,
    #[serde(with = "millis")]
    pub latency_ms: Duration,
}

mod millis {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
