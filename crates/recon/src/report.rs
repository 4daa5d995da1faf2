use crate::model::{Mode, Outcome, ReconMeta, ReconReport};

/// Stamp reconciler output with run metadata.
pub fn assemble(job_name: &str, mode: Mode, outcome: Outcome) -> ReconReport {
    ReconReport {
        meta: ReconMeta {
            job_name: job_name.to_string(),
            mode,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        outcome,
    }
}

/// Headers worth showing alongside a mismatch entry: everything except the
/// column already being compared. Presentation support only; the engine
/// itself never consumes this.
pub fn inspect_columns(headers: &[String], compared: &str) -> Vec<String> {
    headers
        .iter()
        .filter(|h| h.as_str() != compared)
        .cloned()
        .collect()
}
