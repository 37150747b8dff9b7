//! Decision telemetry.
//!
//! One JSON line per processed query, appended to a JSONL file. Records carry
//! the lane, confidence and outcome of a decision but never the message text
//! or the owner's identifier.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use triage::{ErrorCode, ProcessingResult, ProcessingType, QueryContext};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    User,
    Guest,
    Anonymous,
}

impl OwnerKind {
    pub fn of(ctx: &QueryContext) -> Self {
        match ctx.owner() {
            Some(owner) if owner.is_guest() => Self::Guest,
            Some(_) => Self::User,
            None => Self::Anonymous,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub lane: ProcessingType,
    pub confidence: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    pub elapsed_ms: f64,
    pub owner_kind: OwnerKind,
    #[serde(default)]
    pub portfolio_modified: bool,
}

impl DecisionRecord {
    pub fn from_result(result: &ProcessingResult, ctx: &QueryContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            lane: result.processing_type,
            confidence: result.confidence,
            success: result.success,
            error_code: result.error.as_ref().map(|e| e.code),
            elapsed_ms: result.execution_time_ms,
            owner_kind: OwnerKind::of(ctx),
            portfolio_modified: result
                .metadata
                .as_ref()
                .is_some_and(|m| m.portfolio_modified),
        }
    }
}

/// Append-only JSONL sink. Write failures are logged, never returned.
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    path: PathBuf,
}

impl TelemetrySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &DecisionRecord) {
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize decision record: {e}");
                return;
            }
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create telemetry directory: {e}");
                return;
            }
        }
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{json}") {
                    warn!("Failed to append decision record: {e}");
                } else {
                    debug!(path = %self.path.display(), lane = %record.lane, "Appended decision record");
                }
            }
            Err(e) => warn!("Failed to open telemetry file: {e}"),
        }
    }

    /// Read every record back. Malformed lines are skipped.
    pub fn read_all(&self) -> std::io::Result<Vec<DecisionRecord>> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed decision record: {e}");
                    None
                }
            })
            .collect())
    }
}

/// Aggregate view over a decision log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecisionSummary {
    pub total: usize,
    pub per_lane: BTreeMap<String, usize>,
    pub success_rate: f64,
    pub mutation_count: usize,
    pub mean_elapsed_ms: f64,
    pub errors: BTreeMap<String, usize>,
}

pub fn summarize(records: &[DecisionRecord]) -> DecisionSummary {
    if records.is_empty() {
        return DecisionSummary::default();
    }
    let mut summary = DecisionSummary {
        total: records.len(),
        ..Default::default()
    };
    let mut successes = 0usize;
    let mut elapsed = 0.0;
    for r in records {
        *summary.per_lane.entry(r.lane.to_string()).or_default() += 1;
        if let Some(code) = r.error_code {
            *summary.errors.entry(code.to_string()).or_default() += 1;
        }
        if r.success {
            successes += 1;
        }
        if r.portfolio_modified {
            summary.mutation_count += 1;
        }
        elapsed += r.elapsed_ms;
    }
    summary.success_rate = successes as f64 / records.len() as f64;
    summary.mean_elapsed_ms = elapsed / records.len() as f64;
    summary
}
