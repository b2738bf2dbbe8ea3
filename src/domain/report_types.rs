use serde::Serialize;
use std::time::Duration;

use crate::error::CaseError;

// ─── Outcomes ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
    Error(CaseError),
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail(_) => "FAIL",
            Verdict::Error(_) => "ERROR",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    pub case_id: String,
    pub verdict: Verdict,
    pub latency: Duration,
    pub raw_response: Option<String>,
}

// ─── Report ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySummary {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

/// Outcomes in registration order plus the counts derived from them.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcomes: Vec<CaseOutcome>,
    pub summary: RunSummary,
    pub latency: LatencySummary,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl RunReport {
    pub fn all_passed(&self) -> bool {
        self.summary.failed + self.summary.errored == 0
    }
}

// ─── Serialized Report ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseOutcomePayload {
    pub case_id: String,
    pub verdict: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl From<&CaseOutcome> for CaseOutcomePayload {
    fn from(outcome: &CaseOutcome) -> Self {
        let (reason, error_type) = match &outcome.verdict {
            Verdict::Pass => (None, None),
            Verdict::Fail(reason) => (Some(reason.clone()), None),
            Verdict::Error(err) => (Some(err.to_string()), Some(err.kind().to_string())),
        };
        Self {
            case_id: outcome.case_id.clone(),
            verdict: outcome.verdict.label().to_ascii_lowercase(),
            reason,
            error_type,
            latency_ms: outcome.latency.as_millis() as u64,
            raw_response: outcome.raw_response.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportPayload {
    pub summary: RunSummary,
    pub latency: LatencySummary,
    pub elapsed_ms: u64,
    pub cancelled: bool,
    pub cases: Vec<CaseOutcomePayload>,
}

impl From<&RunReport> for RunReportPayload {
    fn from(report: &RunReport) -> Self {
        Self {
            summary: report.summary,
            latency: report.latency,
            elapsed_ms: report.elapsed.as_millis() as u64,
            cancelled: report.cancelled,
            cases: report.outcomes.iter().map(CaseOutcomePayload::from).collect(),
        }
    }
}
