mod case_types;
mod report_types;

pub use case_types::{ArchiveEntry, DigestAlgorithm, ExpectationSpec, FixtureSpec, TestCase};
pub use report_types::{
    CaseOutcome, CaseOutcomePayload, LatencySummary, RunReport, RunReportPayload, RunSummary,
    Verdict,
};
