use std::fmt::Write as _;

use crate::domain::{RunReport, RunReportPayload, Verdict};

const MAX_RESPONSE_PREVIEW: usize = 200;

pub fn render_text(report: &RunReport) -> String {
    let id_width = report
        .outcomes
        .iter()
        .map(|outcome| outcome.case_id.len())
        .max()
        .unwrap_or(0)
        .max(4);

    let mut out = String::new();
    for outcome in &report.outcomes {
        let _ = writeln!(
            out,
            "{:<id_width$}  {:<5}  {:>7}ms",
            outcome.case_id,
            outcome.verdict.label(),
            outcome.latency.as_millis()
        );
        let reason = match &outcome.verdict {
            Verdict::Pass => continue,
            Verdict::Fail(reason) => reason.clone(),
            Verdict::Error(err) => format!("[{}] {err}", err.kind()),
        };
        let _ = writeln!(out, "    {reason}");
        if let Some(body) = &outcome.raw_response {
            let _ = writeln!(out, "    response: {}", preview(body));
        }
    }

    let summary = report.summary;
    let _ = write!(
        out,
        "passed={} failed={} errored={} total={} p50={}ms p95={}ms elapsed={}ms",
        summary.passed,
        summary.failed,
        summary.errored,
        summary.total,
        report.latency.p50_ms,
        report.latency.p95_ms,
        report.elapsed.as_millis()
    );
    if report.cancelled {
        out.push_str(" (cancelled)");
    }
    out.push('\n');
    out
}

pub fn render_json(report: &RunReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&RunReportPayload::from(report))
}

fn preview(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_RESPONSE_PREVIEW) {
        Some((cut, _)) => format!("{:?}…", &trimmed[..cut]),
        None => format!("{trimmed:?}"),
    }
}
