use hdrhistogram::Histogram;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};

use crate::domain::{CaseOutcome, LatencySummary, RunReport, RunSummary, TestCase, Verdict};
use crate::engine::cancel::{cancel_requested, CancelSignal};
use crate::engine::compare::{self, AnswerFormat};
use crate::engine::fixture;
use crate::engine::http::{Dispatcher, QuestionRequest, Transport};
use crate::error::{CaseError, FixtureError, TransportError};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub concurrency: usize,
    pub default_timeout: Duration,
    pub answer: AnswerFormat,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            default_timeout: Duration::from_secs(60),
            answer: AnswerFormat::Raw,
        }
    }
}

/// Runs every case with at most `options.concurrency` in flight.
///
/// Outcomes are indexed by case position, so the report order is the
/// registration order whatever the completion order was. Cases that never
/// started because of cancellation are reported as `Error(Cancelled)`.
pub async fn run_cases<T: Transport>(
    cases: Vec<TestCase>,
    dispatcher: Arc<Dispatcher<T>>,
    options: RunOptions,
    cancel: &CancelSignal,
) -> RunReport {
    let started = Instant::now();
    let cases: Arc<[TestCase]> = cases.into();
    let options = Arc::new(options);
    let worker_count = options.concurrency.max(1).min(cases.len().max(1));
    let cancelled = Arc::new(AtomicBool::new(false));
    let next_case = Arc::new(AtomicUsize::new(0));
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<(usize, CaseOutcome)>();

    tracing::info!(cases = cases.len(), workers = worker_count, "starting run");

    let mut handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let cases = cases.clone();
        let dispatcher = dispatcher.clone();
        let options = options.clone();
        let cancelled = cancelled.clone();
        let next_case = next_case.clone();
        let outcome_tx = outcome_tx.clone();
        let mut worker_cancel_rx = cancel.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                if cancelled.load(Ordering::Relaxed) || cancel_requested(&mut worker_cancel_rx) {
                    cancelled.store(true, Ordering::Relaxed);
                    break;
                }

                let idx = next_case.fetch_add(1, Ordering::Relaxed);
                let Some(case) = cases.get(idx) else {
                    break;
                };

                let outcome = run_case(case, &dispatcher, &options, &mut worker_cancel_rx).await;
                if matches!(
                    outcome.verdict,
                    Verdict::Error(CaseError::Transport(TransportError::Cancelled))
                ) {
                    cancelled.store(true, Ordering::Relaxed);
                }
                let _ = outcome_tx.send((idx, outcome));
            }
        });
        handles.push(handle);
    }
    drop(outcome_tx);

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!("case worker crashed: {err}");
        }
    }

    let mut slots: Vec<Option<CaseOutcome>> = vec![None; cases.len()];
    while let Some((idx, outcome)) = outcome_rx.recv().await {
        slots[idx] = Some(outcome);
    }

    let outcomes: Vec<CaseOutcome> = slots
        .into_iter()
        .zip(cases.iter())
        .map(|(slot, case)| {
            slot.unwrap_or_else(|| CaseOutcome {
                case_id: case.id.clone(),
                verdict: Verdict::Error(TransportError::Cancelled.into()),
                latency: Duration::ZERO,
                raw_response: None,
            })
        })
        .collect();

    let report = aggregate_outcomes(outcomes, started.elapsed(), cancelled.load(Ordering::Relaxed));
    tracing::info!(
        passed = report.summary.passed,
        failed = report.summary.failed,
        errored = report.summary.errored,
        "run finished"
    );
    report
}

async fn run_case<T: Transport>(
    case: &TestCase,
    dispatcher: &Dispatcher<T>,
    options: &RunOptions,
    cancel_rx: &mut broadcast::Receiver<()>,
) -> CaseOutcome {
    let started = Instant::now();
    let finish = |verdict: Verdict, raw_response: Option<String>| CaseOutcome {
        case_id: case.id.clone(),
        verdict,
        latency: started.elapsed(),
        raw_response,
    };

    let file = match build_fixture(case).await {
        Ok(file) => file,
        Err(err) => {
            tracing::warn!(case = %case.id, "fixture rejected: {err}");
            return finish(Verdict::Error(err.into()), None);
        }
    };

    let request = QuestionRequest {
        question: case.question.clone(),
        file,
    };
    let timeout = case.effective_timeout(options.default_timeout);
    let body = match dispatcher.send(&request, timeout, cancel_rx).await {
        Ok(body) => body,
        Err(err) => {
            tracing::debug!(case = %case.id, "dispatch failed: {err}");
            let raw_response = match &err {
                TransportError::BadStatus { body, .. } => Some(body.clone()),
                _ => None,
            };
            return finish(Verdict::Error(err.into()), raw_response);
        }
    };

    let verdict = match compare::extract_answer(&options.answer, &body) {
        Ok(answer) => compare::compare(&case.expected, &answer),
        Err(reason) => Verdict::Fail(reason),
    };
    finish(verdict, Some(body))
}

/// Archive builds touch the filesystem, so they run off the async workers.
async fn build_fixture(case: &TestCase) -> Result<Option<fixture::FixturePayload>, FixtureError> {
    let Some(spec) = case.fixture.clone() else {
        return Ok(None);
    };
    tokio::task::spawn_blocking(move || fixture::build(&spec))
        .await
        .map_err(|err| FixtureError::Io(format!("fixture builder crashed: {err}")))?
}

fn round_to_3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub fn aggregate_outcomes(outcomes: Vec<CaseOutcome>, elapsed: Duration, cancelled: bool) -> RunReport {
    let mut summary = RunSummary {
        total: outcomes.len(),
        ..RunSummary::default()
    };
    for outcome in &outcomes {
        match outcome.verdict {
            Verdict::Pass => summary.passed += 1,
            Verdict::Fail(_) => summary.failed += 1,
            Verdict::Error(_) => summary.errored += 1,
        }
    }

    RunReport {
        latency: latency_summary(&outcomes),
        outcomes,
        summary,
        elapsed,
        cancelled,
    }
}

fn latency_summary(outcomes: &[CaseOutcome]) -> LatencySummary {
    let Ok(mut histogram) = Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3) else {
        return LatencySummary::default();
    };
    let mut recorded = 0usize;
    for outcome in outcomes.iter().filter(|outcome| outcome.latency > Duration::ZERO) {
        let latency_us = (outcome.latency.as_micros() as u64).clamp(1, 3_600_000_000);
        if histogram.record(latency_us).is_ok() {
            recorded += 1;
        }
    }
    if recorded == 0 {
        return LatencySummary::default();
    }

    LatencySummary {
        p50_ms: round_to_3(histogram.value_at_quantile(0.50) as f64 / 1000.0),
        p95_ms: round_to_3(histogram.value_at_quantile(0.95) as f64 / 1000.0),
        max_ms: round_to_3(histogram.max() as f64 / 1000.0),
    }
}
