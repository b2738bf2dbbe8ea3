use std::fs;
use std::future::Future;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use qaprobe::cases::CaseRegistry;
use qaprobe::cli::{
    answer_format, init_logging, render_json, render_text, resolve_endpoint, AskArgs, Cli,
    Command, HarnessConfig, ListArgs, OutputFormat, RunArgs,
};
use qaprobe::engine::cancel::CancelSignal;
use qaprobe::engine::compare::extract_answer;
use qaprobe::engine::fixture::FixturePayload;
use qaprobe::engine::http::{build_client, Dispatcher, HttpTransport, QuestionRequest};
use qaprobe::engine::runner::{run_cases, RunOptions};
use qaprobe::error::ConfigError;

const EXIT_FAILED: u8 = 1;
const EXIT_MISCONFIGURED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Run(args) => run_suite(args).await,
        Command::Ask(args) => ask(args).await,
        Command::List(args) => list(args),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(EXIT_MISCONFIGURED)
        }
    }
}

fn load_registry(path: Option<&Path>) -> Result<CaseRegistry, ConfigError> {
    match path {
        Some(path) => CaseRegistry::load(path),
        None => Ok(CaseRegistry::standard()),
    }
}

async fn run_suite(args: RunArgs) -> Result<ExitCode> {
    let config = HarnessConfig::from_run_args(&args)?;
    let registry = load_registry(config.cases_path.as_deref())?;
    let cases = registry.filtered(config.case_filter.as_deref());
    if cases.is_empty() {
        anyhow::bail!(
            "no cases match filter `{}`",
            config.case_filter.as_deref().unwrap_or("")
        );
    }

    let client = build_client(config.concurrency).map_err(ConfigError::Client)?;
    let dispatcher = Arc::new(Dispatcher::new(HttpTransport::new(
        client,
        config.endpoint.clone(),
    )));
    tracing::info!(endpoint = %config.endpoint, cases = cases.len(), "running suite");

    let cancel = CancelSignal::new();
    let watcher = {
        let cancel = cancel.clone();
        let suite_timeout = config.suite_timeout;
        tokio::spawn(async move {
            let deadline = async {
                match suite_timeout {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                _ = interrupted() => tracing::warn!("interrupted; cancelling run"),
                _ = deadline => tracing::warn!("suite timeout reached; cancelling run"),
            }
            cancel.cancel();
        })
    };

    let options = RunOptions {
        concurrency: config.concurrency,
        default_timeout: config.default_timeout,
        answer: config.answer.clone(),
    };
    let report = run_cases(cases, dispatcher, options, &cancel).await;
    watcher.abort();

    match config.output {
        OutputFormat::Text => print!("{}", render_text(&report)),
        OutputFormat::Json => println!("{}", render_json(&report)?),
    }
    if let Some(path) = &config.report_path {
        fs::write(path, render_json(&report)?)
            .with_context(|| format!("writing report to {}", path.display()))?;
    }

    if report.all_passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_FAILED))
    }
}

/// Resolves on Ctrl-C. Never resolves when the handler cannot be installed.
async fn interrupted() {
    on_signal(tokio::signal::ctrl_c()).await
}

async fn on_signal(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => {}
        Err(err) => {
            tracing::warn!(%err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await
        }
    }
}

async fn ask(args: AskArgs) -> Result<ExitCode> {
    if args.timeout.is_zero() {
        return Err(ConfigError::ZeroTimeout.into());
    }
    let endpoint = resolve_endpoint(&args.endpoint)?;

    let file = match &args.file {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .context("upload path has no file name")?;
            Some(FixturePayload {
                filename,
                bytes: Bytes::from(bytes),
            })
        }
        None => None,
    };

    let client = build_client(1).map_err(ConfigError::Client)?;
    let dispatcher = Dispatcher::new(HttpTransport::new(client, endpoint));
    let request = QuestionRequest {
        question: args.question,
        file,
    };

    let cancel = CancelSignal::new();
    let body = match dispatcher
        .send(&request, args.timeout, &mut cancel.subscribe())
        .await
    {
        Ok(body) => body,
        Err(err) => {
            eprintln!("Error [{}]: {err}", err.kind());
            return Ok(ExitCode::from(EXIT_FAILED));
        }
    };

    match extract_answer(&answer_format(args.answer_field.as_deref()), &body) {
        Ok(answer) => {
            println!("{answer}");
            Ok(ExitCode::SUCCESS)
        }
        Err(reason) => {
            eprintln!("Error: {reason}");
            Ok(ExitCode::from(EXIT_FAILED))
        }
    }
}

fn list(args: ListArgs) -> Result<ExitCode> {
    let registry = load_registry(args.source.cases.as_deref())?;
    for case in registry.filtered(args.source.case_filter.as_deref()) {
        let fixture = case
            .fixture
            .as_ref()
            .map_or("none", |fixture| fixture.kind_name());
        println!("{}\t{}\t{}", case.id, fixture, case.expected.kind_name());
    }
    Ok(ExitCode::SUCCESS)
}
