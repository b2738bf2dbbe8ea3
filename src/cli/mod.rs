//! Command-line surface for running suites in CI.
//!
//! - `qaprobe run --endpoint <url>` runs the registered cases and exits
//!   0 (all passed), 1 (any failed or errored) or 2 (misconfiguration)
//! - `qaprobe ask --question ...` sends one ad-hoc question
//! - `qaprobe list` prints the registered cases

mod report;

use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::engine::compare::AnswerFormat;
use crate::error::ConfigError;

pub use report::{render_json, render_text};

#[derive(Parser, Debug)]
#[command(
    name = "qaprobe",
    version,
    about = "Fixture-driven verification harness for question-answering endpoints"
)]
pub struct Cli {
    /// Log dispatch attempts and retries to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the registered cases and verify every answer
    Run(RunArgs),
    /// Send a single question and print the raw answer
    Ask(AskArgs),
    /// List registered cases
    List(ListArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EndpointArgs {
    /// Question endpoint, e.g. http://localhost:8000/api/
    #[arg(long, env = "API_URL")]
    pub endpoint: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CaseSourceArgs {
    /// JSON case file; the built-in suite is used when omitted
    #[arg(long)]
    pub cases: Option<PathBuf>,
    /// Only cases whose id contains PATTERN (`*` matches anything)
    #[arg(long, value_name = "PATTERN")]
    pub case_filter: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,
    #[command(flatten)]
    pub source: CaseSourceArgs,
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,
    /// Per-case timeout used when a case sets none
    #[arg(long, value_parser = parse_duration, default_value = "60s")]
    pub timeout: Duration,
    /// Cancel whatever is still running after this long
    #[arg(long, value_parser = parse_duration)]
    pub suite_timeout: Option<Duration>,
    /// Read the answer from this field of a JSON object body
    #[arg(long, value_name = "FIELD")]
    pub answer_field: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Also write the JSON report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct AskArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,
    #[arg(long)]
    pub question: String,
    /// File to upload alongside the question
    #[arg(long)]
    pub file: Option<PathBuf>,
    #[arg(long, value_parser = parse_duration, default_value = "60s")]
    pub timeout: Duration,
    #[arg(long, value_name = "FIELD")]
    pub answer_field: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: CaseSourceArgs,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Validated settings for one `run` invocation.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub endpoint: Url,
    pub concurrency: usize,
    pub default_timeout: Duration,
    pub suite_timeout: Option<Duration>,
    pub case_filter: Option<String>,
    pub cases_path: Option<PathBuf>,
    pub answer: AnswerFormat,
    pub output: OutputFormat,
    pub report_path: Option<PathBuf>,
}

impl HarnessConfig {
    pub fn from_run_args(args: &RunArgs) -> Result<Self, ConfigError> {
        if args.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if args.timeout.is_zero() || args.suite_timeout.is_some_and(|limit| limit.is_zero()) {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(Self {
            endpoint: resolve_endpoint(&args.endpoint)?,
            concurrency: args.concurrency,
            default_timeout: args.timeout,
            suite_timeout: args.suite_timeout,
            case_filter: args.source.case_filter.clone(),
            cases_path: args.source.cases.clone(),
            answer: answer_format(args.answer_field.as_deref()),
            output: args.format,
            report_path: args.report.clone(),
        })
    }
}

pub fn answer_format(field: Option<&str>) -> AnswerFormat {
    match field.map(str::trim).filter(|field| !field.is_empty()) {
        Some(field) => AnswerFormat::JsonField(field.to_string()),
        None => AnswerFormat::Raw,
    }
}

pub fn resolve_endpoint(args: &EndpointArgs) -> Result<Url, ConfigError> {
    let raw = args
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingEndpoint)?;

    let url = Url::parse(raw).map_err(|err| ConfigError::InvalidEndpoint {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidEndpoint {
            url: raw.to_string(),
            reason: "expected an http(s) URL with a host".to_string(),
        });
    }
    Ok(url)
}

/// Accepts `250ms`, `30s`, `2m` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let value = raw.trim();
    let invalid = || ConfigError::InvalidDuration(raw.to_string());

    let (number, unit_ms) = if let Some(number) = value.strip_suffix("ms") {
        (number, 1)
    } else if let Some(number) = value.strip_suffix('s') {
        (number, 1_000)
    } else if let Some(number) = value.strip_suffix('m') {
        (number, 60_000)
    } else {
        (value, 1_000)
    };

    let amount: u64 = number.trim().parse().map_err(|_| invalid())?;
    amount
        .checked_mul(unit_ms)
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}

/// Logs go to stderr so stdout carries only the report.
pub fn init_logging(verbose: bool) {
    let default_directive = if verbose { "qaprobe=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
