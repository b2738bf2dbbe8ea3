use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A fixture description that cannot be materialized.
///
/// These are caller bugs in a case definition: the case is recorded as an
/// error and never reaches the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FixtureError {
    #[error("archive `{name}` has no entries")]
    EmptyArchive { name: String },

    #[error("archive `{archive}` contains entry `{entry}` more than once")]
    DuplicateEntry { archive: String, entry: String },

    #[error("invalid fixture file name `{name}`")]
    InvalidName { name: String },

    #[error("fixture workspace I/O failed: {0}")]
    Io(String),

    #[error("failed to write archive: {0}")]
    Archive(String),
}

impl From<std::io::Error> for FixtureError {
    fn from(err: std::io::Error) -> Self {
        FixtureError::Io(err.to_string())
    }
}

impl From<zip::result::ZipError> for FixtureError {
    fn from(err: zip::result::ZipError) -> Self {
        FixtureError::Archive(err.to_string())
    }
}

/// Failure to obtain a 2xx answer from the endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("HTTP {code}: {body}")]
    BadStatus { code: u16, body: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("cancelled")]
    Cancelled,
}

impl TransportError {
    /// Connection refused/reset are the only conditions worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Unreachable(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Timeout(_) => "TIMEOUT",
            TransportError::Unreachable(_) => "UNREACHABLE",
            TransportError::BadStatus { .. } => "BAD_STATUS",
            TransportError::Request(_) => "REQUEST",
            TransportError::Cancelled => "CANCELLED",
        }
    }
}

/// Why a case ended in `Verdict::Error` rather than a comparison.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaseError {
    #[error("fixture: {0}")]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl CaseError {
    pub fn kind(&self) -> &'static str {
        match self {
            CaseError::Fixture(_) => "FIXTURE",
            CaseError::Transport(err) => err.kind(),
        }
    }
}

/// A case list that cannot be registered at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaseDefinitionError {
    #[error("case #{index} has an empty id")]
    EmptyId { index: usize },

    #[error("case `{id}` has an empty question")]
    EmptyQuestion { id: String },

    #[error("case `{id}` has a zero timeout")]
    ZeroTimeout { id: String },

    #[error("case id `{id}` is registered twice")]
    DuplicateId { id: String },

    #[error("case `{id}` has a negative or non-finite tolerance")]
    InvalidTolerance { id: String },
}

/// Harness misconfiguration; aborts before any case runs.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no endpoint configured: pass --endpoint or set API_URL")]
    MissingEndpoint,

    #[error("invalid endpoint URL `{url}`: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("concurrency must be greater than 0")]
    ZeroConcurrency,

    #[error("timeout must be greater than 0")]
    ZeroTimeout,

    #[error("invalid duration `{0}` (expected e.g. 250ms, 30s, 2m)")]
    InvalidDuration(String),

    #[error("failed to read case file '{path}': {reason}")]
    CaseFile { path: PathBuf, reason: String },

    #[error(transparent)]
    Definition(#[from] CaseDefinitionError),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
