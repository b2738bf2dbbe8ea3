use serde::{Deserialize, Serialize};
use std::time::Duration;

// ─── Test Cases ───────────────────────────────────────────────────────────────

/// One question/fixture/expectation triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub fixture: Option<FixtureSpec>,
    pub expected: ExpectationSpec,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl TestCase {
    pub fn new(id: impl Into<String>, question: impl Into<String>, expected: ExpectationSpec) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            fixture: None,
            expected,
            timeout_ms: None,
        }
    }

    pub fn with_fixture(mut self, fixture: FixtureSpec) -> Self {
        self.fixture = Some(fixture);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout_ms.map(Duration::from_millis).unwrap_or(default)
    }
}

// ─── Fixtures ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixtureSpec {
    Text { name: String, content: String },
    Archive { name: String, entries: Vec<ArchiveEntry> },
    /// The data travels inside the question text; no file part is sent.
    InlineLiteral,
}

impl FixtureSpec {
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        FixtureSpec::Text {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn archive<N, C>(name: impl Into<String>, entries: impl IntoIterator<Item = (N, C)>) -> Self
    where
        N: Into<String>,
        C: Into<String>,
    {
        FixtureSpec::Archive {
            name: name.into(),
            entries: entries
                .into_iter()
                .map(|(name, content)| ArchiveEntry {
                    name: name.into(),
                    content: content.into(),
                })
                .collect(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            FixtureSpec::Text { .. } => "text",
            FixtureSpec::Archive { .. } => "archive",
            FixtureSpec::InlineLiteral => "inline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub name: String,
    pub content: String,
}

// ─── Expectations ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ExpectationSpec {
    ExactText {
        value: String,
    },
    /// The digest is produced by a tool running inside the endpoint, so only
    /// its shape can be checked here.
    HashOfExternalCommand {
        algorithm: DigestAlgorithm,
    },
    NumericWithTolerance {
        value: f64,
        #[serde(default)]
        epsilon: f64,
    },
    JsonStructuralEquals {
        value: serde_json::Value,
        /// JSON Pointers of arrays compared as multisets. `""` is the root.
        #[serde(default)]
        unordered_paths: Vec<String>,
    },
}

impl ExpectationSpec {
    pub fn exact(value: impl Into<String>) -> Self {
        ExpectationSpec::ExactText {
            value: value.into(),
        }
    }

    pub fn numeric(value: f64, epsilon: f64) -> Self {
        ExpectationSpec::NumericWithTolerance { value, epsilon }
    }

    pub fn json(value: serde_json::Value) -> Self {
        ExpectationSpec::JsonStructuralEquals {
            value,
            unordered_paths: Vec::new(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ExpectationSpec::ExactText { .. } => "exact",
            ExpectationSpec::HashOfExternalCommand { .. } => "hash",
            ExpectationSpec::NumericWithTolerance { .. } => "numeric",
            ExpectationSpec::JsonStructuralEquals { .. } => "json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Length of the lowercase hex rendering of the digest.
    pub fn hex_len(self) -> usize {
        match self {
            DigestAlgorithm::Md5 => 32,
            DigestAlgorithm::Sha1 => 40,
            DigestAlgorithm::Sha256 => 64,
            DigestAlgorithm::Sha512 => 128,
        }
    }
}
