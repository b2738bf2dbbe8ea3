//! Ordered, validated case definitions.

mod standard;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::domain::{ExpectationSpec, TestCase};
use crate::error::{CaseDefinitionError, ConfigError};

pub use standard::standard_suite;

#[derive(Debug, Clone)]
pub struct CaseRegistry {
    cases: Vec<TestCase>,
}

impl CaseRegistry {
    /// Fixture problems are left for the fixture builder so they surface as
    /// a per-case error instead of rejecting the whole suite.
    pub fn new(cases: Vec<TestCase>) -> Result<Self, CaseDefinitionError> {
        let mut ids = HashSet::with_capacity(cases.len());
        for (index, case) in cases.iter().enumerate() {
            if case.id.trim().is_empty() {
                return Err(CaseDefinitionError::EmptyId { index });
            }
            if case.question.trim().is_empty() {
                return Err(CaseDefinitionError::EmptyQuestion { id: case.id.clone() });
            }
            if case.timeout_ms == Some(0) {
                return Err(CaseDefinitionError::ZeroTimeout { id: case.id.clone() });
            }
            if let ExpectationSpec::NumericWithTolerance { epsilon, value } = case.expected {
                if !(epsilon.is_finite() && epsilon >= 0.0 && value.is_finite()) {
                    return Err(CaseDefinitionError::InvalidTolerance { id: case.id.clone() });
                }
            }
            if !ids.insert(case.id.as_str()) {
                return Err(CaseDefinitionError::DuplicateId { id: case.id.clone() });
            }
        }
        Ok(Self { cases })
    }

    pub fn standard() -> Self {
        Self {
            cases: standard_suite(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let cases: Vec<TestCase> = serde_json::from_str(raw).map_err(|err| ConfigError::CaseFile {
            path: "<inline>".into(),
            reason: err.to_string(),
        })?;
        Ok(Self::new(cases)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|err| ConfigError::CaseFile {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let cases: Vec<TestCase> = serde_json::from_str(&raw).map_err(|err| ConfigError::CaseFile {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Ok(Self::new(cases)?)
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Cases whose id matches `pattern`, in registration order.
    pub fn filtered(&self, pattern: Option<&str>) -> Vec<TestCase> {
        self.cases
            .iter()
            .filter(|case| pattern.map_or(true, |pattern| matches_pattern(pattern, &case.id)))
            .cloned()
            .collect()
    }
}

/// Substring match where `*` stands for any run of characters.
pub fn matches_pattern(pattern: &str, id: &str) -> bool {
    let mut remaining = id;
    for part in pattern.split('*').filter(|part| !part.is_empty()) {
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }
    true
}
