//! Verification harness for question-answering HTTP endpoints.
//!
//! Cases pair a question with an optional fixture file and an expectation.
//! The runner builds each fixture, posts it as multipart form data, and
//! checks the answer with a format-aware comparator.

pub mod cases;
pub mod cli;
pub mod domain;
pub mod engine;
pub mod error;
