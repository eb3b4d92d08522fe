//! Accumulated per-method translation outcomes.
//!
//! Per-method failures never abort the pipeline; they are collected here and
//! rendered once translation finishes. The report serializes with `serde` so
//! front-ends can emit it as JSON next to the rewritten assembly.

use serde::Serialize;

use crate::{metadata::token::Token, Error};

/// One successfully translated method.
#[derive(Debug, Clone, Serialize)]
pub struct TranslatedMethod {
    /// The method's metadata token, rendered as `0x06......`.
    pub method: String,
    /// Number of recovered IL instructions.
    pub instructions: usize,
    /// Encoded size of the recovered instruction section in bytes.
    pub encoded_size: usize,
}

/// One skipped method and why.
#[derive(Debug, Clone, Serialize)]
pub struct MethodFailure {
    /// The method's metadata token, rendered as `0x06......`.
    pub method: String,
    /// Stable machine tag of the failure kind.
    pub tag: &'static str,
    /// Human-readable failure message.
    pub message: String,
}

/// The full translation report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranslationReport {
    translated: Vec<TranslatedMethod>,
    failures: Vec<MethodFailure>,
}

impl TranslationReport {
    /// An empty report.
    #[must_use]
    pub fn new() -> Self {
        TranslationReport::default()
    }

    /// Record a translated method.
    pub fn record_success(&mut self, method: Token, instructions: usize, encoded_size: usize) {
        self.translated.push(TranslatedMethod {
            method: method.to_string(),
            instructions,
            encoded_size,
        });
    }

    /// Record a skipped method.
    pub fn record_failure(&mut self, method: Token, error: &Error) {
        log::warn!("skipping virtualized method {method}: {error}");
        self.failures.push(MethodFailure {
            method: method.to_string(),
            tag: error.tag(),
            message: error.to_string(),
        });
    }

    /// Fold another report into this one (parallel translation reduces
    /// per-worker reports).
    pub fn merge(&mut self, other: TranslationReport) {
        self.translated.extend(other.translated);
        self.failures.extend(other.failures);
    }

    /// Successfully translated methods.
    #[must_use]
    pub fn translated(&self) -> &[TranslatedMethod] {
        &self.translated
    }

    /// Skipped methods.
    #[must_use]
    pub fn failures(&self) -> &[MethodFailure] {
        &self.failures
    }

    /// True when nothing was skipped.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line-per-method human-readable rendering.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!(
            "translated {} method(s), skipped {}\n",
            self.translated.len(),
            self.failures.len()
        );
        for failure in &self.failures {
            out.push_str(&format!(
                "  {} [{}] {}\n",
                failure.method, failure.tag, failure.message
            ));
        }
        out
    }
}
