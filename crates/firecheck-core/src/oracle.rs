//! Verdict state machine and the conformance report it produces.
//!
//! # Verdict rules
//!
//! | Verdict        | Condition                                              |
//! |----------------|--------------------------------------------------------|
//! | `Inconclusive` | Nothing observed, or setup (config, reference) failed  |
//! | `Fail`         | At least one diagnostic with `Severity::Failure`       |
//! | `Pass`         | Observed something and no failure was recorded         |
//!
//! Once a run is marked inconclusive no further diagnostics are accepted,
//! so the two non-passing outcomes never mix.

use crate::verifier::Stage;
use firecheck_protocol::EventIdentifier;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
    Inconclusive,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Inconclusive => write!(f, "INCONCLUSIVE"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Diagnostics
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    /// Contributes to a FAIL verdict.
    Failure,
    /// Reported only.
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    Cardinality,
    MissingIdentity,
    ParameterMismatch,
    LocationOutOfTolerance,
    VelocityOutOfTolerance,
}

/// One field whose observed value differs from the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMismatch {
    pub field: String,
    pub expected: String,
    pub observed: String,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, observed {}",
            self.field, self.expected, self.observed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Reference entry the diagnostic is about; `None` for set-level
    /// findings such as a size mismatch.
    pub identifier: Option<EventIdentifier>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldMismatch>,
}

impl Diagnostic {
    pub fn failure(
        kind: DiagnosticKind,
        identifier: Option<EventIdentifier>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity: Severity::Failure,
            identifier,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn warning(
        kind: DiagnosticKind,
        identifier: Option<EventIdentifier>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::failure(kind, identifier, message)
        }
    }

    pub fn with_fields(mut self, fields: Vec<FieldMismatch>) -> Self {
        self.fields = fields;
        self
    }

    pub fn is_failure(&self) -> bool {
        self.severity == Severity::Failure
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref id) = self.identifier {
            write!(f, "[{}] ", id)?;
        }
        write!(f, "{}", self.message)?;
        for field in &self.fields {
            write!(f, "; {}", field)?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Report
// ═══════════════════════════════════════════════════════════════════════

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConformanceReport {
    /// Name of the check that produced this report.
    pub check: String,
    pub verdict: Verdict,
    /// Why the run is inconclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub reference_count: usize,
    pub discovered_count: usize,
    /// Stages that were evaluated, in order.
    pub stages: Vec<Stage>,
    /// Set when fail-fast sequencing skipped later stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted_after: Option<Stage>,
    pub failures: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    /// Reference entries that passed every evaluated stage.
    pub confirmed: Vec<EventIdentifier>,
}

impl ConformanceReport {
    /// Report for a run that never reached comparison.
    pub fn inconclusive(check: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut builder = VerdictBuilder::new(check, 0, 0);
        builder.inconclusive(reason);
        builder.build()
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// Failure lines in the order they were recorded.
    pub fn failure_messages(&self) -> Vec<String> {
        self.failures.iter().map(|d| d.to_string()).collect()
    }

    /// Failures about one reference entry.
    pub fn failures_for(&self, identifier: &EventIdentifier) -> Vec<&Diagnostic> {
        self.failures
            .iter()
            .filter(|d| d.identifier.as_ref() == Some(identifier))
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Builder
// ═══════════════════════════════════════════════════════════════════════

/// Accumulates diagnostics and decides the verdict.
pub struct VerdictBuilder {
    check: String,
    reference_count: usize,
    discovered_count: usize,
    inconclusive: Option<String>,
    stages: Vec<Stage>,
    halted_after: Option<Stage>,
    failures: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    confirmed: Vec<EventIdentifier>,
}

impl VerdictBuilder {
    pub fn new(check: impl Into<String>, reference_count: usize, discovered_count: usize) -> Self {
        Self {
            check: check.into(),
            reference_count,
            discovered_count,
            inconclusive: None,
            stages: Vec::new(),
            halted_after: None,
            failures: Vec::new(),
            warnings: Vec::new(),
            confirmed: Vec::new(),
        }
    }

    /// Mark the run inconclusive.  The first reason sticks.
    pub fn inconclusive(&mut self, reason: impl Into<String>) {
        if self.inconclusive.is_none() {
            self.inconclusive = Some(reason.into());
        }
    }

    pub fn is_inconclusive(&self) -> bool {
        self.inconclusive.is_some()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn begin_stage(&mut self, stage: Stage) {
        if !self.is_inconclusive() {
            self.stages.push(stage);
        }
    }

    pub fn halt_after(&mut self, stage: Stage) {
        self.halted_after = Some(stage);
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        if self.is_inconclusive() {
            debug!("Discarding diagnostic on inconclusive run: {}", diagnostic);
            return;
        }
        match diagnostic.severity {
            Severity::Failure => self.failures.push(diagnostic),
            Severity::Warning => self.warnings.push(diagnostic),
        }
    }

    pub fn confirm(&mut self, identifier: EventIdentifier) {
        if !self.is_inconclusive() {
            self.confirmed.push(identifier);
        }
    }

    pub fn build(self) -> ConformanceReport {
        let verdict = if self.inconclusive.is_some() {
            Verdict::Inconclusive
        } else if !self.failures.is_empty() {
            Verdict::Fail
        } else {
            Verdict::Pass
        };
        ConformanceReport {
            check: self.check,
            verdict,
            reason: self.inconclusive,
            reference_count: self.reference_count,
            discovered_count: self.discovered_count,
            stages: self.stages,
            halted_after: self.halted_after,
            failures: self.failures,
            warnings: self.warnings,
            confirmed: self.confirmed,
        }
    }
}
