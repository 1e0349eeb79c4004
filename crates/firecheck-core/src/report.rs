//! Format conformance reports for human consumption.

use crate::oracle::{ConformanceReport, Diagnostic, Verdict};
use crate::reference::ReferenceSet;

const RULE: &str = "═══════════════════════════════════════════════════════════════════════\n";

fn section(output: &mut String, title: &str) {
    let mut line = format!("─── {} ", title);
    while line.chars().count() < 71 {
        line.push('─');
    }
    output.push_str(&line);
    output.push('\n');
}

fn push_diagnostics(output: &mut String, diagnostics: &[Diagnostic]) {
    for (i, diagnostic) in diagnostics.iter().enumerate() {
        let subject = diagnostic
            .identifier
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "(all)".to_string());
        output.push_str(&format!("{:>3}. {:<16} {}\n", i + 1, subject, diagnostic.message));
        for field in &diagnostic.fields {
            output.push_str(&format!(
                "       {:<28} expected {:<16} observed {}\n",
                field.field, field.expected, field.observed
            ));
        }
    }
    output.push('\n');
}

/// Format a conformance report.
pub fn format_report(report: &ConformanceReport) -> String {
    let mut output = String::new();

    output.push_str(RULE);
    output.push_str(&format!("  WeaponFire Conformance Report ({})\n", report.check));
    output.push_str(RULE);
    output.push('\n');

    let marker = match report.verdict {
        Verdict::Pass => "✅",
        Verdict::Fail => "❌",
        Verdict::Inconclusive => "⚠",
    };
    output.push_str(&format!("Verdict:                {} {}\n", marker, report.verdict));
    if let Some(ref reason) = report.reason {
        output.push_str(&format!("Reason:                 {}\n", reason));
    }
    output.push_str(&format!("Reference events:       {}\n", report.reference_count));
    output.push_str(&format!("Discovered events:      {}\n", report.discovered_count));
    if !report.stages.is_empty() {
        let stages: Vec<String> = report.stages.iter().map(|s| s.to_string()).collect();
        output.push_str(&format!("Stages evaluated:       {}\n", stages.join(" → ")));
    }
    if let Some(stage) = report.halted_after {
        output.push_str(&format!("Halted after:           {} stage\n", stage));
    }
    output.push('\n');

    if !report.failures.is_empty() {
        section(&mut output, "Failures");
        push_diagnostics(&mut output, &report.failures);
    }

    if !report.warnings.is_empty() {
        section(&mut output, "Warnings (advisory)");
        push_diagnostics(&mut output, &report.warnings);
    }

    if !report.confirmed.is_empty() {
        section(&mut output, "Confirmed");
        for id in &report.confirmed {
            output.push_str(&format!("  ✓ {}\n", id));
        }
        output.push('\n');
    }

    output.push_str(RULE);
    output
}

/// Format a one-line-per-event listing of a reference dataset.
pub fn format_reference_summary(reference: &ReferenceSet) -> String {
    let mut output = String::new();
    output.push_str(&format!("Reference events: {}\n\n", reference.len()));
    output.push_str(&format!(
        "  {:<20} {:<14} {:<14} {:<18} {:>4}\n",
        "Identifier", "Firing", "Target", "Munition type", "Qty"
    ));
    for event in reference {
        output.push_str(&format!(
            "  {:<20} {:<14} {:<14} {:<18} {:>4}\n",
            event.identifier.to_string(),
            event.firing_object_id,
            event.target_object_id,
            event.munition_type.to_string(),
            event.quantity_fired
        ));
    }
    output
}
