//! Plain-text rendering of mappings and stage results for stdout.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::chain::StageResult;
use crate::core::types::{NamedValues, Outputs, Reading};
use crate::run::RunReport;

/// Render one name → address section.
pub fn render_mapping(title: &str, entries: &BTreeMap<String, String>) -> String {
    let mut out = format!("--- {title} ---\n");
    if entries.is_empty() {
        out.push_str("(empty)\n");
    }
    for (name, address) in entries {
        let _ = writeln!(out, "{name:12} -> {address}");
    }
    out
}

/// Render one stage: inputs, selected outputs, dropped names, diagnostics.
///
/// `selection` lists output names to show in order; empty shows every output.
pub fn render_stage(stage: &StageResult, selection: &[String]) -> String {
    let mut out = format!("=== {} ===\n", stage.name);
    out.push_str(&render_values("inputs", &stage.result.inputs));
    out.push_str(&render_outputs(&stage.result.outputs, selection));
    if !stage.dropped.is_empty() {
        let _ = writeln!(out, "defaults kept for: {}", stage.dropped.join(", "));
    }
    for diagnostic in &stage.result.diagnostics {
        let _ = writeln!(out, "warning: {diagnostic}");
    }
    out
}

/// Render every stage of a run, in execution order.
pub fn render_run(report: &RunReport) -> String {
    report
        .results
        .iter()
        .map(|result| {
            let selection = report
                .stage_for(result)
                .map(|stage| stage.report.as_slice())
                .unwrap_or_default();
            render_stage(result, selection)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_values(title: &str, values: &NamedValues) -> String {
    let mut out = format!("--- {title} ---\n");
    for (name, value) in values {
        let _ = writeln!(out, "{name:12} = {value}");
    }
    out
}

fn render_outputs(outputs: &Outputs, selection: &[String]) -> String {
    let mut out = String::from("--- outputs ---\n");
    if selection.is_empty() {
        for (name, reading) in outputs {
            let _ = writeln!(out, "{name:12} = {reading}");
        }
        return out;
    }
    for name in selection {
        match outputs.get(name) {
            Some(reading) => {
                let _ = writeln!(out, "{name:12} = {reading}");
            }
            None => {
                let _ = writeln!(out, "{name:12} = {} (not declared)", Reading::Absent);
            }
        }
    }
    out
}
