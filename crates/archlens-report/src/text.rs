use colored::Colorize;

use archlens_core::report::{ComponentRecord, ProjectReport};
use archlens_core::types::Layer;

/// Format a full analysis report for terminal output.
pub fn format_report(report: &ProjectReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("\n{}\n", "archlens - Architecture Analysis".bold()));
    out.push_str(&format!("{}\n\n", "=".repeat(40)));

    out.push_str(&format!(
        "{}: {} files, {} component(s), {} of {} rules dispatched\n",
        "Summary".bold(),
        report.project_files.len(),
        report.components.len(),
        report.dispatch.dispatched(),
        report.dispatch.total,
    ));

    if !report.project_properties.is_empty() {
        out.push_str(&format!("\n{}\n{}\n", "Project".bold(), "-".repeat(40)));
        for (key, value) in &report.project_properties {
            out.push_str(&format!("  {key}: {value}\n"));
        }
    }

    for component in &report.components {
        out.push_str(&format_component(component));
    }

    if !report.parse_failures.is_empty() {
        out.push_str(&format!(
            "\n{} ({})\n",
            "Unparseable files".yellow().bold(),
            report.parse_failures.len()
        ));
        for failure in &report.parse_failures {
            out.push_str(&format!("  {}: {}\n", failure.path, failure.diagnostic));
        }
    }

    if !report.dispatch.skipped.is_empty() {
        out.push_str(&format!("\n{}\n", "Skipped rules".yellow().bold()));
        for skipped in &report.dispatch.skipped {
            out.push_str(&format!(
                "  {} ({}): {}\n",
                skipped.name, skipped.kind, skipped.reason
            ));
        }
    }

    out.push('\n');
    out
}

fn format_component(component: &ComponentRecord) -> String {
    let mut out = String::new();
    let graph = &component.import_dependencies_graph;

    out.push_str(&format!(
        "\n{} {}\n{}\n",
        "Component".bold(),
        component.path.cyan(),
        "-".repeat(40)
    ));
    out.push_str(&format!(
        "  {} modules, {} dependencies\n",
        graph.len(),
        graph.edge_count()
    ));

    let counts: Vec<String> = Layer::ALL
        .iter()
        .filter_map(|layer| {
            let n = component.layers.values().filter(|l| *l == layer).count();
            (n > 0).then(|| format!("{layer}={n}"))
        })
        .collect();
    if !counts.is_empty() {
        out.push_str(&format!("  Layers: {}\n", counts.join(", ")));
    }

    for (key, value) in &component.properties {
        out.push_str(&format!("  {key}: {value}\n"));
    }

    let violations: Vec<&String> = component.architecture_notes.values().flatten().collect();
    if violations.is_empty() {
        out.push_str(&format!("  {}\n", "No violations found!".green().bold()));
    } else {
        out.push_str(&format!(
            "  {} ({} found)\n",
            "Violations".red().bold(),
            violations.len()
        ));
        for v in violations {
            out.push_str(&format!("    {} {v}\n", "ERROR".red().bold()));
        }
    }

    for failure in &component.rule_failures {
        out.push_str(&format!(
            "  {} {}: {}\n",
            "RULE FAILED".yellow().bold(),
            failure.rule,
            failure.error
        ));
    }

    out
}

/// Format a check result for CI use. Returns (text, passed).
pub fn format_check(report: &ProjectReport) -> (String, bool) {
    let count = report.violation_count();
    let passed = count == 0;

    let mut out = format_report(report);
    if passed {
        out.push_str(&format!("{}\n", "CHECK PASSED".green().bold()));
    } else {
        out.push_str(&format!(
            "{}: {} architecture violation(s)\n",
            "CHECK FAILED".red().bold(),
            count
        ));
    }
    (out, passed)
}
