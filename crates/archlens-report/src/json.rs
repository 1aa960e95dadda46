use serde::Serialize;

use archlens_core::report::ProjectReport;

/// Format a full analysis report as JSON.
pub fn format_report(report: &ProjectReport, compact: bool) -> String {
    if compact {
        serde_json::to_string(report).expect("ProjectReport should be serializable")
    } else {
        serde_json::to_string_pretty(report).expect("ProjectReport should be serializable")
    }
}

/// Wrapper for check output that adds pass/fail metadata.
#[derive(Debug, Serialize)]
pub struct CheckOutput<'a> {
    #[serde(flatten)]
    pub report: &'a ProjectReport,
    pub check: CheckStatus,
}

#[derive(Debug, Serialize)]
pub struct CheckStatus {
    pub passed: bool,
    pub violation_count: usize,
}

/// Format a check result as JSON. Returns (json_string, passed).
pub fn format_check(report: &ProjectReport, compact: bool) -> (String, bool) {
    let violation_count = report.violation_count();
    let passed = violation_count == 0;
    let output = CheckOutput {
        report,
        check: CheckStatus {
            passed,
            violation_count,
        },
    };

    let json = if compact {
        serde_json::to_string(&output).expect("CheckOutput should be serializable")
    } else {
        serde_json::to_string_pretty(&output).expect("CheckOutput should be serializable")
    };
    (json, passed)
}
