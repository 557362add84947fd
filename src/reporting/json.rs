use crate::reporting::model::{Issue, Severity};
use serde::Serialize;

#[derive(Serialize)]
struct Report<'a> {
    scan_metadata: ScanMetadata,
    summary: Summary,
    issues: &'a [Issue],
}

#[derive(Serialize)]
struct ScanMetadata {
    tool: String,
    version: String,
    target: String,
    scan_date: String,
    report_format: String,
}

#[derive(Serialize)]
struct Summary {
    total_issues: usize,
    critical: usize,
    high: usize,
    medium: usize,
    low: usize,
    info: usize,
    failed_checks: Vec<String>,
}

pub fn render(target: &str, issues: &[Issue], failed_checks: &[String]) -> anyhow::Result<String> {
    let count = |severity: Severity| issues.iter().filter(|i| i.severity == severity).count();
    let summary = Summary {
        total_issues: issues.len(),
        critical: count(Severity::Critical),
        high: count(Severity::High),
        medium: count(Severity::Medium),
        low: count(Severity::Low),
        info: count(Severity::Info),
        failed_checks: failed_checks.to_vec(),
    };

    let report = Report {
        scan_metadata: ScanMetadata {
            tool: "gauntlet".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            target: target.to_string(),
            scan_date: chrono::Utc::now().to_rfc3339(),
            report_format: "application/json".to_string(),
        },
        summary,
        issues,
    };

    let json = serde_json::to_string_pretty(&report)?;
    Ok(json)
}
