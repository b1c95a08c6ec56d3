//! Human and machine readable run summaries.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::pipeline::CriterionReport;
use crate::zonal::ZonalStats;

#[derive(Debug, Serialize)]
struct ReportEntry<'a> {
    criterion: &'a str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<&'a ZonalStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    export_path: Option<&'a PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    retryable: bool,
    collaborator_error: bool,
}

impl<'a> From<&'a CriterionReport> for ReportEntry<'a> {
    fn from(report: &'a CriterionReport) -> Self {
        let err = report.error();
        Self {
            criterion: &report.name,
            success: report.is_success(),
            stats: report.stats(),
            task_id: report.export().map(|h| h.task_id.as_str()),
            export_path: report.export().map(|h| &h.path),
            error: err.map(|e| e.to_string()),
            retryable: err.is_some_and(|e| e.is_retryable()),
            collaborator_error: err.is_some_and(|e| e.is_collaborator_error()),
        }
    }
}

/// One line per criterion, e.g. `Elevation Suitability Stats: {min: 1, max: 4}`.
pub fn summary_lines(reports: &[CriterionReport]) -> Vec<String> {
    reports
        .iter()
        .map(|report| match report.stats() {
            Some(stats) => format!("{}: {}", report.stats_label, stats),
            None => format!(
                "{}: failed ({})",
                report.stats_label,
                report.error().map(|e| e.to_string()).unwrap_or_default()
            ),
        })
        .collect()
}

pub fn print_summary(reports: &[CriterionReport]) {
    for line in summary_lines(reports) {
        println!("{}", line);
    }

    println!();
    println!("{:<16} {:<8} {}", "Criterion", "Status", "Export");
    for report in reports {
        let status = if report.is_success() { "ok" } else { "FAILED" };
        let export = match (report.export(), report.error()) {
            (Some(handle), _) => format!("{} -> {}", handle.task_id, handle.path.display()),
            (None, Some(e)) => e.to_string(),
            (None, None) => String::new(),
        };
        println!("{:<16} {:<8} {}", report.name, status, export);
    }
}

pub fn write_json(reports: &[CriterionReport], path: &Path) -> Result<()> {
    let entries: Vec<ReportEntry> = reports.iter().map(ReportEntry::from).collect();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&entries)?)?;
    Ok(())
}
