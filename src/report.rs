//! Terminal rendering of reports for the `validate` and `check` commands.

use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

use crate::engine::{Engine, ValidationOptions};
use crate::models::{AggregateReport, ExistenceCheck, IssueMap, Severity};

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "ERROR",
        Severity::Warning => "WARN ",
        Severity::Info => "INFO ",
    }
}

fn render_issues(out: &mut String, documents: &IssueMap) {
    for (key, issues) in documents {
        let _ = writeln!(out, "    {}", key);
        for issue in issues {
            let location = issue.line.map(|l| format!(":{}", l)).unwrap_or_default();
            let _ = writeln!(
                out,
                "      {} {}{} {}",
                severity_tag(issue.severity),
                issue.kind,
                location,
                issue.message
            );
            if let Some(suggestion) = &issue.suggestion {
                for line in suggestion.lines() {
                    let _ = writeln!(out, "            > {}", line);
                }
            }
        }
    }
}

/// Plain-text rendering of a full report.
pub fn render_report(report: &AggregateReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "docval: {}", report.project_path);
    let _ = writeln!(out, "================================");
    let _ = writeln!(out, "  Docs dir:    {}", report.docs_dir);
    let _ = writeln!(out, "  Documents:   {}", report.document_count);
    let _ = writeln!(out, "  Checked at:  {}", report.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out);

    if !report.discovery.is_empty() {
        let _ = writeln!(out, "  discovery");
        render_issues(&mut out, &report.discovery);
        let _ = writeln!(out);
    }

    for (name, result) in &report.validators {
        let _ = writeln!(
            out,
            "  {:<14} {:<5} {}",
            name,
            if result.pass { "PASS" } else { "FAIL" },
            result.summary
        );
        render_issues(&mut out, &result.documents);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", report.summary_line());
    out
}

pub fn render_check(check: &ExistenceCheck) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", check.message);
    if let Some(dir) = &check.docs_dir {
        let _ = writeln!(out, "  Docs dir:    {}", dir);
    }
    let _ = writeln!(out, "  Documents:   {}", check.document_count);
    out
}

/// Run `docval validate` and print the result. Returns whether the report passed.
pub async fn run_validate(engine: &Engine, path: &Path, options: ValidationOptions, json: bool) -> Result<bool> {
    let report = engine.validate(path, options).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(report.pass)
}

/// Run `docval check` and print the result. A project without
/// documentation is reported, not treated as a failure.
pub fn run_check(engine: &Engine, path: &Path, json: bool) -> Result<()> {
    let check = engine.check(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&check)?);
    } else {
        print!("{}", render_check(&check));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{push_issue, ReportSummary, ValidationIssue, ValidatorResult};
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[test]
    fn test_render_report_lists_issues() {
        let mut docs = IssueMap::new();
        push_issue(
            &mut docs,
            "guide.md",
            ValidationIssue::new("consistency", Severity::Error, "broken_link", "Broken link: ./missing.md")
                .at_line(7)
                .with_suggestion("Fix or remove the link"),
        );
        let mut validators = BTreeMap::new();
        validators.insert(
            "consistency".to_string(),
            ValidatorResult::from_issues("consistency", docs, "1 issue".into(), serde_json::Value::Null),
        );
        let report = AggregateReport {
            project_path: "/p".into(),
            docs_dir: "/p/docs".into(),
            timestamp: Utc::now(),
            document_count: 1,
            validators,
            discovery: IssueMap::new(),
            summary: ReportSummary { total: 1, passed: 0, failed: 1 },
            pass: false,
        };

        let text = render_report(&report);
        assert!(text.contains("consistency    FAIL"));
        assert!(text.contains("ERROR broken_link:7 Broken link: ./missing.md"));
        assert!(text.contains("> Fix or remove the link"));
        assert!(text.contains("FAILED"));
    }

    #[test]
    fn test_render_check() {
        let check = ExistenceCheck {
            exists: false,
            docs_dir: None,
            document_count: 0,
            message: "No documentation directory found".into(),
        };
        let text = render_check(&check);
        assert!(text.starts_with("No documentation directory found"));
        assert!(text.contains("Documents:   0"));
    }

    #[test]
    fn test_run_check_succeeds_without_docs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let engine = Engine::new(std::sync::Arc::new(crate::config::Config::default()));
        assert!(run_check(&engine, tmp.path(), true).is_ok());
        assert!(!tmp.path().join("docs").exists());
        assert!(run_check(&engine, &tmp.path().join("missing"), false).is_err());
    }
}
