//! Integration tests for the engine and the extension traits.
//!
//! These tests drive full validation runs through the library API with a
//! stub change history, and prove that custom validators and tools
//! (implemented via the `Validator` and `Tool` traits) run alongside the
//! built-in ones.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use docval::config::Config;
use docval::engine::{Engine, ValidationContext, ValidationOptions, Verbosity};
use docval::error::codes;
use docval::models::{AggregateReport, IssueMap, Severity, ValidationIssue, ValidatorResult};
use docval::traits::{Tool, ToolContext, ToolOutput, ToolRegistry, Validator, ValidatorRegistry};
use docval::vcs::ChangeHistory;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

// ─── Test History ───────────────────────────────────────────────────

/// Reports the same change time for every file.
struct FixedHistory(DateTime<Utc>);

#[async_trait]
impl ChangeHistory for FixedHistory {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn last_changed(&self, _path: &Path) -> Result<Option<DateTime<Utc>>> {
        Ok(Some(self.0))
    }
}

/// Every lookup fails, as when git is missing or the repository is broken.
struct FailingHistory;

#[async_trait]
impl ChangeHistory for FailingHistory {
    fn name(&self) -> &str {
        "failing"
    }

    async fn last_changed(&self, _path: &Path) -> Result<Option<DateTime<Utc>>> {
        anyhow::bail!("git executable not found")
    }
}

// ─── Test Validators ────────────────────────────────────────────────

struct AlwaysPass;

#[async_trait]
impl Validator for AlwaysPass {
    fn name(&self) -> &str {
        "alwaysPass"
    }

    fn description(&self) -> &str {
        "Passes every project"
    }

    async fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorResult> {
        let mut documents = IssueMap::new();
        for doc in &ctx.documents {
            documents.insert(
                doc.key(),
                vec![ValidationIssue::new(self.name(), Severity::Info, "seen", "document seen")],
            );
        }
        Ok(ValidatorResult::from_issues(self.name(), documents, "ok".into(), Value::Null))
    }
}

struct AlwaysErrors;

#[async_trait]
impl Validator for AlwaysErrors {
    fn name(&self) -> &str {
        "alwaysErrors"
    }

    fn description(&self) -> &str {
        "Fails to run"
    }

    async fn validate(&self, _ctx: &ValidationContext) -> Result<ValidatorResult> {
        anyhow::bail!("backing service unreachable")
    }
}

struct Panics;

#[async_trait]
impl Validator for Panics {
    fn name(&self) -> &str {
        "panics"
    }

    fn description(&self) -> &str {
        "Panics mid-run"
    }

    async fn validate(&self, _ctx: &ValidationContext) -> Result<ValidatorResult> {
        panic!("validator bug")
    }
}

// ─── Test Tool ──────────────────────────────────────────────────────

/// Counts the documents found in a project.
struct CountDocsTool;

#[async_trait]
impl Tool for CountDocsTool {
    fn name(&self) -> &str {
        "count_docs"
    }

    fn description(&self) -> &str {
        "Count documentation files"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "verbose": { "type": "boolean", "default": false }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let path = params["path"].as_str().unwrap_or_default();
        let check = ctx.engine().check(Path::new(path))?;
        Ok(ToolOutput {
            structured: json!({ "count": check.document_count, "verbose": params["verbose"] }),
            text: format!("{} documents", check.document_count),
        })
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn engine_at(time: DateTime<Utc>) -> Engine {
    Engine::new(Arc::new(Config::default())).with_history(Arc::new(FixedHistory(time)))
}

fn only(names: &[&str]) -> ValidationOptions {
    ValidationOptions {
        validators: Some(names.iter().map(|s| s.to_string()).collect()),
        ..Default::default()
    }
}

fn freshness_record(report: &AggregateReport, file: &str) -> Value {
    report.validators["freshness"].details["documents"]
        .as_object()
        .unwrap()
        .iter()
        .find(|(k, _)| k.ends_with(file))
        .map(|(_, v)| v.clone())
        .unwrap()
}

fn issues_for<'a>(report: &'a AggregateReport, validator: &str, file: &str) -> &'a [ValidationIssue] {
    report.validators[validator]
        .documents
        .iter()
        .find(|(key, _)| key.ends_with(file))
        .map(|(_, issues)| issues.as_slice())
        .unwrap_or(&[])
}

// ─── Scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_code_changed_120_days_later_is_critical() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "docs/button.md",
        "---\nlastUpdated: 2024-01-01\nrelatedFiles:\n  - components/Button.tsx\n---\n# Button\n\nUsage notes.\n",
    );
    write(tmp.path(), "components/Button.tsx", "export function Button() { return null }\n");

    let code_changed = Utc.with_ymd_and_hms(2024, 4, 30, 0, 0, 0).unwrap();
    let report = engine_at(code_changed)
        .validate(tmp.path(), only(&["freshness"]))
        .await
        .unwrap();

    let issues = issues_for(&report, "freshness", "button.md");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, "critically_outdated");
    assert_eq!(issues[0].severity, Severity::Error);
    assert!(!report.validators["freshness"].pass);

    let details = &report.validators["freshness"].details;
    let record = details["documents"]
        .as_object()
        .unwrap()
        .iter()
        .find(|(k, _)| k.ends_with("button.md"))
        .map(|(_, v)| v.clone())
        .unwrap();
    assert_eq!(record["status"], "critically_outdated");
    assert_eq!(record["daysSinceUpdate"], 120);
}

#[tokio::test]
async fn test_docs_newer_than_code_are_fresh() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "docs/button.md",
        "---\nlastUpdated: 2024-06-01\nrelatedFiles: [components/Button.tsx]\n---\n# Button\n",
    );
    write(tmp.path(), "components/Button.tsx", "export const Button = () => null\n");

    let report = engine_at(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        .validate(tmp.path(), only(&["freshness"]))
        .await
        .unwrap();
    assert!(issues_for(&report, "freshness", "button.md").is_empty());
    assert!(report.pass);
}

#[tokio::test]
async fn test_toml_front_matter_date_is_preferred() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "docs/button.md",
        "+++\nlastUpdated = 2024-01-01\nrelatedFiles = [\"components/Button.tsx\"]\n+++\n# Button\n",
    );
    write(tmp.path(), "components/Button.tsx", "export function Button() { return null }\n");

    let report = engine_at(Utc.with_ymd_and_hms(2024, 4, 30, 0, 0, 0).unwrap())
        .validate(tmp.path(), only(&["freshness"]))
        .await
        .unwrap();

    let kinds: Vec<&str> = issues_for(&report, "freshness", "button.md")
        .iter()
        .map(|i| i.kind.as_str())
        .collect();
    assert_eq!(kinds, vec!["critically_outdated"]);
    let record = freshness_record(&report, "button.md");
    assert_eq!(record["daysSinceUpdate"], 120);
    assert!(record["lastUpdated"].as_str().unwrap().starts_with("2024-01-01"));
}

#[tokio::test]
async fn test_document_without_related_code_has_no_freshness_issues() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "docs/notes.md", "# Notes\n\nPlain prose about the project.\n");
    write(tmp.path(), "components/Button.tsx", "export const Button = () => null\n");

    let report = engine_at(Utc::now())
        .validate(tmp.path(), only(&["freshness"]))
        .await
        .unwrap();

    let freshness = &report.validators["freshness"];
    assert!(issues_for(&report, "freshness", "notes.md").is_empty());
    assert!(freshness.pass);
    assert_eq!(freshness.details["counts"]["no_related_code"], 1);
    assert_eq!(freshness.details["counts"]["unknown"], 0);
    assert_eq!(freshness_record(&report, "notes.md")["status"], "no_related_code");
}

#[tokio::test]
async fn test_unavailable_history_is_reported() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "docs/button.md",
        "---\nrelatedFiles: [components/Button.tsx]\n---\n# Button\n",
    );
    write(tmp.path(), "components/Button.tsx", "export const Button = () => null\n");

    let engine = Engine::new(Arc::new(Config::default())).with_history(Arc::new(FailingHistory));
    let report = engine.validate(tmp.path(), only(&["freshness"])).await.unwrap();

    let issues = issues_for(&report, "freshness", "button.md");
    assert_eq!(issues.len(), 2);
    assert!(issues.iter().all(|i| i.kind == "vcs_unavailable" && i.severity == Severity::Warning));
    assert!(issues.iter().any(|i| i.message.contains("document was last updated")));
    assert!(issues.iter().any(|i| i.message.contains("related code last changed")));
    assert!(issues[0].message.contains("git executable not found"));
    assert!(report.validators["freshness"].pass);
    assert_eq!(freshness_record(&report, "button.md")["status"], "unknown");
}

#[tokio::test]
async fn test_failed_related_lookups_reported_once_per_document() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "docs/forms.md",
        "---\nlastUpdated: 2024-01-01\nrelatedFiles:\n  - components/Input.tsx\n  - components/Select.tsx\n---\n# Forms\n",
    );
    write(tmp.path(), "components/Input.tsx", "export const Input = () => null\n");
    write(tmp.path(), "components/Select.tsx", "export const Select = () => null\n");

    let engine = Engine::new(Arc::new(Config::default())).with_history(Arc::new(FailingHistory));
    let report = engine.validate(tmp.path(), only(&["freshness"])).await.unwrap();

    let issues = issues_for(&report, "freshness", "forms.md");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, "vcs_unavailable");
    assert!(issues[0].message.contains("related code last changed"));
    let record = freshness_record(&report, "forms.md");
    assert_eq!(record["status"], "unknown");
    assert_eq!(record["relatedFiles"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_coverage_grows_with_each_new_category() {
    let tmp = TempDir::new().unwrap();
    let engine = engine_at(Utc::now());
    let headings = [
        "Architecture",
        "Components",
        "Features",
        "API",
        "Getting Started",
        "Deployment",
        "Testing",
        "Styling",
    ];

    let mut previous = engine.validate(tmp.path(), only(&["coverage"])).await.unwrap().validators["coverage"]
        .details["percentage"]
        .as_f64()
        .unwrap();
    assert_eq!(previous, 0.0);

    for (n, heading) in headings.iter().enumerate() {
        write(tmp.path(), &format!("docs/page{}.md", n), &format!("# {}\n", heading));
        let report = engine.validate(tmp.path(), only(&["coverage"])).await.unwrap();
        let percentage = report.validators["coverage"].details["percentage"].as_f64().unwrap();
        assert!(percentage > previous, "{} did not raise coverage from {}", heading, previous);
        previous = percentage;
    }
    assert_eq!(previous, 100.0);

    write(tmp.path(), "docs/more-tests.md", "# Testing Tips\n");
    let report = engine.validate(tmp.path(), only(&["coverage"])).await.unwrap();
    assert_eq!(report.validators["coverage"].details["percentage"], 100.0);
    assert!(report.validators["coverage"].pass);
}

#[tokio::test]
async fn test_plain_img_in_example_gets_one_warning() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "docs/gallery.md",
        "# Gallery\n\n```jsx\n<img src=\"a.png\" alt=\"b\" />\n```\n",
    );

    let report = engine_at(Utc::now())
        .validate(tmp.path(), only(&["codeStyle"]))
        .await
        .unwrap();

    let issues = issues_for(&report, "codeStyle", "gallery.md");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, "img_instead_of_optimized");
    assert_eq!(issues[0].severity, Severity::Warning);
    let suggestion = issues[0].suggestion.as_deref().unwrap();
    assert!(suggestion.contains("<Image"));
    assert!(suggestion.contains("a.png"));
    assert!(report.validators["codeStyle"].pass);
}

#[tokio::test]
async fn test_zero_documents_still_reports() {
    let tmp = TempDir::new().unwrap();

    let report = engine_at(Utc::now())
        .validate(tmp.path(), ValidationOptions::default())
        .await
        .unwrap();

    assert_eq!(report.document_count, 0);
    assert_eq!(report.summary.total, 5);
    let coverage = &report.validators["coverage"];
    assert_eq!(coverage.details["percentage"], 0.0);
    assert!(!coverage.pass);
    assert!(!report.pass);
    assert!(tmp.path().join("docs").is_dir());
}

#[tokio::test]
async fn test_min_coverage_option_overrides_config() {
    let tmp = TempDir::new().unwrap();
    let options = ValidationOptions {
        validators: Some(vec!["coverage".into()]),
        min_coverage: Some(0.0),
        ..Default::default()
    };
    let report = engine_at(Utc::now()).validate(tmp.path(), options).await.unwrap();
    assert!(report.validators["coverage"].pass);
    assert_eq!(report.validators["coverage"].details["minCoverage"], 0.0);
}

#[tokio::test]
async fn test_summary_verbosity_drops_documents() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "docs/guide.md", "# Guide\n\nSee [missing](./missing.md).\n");

    let options = ValidationOptions {
        validators: Some(vec!["consistency".into()]),
        verbosity: Verbosity::Summary,
        ..Default::default()
    };
    let report = engine_at(Utc::now()).validate(tmp.path(), options).await.unwrap();
    let consistency = &report.validators["consistency"];
    assert!(consistency.documents.is_empty());
    assert!(!consistency.pass);
}

// ─── Aggregation ────────────────────────────────────────────────────

fn custom_engine(validators: Vec<Arc<dyn Validator>>) -> Engine {
    let mut registry = ValidatorRegistry::new();
    for v in validators {
        registry.register(v);
    }
    Engine::with_validators(Arc::new(Config::default()), registry)
        .with_history(Arc::new(FixedHistory(Utc::now())))
}

#[tokio::test]
async fn test_aggregate_passes_when_all_validators_pass() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "docs/a.md", "# A\n");

    let report = custom_engine(vec![Arc::new(AlwaysPass)])
        .validate(tmp.path(), ValidationOptions::default())
        .await
        .unwrap();
    assert!(report.pass);
    assert_eq!(report.summary.passed, 1);
    assert_eq!(issues_for(&report, "alwaysPass", "a.md").len(), 1);
}

#[tokio::test]
async fn test_failing_validators_are_isolated() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "docs/a.md", "# A\n");

    let report = custom_engine(vec![Arc::new(AlwaysPass), Arc::new(AlwaysErrors), Arc::new(Panics)])
        .validate(tmp.path(), ValidationOptions::default())
        .await
        .unwrap();

    assert!(!report.pass);
    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.passed, 1);
    assert_eq!(report.summary.failed, 2);
    assert!(report.validators["alwaysPass"].pass);

    let errored = &report.validators["alwaysErrors"];
    assert!(!errored.pass);
    assert!(errored.error.as_deref().unwrap().contains("backing service unreachable"));
    let panicked = &report.validators["panics"];
    assert!(!panicked.pass);
    assert!(panicked.error.is_some());
}

// ─── Tools ──────────────────────────────────────────────────────────

fn tools() -> (ToolRegistry, ToolContext) {
    let engine = Engine::new(Arc::new(Config::default()));
    let mut tools = ToolRegistry::with_builtins(engine.validators());
    tools.register(Box::new(CountDocsTool));
    (tools, ToolContext::new(Arc::new(engine)))
}

#[tokio::test]
async fn test_wrong_typed_option_is_invalid_params() {
    let tmp = TempDir::new().unwrap();
    let (tools, ctx) = tools();
    let err = tools
        .call(
            "validate_docs",
            json!({"path": tmp.path().to_str().unwrap(), "options": {"skipExternalLinks": "yes"}}),
            &ctx,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), codes::INVALID_PARAMS);
    assert!(err.to_string().contains("options.skipExternalLinks"));
    assert!(!tmp.path().join("docs").exists());
}

#[tokio::test]
async fn test_validate_docs_tool_returns_report() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "docs/guide.md", "# Guide\n\nPlain text.\n");
    let (tools, ctx) = tools();
    let out = tools
        .call(
            "validate_docs",
            json!({"path": tmp.path().to_str().unwrap(), "options": {"validators": ["bestPractices"]}}),
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(out.structured["documentCount"], 1);
    assert_eq!(out.structured["summary"]["total"], 1);
    assert!(out.structured["validators"]["bestPractices"].is_object());
    assert!(out.text.starts_with("Documentation validation"));
}

#[tokio::test]
async fn test_custom_tool_gets_schema_defaults() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "docs/a.md", "# A\n");
    write(tmp.path(), "docs/b.md", "# B\n");
    let (tools, ctx) = tools();
    assert_eq!(tools.len(), 3);

    let out = tools
        .call("count_docs", json!({"path": tmp.path().to_str().unwrap()}), &ctx)
        .await
        .unwrap();
    assert_eq!(out.structured["count"], 2);
    assert_eq!(out.structured["verbose"], false);
    assert_eq!(out.text, "2 documents");
}
