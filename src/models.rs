//! Core data models used throughout docval.
//!
//! These types represent the parsed documents, the issues produced by the
//! validators, and the aggregate report returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Front-matter map: string keys to scalar or array values.
pub type FrontMatter = Map<String, Value>;

/// Issues grouped by the document (or source file) they belong to.
pub type IssueMap = BTreeMap<String, Vec<ValidationIssue>>;

/// A heading extracted from a document body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    /// Anchor id as generated by GitHub-style slugging.
    pub id: String,
    pub line: usize,
}

/// A link extracted from a document body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub text: String,
    pub href: String,
    pub line: usize,
}

/// A fenced or indented code block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    /// Lowercased info-string language, empty for untagged blocks.
    pub language: String,
    pub body: String,
    /// Line of the first body line (one past the opening fence).
    pub line: usize,
    /// Last line occupied by the block, closing fence included.
    pub end_line: usize,
}

/// Raw HTML embedded in the markdown body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HtmlFragment {
    pub html: String,
    pub line: usize,
}

/// A parsed documentation file.
///
/// Line numbers stored on headings, links, code blocks and HTML fragments
/// are 1-based and refer to the original file, front-matter included.
#[derive(Debug, Clone)]
pub struct Document {
    /// Absolute path; the document's identity.
    pub path: PathBuf,
    /// Path relative to the docs directory, `/`-separated.
    pub relative_path: String,
    pub content: String,
    pub front_matter: Option<FrontMatter>,
    pub front_matter_error: Option<String>,
    /// Number of lines taken by the front-matter block (0 when absent).
    pub body_line_offset: usize,
    pub headings: Vec<Heading>,
    pub links: Vec<Link>,
    pub code_blocks: Vec<CodeBlock>,
    pub html: Vec<HtmlFragment>,
}

impl Document {
    /// Identity key used in issue maps.
    pub fn key(&self) -> String {
        self.path.display().to_string()
    }

    /// Look up a front-matter value by the first matching key.
    pub fn front_matter_value(&self, keys: &[&str]) -> Option<&Value> {
        let fm = self.front_matter.as_ref()?;
        keys.iter().find_map(|k| fm.get(*k))
    }

    /// Title: front-matter `title`, else the first level-1 heading.
    pub fn title(&self) -> Option<String> {
        if let Some(Value::String(t)) = self.front_matter_value(&["title"]) {
            return Some(t.clone());
        }
        self.headings
            .iter()
            .find(|h| h.level == 1)
            .map(|h| h.text.clone())
    }

    /// True if the given 1-based line lies inside a code block.
    pub fn is_code_line(&self, line: usize) -> bool {
        self.code_blocks
            .iter()
            .any(|b| line + 1 >= b.line && line <= b.end_line)
    }

    /// Iterate prose lines (front-matter and code blocks excluded) with
    /// their 1-based line numbers.
    pub fn prose_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.content
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l))
            .filter(move |(n, _)| *n > self.body_line_offset && !self.is_code_line(*n))
    }
}

/// Severity of a validation issue, ordered `Info < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single finding produced by a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: Severity,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub validator: String,
}

impl ValidationIssue {
    pub fn new(
        validator: &str,
        severity: Severity,
        kind: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind: kind.to_string(),
            message: message.into(),
            suggestion: None,
            line: None,
            validator: validator.to_string(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

/// Output of a single validator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorResult {
    #[serde(rename = "type")]
    pub validator: String,
    pub documents: IssueMap,
    pub summary: String,
    pub pass: bool,
    /// Validator-specific figures (status buckets, percentages, counts).
    pub details: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidatorResult {
    /// Build a result whose `pass` is "no issue of severity error".
    pub fn from_issues(validator: &str, documents: IssueMap, summary: String, details: Value) -> Self {
        let pass = !has_errors(&documents);
        Self {
            validator: validator.to_string(),
            documents,
            summary,
            pass,
            details,
            error: None,
        }
    }

    /// Entry recorded when a validator fails to complete.
    pub fn failed(validator: &str, error: String) -> Self {
        Self {
            validator: validator.to_string(),
            documents: IssueMap::new(),
            summary: format!("{} failed: {}", validator, error),
            pass: false,
            details: Value::Null,
            error: Some(error),
        }
    }

    pub fn issue_count(&self) -> usize {
        self.documents.values().map(Vec::len).sum()
    }

    pub fn count_severity(&self, severity: Severity) -> usize {
        self.documents
            .values()
            .flatten()
            .filter(|i| i.severity == severity)
            .count()
    }
}

/// True if any issue in the map has severity error.
pub fn has_errors(documents: &IssueMap) -> bool {
    documents
        .values()
        .flatten()
        .any(|i| i.severity == Severity::Error)
}

/// Append an issue under `key`.
pub fn push_issue(map: &mut IssueMap, key: &str, issue: ValidationIssue) {
    map.entry(key.to_string()).or_default().push(issue);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

/// The response payload of a full validation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub project_path: String,
    pub docs_dir: String,
    pub timestamp: DateTime<Utc>,
    pub document_count: usize,
    pub validators: BTreeMap<String, ValidatorResult>,
    pub discovery: IssueMap,
    pub summary: ReportSummary,
    pub pass: bool,
}

impl AggregateReport {
    /// One-line human summary used as the text part of tool responses.
    pub fn summary_line(&self) -> String {
        let issues: usize = self.validators.values().map(|v| v.issue_count()).sum();
        let errors: usize = self
            .validators
            .values()
            .map(|v| v.count_severity(Severity::Error))
            .sum();
        let failed: Vec<&str> = self
            .validators
            .iter()
            .filter(|(_, v)| !v.pass)
            .map(|(k, _)| k.as_str())
            .collect();
        let mut line = format!(
            "Documentation validation {}: {}/{} validators passed across {} documents ({} issues, {} errors)",
            if self.pass { "PASSED" } else { "FAILED" },
            self.summary.passed,
            self.summary.total,
            self.document_count,
            issues,
            errors,
        );
        if !failed.is_empty() {
            line.push_str(&format!("; failing: {}", failed.join(", ")));
        }
        line
    }
}

/// Result of the quick existence check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistenceCheck {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_dir: Option<String>,
    pub document_count: usize,
    pub message: String,
}
