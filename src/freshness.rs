//! Freshness validator: flags documentation that is stale relative to the
//! code it describes.
//!
//! For each document the declared update time (front-matter, else change
//! history) is compared with the latest change time of its related code
//! files. The gap in days is classified against the configured bands.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::config::FreshnessConfig;
use crate::discovery::list_source_files;
use crate::engine::ValidationContext;
use crate::models::{push_issue, Document, IssueMap, Severity, ValidationIssue, ValidatorResult};
use crate::traits::Validator;
use crate::vcs::ChangeHistory;

pub const FRESHNESS: &str = "freshness";

const DATE_KEYS: &[&str] = &["lastUpdated", "last_updated", "updated", "date"];
const RELATED_KEYS: &[&str] = &["relatedFiles", "related_files", "related"];
const SCRIPT_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js", "mjs", "css", "scss"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessStatus {
    Fresh,
    NeedsReview,
    Outdated,
    CriticallyOutdated,
    NoRelatedCode,
    Unknown,
}

impl FreshnessStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::NeedsReview => "needs_review",
            Self::Outdated => "outdated",
            Self::CriticallyOutdated => "critically_outdated",
            Self::NoRelatedCode => "no_related_code",
            Self::Unknown => "unknown",
        }
    }

    fn severity(self) -> Option<Severity> {
        match self {
            Self::CriticallyOutdated => Some(Severity::Error),
            Self::Outdated => Some(Severity::Warning),
            Self::NeedsReview => Some(Severity::Info),
            _ => None,
        }
    }
}

/// Classify a gap (in days) between doc update and code change.
pub fn classify(days: i64, cfg: &FreshnessConfig) -> FreshnessStatus {
    if days > cfg.critical_days {
        FreshnessStatus::CriticallyOutdated
    } else if days > cfg.outdated_days {
        FreshnessStatus::Outdated
    } else if days > cfg.review_days {
        FreshnessStatus::NeedsReview
    } else {
        FreshnessStatus::Fresh
    }
}

/// Per-document freshness record reported in the validator details.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessRecord {
    pub status: FreshnessStatus,
    pub last_updated: Option<DateTime<Utc>>,
    pub related_code_last_updated: Option<DateTime<Utc>>,
    pub days_since_update: Option<i64>,
    pub related_files: Vec<String>,
}

/// Parse a front-matter date value.
///
/// Accepts RFC 3339, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`
/// and integer Unix timestamps.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|s| Utc.timestamp_opt(s, 0).single()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
                if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(Utc.from_utc_datetime(&ndt));
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|ndt| Utc.from_utc_datetime(&ndt))
        }
        _ => None,
    }
}

/// Compiled patterns used to infer related code files.
pub struct RelatedFileMatcher {
    source_path: Regex,
    import_path: Regex,
    named_heading: Regex,
    source_dirs: Vec<String>,
}

impl RelatedFileMatcher {
    pub fn new(source_dirs: &[String]) -> Result<Self> {
        let alternation = source_dirs
            .iter()
            .map(|d| regex::escape(d.trim_matches('/')))
            .collect::<Vec<_>>()
            .join("|");
        let source_path = Regex::new(&format!(
            r"\b((?:{})/[\w\-./\[\]()@]+\.[A-Za-z0-9]+)",
            alternation
        ))?;
        let import_path = Regex::new(r#"(?:from|import|require)\s*\(?\s*['"]([^'"\s]+)['"]"#)?;
        let named_heading = Regex::new(r"(?i)^(?:the\s+)?`?([A-Za-z][A-Za-z0-9]*)`?\s+(component|hook)s?\b")?;
        Ok(Self {
            source_path,
            import_path,
            named_heading,
            source_dirs: source_dirs.to_vec(),
        })
    }

    /// Infer the existing project files a document describes.
    pub fn related_files(&self, doc: &Document, project_root: &Path) -> Vec<PathBuf> {
        let mut found: BTreeSet<PathBuf> = BTreeSet::new();

        // Explicit front-matter list
        if let Some(value) = doc.front_matter_value(RELATED_KEYS) {
            let entries: Vec<&str> = match value {
                Value::String(s) => vec![s.as_str()],
                Value::Array(items) => items.iter().filter_map(|v| v.as_str()).collect(),
                _ => Vec::new(),
            };
            for entry in entries {
                if let Some(p) = resolve_project_path(project_root, entry) {
                    found.insert(p);
                }
            }
        }

        // Source paths mentioned anywhere in the document
        for cap in self.source_path.captures_iter(&doc.content) {
            if let Some(p) = resolve_project_path(project_root, &cap[1]) {
                found.insert(p);
            }
        }

        // Import specifiers: `@/x`, `~/x` aliases and project-relative paths
        for cap in self.import_path.captures_iter(&doc.content) {
            let spec = &cap[1];
            let spec = spec
                .strip_prefix("@/")
                .or_else(|| spec.strip_prefix("~/"))
                .unwrap_or(spec);
            let spec = spec.trim_start_matches("./").trim_start_matches("../");
            let first = spec.split('/').next().unwrap_or_default();
            if !self.source_dirs.iter().any(|d| d == first) {
                continue;
            }
            if let Some(p) = resolve_project_path(project_root, spec) {
                found.insert(p);
            }
        }

        // Naming heuristics: "Button Component" → components/Button.*
        let mut titles: Vec<String> = doc
            .headings
            .iter()
            .filter(|h| h.level <= 2)
            .map(|h| h.text.clone())
            .collect();
        if let Some(t) = doc.title() {
            titles.push(t);
        }
        for title in titles {
            let Some(cap) = self.named_heading.captures(title.trim()) else {
                continue;
            };
            let name = cap[1].to_string();
            let kind_dir = if cap[2].eq_ignore_ascii_case("hook") {
                "hooks"
            } else {
                "components"
            };
            let mut search_dirs = vec![kind_dir.to_string()];
            search_dirs.extend(self.source_dirs.iter().map(|d| format!("{}/{}", d, kind_dir)));
            for file in list_source_files(project_root, &search_dirs) {
                if file_matches_name(&file, &name) {
                    found.insert(file);
                }
            }
        }

        found.remove(&doc.path);
        found.into_iter().collect()
    }
}

fn file_matches_name(file: &Path, name: &str) -> bool {
    let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    if stem.eq_ignore_ascii_case(name) {
        return true;
    }
    stem == "index"
        && file
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(|n| n.eq_ignore_ascii_case(name))
            .unwrap_or(false)
}

/// Resolve a project-relative path, trying script extensions and `index`
/// files when the path itself does not exist.
fn resolve_project_path(project_root: &Path, spec: &str) -> Option<PathBuf> {
    let spec = spec.trim().trim_start_matches("./").trim_start_matches('/');
    if spec.is_empty() || spec.contains("://") {
        return None;
    }
    let base = project_root.join(spec);
    if base.is_file() {
        return Some(base);
    }
    for ext in SCRIPT_EXTENSIONS {
        let with_ext = PathBuf::from(format!("{}.{}", base.display(), ext));
        if with_ext.is_file() {
            return Some(with_ext);
        }
        let index = base.join(format!("index.{}", ext));
        if index.is_file() {
            return Some(index);
        }
    }
    None
}

fn relative_display(project_root: &Path, path: &Path) -> String {
    path.strip_prefix(project_root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Flags documents whose related code changed after they were last updated.
pub struct FreshnessValidator;

#[async_trait]
impl Validator for FreshnessValidator {
    fn name(&self) -> &str {
        FRESHNESS
    }

    fn description(&self) -> &str {
        "Compare document update times with the latest change of the code they describe"
    }

    async fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorResult> {
        let cfg = &ctx.config.freshness;
        let matcher = RelatedFileMatcher::new(&cfg.source_dirs)?;

        let mut tasks = JoinSet::new();
        for doc in ctx.documents.iter() {
            let related = matcher.related_files(doc, &ctx.project_root);
            let declared = doc.front_matter_value(DATE_KEYS).cloned();
            let job = DocumentJob {
                key: doc.key(),
                path: doc.path.clone(),
                declared,
                related,
                project_root: ctx.project_root.clone(),
                history: ctx.history.clone(),
                cfg: cfg.clone(),
            };
            tasks.spawn(job.run());
        }

        let mut documents = IssueMap::new();
        let mut records: BTreeMap<String, FreshnessRecord> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (key, record, issues) = joined?;
            for issue in issues {
                push_issue(&mut documents, &key, issue);
            }
            records.insert(key, record);
        }

        let mut counts: BTreeMap<&'static str, usize> = [
            FreshnessStatus::Fresh,
            FreshnessStatus::NeedsReview,
            FreshnessStatus::Outdated,
            FreshnessStatus::CriticallyOutdated,
            FreshnessStatus::NoRelatedCode,
            FreshnessStatus::Unknown,
        ]
        .iter()
        .map(|s| (s.label(), 0))
        .collect();
        for record in records.values() {
            *counts.entry(record.status.label()).or_default() += 1;
        }

        let summary = format!(
            "{} documents: {} fresh, {} needs review, {} outdated, {} critically outdated, {} without related code, {} unknown",
            records.len(),
            counts["fresh"],
            counts["needs_review"],
            counts["outdated"],
            counts["critically_outdated"],
            counts["no_related_code"],
            counts["unknown"],
        );
        let details = json!({
            "history": ctx.history.name(),
            "counts": counts,
            "documents": records,
        });

        Ok(ValidatorResult::from_issues(FRESHNESS, documents, summary, details))
    }
}

/// Owned inputs for one document's freshness check, run as its own task.
struct DocumentJob {
    key: String,
    path: PathBuf,
    declared: Option<Value>,
    related: Vec<PathBuf>,
    project_root: PathBuf,
    history: Arc<dyn ChangeHistory>,
    cfg: FreshnessConfig,
}

impl DocumentJob {
    async fn run(self) -> (String, FreshnessRecord, Vec<ValidationIssue>) {
        let related_names: Vec<String> = self
            .related
            .iter()
            .map(|p| relative_display(&self.project_root, p))
            .collect();
        let mut record = FreshnessRecord {
            status: FreshnessStatus::NoRelatedCode,
            last_updated: None,
            related_code_last_updated: None,
            days_since_update: None,
            related_files: related_names,
        };
        let mut issues = Vec::new();

        if self.related.is_empty() {
            return (self.key, record, issues);
        }

        record.status = FreshnessStatus::Unknown;

        let declared = self.declared.as_ref().and_then(parse_timestamp);
        if self.declared.is_some() && declared.is_none() {
            issues.push(
                ValidationIssue::new(
                    FRESHNESS,
                    Severity::Info,
                    "unparseable_date",
                    "Front-matter update date could not be parsed; using change history instead",
                )
                .with_suggestion("Use an ISO date such as 2024-01-31"),
            );
        }

        let last_updated = match declared {
            Some(ts) => Some(ts),
            None => match self.history.last_changed(&self.path).await {
                Ok(ts) => ts,
                Err(e) => {
                    tracing::warn!(path = %self.key, error = %e, "change history unavailable");
                    issues.push(ValidationIssue::new(
                        FRESHNESS,
                        Severity::Warning,
                        "vcs_unavailable",
                        format!("Could not determine when the document was last updated: {}", e),
                    ));
                    None
                }
            },
        };
        record.last_updated = last_updated;

        let mut lookups = JoinSet::new();
        for file in self.related.clone() {
            let history = self.history.clone();
            lookups.spawn(async move {
                let ts = history.last_changed(&file).await;
                (file, ts)
            });
        }
        let mut newest: Option<(DateTime<Utc>, PathBuf)> = None;
        let mut failed = 0usize;
        let mut last_error = None;
        while let Some(joined) = lookups.join_next().await {
            let (file, ts) = match joined {
                Ok(lookup) => lookup,
                Err(e) => {
                    failed += 1;
                    last_error = Some(e.to_string());
                    continue;
                }
            };
            match ts {
                Ok(Some(ts)) => {
                    if newest.as_ref().map(|(n, _)| ts > *n).unwrap_or(true) {
                        newest = Some((ts, file));
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "change history lookup failed");
                    failed += 1;
                    last_error = Some(e.to_string());
                }
            }
        }
        record.related_code_last_updated = newest.as_ref().map(|(ts, _)| *ts);

        if failed == self.related.len() {
            if let Some(err) = last_error {
                issues.push(ValidationIssue::new(
                    FRESHNESS,
                    Severity::Warning,
                    "vcs_unavailable",
                    format!("Could not determine when related code last changed: {}", err),
                ));
            }
        }

        let (Some(last), Some((code_ts, code_file))) = (last_updated, newest) else {
            return (self.key, record, issues);
        };

        if code_ts <= last {
            record.status = FreshnessStatus::Fresh;
            return (self.key, record, issues);
        }

        let days = (code_ts - last).num_days();
        record.days_since_update = Some(days);
        record.status = classify(days, &self.cfg);

        if let Some(severity) = record.status.severity() {
            issues.push(
                ValidationIssue::new(
                    FRESHNESS,
                    severity,
                    record.status.label(),
                    format!(
                        "Document last updated {} but {} changed {} days later",
                        last.format("%Y-%m-%d"),
                        relative_display(&self.project_root, &code_file),
                        days
                    ),
                )
                .with_suggestion(
                    "Review the document against the current code and refresh its lastUpdated date",
                ),
            );
        }

        (self.key, record, issues)
    }
}
