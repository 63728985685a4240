//! Validation engine: discovery, concurrent validator runs, aggregation.
//!
//! One call to [`Engine::validate`] is one self-contained run. Documents
//! are re-read and re-parsed every time and nothing is cached between
//! runs. Validators share an immutable [`ValidationContext`] and run as
//! separate tasks; a validator that errors or panics is recorded as a
//! failed entry while the others complete.

use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::discovery::{count_doc_files, discover_documents, find_docs_dir, locate_docs_dir};
use crate::error::EngineError;
use crate::models::{AggregateReport, Document, ExistenceCheck, IssueMap, ReportSummary, Severity, ValidatorResult};
use crate::traits::ValidatorRegistry;
use crate::vcs::{history_for, ChangeHistory};

/// How much per-document detail a report carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Validator summaries only; per-document issues dropped.
    Summary,
    /// Warnings and errors.
    Normal,
    /// Everything, info included.
    #[default]
    Detailed,
}

impl Verbosity {
    pub const NAMES: [&'static str; 3] = ["summary", "normal", "detailed"];

    /// Drop issues below this verbosity's threshold, in place.
    pub fn apply(self, documents: &mut IssueMap) {
        match self {
            Verbosity::Summary => documents.clear(),
            Verbosity::Normal => {
                for issues in documents.values_mut() {
                    issues.retain(|i| i.severity >= Severity::Warning);
                }
                documents.retain(|_, issues| !issues.is_empty());
            }
            Verbosity::Detailed => {}
        }
    }
}

/// Per-request options. Unset fields fall back to the configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ValidationOptions {
    /// Validator names to run; `None` or empty runs all of them.
    #[serde(default)]
    pub validators: Option<Vec<String>>,
    #[serde(default)]
    pub verbosity: Verbosity,
    #[serde(default)]
    pub skip_external_links: Option<bool>,
    #[serde(default)]
    pub min_coverage: Option<f64>,
}

/// Everything a validator may read during one run.
pub struct ValidationContext {
    pub project_root: PathBuf,
    pub docs_dir: PathBuf,
    pub documents: Vec<Document>,
    pub config: Arc<Config>,
    pub options: ValidationOptions,
    pub history: Arc<dyn ChangeHistory>,
}

impl ValidationContext {
    pub fn skip_external_links(&self) -> bool {
        self.options
            .skip_external_links
            .unwrap_or(self.config.consistency.skip_external_links)
    }

    pub fn min_coverage(&self) -> f64 {
        self.options
            .min_coverage
            .unwrap_or(self.config.coverage.min_percentage)
    }
}

/// Runs the registered validators against a project.
pub struct Engine {
    config: Arc<Config>,
    validators: ValidatorRegistry,
    history: Option<Arc<dyn ChangeHistory>>,
}

impl Engine {
    /// Engine with the built-in validators.
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_validators(config, ValidatorRegistry::with_builtins())
    }

    pub fn with_validators(config: Arc<Config>, validators: ValidatorRegistry) -> Self {
        Self {
            config,
            validators,
            history: None,
        }
    }

    /// Use a fixed change-history source instead of picking one per project.
    pub fn with_history(mut self, history: Arc<dyn ChangeHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn validators(&self) -> &ValidatorRegistry {
        &self.validators
    }

    /// Check that `path` is an existing directory and return it canonicalized.
    pub fn resolve_project(path: &Path) -> Result<PathBuf, EngineError> {
        if !path.exists() {
            return Err(EngineError::ProjectNotFound(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Err(EngineError::NotADirectory(path.to_path_buf()));
        }
        Ok(std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
    }

    /// Quick check: is there documentation, and how much. Runs no
    /// validators and never creates the docs directory.
    pub fn check(&self, project: &Path) -> Result<ExistenceCheck> {
        let root = Self::resolve_project(project)?;
        let Some(docs_dir) = find_docs_dir(&root, &self.config.docs) else {
            return Ok(ExistenceCheck {
                exists: false,
                docs_dir: None,
                document_count: 0,
                message: format!(
                    "No documentation directory found in {} (looked for: {})",
                    root.display(),
                    self.config.docs.candidates.join(", ")
                ),
            });
        };

        let count = count_doc_files(&docs_dir, &self.config.docs)?;
        let message = if count == 0 {
            format!(
                "Documentation directory {} exists but contains no documentation files",
                docs_dir.display()
            )
        } else {
            format!("Found {} documentation files in {}", count, docs_dir.display())
        };
        Ok(ExistenceCheck {
            exists: count > 0,
            docs_dir: Some(docs_dir.display().to_string()),
            document_count: count,
            message,
        })
    }

    /// Names of the validators selected by `options`, in registry order.
    fn select(&self, options: &ValidationOptions) -> Result<Vec<String>, EngineError> {
        let requested = match &options.validators {
            Some(names) if !names.is_empty() => names,
            _ => return Ok(self.validators.names()),
        };
        for name in requested {
            if self.validators.find(name).is_none() {
                return Err(EngineError::UnknownValidator(name.clone()));
            }
        }
        Ok(self
            .validators
            .names()
            .into_iter()
            .filter(|n| requested.contains(n))
            .collect())
    }

    /// Run a full validation of the project at `project`.
    pub async fn validate(&self, project: &Path, options: ValidationOptions) -> Result<AggregateReport> {
        let started = Instant::now();
        let root = Self::resolve_project(project)?;
        let selected = self.select(&options)?;

        let docs_dir = locate_docs_dir(&root, &self.config.docs).map_err(|e| EngineError::DocsDirUnavailable {
            path: root.clone(),
            reason: format!("{:#}", e),
        })?;
        let discovery = discover_documents(&docs_dir, &self.config).await?;
        tracing::info!(
            project = %root.display(),
            documents = discovery.documents.len(),
            validators = ?selected,
            "starting validation run"
        );

        let history = match &self.history {
            Some(h) => h.clone(),
            None => history_for(&root, self.config.freshness.history),
        };
        let verbosity = options.verbosity;
        let document_count = discovery.documents.len();
        let ctx = Arc::new(ValidationContext {
            project_root: root.clone(),
            docs_dir: docs_dir.clone(),
            documents: discovery.documents,
            config: self.config.clone(),
            options,
            history,
        });

        let mut handles = Vec::new();
        for name in &selected {
            let Some(validator) = self.validators.find(name) else {
                continue;
            };
            let ctx = ctx.clone();
            let handle = tokio::spawn(async move {
                let t = Instant::now();
                let result = validator.validate(&ctx).await;
                tracing::debug!(validator = validator.name(), elapsed_ms = t.elapsed().as_millis() as u64, "validator finished");
                result
            });
            handles.push((name.clone(), handle));
        }

        let mut validators: BTreeMap<String, ValidatorResult> = BTreeMap::new();
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    tracing::warn!(validator = %name, error = %e, "validator failed");
                    ValidatorResult::failed(&name, format!("{:#}", e))
                }
                Err(join_err) => {
                    tracing::warn!(validator = %name, error = %join_err, "validator panicked");
                    ValidatorResult::failed(&name, format!("validator panicked: {}", join_err))
                }
            };
            validators.insert(name, result);
        }

        let mut discovery_issues = discovery.issues;
        verbosity.apply(&mut discovery_issues);
        for result in validators.values_mut() {
            verbosity.apply(&mut result.documents);
        }

        let passed = validators.values().filter(|r| r.pass).count();
        let summary = ReportSummary {
            total: validators.len(),
            passed,
            failed: validators.len() - passed,
        };
        let report = AggregateReport {
            project_path: root.display().to_string(),
            docs_dir: docs_dir.display().to_string(),
            timestamp: Utc::now(),
            document_count,
            pass: summary.failed == 0,
            validators,
            discovery: discovery_issues,
            summary,
        };

        tracing::info!(
            pass = report.pass,
            passed = summary.passed,
            failed = summary.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "validation run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidationIssue;

    #[test]
    fn test_verbosity_filters() {
        let mut docs = IssueMap::new();
        docs.insert(
            "a.md".into(),
            vec![
                ValidationIssue::new("t", Severity::Info, "i", "info"),
                ValidationIssue::new("t", Severity::Error, "e", "error"),
            ],
        );
        docs.insert("b.md".into(), vec![ValidationIssue::new("t", Severity::Info, "i", "info")]);

        let mut normal = docs.clone();
        Verbosity::Normal.apply(&mut normal);
        assert_eq!(normal.len(), 1);
        assert_eq!(normal["a.md"].len(), 1);

        let mut summary = docs.clone();
        Verbosity::Summary.apply(&mut summary);
        assert!(summary.is_empty());

        let mut detailed = docs.clone();
        Verbosity::Detailed.apply(&mut detailed);
        assert_eq!(detailed, docs);
    }

    #[test]
    fn test_options_reject_unknown_fields() {
        let ok: ValidationOptions =
            serde_json::from_value(serde_json::json!({"verbosity": "normal", "minCoverage": 50})).unwrap();
        assert_eq!(ok.verbosity, Verbosity::Normal);
        assert_eq!(ok.min_coverage, Some(50.0));
        assert!(serde_json::from_value::<ValidationOptions>(serde_json::json!({"fast": true})).is_err());
        assert!(serde_json::from_value::<ValidationOptions>(serde_json::json!({"skipExternalLinks": "yes"})).is_err());
    }

    #[test]
    fn test_resolve_project_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("f.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            Engine::resolve_project(&tmp.path().join("missing")),
            Err(EngineError::ProjectNotFound(_))
        ));
        assert!(matches!(Engine::resolve_project(&file), Err(EngineError::NotADirectory(_))));
        assert!(Engine::resolve_project(tmp.path()).is_ok());
    }

    #[test]
    fn test_check_does_not_create_docs_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let engine = Engine::new(Arc::new(Config::default()));
        let check = engine.check(tmp.path()).unwrap();
        assert!(!check.exists);
        assert!(check.docs_dir.is_none());
        assert!(!tmp.path().join("docs").exists());

        std::fs::create_dir_all(tmp.path().join("docs")).unwrap();
        std::fs::write(tmp.path().join("docs/a.md"), "# A\n").unwrap();
        let check = engine.check(tmp.path()).unwrap();
        assert!(check.exists);
        assert_eq!(check.document_count, 1);
    }

    #[test]
    fn test_unknown_validator_rejected() {
        let engine = Engine::new(Arc::new(Config::default()));
        let options = ValidationOptions {
            validators: Some(vec!["spelling".to_string()]),
            ..Default::default()
        };
        assert!(matches!(engine.select(&options), Err(EngineError::UnknownValidator(_))));
    }
}
