//! TOML configuration parsing and validation.
//!
//! Every section is optional; omitted values fall back to the policy
//! defaults below. Per-request tool options override the relevant fields.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub docs: DocsConfig,
    #[serde(default)]
    pub freshness: FreshnessConfig,
    #[serde(default)]
    pub consistency: ConsistencyConfig,
    #[serde(default)]
    pub coverage: CoverageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocsConfig {
    /// Candidate docs directories, relative to the project root, in priority order.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            extensions: default_extensions(),
            exclude_globs: Vec::new(),
            create_if_missing: true,
            follow_symlinks: false,
        }
    }
}

fn default_candidates() -> Vec<String> {
    ["docs", "documentation", "doc", "content/docs", "src/docs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_extensions() -> Vec<String> {
    vec!["md".to_string(), "mdx".to_string(), "markdown".to_string()]
}
fn default_true() -> bool {
    true
}

/// Where file change times come from.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    /// git inside a work tree, file mtime otherwise.
    #[default]
    Auto,
    Git,
    Mtime,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FreshnessConfig {
    #[serde(default = "default_critical_days")]
    pub critical_days: i64,
    #[serde(default = "default_outdated_days")]
    pub outdated_days: i64,
    #[serde(default = "default_review_days")]
    pub review_days: i64,
    #[serde(default = "default_source_dirs")]
    pub source_dirs: Vec<String>,
    #[serde(default)]
    pub history: HistoryMode,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            critical_days: default_critical_days(),
            outdated_days: default_outdated_days(),
            review_days: default_review_days(),
            source_dirs: default_source_dirs(),
            history: HistoryMode::Auto,
        }
    }
}

fn default_critical_days() -> i64 {
    90
}
fn default_outdated_days() -> i64 {
    30
}
fn default_review_days() -> i64 {
    7
}
fn default_source_dirs() -> Vec<String> {
    [
        "app",
        "components",
        "lib",
        "hooks",
        "pages",
        "src",
        "styles",
        "utils",
        "features",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConsistencyConfig {
    /// Extra casual → canonical term mappings, merged over the built-in table.
    #[serde(default)]
    pub terminology: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub skip_external_links: bool,
    #[serde(default = "default_external_timeout_secs")]
    pub external_timeout_secs: u64,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            terminology: BTreeMap::new(),
            skip_external_links: true,
            external_timeout_secs: default_external_timeout_secs(),
        }
    }
}

fn default_external_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct CategoryConfig {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoverageConfig {
    #[serde(default = "default_min_percentage")]
    pub min_percentage: f64,
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryConfig>,
    #[serde(default = "default_component_dirs")]
    pub component_dirs: Vec<String>,
    #[serde(default = "default_feature_dirs")]
    pub feature_dirs: Vec<String>,
    #[serde(default = "default_route_dirs")]
    pub route_dirs: Vec<String>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            min_percentage: default_min_percentage(),
            categories: default_categories(),
            component_dirs: default_component_dirs(),
            feature_dirs: default_feature_dirs(),
            route_dirs: default_route_dirs(),
        }
    }
}

fn default_min_percentage() -> f64 {
    80.0
}

fn default_categories() -> Vec<CategoryConfig> {
    let table: [(&str, &[&str]); 8] = [
        ("architecture", &["architecture", "design", "overview", "structure"]),
        ("components", &["component", "components", "ui"]),
        ("features", &["feature", "features"]),
        ("api", &["api", "apis", "endpoint", "endpoints", "route handler"]),
        (
            "getting-started",
            &["getting started", "installation", "install", "setup", "quickstart"],
        ),
        ("deployment", &["deploy", "deployment", "hosting", "release"]),
        ("testing", &["test", "tests", "testing"]),
        ("styling", &["styling", "styles", "theme", "theming", "css", "tailwind"]),
    ];
    table
        .iter()
        .map(|(name, keywords)| CategoryConfig {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        })
        .collect()
}

fn default_component_dirs() -> Vec<String> {
    vec!["components".to_string()]
}
fn default_feature_dirs() -> Vec<String> {
    vec!["features".to_string()]
}
fn default_route_dirs() -> Vec<String> {
    vec!["app".to_string()]
}

impl Config {
    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.docs.candidates.is_empty() {
            anyhow::bail!("docs.candidates must not be empty");
        }
        if self.docs.extensions.is_empty() {
            anyhow::bail!("docs.extensions must not be empty");
        }

        let f = &self.freshness;
        if f.review_days < 0 {
            anyhow::bail!("freshness.review_days must be >= 0");
        }
        if !(f.review_days <= f.outdated_days && f.outdated_days <= f.critical_days) {
            anyhow::bail!(
                "freshness thresholds must satisfy review_days <= outdated_days <= critical_days (got {}/{}/{})",
                f.review_days,
                f.outdated_days,
                f.critical_days
            );
        }

        if !(0.0..=100.0).contains(&self.coverage.min_percentage) {
            anyhow::bail!("coverage.min_percentage must be in [0, 100]");
        }
        if self.coverage.categories.is_empty() {
            anyhow::bail!("coverage.categories must not be empty");
        }
        for cat in &self.coverage.categories {
            if cat.keywords.is_empty() {
                anyhow::bail!("coverage category '{}' has no keywords", cat.name);
            }
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Load the config file if it exists, otherwise use the built-in defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.freshness.critical_days, 90);
        assert_eq!(cfg.freshness.outdated_days, 30);
        assert_eq!(cfg.freshness.review_days, 7);
        assert_eq!(cfg.coverage.min_percentage, 80.0);
        assert_eq!(cfg.coverage.categories.len(), 8);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.docs.candidates[0], "docs");
        assert!(cfg.consistency.skip_external_links);
    }

    #[test]
    fn test_partial_sections() {
        let cfg: Config = toml::from_str(
            r#"
[freshness]
critical_days = 60
history = "mtime"

[consistency.terminology]
"react query" = "React Query"

[coverage]
min_percentage = 50
"#,
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.freshness.critical_days, 60);
        assert_eq!(cfg.freshness.outdated_days, 30);
        assert_eq!(cfg.freshness.history, HistoryMode::Mtime);
        assert_eq!(
            cfg.consistency.terminology.get("react query").map(String::as_str),
            Some("React Query")
        );
        assert_eq!(cfg.coverage.min_percentage, 50.0);
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        let cfg: Config = toml::from_str("[freshness]\ncritical_days = 10\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_coverage() {
        let cfg: Config = toml::from_str("[coverage]\nmin_percentage = 120\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let cfg = load_config_or_default(Path::new("/nonexistent/docval.toml")).unwrap();
        assert_eq!(cfg.docs.extensions.len(), 3);
    }
}
