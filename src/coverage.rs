//! Coverage validator: what share of the expected documentation categories
//! is covered, and which components and features are never mentioned.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::config::{CategoryConfig, CoverageConfig};
use crate::discovery::{is_pruned_dir, list_source_files};
use crate::engine::ValidationContext;
use crate::models::{push_issue, Document, IssueMap, Severity, ValidationIssue, ValidatorResult};
use crate::traits::Validator;

pub const COVERAGE: &str = "coverage";

const COMPONENT_EXTENSIONS: &[&str] = &["tsx", "jsx", "ts", "js", "vue", "svelte", "astro"];
const PAGE_EXTENSIONS: &[&str] = &["tsx", "jsx", "ts", "js", "mdx"];
const TAG_KEYS: &[&str] = &["tags", "category", "categories"];

/// Lowercase and keep only alphanumerics, so `user-card`, `UserCard` and
/// `user card` compare equal.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Every name the documentation mentions: file stems, headings, prose
/// words and short word runs.
#[derive(Debug, Default)]
pub struct DocumentationIndex {
    names: HashSet<String>,
}

impl DocumentationIndex {
    pub fn build(documents: &[Document]) -> Self {
        let mut index = Self::default();
        for doc in documents {
            for segment in doc.relative_path.split('/') {
                let stem = segment.rsplit_once('.').map(|(s, _)| s).unwrap_or(segment);
                index.insert(stem);
            }
            for heading in &doc.headings {
                index.insert(&heading.text);
            }
            for line in doc.content.lines() {
                let words: Vec<&str> = line
                    .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
                    .filter(|w| !w.is_empty())
                    .collect();
                for n in 1..=3 {
                    for run in words.windows(n) {
                        index.insert(&run.join(" "));
                    }
                }
            }
        }
        index
    }

    fn insert(&mut self, name: &str) {
        let normalized = normalize_name(name);
        if !normalized.is_empty() {
            self.names.insert(normalized);
        }
    }

    pub fn mentions(&self, name: &str) -> bool {
        self.names.contains(&normalize_name(name))
    }
}

/// A compiled documentation category.
pub struct Category {
    pub name: String,
    keywords: Vec<String>,
    pattern: Regex,
}

impl Category {
    pub fn compile(cfg: &CategoryConfig) -> Result<Self> {
        let alternatives: Vec<String> = cfg
            .keywords
            .iter()
            .map(|k| {
                k.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"[\s_-]+")
            })
            .collect();
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
            .with_context(|| format!("Invalid keywords for category {}", cfg.name))?;
        Ok(Self {
            name: cfg.name.clone(),
            keywords: cfg.keywords.clone(),
            pattern,
        })
    }

    /// Matched against the relative path, headings and tag-like front-matter.
    pub fn matches(&self, doc: &Document) -> bool {
        let path_words = doc.relative_path.replace(['/', '.'], " ");
        if self.pattern.is_match(&path_words) {
            return true;
        }
        if doc.headings.iter().any(|h| self.pattern.is_match(&h.text)) {
            return true;
        }
        let Some(fm) = &doc.front_matter else {
            return false;
        };
        TAG_KEYS.iter().filter_map(|k| fm.get(*k)).any(|v| match v {
            serde_json::Value::String(s) => self.pattern.is_match(s),
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|i| i.as_str())
                .any(|s| self.pattern.is_match(s)),
            _ => false,
        })
    }
}

/// Kind of source marker expected to be documented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Component,
    Feature,
}

/// A component or feature found in the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMarker {
    pub kind: MarkerKind,
    pub name: String,
    pub path: PathBuf,
}

fn with_src_variants(dirs: &[String]) -> Vec<String> {
    let mut out: Vec<String> = dirs.to_vec();
    out.extend(dirs.iter().map(|d| format!("src/{}", d)));
    out
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.contains(&e))
        .unwrap_or(false)
}

fn is_test_or_story(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.contains(".test.")
        || name.contains(".spec.")
        || name.contains(".stories.")
        || path.components().any(|c| c.as_os_str() == "__tests__")
}

/// Components: script or markup files under the component directories.
pub fn component_markers(project_root: &Path, cfg: &CoverageConfig) -> Vec<SourceMarker> {
    let mut by_name: BTreeMap<String, SourceMarker> = BTreeMap::new();
    for file in list_source_files(project_root, &with_src_variants(&cfg.component_dirs)) {
        if !has_extension(&file, COMPONENT_EXTENSIONS) || is_test_or_story(&file) {
            continue;
        }
        let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let name = if stem == "index" {
            file.parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or(stem)
        } else {
            stem
        };
        if name.is_empty() || name.starts_with('_') {
            continue;
        }
        by_name
            .entry(normalize_name(name))
            .or_insert_with(|| SourceMarker {
                kind: MarkerKind::Component,
                name: name.to_string(),
                path: file.clone(),
            });
    }
    by_name.into_values().collect()
}

fn is_plain_segment(segment: &str) -> bool {
    !(segment.starts_with('(')
        || segment.starts_with('[')
        || segment.starts_with('_')
        || segment.starts_with('@')
        || segment.is_empty())
}

/// Features: directories directly under the feature directories, plus the
/// first plain route segment of every `page.*` under the route directories.
pub fn feature_markers(project_root: &Path, cfg: &CoverageConfig) -> Vec<SourceMarker> {
    let mut by_name: BTreeMap<String, SourceMarker> = BTreeMap::new();

    for dir in with_src_variants(&cfg.feature_dirs) {
        let root = project_root.join(&dir);
        let Ok(entries) = std::fs::read_dir(&root) else {
            continue;
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.path())
            .collect();
        dirs.sort();
        for path in dirs {
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
                continue;
            };
            if name.starts_with('.') || !is_plain_segment(&name) {
                continue;
            }
            by_name.entry(normalize_name(&name)).or_insert(SourceMarker {
                kind: MarkerKind::Feature,
                name,
                path,
            });
        }
    }

    for dir in with_src_variants(&cfg.route_dirs) {
        let root = project_root.join(&dir);
        if !root.is_dir() {
            continue;
        }
        let walker = walkdir::WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_pruned_dir(e))
            .filter_map(|e| e.ok());
        for entry in walker {
            let path = entry.path();
            let is_page = path.file_stem().map(|s| s == "page").unwrap_or(false)
                && has_extension(path, PAGE_EXTENSIONS);
            if !entry.file_type().is_file() || !is_page {
                continue;
            }
            let Ok(relative) = path.strip_prefix(&root) else {
                continue;
            };
            let segment = relative
                .parent()
                .into_iter()
                .flat_map(|p| p.components())
                .filter_map(|c| c.as_os_str().to_str())
                .find(|s| is_plain_segment(s));
            let Some(segment) = segment else {
                continue;
            };
            by_name
                .entry(normalize_name(segment))
                .or_insert_with(|| SourceMarker {
                    kind: MarkerKind::Feature,
                    name: segment.to_string(),
                    path: path.to_path_buf(),
                });
        }
    }

    by_name.into_values().collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkerSummary {
    total: usize,
    documented: usize,
    undocumented: Vec<String>,
}

fn summarize_markers(markers: &[SourceMarker], index: &DocumentationIndex) -> MarkerSummary {
    let undocumented: Vec<String> = markers
        .iter()
        .filter(|m| !index.mentions(&m.name))
        .map(|m| m.name.clone())
        .collect();
    MarkerSummary {
        total: markers.len(),
        documented: markers.len() - undocumented.len(),
        undocumented,
    }
}

fn relative_display(project_root: &Path, path: &Path) -> String {
    path.strip_prefix(project_root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

pub struct CoverageValidator;

#[async_trait]
impl Validator for CoverageValidator {
    fn name(&self) -> &str {
        COVERAGE
    }

    fn description(&self) -> &str {
        "Measure category coverage and find undocumented components and features"
    }

    async fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorResult> {
        let cfg = &ctx.config.coverage;
        let categories = cfg
            .categories
            .iter()
            .map(Category::compile)
            .collect::<Result<Vec<_>>>()?;

        let mut documented = Vec::new();
        let mut missing = Vec::new();
        for category in &categories {
            if ctx.documents.iter().any(|d| category.matches(d)) {
                documented.push(category.name.clone());
            } else {
                missing.push(category);
            }
        }
        let percentage = if categories.is_empty() {
            0.0
        } else {
            documented.len() as f64 / categories.len() as f64 * 100.0
        };
        let min_coverage = ctx.min_coverage();

        let mut documents = IssueMap::new();
        let docs_key = ctx.docs_dir.display().to_string();
        for category in &missing {
            push_issue(
                &mut documents,
                &docs_key,
                ValidationIssue::new(
                    COVERAGE,
                    Severity::Warning,
                    "missing_category",
                    format!("No documentation covers the '{}' category", category.name),
                )
                .with_suggestion(format!(
                    "Add a document whose title, path or tags mention one of: {}",
                    category.keywords.join(", ")
                )),
            );
        }

        let index = DocumentationIndex::build(&ctx.documents);
        let components = component_markers(&ctx.project_root, cfg);
        let features = feature_markers(&ctx.project_root, cfg);
        tracing::debug!(
            components = components.len(),
            features = features.len(),
            "scanned source markers"
        );

        for marker in components.iter().chain(features.iter()) {
            if index.mentions(&marker.name) {
                continue;
            }
            let (kind, label) = match marker.kind {
                MarkerKind::Component => ("undocumented_component", "Component"),
                MarkerKind::Feature => ("undocumented_feature", "Feature"),
            };
            push_issue(
                &mut documents,
                &marker.path.display().to_string(),
                ValidationIssue::new(
                    COVERAGE,
                    Severity::Info,
                    kind,
                    format!(
                        "{} {} ({}) is not mentioned in the documentation",
                        label,
                        marker.name,
                        relative_display(&ctx.project_root, &marker.path)
                    ),
                )
                .with_suggestion(format!("Document {} or link to it from an existing page", marker.name)),
            );
        }

        let summary = format!(
            "Coverage {:.1}% ({}/{} categories, minimum {}%)",
            percentage,
            documented.len(),
            categories.len(),
            min_coverage
        );
        let details = json!({
            "percentage": percentage,
            "minCoverage": min_coverage,
            "documentedCategories": documented,
            "missingCategories": missing.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "components": summarize_markers(&components, &index),
            "features": summarize_markers(&features, &index),
        });

        let mut result = ValidatorResult::from_issues(COVERAGE, documents, summary, details);
        result.pass = percentage >= min_coverage;
        Ok(result)
    }
}
