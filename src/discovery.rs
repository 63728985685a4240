//! Document discovery: locate the docs directory, walk it, and parse every
//! documentation file.
//!
//! Files are read concurrently. A file that cannot be read or decoded is
//! skipped and reported as a warning attributed to `discovery`; the run
//! continues.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use walkdir::{DirEntry, WalkDir};

use crate::config::{Config, DocsConfig};
use crate::markdown::parse_document;
use crate::models::{push_issue, Document, IssueMap, Severity, ValidationIssue};

pub const DISCOVERY: &str = "discovery";

/// Directory names never descended into, besides dot-directories.
const DEPENDENCY_DIRS: &[&str] = &["node_modules", "target", "vendor", "dist", "build", "out"];

/// Documents found under a docs directory plus per-file discovery issues.
#[derive(Debug, Default)]
pub struct Discovery {
    pub documents: Vec<Document>,
    pub issues: IssueMap,
}

/// First existing candidate docs directory under `project_root`.
pub fn find_docs_dir(project_root: &Path, docs: &DocsConfig) -> Option<PathBuf> {
    docs.candidates
        .iter()
        .map(|c| project_root.join(c))
        .find(|p| p.is_dir())
}

/// Locate the docs directory, creating the first candidate when none exists
/// and `create_if_missing` is set.
pub fn locate_docs_dir(project_root: &Path, docs: &DocsConfig) -> Result<PathBuf> {
    if let Some(dir) = find_docs_dir(project_root, docs) {
        return Ok(dir);
    }

    let first = docs
        .candidates
        .first()
        .ok_or_else(|| anyhow::anyhow!("docs.candidates is empty"))?;
    let dir = project_root.join(first);
    if docs.create_if_missing {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create docs directory: {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), "created empty docs directory");
    }
    Ok(dir)
}

/// True for dot-directories and dependency/build output directories.
pub fn is_pruned_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || DEPENDENCY_DIRS.contains(&name.as_ref())
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Enumerate documentation files under `docs_dir`, sorted by path.
pub fn list_doc_files(docs_dir: &Path, docs: &DocsConfig) -> Result<Vec<PathBuf>> {
    if !docs_dir.is_dir() {
        return Ok(Vec::new());
    }
    let exclude_set = build_globset(&docs.exclude_globs)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(docs_dir)
        .follow_links(docs.follow_symlinks)
        .into_iter()
        .filter_entry(|e| !is_pruned_dir(e));
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_extension(entry.path(), &docs.extensions) {
            continue;
        }

        let relative = entry.path().strip_prefix(docs_dir).unwrap_or(entry.path());
        if exclude_set.is_match(relative) {
            continue;
        }
        files.push(entry.into_path());
    }

    files.sort();
    Ok(files)
}

/// Count documentation files without parsing them.
pub fn count_doc_files(docs_dir: &Path, docs: &DocsConfig) -> Result<usize> {
    Ok(list_doc_files(docs_dir, docs)?.len())
}

/// Walk `docs_dir`, read every documentation file concurrently and parse it.
pub async fn discover_documents(docs_dir: &Path, config: &Config) -> Result<Discovery> {
    let files = list_doc_files(docs_dir, &config.docs)?;

    let mut tasks = JoinSet::new();
    for path in files {
        let relative = path
            .strip_prefix(docs_dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        tasks.spawn(async move {
            let bytes = tokio::fs::read(&path).await;
            (path, relative, bytes)
        });
    }

    let mut discovery = Discovery::default();
    while let Some(joined) = tasks.join_next().await {
        let (path, relative, bytes) = joined.context("document read task panicked")?;
        let key = path.display().to_string();

        let content = match bytes.map(String::from_utf8) {
            Ok(Ok(content)) => content,
            Ok(Err(_)) => {
                tracing::warn!(path = %key, "skipping non UTF-8 document");
                push_issue(
                    &mut discovery.issues,
                    &key,
                    ValidationIssue::new(
                        DISCOVERY,
                        Severity::Warning,
                        "unreadable_document",
                        "Document is not valid UTF-8 and was skipped",
                    ),
                );
                continue;
            }
            Err(e) => {
                tracing::warn!(path = %key, error = %e, "skipping unreadable document");
                push_issue(
                    &mut discovery.issues,
                    &key,
                    ValidationIssue::new(
                        DISCOVERY,
                        Severity::Warning,
                        "unreadable_document",
                        format!("Document could not be read and was skipped: {}", e),
                    ),
                );
                continue;
            }
        };

        let document = parse_document(path, relative, content);
        if let Some(err) = &document.front_matter_error {
            push_issue(
                &mut discovery.issues,
                &key,
                ValidationIssue::new(
                    DISCOVERY,
                    Severity::Warning,
                    "malformed_front_matter",
                    format!("Front-matter ignored: {}", err),
                )
                .at_line(1)
                .with_suggestion("Fix the metadata block so update dates and related files are honoured"),
            );
        }
        discovery.documents.push(document);
    }

    discovery.documents.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(discovery)
}

/// Enumerate project source files under the given top-level directories,
/// applying the same pruning rules as document discovery.
pub fn list_source_files(project_root: &Path, dirs: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for dir in dirs {
        let root = project_root.join(dir);
        if !root.is_dir() {
            continue;
        }
        let walker = WalkDir::new(&root)
            .into_iter()
            .filter_entry(|e| !is_pruned_dir(e))
            .filter_map(|e| e.ok());
        for entry in walker {
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files.dedup();
    files
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
