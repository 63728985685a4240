//! File change history: "when did file X last change?"
//!
//! The freshness validator only needs the most recent change timestamp of a
//! file. [`GitHistory`] answers from `git log`, falling back to the file's
//! mtime for untracked files; [`MtimeHistory`] uses the mtime only.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

use crate::config::HistoryMode;

/// Source of per-file change timestamps.
///
/// `Ok(None)` means the file has no known history (e.g. it does not
/// exist); `Err` means the source itself failed and the caller should
/// degrade gracefully.
#[async_trait]
pub trait ChangeHistory: Send + Sync {
    fn name(&self) -> &str;

    async fn last_changed(&self, path: &Path) -> Result<Option<DateTime<Utc>>>;
}

/// Git-backed history rooted at a work tree.
pub struct GitHistory {
    repo_dir: PathBuf,
}

impl GitHistory {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }
}

#[async_trait]
impl ChangeHistory for GitHistory {
    fn name(&self) -> &str {
        "git"
    }

    async fn last_changed(&self, path: &Path) -> Result<Option<DateTime<Utc>>> {
        let output = Command::new("git")
            .args(["log", "-1", "--format=%ct", "--"])
            .arg(path)
            .current_dir(&self.repo_dir)
            .output()
            .await
            .with_context(|| "Failed to execute 'git log'. Is git installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git log failed for {}: {}", path.display(), stderr.trim());
        }

        let ts_str = String::from_utf8_lossy(&output.stdout);
        match ts_str.trim().parse::<i64>() {
            Ok(secs) => Ok(Utc.timestamp_opt(secs, 0).single()),
            // Untracked or never committed: fall back to the filesystem.
            Err(_) => file_mtime(path).await,
        }
    }
}

/// History derived from filesystem modification times.
pub struct MtimeHistory;

#[async_trait]
impl ChangeHistory for MtimeHistory {
    fn name(&self) -> &str {
        "mtime"
    }

    async fn last_changed(&self, path: &Path) -> Result<Option<DateTime<Utc>>> {
        file_mtime(path).await
    }
}

async fn file_mtime(path: &Path) -> Result<Option<DateTime<Utc>>> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to stat {}", path.display()));
        }
    };
    let modified = metadata
        .modified()
        .with_context(|| format!("No modification time for {}", path.display()))?;
    Ok(Some(DateTime::<Utc>::from(modified)))
}

/// True if `dir` or one of its ancestors contains a `.git` entry.
pub fn in_git_work_tree(dir: &Path) -> bool {
    dir.ancestors().any(|d| d.join(".git").exists())
}

/// Pick the history source for a project according to `mode`.
pub fn history_for(project_root: &Path, mode: HistoryMode) -> Arc<dyn ChangeHistory> {
    match mode {
        HistoryMode::Git => Arc::new(GitHistory::new(project_root)),
        HistoryMode::Mtime => Arc::new(MtimeHistory),
        HistoryMode::Auto => {
            if in_git_work_tree(project_root) {
                Arc::new(GitHistory::new(project_root))
            } else {
                Arc::new(MtimeHistory)
            }
        }
    }
}
