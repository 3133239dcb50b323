use std::{
    fs::{File, OpenOptions},
    io::Write as _,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::Context as _;

use crate::{foundation::error::KarmaResult, source::model::Post};

pub const ERROR_LOG_FILE: &str = "errors.log";
pub const AUDIT_LOG_FILE: &str = "datalog.txt";

/// Append-only line log shared by render workers.
#[derive(Debug)]
pub struct TextLog {
    path: Option<PathBuf>,
    file: Option<Mutex<File>>,
}

impl TextLog {
    pub fn open(path: impl Into<PathBuf>) -> KarmaResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create log dir '{}'", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open log '{}'", path.display()))?;
        Ok(Self {
            path: Some(path),
            file: Some(Mutex::new(file)),
        })
    }

    /// A log that drops every line.
    pub fn discard() -> Self {
        Self {
            path: None,
            file: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write failures are reported through `tracing` and otherwise ignored; a full disk must not
    /// take the render down with it.
    pub fn append(&self, line: &str) {
        let Some(file) = &self.file else {
            return;
        };
        let mut guard = match file.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(guard, "{line}") {
            tracing::warn!(error = %e, path = ?self.path, "failed to append log line");
        }
    }
}

/// Error log plus per-post audit record, both under one directory.
#[derive(Debug)]
pub struct RunLogs {
    pub errors: Arc<TextLog>,
    pub audit: Arc<TextLog>,
}

impl RunLogs {
    pub fn open(dir: &Path) -> KarmaResult<Self> {
        Ok(Self {
            errors: Arc::new(TextLog::open(dir.join(ERROR_LOG_FILE))?),
            audit: Arc::new(TextLog::open(dir.join(AUDIT_LOG_FILE))?),
        })
    }
}

pub fn audit_line(post: &Post) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        post.permalink,
        post.created_at.to_rfc3339(),
        post.author.display_name(),
        post.score
    )
}
