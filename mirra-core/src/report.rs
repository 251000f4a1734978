use std::path::PathBuf;

use crate::freshness::BuildReason;
use crate::index::ContentRecord;
use crate::template::Diagnostic;

/// One output file that was produced in a run, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAction {
    pub path: PathBuf,
    pub reason: BuildReason,
}

/// A file-scoped error the run recovered from.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub path: PathBuf,
    pub message: String,
}

/// Everything a build run did, accumulated by the coordinating task.
#[derive(Debug, Default, Clone)]
pub struct BuildReport {
    /// Markup and markdown outputs rendered through the template engine
    pub rendered: Vec<FileAction>,
    /// Assets copied verbatim
    pub copied: Vec<FileAction>,
    /// Files whose output was already current
    pub skipped: usize,
    /// Output entries removed because their source is gone
    pub deleted: Vec<PathBuf>,
    /// Passthrough files copied back into the source tree
    pub restored: Vec<PathBuf>,
    pub failures: Vec<Failure>,
    pub diagnostics: Vec<Diagnostic>,
    /// The content index, in traversal order
    pub pages: Vec<ContentRecord>,
    pub index_written: bool,
    pub marker_written: bool,
}

impl BuildReport {
    /// Number of filesystem writes the run performed.
    pub fn writes(&self) -> usize {
        self.rendered.len()
            + self.copied.len()
            + self.deleted.len()
            + self.restored.len()
            + usize::from(self.index_written)
            + usize::from(self.marker_written)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.diagnostics.is_empty()
    }
}
