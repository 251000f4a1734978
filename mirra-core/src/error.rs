use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a build run or a single file within it.
///
/// `MissingSourceDir`, `MissingLayoutsDir` and `MissingComponentsDir` are
/// structural: they are raised before any output is touched. Everything
/// else is scoped to one file and ends up in the run's failure list.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Source folder not found: {}", .0.display())]
    MissingSourceDir(PathBuf),
    #[error("Layouts folder not found: {}", .0.display())]
    MissingLayoutsDir(PathBuf),
    #[error("Components folder not found: {}", .0.display())]
    MissingComponentsDir(PathBuf),
    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Build task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;
