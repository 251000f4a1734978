use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::{BuildError, Result};
use crate::page::is_markup;

/// Latest modification time across every shared template.
///
/// Any markup output older than this may embed an outdated layout or
/// component and is rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DependencyClock(SystemTime);

impl DependencyClock {
    pub fn at(time: SystemTime) -> Self {
        Self(time)
    }

    /// Scans every entry under `dirs`, the directories themselves included,
    /// so adding or removing a template also moves the clock.
    pub fn of_dirs<I, P>(dirs: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut latest = SystemTime::UNIX_EPOCH;

        for dir in dirs {
            for entry in WalkDir::new(dir.as_ref()).follow_links(false) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if e.io_error().map(|e| e.kind()) == Some(ErrorKind::NotFound) => {
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };
                let modified = entry
                    .metadata()?
                    .modified()
                    .map_err(|e| BuildError::io(entry.path(), e))?;
                latest = latest.max(modified);
            }
        }

        Ok(Self(latest))
    }

    pub fn time(&self) -> SystemTime {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildReason {
    Forced,
    NewFile,
    SourceModified,
    SharedTemplateChanged,
}

impl fmt::Display for BuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildReason::Forced => write!(f, "forced"),
            BuildReason::NewFile => write!(f, "new file"),
            BuildReason::SourceModified => write!(f, "source modified"),
            BuildReason::SharedTemplateChanged => write!(f, "shared template changed"),
        }
    }
}

/// Decides whether `output` has to be produced again from `source`.
///
/// Returns the reason when a build is needed. A missing output is a new
/// file; any other stat failure is returned to the caller.
pub async fn needs_build(
    source: &Path,
    output: &Path,
    clock: DependencyClock,
    force: bool,
) -> Result<Option<BuildReason>> {
    if force {
        return Ok(Some(BuildReason::Forced));
    }

    let output_modified = match tokio::fs::metadata(output).await {
        Ok(meta) => meta.modified().map_err(|e| BuildError::io(output, e))?,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Some(BuildReason::NewFile)),
        Err(e) => return Err(BuildError::io(output, e)),
    };

    let source_modified = tokio::fs::metadata(source)
        .await
        .and_then(|meta| meta.modified())
        .map_err(|e| BuildError::io(source, e))?;

    if source_modified > output_modified {
        return Ok(Some(BuildReason::SourceModified));
    }

    if is_markup(output) && clock.time() > output_modified {
        return Ok(Some(BuildReason::SharedTemplateChanged));
    }

    Ok(None)
}
