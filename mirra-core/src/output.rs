use std::fs::File;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{BuildError, Result};

const TEMP_PREFIX: &str = ".mirra-";

/// Writes `contents` to a temporary file beside `target`, then renames it
/// over `target`.
///
/// `target` either keeps its previous content or holds all of `contents`.
/// On failure the temporary file is removed.
pub fn write_atomic(target: &Path, contents: &[u8]) -> Result<()> {
    let mut temp = temp_beside(target)?;
    temp.write_all(contents)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| BuildError::io(target, e))?;
    set_public(&temp, target)?;
    persist(temp, target)
}

/// Copies `source` over `target` the same way as [`write_atomic`].
pub fn copy_atomic(source: &Path, target: &Path) -> Result<()> {
    let mut input = File::open(source).map_err(|e| BuildError::io(source, e))?;
    let permissions = input
        .metadata()
        .map_err(|e| BuildError::io(source, e))?
        .permissions();

    let mut temp = temp_beside(target)?;
    std::io::copy(&mut input, temp.as_file_mut())
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| BuildError::io(target, e))?;
    temp.as_file()
        .set_permissions(permissions)
        .map_err(|e| BuildError::io(target, e))?;
    persist(temp, target)
}

fn temp_beside(target: &Path) -> Result<NamedTempFile> {
    let parent = target
        .parent()
        .ok_or_else(|| BuildError::InvalidPath(target.to_path_buf()))?;

    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(parent)
        .map_err(|e| BuildError::io(target, e))
}

fn persist(temp: NamedTempFile, target: &Path) -> Result<()> {
    temp.persist(target)
        .map(|_| ())
        .map_err(|e| BuildError::io(target, e.error))
}

/// Temporary files are created owner-only; published pages are not.
#[cfg(unix)]
fn set_public(temp: &NamedTempFile, target: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    temp.as_file()
        .set_permissions(std::fs::Permissions::from_mode(0o644))
        .map_err(|e| BuildError::io(target, e))
}

#[cfg(not(unix))]
fn set_public(_temp: &NamedTempFile, _target: &Path) -> Result<()> {
    Ok(())
}
