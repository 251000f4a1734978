use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::BuildRunConfig;
use crate::error::{BuildError, Result};
use crate::page::is_markup;
use crate::report::Failure;
use crate::walker::MirrorWalker;

#[derive(Debug, Default, PartialEq)]
pub struct SyncOutcome {
    pub deleted: Vec<PathBuf>,
    pub restored: Vec<PathBuf>,
    pub failures: Vec<Failure>,
}

/// Removes output entries whose source is gone.
///
/// Kept in place: the content index, the routing marker at the output
/// root, and `.html` files whose `.md` source still exists. Passthrough
/// files (e.g. `CNAME`) are copied back into the source tree instead.
/// Entries that vanish before they can be removed count as removed.
pub fn sync_deletions(config: &BuildRunConfig) -> Result<SyncOutcome> {
    let mut pairs = MirrorWalker::new(&config.output, &config.source).walk()?;
    // Parents sort before their children.
    pairs.sort_by(|a, b| a.origin.cmp(&b.origin));

    let shared = config.shared_dirs();
    let index = config.index_path();
    let marker = config.routing_marker_path();
    let mut outcome = SyncOutcome::default();
    let mut removed_dirs: Vec<PathBuf> = Vec::new();

    for pair in pairs {
        let (built, source) = (&pair.origin, &pair.mirror);

        if removed_dirs.iter().any(|dir| built.starts_with(dir)) {
            continue;
        }

        let counterpart = !shared.iter().any(|dir| source.starts_with(dir)) && exists(source)?;

        if pair.is_dir() {
            if counterpart {
                continue;
            }
            match remove(built, |p| std::fs::remove_dir_all(p)) {
                Ok(()) => {
                    log::info!("Deleted {}", built.display());
                    outcome.deleted.push(built.clone());
                }
                Err(e) => fail(&mut outcome, built, e),
            }
            removed_dirs.push(built.clone());
            continue;
        }

        if counterpart || *built == index || *built == marker {
            continue;
        }

        let file_name = built
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        if config.is_passthrough(file_name) {
            match std::fs::copy(built, source) {
                Ok(_) => {
                    log::info!("Copied {} to {}", built.display(), source.display());
                    outcome.restored.push(source.clone());
                }
                Err(e) => fail(&mut outcome, built, BuildError::io(source, e)),
            }
            continue;
        }

        if is_markup(built) && exists(&source.with_extension("md"))? {
            continue;
        }

        match remove(built, |p| std::fs::remove_file(p)) {
            Ok(()) => {
                log::info!("Deleted {}", built.display());
                outcome.deleted.push(built.clone());
            }
            Err(e) => fail(&mut outcome, built, e),
        }
    }

    Ok(outcome)
}

fn exists(path: &Path) -> Result<bool> {
    match std::fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => Ok(false),
        Err(e) => Err(BuildError::io(path, e)),
    }
}

fn remove(path: &Path, op: fn(&Path) -> std::io::Result<()>) -> Result<()> {
    match op(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::io(path, e)),
    }
}

fn fail(outcome: &mut SyncOutcome, path: &Path, err: BuildError) {
    log::error!("Could not sync {}: {err}", path.display());
    outcome.failures.push(Failure {
        path: path.to_path_buf(),
        message: err.to_string(),
    });
}
