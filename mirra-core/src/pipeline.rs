use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use crate::config::BuildRunConfig;
use crate::error::{BuildError, Result};
use crate::freshness::{BuildReason, DependencyClock, needs_build};
use crate::frontmatter::SourceItem;
use crate::index::{build_index, write_index};
use crate::output::{copy_atomic, write_atomic};
use crate::page::{SourceKind, is_markdown, output_path};
use crate::report::{BuildReport, Failure, FileAction};
use crate::store::TemplateStore;
use crate::sync::sync_deletions;
use crate::template::{Diagnostic, TemplateEngine};
use crate::walker::{MirrorWalker, PathPair};

pub type BuildObserver = Arc<dyn Fn(&BuildReport) + Send + Sync>;

/// The mirrored build: build pass, deletion sync, content index.
///
/// Holds only the immutable configuration; every run computes its own
/// clock and template store and returns its own report.
pub struct Pipeline {
    config: Arc<BuildRunConfig>,
    observers: Vec<BuildObserver>,
}

/// Read-only state shared by all file tasks of one run.
struct RunContext {
    config: Arc<BuildRunConfig>,
    clock: DependencyClock,
    store: TemplateStore,
    force: bool,
}

enum FileOutcome {
    Skipped,
    Rendered(FileAction, Vec<Diagnostic>),
    Copied(FileAction),
}

impl Pipeline {
    /// Checks the required folders and resolves every root to an absolute
    /// path. The output root does not have to exist yet.
    pub fn new(config: BuildRunConfig) -> Result<Self> {
        let source = resolve(&config.source, BuildError::MissingSourceDir)?;
        let layouts = resolve(&config.layouts, BuildError::MissingLayoutsDir)?;
        let components = resolve(&config.components, BuildError::MissingComponentsDir)?;
        let output = match config.output.canonicalize() {
            Ok(path) => path,
            Err(_) => std::path::absolute(&config.output)
                .map_err(|e| BuildError::io(&config.output, e))?,
        };

        Ok(Self {
            config: Arc::new(BuildRunConfig {
                source,
                output,
                layouts,
                components,
                ..config
            }),
            observers: Vec::new(),
        })
    }

    /// Registers a callback invoked after every completed run.
    pub fn on_build_complete<F>(mut self, observer: F) -> Self
    where
        F: Fn(&BuildReport) + Send + Sync + 'static,
    {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn config(&self) -> &BuildRunConfig {
        &self.config
    }

    pub fn build_root(&self) -> &Path {
        &self.config.output
    }

    /// Runs one full pass. Only structural problems are returned as
    /// errors; everything else lands in the report's failures and the
    /// pass carries on, so observers always see a finished report.
    pub async fn run_build(&self, force: bool) -> Result<BuildReport> {
        let started = Instant::now();
        self.check_dirs()?;

        let mut report = BuildReport::default();
        if let Some((clock, store, pairs)) = self.prepare(&mut report).await {
            let (dirs, files): (Vec<_>, Vec<_>) = pairs.into_iter().partition(PathPair::is_dir);
            let files = self.resolve_collisions(files, &mut report);
            self.create_dirs(dirs, &mut report).await;

            let context = Arc::new(RunContext {
                config: Arc::clone(&self.config),
                clock,
                store,
                force: force || self.config.force,
            });
            self.build_files(files, context, &mut report).await;
        }

        match self.write_routing_marker().await {
            Ok(written) => report.marker_written = written,
            Err(e) => record(&mut report, self.config.routing_marker_path(), e),
        }

        self.finish(&mut report).await;

        log::info!(
            "Built {} page(s), copied {} file(s), deleted {}, skipped {} in {:.2?}",
            report.rendered.len(),
            report.copied.len(),
            report.deleted.len(),
            report.skipped,
            started.elapsed()
        );
        if !report.failures.is_empty() {
            log::warn!("{} file(s) could not be built", report.failures.len());
        }

        for observer in &self.observers {
            observer(&report);
        }

        Ok(report)
    }

    /// Clock, template store and source pairs for this run. `None` when
    /// any of them is unavailable, in which case no file is built.
    async fn prepare(
        &self,
        report: &mut BuildReport,
    ) -> Option<(DependencyClock, TemplateStore, Vec<PathPair>)> {
        let config = Arc::clone(&self.config);
        let prepared = tokio::task::spawn_blocking(move || -> Result<_> {
            let shared = config.shared_dirs();
            let clock = DependencyClock::of_dirs(&shared)?;
            let store = TemplateStore::load(&config.layouts, &config.components)?;
            let pairs = MirrorWalker::new(&config.source, &config.output)
                .omit(&shared)
                .walk()?;
            std::fs::create_dir_all(&config.output)
                .map_err(|e| BuildError::io(&config.output, e))?;
            Ok((clock, store, pairs))
        })
        .await
        .map_err(BuildError::from)
        .and_then(|prepared| prepared);

        match prepared {
            Ok(prepared) => Some(prepared),
            Err(e) => {
                log::error!("Skipping the build phase: {e}");
                record(report, self.config.source.clone(), e);
                None
            }
        }
    }

    /// Deletion sync, then the content index. Each step runs even when the
    /// one before it failed.
    async fn finish(&self, report: &mut BuildReport) {
        let config = Arc::clone(&self.config);
        let joined = tokio::task::spawn_blocking(move || {
            let sync = sync_deletions(&config);
            let index = build_index(&config.output, &config.not_found_page).map(|pages| {
                let written = write_index(&config.index_path(), &pages);
                (pages, written)
            });
            (sync, index)
        })
        .await;

        let (sync, index) = match joined {
            Ok(results) => results,
            Err(e) => {
                record(report, self.config.output.clone(), e.into());
                return;
            }
        };

        match sync {
            Ok(sync) => {
                report.deleted = sync.deleted;
                report.restored = sync.restored;
                report.failures.extend(sync.failures);
            }
            Err(e) => record(report, self.config.output.clone(), e),
        }

        match index {
            Ok((pages, written)) => {
                report.pages = pages;
                match written {
                    Ok(written) => report.index_written = written,
                    Err(e) => record(report, self.config.index_path(), e),
                }
            }
            Err(e) => record(report, self.config.index_path(), e),
        }
    }

    /// A markdown page and a markup page can map to the same output. The
    /// markup source wins; the markdown one is reported and left out.
    fn resolve_collisions(&self, files: Vec<PathPair>, report: &mut BuildReport) -> Vec<PathPair> {
        let mut targets: BTreeMap<PathBuf, PathPair> = BTreeMap::new();

        for pair in files {
            let target = output_path(&pair.mirror);
            let Some(existing) = targets.remove(&target) else {
                targets.insert(target, pair);
                continue;
            };

            let (winner, loser) = if is_markdown(&existing.origin) {
                (pair, existing)
            } else {
                (existing, pair)
            };
            let message = format!(
                "output {} is already produced by {}",
                target.display(),
                self.display(&winner.origin)
            );
            log::error!("Not building {}: {message}", self.display(&loser.origin));
            report.failures.push(Failure {
                path: loser.origin,
                message,
            });
            targets.insert(target, winner);
        }

        targets.into_values().collect()
    }

    fn check_dirs(&self) -> Result<()> {
        let required: [(&Path, fn(PathBuf) -> BuildError); 3] = [
            (self.config.source.as_path(), BuildError::MissingSourceDir),
            (self.config.layouts.as_path(), BuildError::MissingLayoutsDir),
            (self.config.components.as_path(), BuildError::MissingComponentsDir),
        ];
        for (dir, missing) in required {
            if !dir.is_dir() {
                return Err(missing(dir.to_path_buf()));
            }
        }
        Ok(())
    }

    /// Every directory is created before any file task starts.
    async fn create_dirs(&self, dirs: Vec<PathPair>, report: &mut BuildReport) {
        let mut tasks = JoinSet::new();
        for pair in dirs {
            tasks.spawn(async move {
                let result = tokio::fs::create_dir_all(&pair.mirror).await;
                (pair.mirror, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((path, Err(e))) => {
                    let err = BuildError::io(&path, e);
                    record(report, path, err);
                }
                Ok((_, Ok(()))) => {}
                Err(e) => record(report, self.config.output.clone(), e.into()),
            }
        }
    }

    async fn build_files(
        &self,
        files: Vec<PathPair>,
        context: Arc<RunContext>,
        report: &mut BuildReport,
    ) {
        let mut tasks = JoinSet::new();
        for pair in files {
            let context = Arc::clone(&context);
            tasks.spawn(async move {
                let result = build_file(&pair, &context).await;
                (pair.origin, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(FileOutcome::Skipped))) => report.skipped += 1,
                Ok((_, Ok(FileOutcome::Rendered(action, diagnostics)))) => {
                    report.rendered.push(action);
                    report.diagnostics.extend(diagnostics);
                }
                Ok((_, Ok(FileOutcome::Copied(action)))) => report.copied.push(action),
                Ok((path, Err(e))) => {
                    log::error!("Could not build file {}: {e}", self.display(&path));
                    report.failures.push(Failure {
                        path,
                        message: e.to_string(),
                    });
                }
                Err(e) => record(report, self.config.source.clone(), e.into()),
            }
        }
    }

    async fn write_routing_marker(&self) -> Result<bool> {
        let marker = self.config.routing_marker_path();
        if tokio::fs::try_exists(&marker)
            .await
            .map_err(|e| BuildError::io(&marker, e))?
        {
            return Ok(false);
        }

        tokio::fs::write(&marker, b"")
            .await
            .map_err(|e| BuildError::io(&marker, e))?;
        Ok(true)
    }

    fn display<'p>(&self, path: &'p Path) -> std::path::Display<'p> {
        path.strip_prefix(&self.config.source)
            .unwrap_or(path)
            .display()
    }
}

async fn build_file(pair: &PathPair, context: &RunContext) -> Result<FileOutcome> {
    let target = output_path(&pair.mirror);
    let Some(reason) = needs_build(&pair.origin, &target, context.clock, context.force).await? else {
        log::debug!("Up to date: {}", target.display());
        return Ok(FileOutcome::Skipped);
    };

    let relative = target
        .strip_prefix(&context.config.output)
        .unwrap_or(&target);
    log::info!("Building {} -- {reason}", relative.display());

    let kind = SourceKind::of(&pair.origin);
    if !kind.is_template() {
        let (source, output) = (pair.origin.clone(), target.clone());
        tokio::task::spawn_blocking(move || copy_atomic(&source, &output)).await??;
        return Ok(FileOutcome::Copied(action(target, reason)));
    }

    let text = tokio::fs::read_to_string(&pair.origin)
        .await
        .map_err(|e| BuildError::io(&pair.origin, e))?;
    let item = SourceItem::parse_lossy(&text, &pair.origin);
    let rendered = TemplateEngine::new(&context.store).render_page(&item, kind, &pair.origin);

    let output = target.clone();
    tokio::task::spawn_blocking(move || write_atomic(&output, rendered.text.as_bytes())).await??;

    Ok(FileOutcome::Rendered(action(target, reason), rendered.diagnostics))
}

fn record(report: &mut BuildReport, path: PathBuf, err: BuildError) {
    log::error!("{err}");
    report.failures.push(Failure {
        path,
        message: err.to_string(),
    });
}

fn action(path: PathBuf, reason: BuildReason) -> FileAction {
    FileAction { path, reason }
}

fn resolve(dir: &Path, missing: fn(PathBuf) -> BuildError) -> Result<PathBuf> {
    match dir.canonicalize() {
        Ok(path) if path.is_dir() => Ok(path),
        _ => Err(missing(dir.to_path_buf())),
    }
}
