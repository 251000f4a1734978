use anyhow::Result;
use clap::{Arg, ArgMatches, Command, value_parser};
use mirra_core::{Pipeline, RebuildTrigger};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cmd::build::add_build_args;
use crate::config::MirraConfig;

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("watch"))
        .about("Build, then rebuild whenever the source tree changes")
        .arg(
            Arg::new("debounce")
                .short('d')
                .long("debounce")
                .value_name("MS")
                .help("Quiet period before a rebuild starts [default: 200]")
                .value_parser(value_parser!(u64)),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = MirraConfig::load(args)?;
    let debounce = Duration::from_millis(config.watch.debounce_ms);

    let pipeline = Pipeline::new(config.build)?;
    pipeline.run_build(false).await?;

    let source = pipeline.config().source.clone();
    let output = pipeline.build_root().to_path_buf();
    let (tx, rx) = mpsc::channel(256);

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for path in relevant_paths(event, &output) {
                // A full queue already guarantees a rebuild
                let _ = tx.try_send(path);
            }
        }
        Err(e) => log::error!("Watch error: {e}"),
    })?;
    watcher.watch(&source, RecursiveMode::Recursive)?;
    log::info!("Watching {} for changes...", source.display());

    let trigger = RebuildTrigger::new(debounce);
    let rebuilds = trigger.run(rx, |paths: Vec<PathBuf>| {
        let pipeline = &pipeline;
        async move {
            for path in &paths {
                log::debug!("Changed: {}", path.display());
            }
            if let Err(e) = pipeline.run_build(false).await {
                log::error!("Rebuild failed: {e}");
            }
        }
    });

    tokio::select! {
        _ = rebuilds => {}
        _ = tokio::signal::ctrl_c() => log::info!("Stopping watch"),
    }

    drop(watcher);
    Ok(())
}

/// Paths of an event worth rebuilding for. Access events and anything
/// inside the output tree are ignored.
fn relevant_paths(event: Event, output: &Path) -> Vec<PathBuf> {
    if matches!(event.kind, EventKind::Access(_)) {
        return Vec::new();
    }
    event
        .paths
        .into_iter()
        .filter(|path| !path.starts_with(output))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    #[test]
    fn test_output_changes_are_ignored() {
        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/site/docs/index.html"))
            .add_path(PathBuf::from("/site/src/index.html"));

        let paths = relevant_paths(event, Path::new("/site/docs"));
        assert_eq!(paths, vec![PathBuf::from("/site/src/index.html")]);
    }

    #[test]
    fn test_access_events_are_ignored() {
        let event = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/site/src/index.html"));
        assert!(relevant_paths(event, Path::new("/site/docs")).is_empty());

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/site/src/new.md"));
        assert_eq!(relevant_paths(event, Path::new("/site/docs")).len(), 1);
    }
}
