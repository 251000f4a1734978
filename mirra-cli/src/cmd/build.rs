use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use mirra_core::Pipeline;

use crate::config::MirraConfig;

pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .value_name("DIR")
                .help("Source tree to mirror [default: ./src]"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output tree [default: ./docs]"),
        )
        .arg(
            Arg::new("layouts")
                .long("layouts")
                .value_name("DIR")
                .help("Layouts directory [default: <source>/layouts]"),
        )
        .arg(
            Arg::new("components")
                .long("components")
                .value_name("DIR")
                .help("Components directory [default: <source>/components]"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file [default: ./mirra.toml]"),
        )
}

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build"))
        .about("Mirror the source tree into the output tree once")
        .arg(
            Arg::new("force")
                .short('f')
                .long("force")
                .help("Rebuild every file regardless of timestamps")
                .action(ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = MirraConfig::load(args)?;
    let force = config.build.force;

    let pipeline = Pipeline::new(config.build)?;
    let report = pipeline.run_build(force).await?;

    if !report.is_clean() {
        log::warn!(
            "Finished with {} failure(s) and {} template diagnostic(s)",
            report.failures.len(),
            report.diagnostics.len()
        );
    }
    log::info!("Site built in {}", pipeline.build_root().display());

    Ok(())
}
