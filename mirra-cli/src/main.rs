mod cmd;
mod config;

use clap::{Arg, Command};

fn cli() -> Command {
    Command::new("mirra")
        .about("Mirror a source tree into a static site")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level filter, overridden by RUST_LOG")
                .default_value("info")
                .global(true),
        )
        .subcommand(cmd::build::make_subcommand())
        .subcommand(cmd::watch::make_subcommand())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    match matches.subcommand() {
        Some(("build", args)) => cmd::build::execute(args).await,
        Some(("watch", args)) => cmd::watch::execute(args).await,
        _ => unreachable!("subcommand_required"),
    }
}
