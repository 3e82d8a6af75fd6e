mod cli;
mod commands;

use std::io::Write;

use cli::{Cli, Commands};
use commands::{community, fuse};

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    match &cli.command {
        Commands::Fuse(args) => fuse::run(&cli, args),
        Commands::Community(args) => community::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
