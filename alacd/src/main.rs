use alacd::{Args, Commands, logger::Logger};
use clap::{ColorChoice, Parser};
use kdam::{term, term::Colorizer};
use std::{
    io::{IsTerminal, stderr},
    process,
};

fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let colors = match args.color {
        ColorChoice::Always => true,
        ColorChoice::Auto => stderr().is_terminal(),
        ColorChoice::Never => false,
    };

    term::init(colors);
    colored::control::set_override(colors);
    Logger::init(args.log_level())?;

    match args.command {
        Commands::Inspect(args) => args.execute()?,
        Commands::Rip(args) => args.execute()?,
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".colorize("bold red"), e);
        process::exit(1);
    }
}
