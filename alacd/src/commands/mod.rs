mod inspect;
mod rip;

pub use inspect::Inspect;
pub use rip::Rip;

use clap::{ColorChoice, Parser, Subcommand};
use log::LevelFilter;

/// Download encrypted ALAC streams and rebuild them as tagged m4a files.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// When to output colored text.
    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Print debug logs, including request retries and key switches.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else if self.quiet {
            LevelFilter::Warn
        } else {
            LevelFilter::Info
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Inspect(Inspect),
    Rip(Rip),
}
