pub mod settings;

#[cfg(feature = "cli")]
use chrono::NaiveDate;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::path::PathBuf;

pub use settings::Settings;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "court-booker")]
#[command(about = "Books a condo tennis court the moment the booking window opens")]
pub struct CliArgs {
    #[arg(long, short, default_value = settings::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Run one booking now instead of waiting for the daily trigger")]
    pub once: bool,

    #[arg(long, requires = "once", help = "Target date for --once (YYYY-MM-DD)")]
    pub date: Option<NaiveDate>,

    #[arg(long, help = "Print the resolved configuration and next trigger, then exit")]
    pub dry_run: bool,
}
