//! HandGuide CLI: run guidance studies and manage their setup.
//!
//! Usage:
//!   handguide run [OPTIONS]              Run a study over a landmark replay
//!   handguide validate <FILE>            Validate a task file
//!   handguide link --tasks <FILE>        Print a study deep link
//!   handguide calibrate display|world    Calibrate display or world PPI
//!   handguide config show|reset|path     Inspect or reset the configuration
//!   handguide serial list|monitor        List ports or watch the wearable
//!   handguide check                      Check configuration and devices

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use handguide_common::{ConfigStore, LoggingConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "handguide",
    about = "Hand-guidance study runner with haptic feedback",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a study over a recorded landmark stream
    Run(RunArgs),

    /// Validate a task file
    Validate {
        /// Path to the task JSON file
        path: PathBuf,
    },

    /// Print a study deep link for a task file
    Link {
        /// Path to the task JSON file
        #[arg(short, long)]
        tasks: PathBuf,

        /// Participant id embedded in the link
        #[arg(short, long)]
        participant: Option<String>,
    },

    /// Calibrate the display or the camera world scale
    Calibrate {
        #[command(subcommand)]
        target: CalibrateTarget,
    },

    /// Inspect or reset the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Serial port utilities
    Serial {
        #[command(subcommand)]
        action: SerialAction,
    },

    /// Check configuration and devices
    Check,
}

#[derive(Args)]
pub struct RunArgs {
    /// Task JSON file
    #[arg(short, long, conflicts_with = "link", required_unless_present = "link")]
    pub tasks: Option<PathBuf>,

    /// Study deep link (`#/study?participantId=..&data=..`)
    #[arg(long)]
    pub link: Option<String>,

    /// Participant id (overrides the link)
    #[arg(short, long)]
    pub participant: Option<String>,

    /// JSONL landmark recording to replay
    #[arg(short, long)]
    pub replay: PathBuf,

    /// Serial port of the wearable
    #[arg(long)]
    pub port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    pub baud: Option<u32>,

    /// Detection frame rate
    #[arg(long, default_value = "60")]
    pub fps: u32,

    /// Directory for the export bundle
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not ring the terminal bell on milestones
    #[arg(long)]
    pub no_bell: bool,
}

#[derive(Subcommand)]
enum CalibrateTarget {
    /// Adjust the display PPI against a physical reference
    Display {
        /// Reference object: ruler|credit|dollar
        #[arg(long)]
        tool: Option<String>,
    },

    /// Measure the world PPI from a dual-pinch recording
    World {
        /// JSONL landmark recording with both hands pinching
        #[arg(short, long)]
        replay: PathBuf,

        /// Frame rate of the recording
        #[arg(long, default_value = "30")]
        fps: u32,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Restore defaults
    Reset,
    /// Print the config file location
    Path,
}

#[derive(Subcommand)]
enum SerialAction {
    /// List serial ports
    List,
    /// Print lines and IMU readings from a port
    Monitor {
        /// Serial port path
        #[arg(short, long)]
        port: String,

        /// Baud rate
        #[arg(long)]
        baud: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let store = match &cli.config {
        Some(path) => ConfigStore::open(path),
        None => ConfigStore::open_default(),
    };

    // Initialize logging
    let logging = store.snapshot().logging;
    handguide_common::logging::init_logging(&LoggingConfig {
        level: if cli.verbose {
            "debug".to_string()
        } else {
            logging.level
        },
        json: logging.json,
    });

    match cli.command {
        Commands::Run(args) => commands::run::run(&store, args).await,
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Link { tasks, participant } => commands::link::run(tasks, participant),
        Commands::Calibrate { target } => match target {
            CalibrateTarget::Display { tool } => commands::calibrate::display(&store, tool),
            CalibrateTarget::World { replay, fps } => {
                commands::calibrate::world(&store, replay, fps).await
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&store),
            ConfigAction::Reset => commands::config::reset(&store),
            ConfigAction::Path => commands::config::path(&store),
        },
        Commands::Serial { action } => match action {
            SerialAction::List => commands::serial::list(),
            SerialAction::Monitor { port, baud } => {
                commands::serial::monitor(&store, port, baud).await
            }
        },
        Commands::Check => commands::check::run(&store),
    }
}
