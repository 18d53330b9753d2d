use clap::{ArgAction, Parser, Subcommand};
use commands::{config, download};
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "cloudgrab")]
#[command(about = "CloudGrab - Download your latest exported video from the cloud editor")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Also write logs to the daily rotating log file
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the most recent exported video
    #[command(long_about = "Open the exported videos collection with a saved login session, open the newest video and save it to the download directory. The file is named after the video title.")]
    Download {
        /// Collection URL (overrides the configured one)
        #[arg(long)]
        url: Option<String>,

        /// Directory to save the video into
        #[arg(long, value_name = "DIR")]
        download_dir: Option<PathBuf>,

        /// Run the browser without a window
        #[arg(long, action = ArgAction::SetTrue)]
        headless: bool,

        /// Session state JSON with the login cookies
        #[arg(long, value_name = "FILE")]
        session_file: Option<PathBuf>,

        /// Keep the browser open for this many seconds after finishing
        #[arg(long, value_name = "SECS")]
        keep_open: Option<u64>,
    },
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing configuration file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },

    /// Print the configuration file location
    Path,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let log_file = cli
        .log_file
        .then(|| cloudgrab_config::PathManager::default().log_file());
    logging::init_logging_with_file(cli.verbose, cli.quiet, log_file)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Download {
            url,
            download_dir,
            headless,
            session_file,
            keep_open,
        } => {
            let args = download::DownloadArgs {
                url,
                download_dir,
                headless,
                session_file,
                keep_open,
            };
            download::run_download(args, &output).await
        }
        Commands::Config { cmd } => config::run_config(cmd, &output),
    }
}
