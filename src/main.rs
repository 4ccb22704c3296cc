//! tailscope — live terminal viewer for Claude Code stream-json logs
//!
//! Tails one `.jsonl` log (given on the command line or discovered from the
//! current directory) and renders each event as it is written.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tailscope::ui::theme::ThemeStyle;
use tailscope::{config, discover, ui};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "tailscope", about = "Live viewer for Claude Code stream-json logs")]
struct Cli {
    /// Log file to tail (default: newest session log for this directory)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Log file to tail
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    file_flag: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Where to write diagnostics (default: platform cache dir)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Write silence (ms) after which a session is considered over
    #[arg(long, value_name = "MS")]
    idle_timeout_ms: Option<u64>,

    /// Color theme
    #[arg(long, value_parser = ["dark", "light"])]
    theme: Option<String>,
}

impl Cli {
    /// `--file` wins over the positional argument.
    fn target(&self) -> Option<PathBuf> {
        self.file_flag.clone().or_else(|| self.file.clone())
    }
}

fn init_tracing(verbose: u8, log_path: &Path) -> Result<()> {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env("TAILSCOPE_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    // The terminal belongs to the UI, so diagnostics go to a file.
    if let Some(dir) = log_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open {}", log_path.display()))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let Some(path) = cli.target().or_else(discover::find_log) else {
        bail!("no log file given and no .jsonl found\n\nUsage: tailscope [FILE]");
    };

    let mut config = config::load_config();
    if let Some(ms) = cli.idle_timeout_ms {
        config.idle_timeout_ms = ms;
    }
    if let Some(theme) = cli.theme {
        config.theme = theme;
    }
    info!(path = %path.display(), theme = %config.theme, "starting");

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(ui::run(
        &path,
        config.tail_config(),
        ThemeStyle::from_config_str(&config.theme),
    ))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(config::default_log_path);
    if let Err(e) = init_tracing(cli.verbose, &log_path) {
        eprintln!("tailscope: logging disabled: {e:#}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("tailscope: {e:#}");
            ExitCode::FAILURE
        }
    }
}
