pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use qbeat_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "qbeat",
    about = "QBeat voice ordering operator CLI",
    long_about = "Inspect the menu, test phrase resolution, replay scripted calls, and inspect config.",
    after_help = "Examples:\n  qbeat menu --section kids\n  qbeat resolve crescant\n  qbeat simulate --script call.jsonl\n  qbeat config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Explicit config file (defaults to qbeat.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "List catalog items as JSON, optionally for one section")]
    Menu {
        #[arg(long, help = "breakfast, kids, or lunch")]
        section: Option<String>,
    },
    #[command(about = "Show which catalog item a spoken phrase resolves to, and by which rule")]
    Resolve { phrase: String },
    #[command(about = "Replay a JSON-lines script of tool calls and events through one session")]
    Simulate {
        #[arg(long, help = "Path to the JSON-lines script")]
        script: PathBuf,
        #[arg(long, help = "Wait for the post-order teardown instead of cancelling it")]
        wait_teardown: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config.clone(), ..LoadOptions::default() };
    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Menu { section } => commands::menu::run(options, section.as_deref()),
        Command::Resolve { phrase } => commands::resolve::run(options, &phrase),
        Command::Simulate { script, wait_teardown } => {
            commands::simulate::run(options, &script, wait_teardown)
        }
        Command::Config => commands::config::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so command output on stdout stays machine readable.
fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}
