//! DevPulse CLI - developer-activity analytics from the command line.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "devpulse")]
#[command(about = "Track coding sessions and report on AI-assisted development", long_about = None)]
#[command(version)]
struct Cli {
    /// Data directory (default: $DEVPULSE_DATA_DIR or ~/.devpulse)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Working tree to inspect (overrides the configured path)
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config.toml to the data directory
    Init,
    /// Coding session lifecycle
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Usage report over a date range
    Report {
        /// Date range (today, week, month, all)
        #[arg(long, default_value = "week")]
        range: String,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Include commit patterns from the repository log
        #[arg(long)]
        commits: bool,
    },
    /// Record usage events directly
    Usage {
        #[command(subcommand)]
        command: UsageCommands,
    },
    /// Inspect the working tree
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },
    /// Event store maintenance
    Store {
        #[command(subcommand)]
        command: StoreCommands,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Start a session and capture the working-tree baseline
    Start {
        /// Session identifier
        id: String,
        /// User name
        #[arg(short, long)]
        user: String,
        /// Tool in use (cursor, copilot, claude, ...)
        #[arg(short, long)]
        tool: String,
    },
    /// Analyze the current diff of one or more files
    Track {
        /// Session identifier
        id: String,
        /// Paths relative to the repository root
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// End a session and print its report
    End {
        /// Session identifier
        id: String,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show one session
    Status {
        /// Session identifier
        id: String,
    },
    /// List all sessions
    List,
}

#[derive(Subcommand)]
enum UsageCommands {
    /// Append a usage event
    Log {
        /// Tool in use
        #[arg(short, long)]
        tool: String,
        /// User name
        #[arg(short, long)]
        user: String,
        /// Feedback (excellent, good, average, poor)
        #[arg(long)]
        feedback: Option<String>,
        /// Free-form context
        #[arg(long)]
        context: Option<String>,
        /// Lines generated
        #[arg(long, default_value = "0")]
        lines: u64,
        /// Files modified
        #[arg(long, default_value = "0")]
        files: u64,
        /// Minutes spent
        #[arg(long, default_value = "0", value_parser = commands::usage::parse_minutes)]
        minutes: f64,
    },
}

#[derive(Subcommand)]
enum RepoCommands {
    /// Working-tree status
    Status,
    /// Commits from the last N days, classified
    Commits {
        /// Number of days to look back
        #[arg(long, default_value = "7")]
        days: i64,
    },
    /// Remote, branch and last commit
    Info,
}

#[derive(Subcommand)]
enum StoreCommands {
    /// Export the whole store as JSON
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Recompute aggregates from stored events
    Rebuild,
}

fn main() -> Result<()> {
    // Respects RUST_LOG (e.g. RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = commands::GlobalArgs {
        data_dir: cli.data_dir,
        repo: cli.repo,
    };

    match cli.command {
        Commands::Init => commands::init::run(&global),
        Commands::Session { command } => match command {
            SessionCommands::Start { id, user, tool } => {
                commands::session::start(&global, &id, &user, &tool)
            }
            SessionCommands::Track { id, paths } => commands::session::track(&global, &id, &paths),
            SessionCommands::End { id, format } => commands::session::end(&global, &id, &format),
            SessionCommands::Status { id } => commands::session::status(&global, &id),
            SessionCommands::List => commands::session::list(&global),
        },
        Commands::Report {
            range,
            format,
            commits,
        } => commands::report::run(&global, &range, &format, commits),
        Commands::Usage { command } => match command {
            UsageCommands::Log {
                tool,
                user,
                feedback,
                context,
                lines,
                files,
                minutes,
            } => commands::usage::log(
                &global,
                commands::usage::LogArgs {
                    tool,
                    user,
                    feedback,
                    context,
                    lines,
                    files,
                    minutes,
                },
            ),
        },
        Commands::Repo { command } => match command {
            RepoCommands::Status => commands::repo::status(&global),
            RepoCommands::Commits { days } => commands::repo::commits(&global, days),
            RepoCommands::Info => commands::repo::info(&global),
        },
        Commands::Store { command } => match command {
            StoreCommands::Export { output } => commands::store::export(&global, output.as_deref()),
            StoreCommands::Rebuild => commands::store::rebuild(&global),
        },
    }
}
