//! AX: adaptive extraction runner, entry point.

use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use ax_cli::commands::{self, Paths};
use ax_cli::targets::{collect_targets, TargetFlags};
use ax_engine::MemoryStore;

#[derive(Parser)]
#[command(
    name = "ax",
    about = "Adaptive extraction: pick api, dom or browser per URL and learn from every attempt",
    version
)]
struct Cli {
    /// Path to the memory file.
    #[arg(short, long, global = true)]
    memory: Option<String>,

    /// Append every attempt to this JSONL file.
    #[arg(long, global = true)]
    experience_log: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Shorthand for --log-level debug.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Machine-readable output on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Per-URL flags shared by `run` and `decide`.
#[derive(clap::Args, Clone, Copy)]
struct FlagArgs {
    /// The page is expected to contain a form.
    #[arg(long)]
    expect_form: bool,

    /// Favour the fastest method.
    #[arg(long)]
    prefer_speed: bool,

    /// Ask strategies to fill forms they find.
    #[arg(long)]
    fill_forms: bool,

    /// Derive the flags above from each URL's text.
    #[arg(long)]
    infer_flags: bool,
}

impl From<FlagArgs> for TargetFlags {
    fn from(args: FlagArgs) -> Self {
        TargetFlags {
            expect_form: args.expect_form,
            prefer_speed: args.prefer_speed,
            fill_forms: args.fill_forms,
            infer_flags: args.infer_flags,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract content from URLs, falling back between methods.
    Run {
        /// URLs to process.
        urls: Vec<String>,

        /// File with one URL per line, optionally followed by its true category.
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        flags: FlagArgs,

        /// Skip content summaries.
        #[arg(long)]
        no_summary: bool,

        /// Seconds before a single attempt is abandoned.
        #[arg(long, default_value_t = 30)]
        timeout: u64,

        /// Seconds for each HTTP request.
        #[arg(long, default_value_t = 15)]
        http_timeout: u64,
    },

    /// Show which method would be tried first for a URL.
    ///
    /// Nothing is fetched. When the URL's domain has no known category, the
    /// category guessed for it is saved to the memory file, as during a run.
    Decide {
        url: String,

        #[command(flatten)]
        flags: FlagArgs,
    },

    /// Summarize the memory file, or one category's method table.
    Stats {
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Validate the memory file.
    Validate,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   ax completions bash > ~/.local/share/bash-completion/completions/ax
    ///   ax completions zsh > ~/.zfunc/_ax
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let paths = Paths::resolve(cli.memory.as_deref(), cli.experience_log.as_deref());
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Run {
            urls,
            file,
            flags,
            no_summary,
            timeout,
            http_timeout,
        } => {
            let targets = collect_targets(&urls, file.as_deref(), flags.into())?;
            tracing::info!("Memory: {}", paths.memory.display());
            let options = commands::run::RunOptions {
                targets,
                summarize: !no_summary,
                strategy_timeout: Duration::from_secs(timeout),
                http_timeout: Duration::from_secs(http_timeout),
                json: cli.json,
            };
            commands::run::run(&paths, options, &mut stdout).await?;
        }

        Commands::Decide { url, flags } => {
            let config = TargetFlags::from(flags).config_for(&url);
            let memory = MemoryStore::open(&paths.memory);
            commands::decide::decide(memory, &url, &config, cli.json, &mut stdout).await?;
        }

        Commands::Stats { category } => {
            let memory = MemoryStore::open(&paths.memory);
            commands::stats::stats(&memory, category.as_deref(), cli.json, &mut stdout)?;
        }

        Commands::Validate => {
            if let Err(e) = commands::validate::validate(&paths.memory, &mut stdout) {
                eprintln!("Invalid memory file: {e}");
                std::process::exit(1);
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "ax", &mut stdout);
        }
    }

    Ok(())
}
