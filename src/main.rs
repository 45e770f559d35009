//! juris CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use jurisprudencia::{
    commands::{
        cmd_batch, cmd_capture, cmd_clear, cmd_export, cmd_import, cmd_init, cmd_list,
        cmd_process, cmd_status, cmd_watch, open_session, open_store, print_batch_report,
        print_outcome, print_records, print_status, InitOptions,
    },
    config::Config,
    error::Result,
    progress::LogWriterFactory,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "juris")]
#[command(version, about = "Capture and structure Portuguese court decisions", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the configuration and storage
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,

        /// Directory for direct storage (virtual database otherwise)
        #[arg(long)]
        directory: Option<PathBuf>,
    },

    /// Capture one decision: a portal URL or pasted text
    Capture {
        /// Read the candidate from a file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Capture every URL listed in a file, one per line
    Batch {
        /// File with one candidate per line
        file: PathBuf,
    },

    /// Watch a file standing in for the clipboard
    Watch {
        /// File to poll
        file: PathBuf,

        /// Poll interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval: u64,
    },

    /// Extract raw captures left pending
    Process,

    /// List stored decisions
    List,

    /// Export every decision to one JSON file
    Export {
        /// Output file or directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import decisions from a JSON file
    Import {
        /// File with one record or an array of records
        file: PathBuf,
    },

    /// Delete every stored decision
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show storage status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory))
        .with(filter)
        .init();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "juris", &mut std::io::stdout());
        return Ok(());
    }

    if let Commands::Init { force, directory } = &cli.command {
        return handle_init(cli.config.as_deref(), *force, directory.clone(), cli.json).await;
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Capture { file } => {
            let text = match file {
                Some(path) => tokio::fs::read_to_string(&path).await?,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };

            let ingestor = open_session(&config).await?;
            let outcome = cmd_capture(&ingestor, &text).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }

        Commands::Batch { file } => {
            let ingestor = open_session(&config).await?;
            let report = cmd_batch(&ingestor, &file).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_batch_report(&report);
            }
        }

        Commands::Watch { file, interval } => {
            let ingestor = open_session(&config).await?;
            let report =
                cmd_watch(&ingestor, &file, Duration::from_millis(interval.max(100))).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_batch_report(&report);
            }
        }

        Commands::Process => {
            let ingestor = open_session(&config).await?;
            let report = cmd_process(&ingestor).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_batch_report(&report);
            }
        }

        Commands::List => {
            let store = open_store(&config).await?;
            let records = cmd_list(&store).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_records(&records);
            }
        }

        Commands::Export { out } => {
            let store = open_store(&config).await?;
            let (path, count) = cmd_export(&store, out.as_deref()).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "path": path.display().to_string(), "records": count })
                );
            } else {
                println!("✓ Exported {} decisions to {}", count, path.display());
            }
        }

        Commands::Import { file } => {
            let store = open_store(&config).await?;
            let stats = cmd_import(&store, &file).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("✓ Imported {} decisions", stats.imported);
                if stats.skipped > 0 {
                    println!("  Skipped {} malformed entries", stats.skipped);
                }
            }
        }

        Commands::Clear { yes } => {
            if !yes {
                eprintln!("⚠️  This will delete ALL stored decisions!");
                eprintln!("Run with --yes to confirm.");
                std::process::exit(1);
            }
            let store = open_store(&config).await?;
            let removed = cmd_clear(&store).await?;
            if cli.json {
                println!(r#"{{"status": "ok", "removed": {}}}"#, removed);
            } else {
                println!("✓ Removed {} decisions", removed);
            }
        }

        Commands::Status => {
            let store = open_store(&config).await?;
            let status = cmd_status(&config, &store).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

async fn handle_init(
    config: Option<&Path>,
    force: bool,
    directory: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let (base_dir, config_path) = Config::resolve_location(config);

    let config = cmd_init(InitOptions {
        base_dir,
        config_path,
        force,
        directory,
    })
    .await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "status": "ok",
                "config": config.paths.config_file.display().to_string(),
            })
        );
    } else {
        println!("✓ jurisprudencia initialized successfully");
        println!("  Config: {}", config.paths.config_file.display());
        println!("\nNext steps:");
        println!("  1. Edit the config file to grant a storage directory or tune heuristics");
        println!("  2. Capture a decision: juris capture < acordao.txt");
        println!("  3. Capture a URL list: juris batch urls.txt");
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let (_, config_path) = Config::resolve_location(path);

    if !config_path.exists() {
        eprintln!(
            "Config file not found: {}\nRun 'juris init' first.",
            config_path.display()
        );
        std::process::exit(1);
    }

    Config::load(&config_path)
}
