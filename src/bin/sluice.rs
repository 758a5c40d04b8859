//! Sluice CLI - Serialize a codebase into one self-describing snapshot file.

use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use serde::Serialize;
use sluice::builder::Snapshot;
use sluice::config::Config;
use sluice::errors::{exit_code, SluiceError};
use sluice::report::{ConsoleReporter, Verbosity};
use sluice::tokens::Encoding;
use sluice::walker::read_manifest;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Serialize a codebase into one self-describing snapshot file")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a snapshot artifact for a project
    Extract(ExtractArgs),

    /// Print the effective configuration
    Config {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        overrides: ConfigArgs,

        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
struct ExtractArgs {
    /// Project root
    #[arg(default_value = ".")]
    path: PathBuf,

    #[command(flatten)]
    overrides: ConfigArgs,

    /// Fixed generation time (RFC 3339) for reproducible artifacts
    #[arg(long, value_parser = parse_timestamp)]
    timestamp: Option<DateTime<Utc>>,

    /// Print the summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Also list filtered-out candidates
    #[arg(short, long)]
    verbose: bool,

    /// Print the summary only
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Settings layered over the project config file.
#[derive(Args)]
struct ConfigArgs {
    /// Config file to use instead of .sluice.toml / .sluice.json under the root
    #[arg(long)]
    config: Option<PathBuf>,

    /// Artifact path (relative to the current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Additional deny-list substring
    #[arg(long)]
    deny: Vec<String>,

    /// Drop the configured deny-list before adding --deny entries
    #[arg(long)]
    no_default_deny: bool,

    /// Extension allow-list, replacing the configured one
    #[arg(long, value_delimiter = ',')]
    ext: Vec<String>,

    /// Skip files larger than this many bytes
    #[arg(long)]
    max_size: Option<u64>,

    /// Top-level directory that must exist under the root
    #[arg(long)]
    require: Vec<String>,

    /// Pinned manifest file, one path per line (switches to pinned mode)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Pinned path, in order (switches to pinned mode)
    #[arg(long)]
    pin: Vec<String>,

    /// Add a project-structure tree to the header
    #[arg(long)]
    tree: bool,

    /// Skip token counting
    #[arg(long)]
    no_tokens: bool,

    /// Token encoding
    #[arg(long)]
    encoding: Option<EncodingArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum EncodingArg {
    Cl100k,
    O200k,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Cl100k => Encoding::Cl100kBase,
            EncodingArg::O200k => Encoding::O200kBase,
        }
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp: {e}"))
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let json_output = json_flag(&cli.command);

    let result = match cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::Config {
            path,
            overrides,
            json,
        } => run_config(&path, &overrides, json),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "sluice", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        if json_output {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
                exit_code: i32,
            }

            let payload = ErrorOutput {
                error: e.to_string(),
                exit_code: exit_code(&e),
            };

            let json = serde_json::to_string(&payload)
                .unwrap_or_else(|_| "{\"error\":\"serialization failed\"}".to_string());
            eprintln!("{json}");
        } else {
            eprintln!("error: {}", e);
        }
        std::process::exit(exit_code(&e));
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SLUICE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn json_flag(cmd: &Commands) -> bool {
    match cmd {
        Commands::Extract(args) => args.json,
        Commands::Config { json, .. } => *json,
        Commands::Completions { .. } => false,
    }
}

/// Project config with command-line overrides applied.
fn effective_config(root: &Path, args: &ConfigArgs) -> Result<Config, SluiceError> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load(root)?,
    };

    if args.no_default_deny {
        config.deny.clear();
    }
    config.deny.extend(args.deny.iter().cloned());
    if !args.ext.is_empty() {
        config.extensions = args.ext.clone();
    }
    if let Some(max) = args.max_size {
        config.max_file_size = max;
    }
    config.require.extend(args.require.iter().cloned());
    if let Some(manifest) = &args.manifest {
        config.pinned = Some(read_manifest(manifest)?);
    }
    if !args.pin.is_empty() {
        config
            .pinned
            .get_or_insert_with(Vec::new)
            .extend(args.pin.iter().cloned());
    }
    if args.tree {
        config.tree = true;
    }
    if args.no_tokens {
        config.count_tokens = false;
    }
    if let Some(encoding) = args.encoding {
        config.encoding = encoding.into();
    }
    if let Some(output) = &args.output {
        let output = if output.is_absolute() {
            output.clone()
        } else {
            env::current_dir()?.join(output)
        };
        config.output = Some(output);
    }

    debug!(pinned = config.is_pinned(), "effective configuration resolved");
    Ok(config)
}

// --- Extract command ---

fn run_extract(args: ExtractArgs) -> Result<(), SluiceError> {
    let config = effective_config(&args.path, &args.overrides)?;

    let mut snapshot = Snapshot::from_config(&args.path, &config);
    if let Some(timestamp) = args.timestamp {
        snapshot = snapshot.generated_at(timestamp);
    }

    let verbosity = if args.quiet {
        Verbosity::Quiet
    } else if args.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    };
    let mut reporter = ConsoleReporter::stderr(verbosity);
    let report = snapshot.run(&mut reporter)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| SluiceError::Io(std::io::Error::other(e.to_string())))?;
        println!("{json}");
    }
    Ok(())
}

// --- Config command ---

fn run_config(root: &Path, overrides: &ConfigArgs, json: bool) -> Result<(), SluiceError> {
    let config = effective_config(root, overrides)?;
    let rendered = if json {
        config.to_json()?
    } else {
        config.to_toml()?
    };
    print!("{rendered}");
    if !rendered.ends_with('\n') {
        println!();
    }
    Ok(())
}
