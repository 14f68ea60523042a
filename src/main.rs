//! `sfc` command line entry point.
//!
//! - `compile` - compile component sources (files or directories) into the cache
//! - `clear-cache` - delete every cached artifact and both cache maps
//! - `runtime` - print the client-side script dispatch runtime

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sfc_compiler::{BatchReport, CompilerConfig, ComponentCompiler, FilterRegistry, SCOPE_RUNTIME};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sfc", version, about = "Single-file component compiler")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML compiler config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured cache directory.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Enable debug output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile component sources.
    Compile {
        /// Source files, or directories to scan.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Base directory component ids are derived from.
        #[arg(long)]
        base: Option<PathBuf>,

        /// Source extension picked up when scanning directories.
        #[arg(long, default_value = "vue")]
        ext: String,

        /// Reuse any existing cache entry regardless of modification times.
        #[arg(long)]
        ignore_cache_time: bool,

        /// Print the compiled components as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete all cached artifacts.
    ClearCache,
    /// Print the script dispatch runtime.
    Runtime,
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<CompilerConfig> {
    let mut config = match &cli.config {
        Some(path) => CompilerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CompilerConfig::default(),
    };
    if let Some(cache_dir) = &cli.cache_dir {
        config = config.with_cache_dir(cache_dir);
    }
    Ok(config)
}

fn merge(into: &mut BatchReport, from: BatchReport) {
    into.compiled.extend(from.compiled);
    into.skipped.extend(from.skipped);
    into.failures.extend(from.failures);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let mut config = load_config(&cli)?;

    match &cli.command {
        Command::Runtime => {
            print!("{}", SCOPE_RUNTIME);
        }
        Command::ClearCache => {
            let mut compiler = ComponentCompiler::from_config(&config, &FilterRegistry::builtin())?;
            compiler.clear_cache()?;
        }
        Command::Compile {
            paths,
            base,
            ext,
            ignore_cache_time,
            json,
        } => {
            config.ignore_cache_time |= *ignore_cache_time;
            let mut compiler = ComponentCompiler::from_config(&config, &FilterRegistry::builtin())?;

            let (dirs, files): (Vec<&PathBuf>, Vec<&PathBuf>) = paths.iter().partition(|p| p.is_dir());
            let mut report = compiler.compile_batch(&files, base.as_deref())?;
            for dir in dirs {
                merge(&mut report, compiler.compile_dir(dir, ext)?);
            }

            for diagnostic in report.diagnostics() {
                tracing::warn!("[{}] {}: {}", diagnostic.code, diagnostic.file.display(), diagnostic.message);
            }

            if *json {
                println!("{}", serde_json::to_string_pretty(&report.compiled)?);
            } else {
                for compiled in &report.compiled {
                    let state = if compiled.rebuilt { "compiled" } else { "cached" };
                    tracing::info!("{} {} ({} artifacts)", state, compiled.identity.id, compiled.artifacts.len());
                }
            }

            if !report.is_success() {
                for (path, err) in &report.failures {
                    tracing::error!("{}: {}", path.display(), err);
                }
                anyhow::bail!("{} component(s) failed to compile", report.failures.len());
            }
        }
    }

    Ok(())
}
