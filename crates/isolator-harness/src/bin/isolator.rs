//! CLI entrypoint for isolator artifact tooling.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use isolator::IsolatorConfig;
use isolator_harness::{InventorySource, fingerprint, generate, inspect_function, warm};

/// Proxy-class generation and cache tooling.
#[derive(Debug, Parser)]
#[command(name = "isolator")]
#[command(about = "Generate, inspect and pre-warm isolator proxy classes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print or write the synthesized proxy class.
    Generate {
        /// Fully qualified class name (defaults to ISOLATOR_CLASS or `Isolator\Isolator`).
        #[arg(long)]
        class: Option<String>,
        /// JSON signature inventory; the builtin table is used when omitted.
        #[arg(long)]
        inventory: Option<PathBuf>,
        /// Comma-separated subset of functions to cover.
        #[arg(long, value_delimiter = ',')]
        functions: Option<Vec<String>>,
        /// Output path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print a function's arity profile and classification as JSON.
    Inspect {
        function: String,
        #[arg(long)]
        inventory: Option<PathBuf>,
    },
    /// Print the artifact fingerprint for the builtin inventory.
    Fingerprint {
        #[arg(long)]
        class: Option<String>,
    },
    /// Generate the artifact if missing and report whether it was reused.
    Warm {
        /// Storage root (defaults to ISOLATOR_CACHE_DIR or `<temp>/isolator`).
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        #[arg(long)]
        class: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = IsolatorConfig::from_env();

    match cli.command {
        Command::Generate {
            class,
            inventory,
            functions,
            output,
        } => {
            if let Some(class) = class {
                config.class_name = class;
            }
            let source = InventorySource::load(inventory.as_deref(), &config)?;
            let report = generate(&source, &config.class_name, functions.as_deref(), &config);
            for skipped in &report.skipped {
                eprintln!("Skipped {}: {}", skipped.name, skipped.reason);
            }
            match output {
                Some(path) => {
                    std::fs::write(&path, &report.source)?;
                    eprintln!(
                        "Wrote {} ({} overrides)",
                        path.display(),
                        report.overridden.len()
                    );
                }
                None => print!("{}", report.source),
            }
        }
        Command::Inspect {
            function,
            inventory,
        } => {
            let source = InventorySource::load(inventory.as_deref(), &config)?;
            let report = inspect_function(&source, &function, &config)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Fingerprint { class } => {
            if let Some(class) = class {
                config.class_name = class;
            }
            println!("{}", fingerprint(&config));
        }
        Command::Warm { cache_dir, class } => {
            if let Some(dir) = cache_dir {
                config.storage_root = dir;
            }
            if let Some(class) = class {
                config.class_name = class;
            }
            let report = warm(&config)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
