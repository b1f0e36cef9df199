//! oxide-ddl CLI
//!
//! Command-line tool that prints the DDL for table definitions and table
//! diffs read from JSON documents.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_ddl::prelude::*;

/// Table definition and table diff to DDL compiler.
#[derive(Parser)]
#[command(name = "oxide-ddl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML dialect profile, overlaid on the SQLite defaults.
    #[arg(short, long, env = "OXIDE_DDL_PROFILE")]
    profile: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print CREATE TABLE and CREATE INDEX statements for a JSON table.
    CreateTable {
        /// JSON table definition.
        file: PathBuf,
    },

    /// Print the statements that apply a JSON table diff.
    AlterTable {
        /// JSON table diff.
        file: PathBuf,

        /// Print the statements that undo the diff instead.
        #[arg(short, long)]
        reverse: bool,
    },

    /// Print identifiers as the dialect quotes them.
    Quote {
        /// Identifiers to quote.
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Print the type declaration of a logical type.
    MapType {
        /// Logical type name, e.g. `string` or `bigint`.
        logical_type: String,

        /// Maximum length.
        #[arg(long)]
        length: Option<u32>,

        /// Total digits.
        #[arg(long)]
        precision: Option<u32>,

        /// Fractional digits.
        #[arg(long)]
        scale: Option<u32>,

        /// Unsigned integer.
        #[arg(long)]
        unsigned: bool,

        /// Fixed-width string.
        #[arg(long)]
        fixed: bool,

        /// Auto-incrementing integer.
        #[arg(long)]
        autoincrement: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let platform = Platform::new(load_profile(cli.profile.as_deref())?);

    match cli.command {
        Commands::CreateTable { file } => {
            let table: Table = read_json(&file)?;
            print_statements(&platform.render_create_table(&table)?);
        }

        Commands::AlterTable { file, reverse } => {
            let mut diff: TableDiff = read_json(&file)?;
            if reverse {
                diff = platform.reverse_diff(&diff)?;
            }
            print_statements(&platform.compile_diff(&diff)?);
        }

        Commands::Quote { names } => {
            for name in &names {
                println!("{}", platform.quote_identifier(name));
            }
        }

        Commands::MapType {
            logical_type,
            length,
            precision,
            scale,
            unsigned,
            fixed,
            autoincrement,
        } => {
            let options = TypeOptions {
                length,
                precision,
                scale,
                unsigned,
                fixed,
                autoincrement,
                primary: autoincrement,
            };
            println!("{}", platform.map_type(logical_type.parse()?, &options)?);
        }
    }

    Ok(())
}

fn load_profile(path: Option<&Path>) -> anyhow::Result<PlatformProfile> {
    let Some(path) = path else {
        return Ok(PlatformProfile::sqlite());
    };
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading profile {}", path.display()))?;
    let profile = PlatformProfile::from_toml_str(&source)
        .with_context(|| format!("parsing profile {}", path.display()))?;
    debug!(profile = %profile.name, path = %path.display(), "Loaded dialect profile");
    Ok(profile)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let source =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("parsing {}", path.display()))
}

fn print_statements(statements: &[String]) {
    for statement in statements {
        println!("{statement};");
    }
}
