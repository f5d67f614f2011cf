// SPDX-License-Identifier: MIT
//
// jumpblock: semantic block navigation from the command line.
//
// This binary is the host side of the engine. It turns a file (or stdin),
// a language id and a selection into one jump request, and prints what
// the engine answers:
//
//   argv → clap → Cli ─┬─ down/up/out → Request → jb_engine::jump → JSON
//                      ├─ tree        → BlockTree outline
//                      └─ languages   → registry ids
//
// Languages come from the engine's built-in registry plus whatever the
// optional config file adds (see `config`). Rows and columns are 0-based,
// columns counted in `--unit` (UTF-16 code units by default).

mod config;
mod error;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use jb_engine::buffer::{Buffer, ColumnUnit};
use jb_engine::navigate::Direction;
use jb_engine::position::Position;
use jb_engine::profile::{Registry, language_for_extension};
use jb_engine::{Request, SelectionResult, tree};

use crate::config::{Associations, Config};
use crate::error::CliError;

/// Language used when nothing else identifies the input.
const FALLBACK_LANGUAGE: &str = "plaintext";

// ─── Arguments ──────────────────────────────────────────────────────────────

/// Jump between sibling and parent blocks of source code.
#[derive(Debug, Parser)]
#[command(name = "jumpblock", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the default one.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More logging on stderr (-v debug, -vv trace). `JUMPBLOCK_LOG` wins.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Select the next sibling block.
    Down(JumpArgs),
    /// Select the previous sibling block.
    Up(JumpArgs),
    /// Select the enclosing block.
    Out(JumpArgs),
    /// Print the block tree as an outline.
    Tree(SourceArgs),
    /// List every known language id.
    Languages,
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// File to read. Stdin when omitted or `-`.
    file: Option<PathBuf>,

    /// Language id. Inferred from the file name when omitted.
    #[arg(short, long, value_name = "ID")]
    language: Option<String>,
}

#[derive(Debug, Args)]
struct JumpArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// The moving end of the selection.
    #[arg(long, value_name = "ROW:COL", value_parser = parse_position)]
    cursor: Position,

    /// The fixed end of the selection. Defaults to the cursor.
    #[arg(long, value_name = "ROW:COL", value_parser = parse_position)]
    anchor: Option<Position>,

    /// What columns count.
    #[arg(long, default_value_t = ColumnUnit::Utf16)]
    unit: ColumnUnit,
}

/// Parse `ROW:COL`, both 0-based.
fn parse_position(s: &str) -> Result<Position, CliError> {
    let bad = || CliError::BadPosition(s.to_owned());
    let (row, col) = s.split_once(':').ok_or_else(bad)?;
    let row = row.trim().parse().map_err(|_| bad())?;
    let col = col.trim().parse().map_err(|_| bad())?;
    Ok(Position::new(row, col))
}

// ─── Input ──────────────────────────────────────────────────────────────────

fn read_source(source: &SourceArgs) -> Result<String, CliError> {
    match source.file.as_deref() {
        Some(path) if path != Path::new("-") => {
            fs::read_to_string(path).map_err(|e| CliError::Io {
                path: path.to_owned(),
                source: e,
            })
        }
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .map_err(CliError::Stdin)?;
            Ok(text)
        }
    }
}

/// `--language`, then config associations, then the file extension.
fn detect_language(source: &SourceArgs, associations: &Associations) -> String {
    if let Some(language) = &source.language {
        return language.clone();
    }
    let Some(path) = source.file.as_deref() else {
        return FALLBACK_LANGUAGE.to_owned();
    };
    let detected = associations.language_for(path).or_else(|| {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(language_for_extension)
    });
    detected.unwrap_or(FALLBACK_LANGUAGE).to_owned()
}

// ─── Commands ───────────────────────────────────────────────────────────────

fn jump(
    args: &JumpArgs,
    direction: Direction,
    registry: &Registry,
    associations: &Associations,
) -> Result<SelectionResult, CliError> {
    let text = read_source(&args.source)?;
    let language = detect_language(&args.source, associations);
    debug!(%language, %direction, cursor = ?args.cursor, "jump request");
    let request = Request {
        language_id: &language,
        text: &text,
        cursor: args.cursor,
        anchor: args.anchor.unwrap_or(args.cursor),
        direction,
        unit: args.unit,
    };
    Ok(jb_engine::jump(&request, registry))
}

fn outline(
    source: &SourceArgs,
    registry: &Registry,
    associations: &Associations,
) -> Result<String, CliError> {
    let text = read_source(source)?;
    let language = detect_language(source, associations);
    let buffer = Buffer::from_text(&text);
    Ok(tree::build(&buffer, registry.resolve(&language)).to_string())
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = Config::load_or_default(cli.config.as_deref())?;
    let registry = config.registry()?;
    let associations = config.associations()?;

    let (args, direction) = match cli.command {
        Command::Down(args) => (args, Direction::Down),
        Command::Up(args) => (args, Direction::Up),
        Command::Out(args) => (args, Direction::Out),
        Command::Tree(source) => {
            print!("{}", outline(&source, &registry, &associations)?);
            return Ok(());
        }
        Command::Languages => {
            for id in registry.ids() {
                let profile = registry.resolve(id);
                let strategy = profile.strategy.to_string();
                println!("{id:<20} {strategy:<10} {}", profile.name);
            }
            return Ok(());
        }
    };

    let result = jump(&args, direction, &registry, &associations)?;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env("JUMPBLOCK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

// ─── Entry point ────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("jumpblock: {e}");
        process::exit(1);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
