//! Veles CLI - Command-line tool for inspecting Havok tagfile assets.
//!
//! This is the main entry point for the Veles command-line application.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use veles::prelude::*;
use veles::tagfile::Chunk as TagChunk;

/// Veles - Havok tagfile inspection tool
#[derive(Parser)]
#[command(name = "veles")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the chunk tree and SDK version of a tagfile
    Info {
        /// Input tagfile
        input: PathBuf,
    },

    /// List the types declared in a tagfile's schema
    Types {
        /// Input tagfile
        input: PathBuf,

        /// Show field layouts per type
        #[arg(short, long)]
        fields: bool,
    },

    /// Dump the decoded object graph as JSON
    Dump {
        /// Input tagfile
        input: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Dump one item slot instead of the roots
        #[arg(long)]
        slot: Option<u32>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => cmd_info(&input)?,
        Commands::Types { input, fields } => cmd_types(&input, fields)?,
        Commands::Dump {
            input,
            output,
            slot,
        } => cmd_dump(&input, output.as_deref(), slot)?,
    }

    Ok(())
}

fn open(path: &PathBuf) -> Result<TagFile> {
    let start = Instant::now();
    let file = TagFile::open(path)
        .with_context(|| format!("Failed to decode tagfile: {}", path.display()))?;
    eprintln!("Decoded {} in {:?}", path.display(), start.elapsed());
    Ok(file)
}

fn cmd_info(input: &PathBuf) -> Result<()> {
    let file = open(input)?;

    println!(
        "SDK version: {}",
        file.sdk_version().unwrap_or("(no SDKV chunk)")
    );
    println!("Types: {}", file.registry().len());
    println!("Items: {}", file.items().len());
    println!();
    print_chunk(file.root(), 0);

    report_summary(file.report());
    Ok(())
}

fn print_chunk(chunk: &TagChunk, depth: usize) {
    println!(
        "{}{} ({} bytes)",
        "  ".repeat(depth),
        chunk.tag_str(),
        chunk.payload_len()
    );
    for child in &chunk.children {
        print_chunk(child, depth + 1);
    }
}

fn cmd_types(input: &PathBuf, fields: bool) -> Result<()> {
    let file = open(input)?;
    let registry = file.registry();

    for (index, schema) in registry.iter() {
        let parent = registry.type_name(schema.parent).unwrap_or("-");
        let hash = schema
            .hash
            .map(|h| format!("{:#010x}", h))
            .unwrap_or_else(|| "-".to_string());
        let degraded = if schema.degraded { " [degraded]" } else { "" };
        println!(
            "{:4}  {} (parent: {}, size: {}, hash: {}){}",
            index, schema.name, parent, schema.byte_size, hash, degraded
        );

        if fields {
            for field in registry.flattened_fields(index) {
                let array = if field.is_array { "[]" } else { "" };
                println!(
                    "        +{:<4} {}: {}{}",
                    field.byte_offset, field.name, field.field_type, array
                );
            }
        }
    }

    report_summary(file.report());
    Ok(())
}

fn cmd_dump(input: &PathBuf, output: Option<&std::path::Path>, slot: Option<u32>) -> Result<()> {
    let file = open(input)?;
    let dumper = JsonDumper::new(&file);

    let value = match slot {
        Some(slot) => dumper.dump_slot(slot),
        None => dumper.dump(),
    };
    let text = serde_json::to_string_pretty(&value)?;

    match output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{}", text),
    }

    report_summary(file.report());
    Ok(())
}

fn report_summary(report: &SessionReport) {
    if report.is_clean() {
        return;
    }
    eprintln!();
    for name in &report.degraded_types {
        eprintln!("warning: type degraded by patching: {}", name);
    }
    for err in &report.patch_errors {
        eprintln!("warning: {}", err);
    }
    for err in &report.resolve_errors {
        eprintln!("warning: {}", err);
    }
}
