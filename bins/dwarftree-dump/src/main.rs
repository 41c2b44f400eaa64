//! dwarftree-dump
//!
//! Builds the typed presentation tree for an ELF file's debug info and
//! prints it with group headers and name/offset/type columns.

use anyhow::Result;
use clap::Parser;
use dwarftree_model::{build, loader, DebugInfoSource, Element, ModelError};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "dwarftree-dump")]
#[command(about = "Print the typed declaration tree of an ELF's DWARF debug info")]
struct Cli {
    /// ELF file with DWARF debug info
    file: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("debug").init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(ModelError::NoDebugInfo { path }) = err.downcast_ref::<ModelError>() {
                eprintln!("{} has no debug info.", path.display());
            } else {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let source = loader::load_file(&cli.file)?;
    let root = build(&source)?;
    print_element(&source, &root, 0);
    Ok(())
}

fn print_element(source: &DebugInfoSource, elem: &Element, depth: usize) {
    let indent = "  ".repeat(depth);
    let mut line = format!("{indent}{}", elem.name());
    if let Some(die) = elem.die() {
        line.push_str(&format!("  [{:#x}]", source.offset(die)));
    }
    if let Some(type_string) = elem.type_string() {
        line.push_str(&format!("  {type_string}"));
    }
    println!("{line}");

    for (group, children) in elem.children_groups() {
        match group {
            Some(group) => println!("{indent}  {}:", group.label()),
            None => println!("{indent}  Others:"),
        }
        for child in children {
            print_element(source, child, depth + 2);
        }
    }
}
