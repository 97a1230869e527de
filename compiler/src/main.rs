use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process;

use crumb::{Vm, VmConfig};
use crumb_lang::{compile_with, CompileOptions};

/// Compile a source file and run it on the stack machine.
#[derive(Parser)]
#[command(name = "crumbc", version)]
struct Cli {
    /// Source file to compile and run.
    source: PathBuf,

    /// Runtime memory size in bytes (stack and reserved heap).
    #[arg(long, default_value_t = crumb::MAX_MEMORY_SIZE)]
    memory_size: usize,

    /// Print each executed instruction.
    #[arg(long)]
    trace: bool,
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(status) => {
            println!("program halted with status {}", status);
            process::exit(status as i32);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<u32> {
    let source = std::fs::read_to_string(&cli.source)
        .with_context(|| format!("reading {}", cli.source.display()))?;

    let options = CompileOptions::default().with_memory_size(cli.memory_size);
    let image = compile_with(&source, &options)
        .with_context(|| format!("compiling {}", cli.source.display()))?;

    let config = VmConfig::default()
        .with_memory_size(cli.memory_size)
        .with_trace(cli.trace);
    let mut vm = Vm::new(image, config).context("initializing the machine")?;
    let status = vm.run().context("executing the program")?;
    Ok(status)
}
