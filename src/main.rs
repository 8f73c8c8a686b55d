use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use rasm16::{
    asm::assembler::{AddressUnit, Assembler, AssemblerOptions, Resolution},
    diag::LogSink,
    emu::{Cpu, Exit, RunPolicy},
};

/// Assembler and emulator for the RASM-16 machine.
#[derive(Parser)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<LevelFilter>,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a source file into a binary image
    Build {
        /// Assembly source file
        source: PathBuf,
        /// Destination for the binary image
        #[arg(short, long, default_value = "output.bin")]
        output: PathBuf,
        #[command(flatten)]
        asm: AsmArgs,
    },
    /// Load a binary image at the code base and run it
    Run {
        /// Binary image
        image: PathBuf,
        /// Stop after this many cycles instead of running until HLT
        #[arg(short, long)]
        cycles: Option<usize>,
    },
    /// Assemble a source file in memory and run it
    Exec {
        /// Assembly source file
        source: PathBuf,
        /// Stop after this many cycles instead of running until HLT
        #[arg(short, long)]
        cycles: Option<usize>,
        #[command(flatten)]
        asm: AsmArgs,
    },
}

#[derive(Args)]
struct AsmArgs {
    /// Allow labels to be referenced before they are defined
    #[arg(long)]
    two_pass: bool,
    /// Count the location counter in bytes instead of instructions
    #[arg(long)]
    byte_addresses: bool,
}

impl AsmArgs {
    fn options(&self) -> AssemblerOptions {
        AssemblerOptions {
            resolution: if self.two_pass {
                Resolution::TwoPass
            } else {
                Resolution::SinglePass
            },
            address_unit: if self.byte_addresses {
                AddressUnit::Bytes
            } else {
                AddressUnit::Instructions
            },
        }
    }
}

fn assemble(source: &PathBuf, args: &AsmArgs) -> Result<Vec<u8>> {
    let text = fs::read_to_string(source)
        .with_context(|| format!("failed to read {}", source.display()))?;
    let mut asm = Assembler::new(args.options(), LogSink);
    let assembly = asm
        .assemble_source(&text)
        .with_context(|| format!("failed to assemble {}", source.display()))?;
    Ok(assembly.image)
}

fn run(image: &[u8], cycles: Option<usize>) -> Result<()> {
    let mut cpu = Cpu::default();
    cpu.load_image(image).context("failed to load image")?;
    let policy = match cycles {
        Some(n) => RunPolicy::Cycles(n),
        None => RunPolicy::UntilHalt,
    };
    let exit = cpu.run(policy);
    println!("{}", cpu);
    match exit.context("execution failed")? {
        Exit::Halted => println!("Halted"),
        Exit::BudgetExhausted => println!("Cycle budget exhausted"),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(debug_assertions)]
    let default_level = LevelFilter::Trace;
    #[cfg(not(debug_assertions))]
    let default_level = LevelFilter::Info;

    TermLogger::init(
        cli.log_level.unwrap_or(default_level),
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("failed to initialize logger")?;

    match cli.command {
        Command::Build {
            source,
            output,
            asm,
        } => {
            let image = assemble(&source, &asm)?;
            fs::write(&output, &image)
                .with_context(|| format!("failed to write {}", output.display()))?;
            log::info!("wrote {} bytes to {}", image.len(), output.display());
        }
        Command::Run { image, cycles } => {
            let bytes =
                fs::read(&image).with_context(|| format!("failed to read {}", image.display()))?;
            run(&bytes, cycles)?;
        }
        Command::Exec {
            source,
            cycles,
            asm,
        } => {
            let image = assemble(&source, &asm)?;
            run(&image, cycles)?;
        }
    }
    Ok(())
}
