//! Boot compiler CLI
//!
//! Entry point for the `boot-compile` command-line tool.

use boot_compiler::logging::{init_logging, LogLevel};
use boot_compiler::{compile, CompileOptions, InstructionBundle};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "boot-compile")]
#[command(about = "Compile layered app configuration into boot instructions", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Application root directory (default: current directory)
    #[arg(long, short = 'r')]
    root: Option<PathBuf>,

    /// Environment name (default: development)
    #[arg(long, short = 'e', env = "BOOT_ENV")]
    env: Option<String>,

    /// Path to a TOML options file
    #[arg(long, short = 'o')]
    options: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and print the instruction bundle as JSON
    Compile {
        #[command(flatten)]
        source: SourceArgs,

        /// Write the bundle to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Print the digest of the compiled bundle
    Digest {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print the flattened middleware phase list
    Phases {
        #[command(flatten)]
        source: SourceArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(LogLevel::from_flags(cli.verbose, cli.quiet));

    match cli.command {
        Commands::Compile {
            source,
            output,
            compact,
        } => cmd_compile(&source, output, compact),
        Commands::Digest { source } => cmd_digest(&source),
        Commands::Phases { source } => cmd_phases(&source),
    }
}

fn load_options(source: &SourceArgs) -> CompileOptions {
    let mut options = match &source.options {
        Some(path) => match CompileOptions::from_file(path) {
            Ok(options) => options,
            Err(e) => {
                eprintln!("Error loading options: {}", e);
                process::exit(1);
            }
        },
        None => CompileOptions::default(),
    };

    if let Some(root) = &source.root {
        options.app_root_dir = root.clone();
    }
    if let Some(env) = &source.env {
        options.env = Some(env.clone());
    }
    options
}

fn compile_or_exit(source: &SourceArgs) -> InstructionBundle {
    let options = load_options(source);
    match compile(&options) {
        Ok(bundle) => bundle,
        Err(e) => {
            eprintln!("Compile error [{}]: {}", e.kind(), e);
            process::exit(1);
        }
    }
}

fn cmd_compile(source: &SourceArgs, output: Option<PathBuf>, compact: bool) {
    let bundle = compile_or_exit(source);

    let serialized = if compact {
        serde_json::to_string(&bundle)
    } else {
        bundle.to_json()
    };
    let json = match serialized {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = fs::write(&path, json + "\n") {
                eprintln!("Error writing {}: {}", path.display(), e);
                process::exit(1);
            }
        }
        None => println!("{}", json),
    }
}

fn cmd_digest(source: &SourceArgs) {
    let bundle = compile_or_exit(source);
    match bundle.digest() {
        Ok(digest) => println!("{}", digest),
        Err(e) => {
            eprintln!("Error computing digest: {}", e);
            process::exit(1);
        }
    }
}

fn cmd_phases(source: &SourceArgs) {
    let bundle = compile_or_exit(source);
    for phase in &bundle.middleware.phases {
        println!("{}", phase);
    }
}
