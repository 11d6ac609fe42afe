//! gbs: verify, run and re-write Gobstones object files.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Input, parse or usage error
//! - 2: Verification failure
//! - 3: Runtime fault

use clap::{Parser, Subcommand};
use gbs_cli::config::parse_head;
use gbs_cli::{commands, init_logging, Backend, CliError, RunConfig, RunFlags};
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "gbs", version)]
#[command(about = "Run Gobstones object files on the interpreter or as native code")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify and run a program, printing its results as `name = value`
    Run {
        file: PathBuf,

        /// Execution engine [env: GBS_BACKEND] [default: interpreter]
        #[arg(long, value_enum)]
        backend: Option<Backend>,

        /// Board width
        #[arg(long)]
        width: Option<u32>,

        /// Board height
        #[arg(long)]
        height: Option<u32>,

        /// Starting head position, written X,Y
        #[arg(long, value_parser = parse_head)]
        head: Option<(u32, u32)>,

        /// Stop the interpreter after this many instructions [env: GBS_MAX_STEPS]
        #[arg(long)]
        max_steps: Option<u64>,
    },

    /// Verify a program without running it
    Check { file: PathBuf },

    /// Print a program in object-file form
    Dump {
        file: PathBuf,

        /// Single-letter opcodes and mangled names
        #[arg(long)]
        compact: bool,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            process::exit(code);
        }
    };

    init_logging();

    match execute(cli.command) {
        Ok(output) => print!("{output}"),
        Err(err) => {
            match &err {
                CliError::Runtime(_) => eprintln!("runtime error: {err}"),
                _ => eprintln!("error: {err}"),
            }
            process::exit(err.exit_code());
        }
    }
}

fn execute(command: Command) -> Result<String, CliError> {
    match command {
        Command::Run {
            file,
            backend,
            width,
            height,
            head,
            max_steps,
        } => {
            let flags = RunFlags {
                backend,
                max_steps,
                width,
                height,
                head,
            };
            let config = RunConfig::resolve(&flags)?;
            commands::run(&file, &config)
        }
        Command::Check { file } => commands::check(&file),
        Command::Dump { file, compact } => commands::dump(&file, compact),
    }
}
