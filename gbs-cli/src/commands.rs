//! CLI command implementations.
//!
//! Each command returns the text it prints on stdout; `main` does the
//! printing and maps errors to exit codes.

use crate::config::{Backend, RunConfig};
use crate::error::CliError;
use gbs_assembler::{read_object, write_object, Style};
use gbs_common::{Board, CompiledProgram, Value};
use gbs_jit::{default_target, JitError};
use gbs_vm::Interpreter;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Read and parse an object file.
pub fn load(path: &Path) -> Result<CompiledProgram, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let program = read_object(&text)?;
    debug!(path = %path.display(), routines = program.routines().len(), "loaded");
    Ok(program)
}

/// Verify an object file.
pub fn check(path: &Path) -> Result<String, CliError> {
    let program = load(path)?;
    gbs_verifier::verify(&program).map_err(CliError::Verify)?;
    Ok(format!(
        "OK: {} ({} routines)\n",
        path.display(),
        program.routines().len()
    ))
}

/// Re-write an object file in the requested style.
pub fn dump(path: &Path, compact: bool) -> Result<String, CliError> {
    let program = load(path)?;
    let style = if compact { Style::Compact } else { Style::Verbose };
    Ok(write_object(&program, style))
}

/// Verify and run an object file, returning one `name = value` line per
/// result.
pub fn run(path: &Path, config: &RunConfig) -> Result<String, CliError> {
    let program = load(path)?;
    gbs_verifier::verify(&program).map_err(CliError::Verify)?;

    let (width, height) = (config.width, config.height);
    let (x, y) = config.head;
    let mut board = Board::with_head(width, height, x, y)
        .map_err(|e| CliError::Config(e.to_string()))?;

    let bindings = match config.backend {
        Backend::Native => match run_native(&program, &mut board)? {
            Some(bindings) => bindings,
            None => interpret(&program, &mut board, config)?,
        },
        Backend::Interpreter => interpret(&program, &mut board, config)?,
    };

    Ok(bindings
        .iter()
        .map(|(name, value)| format!("{name} = {value}\n"))
        .collect())
}

fn interpret(
    program: &CompiledProgram,
    board: &mut Board,
    config: &RunConfig,
) -> Result<Vec<(String, Value)>, CliError> {
    let mut interpreter = Interpreter::new(program, board);
    if let Some(limit) = config.max_steps {
        interpreter = interpreter.with_step_limit(limit);
    }
    let result = interpreter.execute();
    info!(backend = "interpreter", steps = interpreter.steps(), "run finished");
    result.map_err(|fault| CliError::Runtime(fault.to_string()))
}

/// Run natively. `None` means the program or host cannot run natively and
/// the caller should interpret instead.
fn run_native(
    program: &CompiledProgram,
    board: &mut Board,
) -> Result<Option<Vec<(String, Value)>>, CliError> {
    let target = default_target();
    if !target.is_available() {
        warn!("native backend unavailable on this host, falling back to the interpreter");
        return Ok(None);
    }
    let code = match gbs_jit::compile(program) {
        Ok(code) => code,
        Err(err) => {
            warn!(%err, "cannot compile natively, falling back to the interpreter");
            return Ok(None);
        }
    };
    let function = match gbs_jit::load(code, target.as_ref()) {
        Ok(function) => function,
        Err(err) => {
            warn!(%err, "cannot load native code, falling back to the interpreter");
            return Ok(None);
        }
    };
    match function.run(board) {
        Ok(bindings) => {
            info!(backend = "native", "run finished");
            Ok(Some(bindings))
        }
        Err(JitError::Fault { message }) => Err(CliError::Runtime(message)),
        Err(err) => Err(CliError::Runtime(err.to_string())),
    }
}
