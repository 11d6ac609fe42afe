//! Entrypoint check: a program has exactly one place to start.

use crate::error::VerifyError;
use gbs_common::{CompiledProgram, RoutineKind};

/// Run the entrypoint check.
///
/// Routines marked `entrypoint` are counted; when there are none, the
/// fallback names (`program`, `interactive`, `Main`) are tried.
pub fn check_entrypoint(program: &CompiledProgram) -> Vec<VerifyError> {
    let marked: Vec<&str> = program
        .routines()
        .iter()
        .filter(|r| r.kind == RoutineKind::Entrypoint)
        .map(|r| r.name.as_str())
        .collect();

    match marked.len() {
        0 if program.entrypoint().is_none() => vec![VerifyError::MissingEntrypoint],
        0 | 1 => Vec::new(),
        count => vec![VerifyError::MultipleEntrypoints {
            count,
            names: marked.join(", "),
        }],
    }
}
