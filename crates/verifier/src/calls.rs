//! Call resolution and arity checks, plus returnVars placement.

use crate::error::VerifyError;
use gbs_common::{CallTarget, CompiledProgram, Instruction};

/// Declared parameter count of whatever `target` names.
pub(crate) fn arity_of(target: &CallTarget<'_>) -> usize {
    match target {
        CallTarget::Builtin(builtin) => builtin.arity(),
        CallTarget::Routine(routine) | CallTarget::External { routine, .. } => routine.arity(),
    }
}

/// Run the call check.
pub fn check_calls(program: &CompiledProgram) -> Vec<VerifyError> {
    let mut errors = Vec::new();
    let entry = program.entrypoint().map(|r| r.name.as_str());

    for routine in program.routines() {
        for (at, instr) in routine.instructions().iter().enumerate() {
            match instr {
                Instruction::Call { name, argc } => match program.resolve(name) {
                    None => errors.push(VerifyError::UndefinedRoutine {
                        routine: routine.name.clone(),
                        at,
                        name: name.clone(),
                    }),
                    Some(target) => {
                        let expected = arity_of(&target);
                        if expected != *argc {
                            errors.push(VerifyError::ArityMismatch {
                                routine: routine.name.clone(),
                                at,
                                name: name.clone(),
                                expected,
                                found: *argc,
                            });
                        }
                    }
                },
                Instruction::ReturnNamed { n, names } => {
                    if entry != Some(routine.name.as_str()) {
                        errors.push(VerifyError::MalformedReturnNamed {
                            routine: routine.name.clone(),
                            at,
                            reason: "outside the entrypoint",
                        });
                    }
                    if names.len() != *n {
                        errors.push(VerifyError::MalformedReturnNamed {
                            routine: routine.name.clone(),
                            at,
                            reason: "name count differs from value count",
                        });
                    }
                }
                _ => {}
            }
        }
    }

    errors
}
