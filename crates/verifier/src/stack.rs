//! Stack balance analysis.
//!
//! Walks every path through each routine, tracking operand-stack depth.
//! Checks for underflow, for paths that meet with different depths, for
//! returns that leave extra values behind, for functions whose returns
//! disagree on their value count, and for paths that run off the end of
//! the routine. A call that always faults (unknown target, wrong arity)
//! ends its path.

use crate::error::VerifyError;
use gbs_common::{CallTarget, CompiledProgram, Instruction, Routine, RoutineKind};
use std::collections::HashSet;

/// Number of values a call to `target` leaves on the stack.
fn results_of(target: &CallTarget<'_>) -> usize {
    match target {
        CallTarget::Builtin(builtin) => (builtin.kind == RoutineKind::Function) as usize,
        CallTarget::Routine(routine) | CallTarget::External { routine, .. } => {
            if routine.kind != RoutineKind::Function {
                return 0;
            }
            routine
                .instructions()
                .iter()
                .find_map(|instr| match instr {
                    Instruction::Return(n) => Some(*n),
                    _ => None,
                })
                .unwrap_or(0)
        }
    }
}

/// Whether `instr` is a call that cannot succeed at run time.
fn always_faults(program: &CompiledProgram, instr: &Instruction) -> bool {
    let Instruction::Call { name, argc } = instr else {
        return false;
    };
    match program.resolve(name) {
        None => true,
        Some(CallTarget::Builtin(builtin)) => builtin.arity() != *argc,
        Some(CallTarget::Routine(routine)) | Some(CallTarget::External { routine, .. }) => {
            routine.arity() != *argc
        }
    }
}

/// `(pops, pushes)` of one instruction.
fn effect(program: &CompiledProgram, instr: &Instruction) -> (usize, usize) {
    match instr {
        Instruction::PushConst(_) | Instruction::PushVar(_) => (0, 1),
        Instruction::PopVar(_) | Instruction::JumpIfFalse(_) | Instruction::JumpIfNotIn { .. } => {
            (1, 0)
        }
        Instruction::Call { name, argc } => {
            let pushes = program.resolve(name).map(|t| results_of(&t)).unwrap_or(0);
            (*argc, pushes)
        }
        Instruction::Return(n) => (*n, 0),
        _ => (0, 0),
    }
}

/// Run the stack balance check.
pub fn check_stack(program: &CompiledProgram) -> Vec<VerifyError> {
    program
        .routines()
        .iter()
        .flat_map(|routine| check_routine(program, routine))
        .collect()
}

fn check_routine(program: &CompiledProgram, routine: &Routine) -> Vec<VerifyError> {
    let code = routine.instructions();
    let mut errors = Vec::new();
    let mut depths: Vec<Option<usize>> = vec![None; code.len()];
    let mut reported = HashSet::new();
    let mut falls_off = false;
    // Callers take as many results as the first `return` leaves.
    let returns = match routine.kind {
        RoutineKind::Function => code.iter().find_map(|instr| match instr {
            Instruction::Return(n) => Some(*n),
            _ => None,
        }),
        _ => None,
    };
    let mut work = vec![(0usize, 0usize)];

    while let Some((at, depth)) = work.pop() {
        let Some(instr) = code.get(at) else {
            falls_off = true;
            continue;
        };
        match depths[at] {
            Some(seen) if seen == depth => continue,
            Some(seen) => {
                if reported.insert(at) {
                    errors.push(VerifyError::InconsistentDepth {
                        routine: routine.name.clone(),
                        at,
                        first: seen,
                        second: depth,
                    });
                }
                continue;
            }
            None => depths[at] = Some(depth),
        }

        let (pops, pushes) = effect(program, instr);
        if depth < pops {
            errors.push(VerifyError::StackUnderflow {
                routine: routine.name.clone(),
                at,
                depth,
                needed: pops,
            });
            continue;
        }
        let after = depth - pops + pushes;

        if always_faults(program, instr) {
            continue;
        }
        match instr {
            Instruction::Return(n) => {
                if let Some(first) = returns.filter(|first| first != n) {
                    errors.push(VerifyError::MixedReturnCounts {
                        routine: routine.name.clone(),
                        at,
                        first,
                        found: *n,
                    });
                }
                if depth != *n {
                    errors.push(VerifyError::UnbalancedReturn {
                        routine: routine.name.clone(),
                        at,
                        expected: *n,
                        depth,
                    });
                }
            }
            Instruction::ReturnNamed { .. } | Instruction::Throw(_) => {}
            Instruction::Jump(_) => {
                if let Some(target) = routine.target(at) {
                    work.push((target, after));
                }
            }
            Instruction::JumpIfFalse(_) | Instruction::JumpIfNotIn { .. } => {
                work.push((at + 1, after));
                if let Some(target) = routine.target(at) {
                    work.push((target, after));
                }
            }
            _ => work.push((at + 1, after)),
        }
    }

    if falls_off {
        errors.push(VerifyError::FallsOffEnd {
            routine: routine.name.clone(),
        });
    }
    errors
}
