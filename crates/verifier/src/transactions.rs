//! Board transaction brackets.
//!
//! A function body opens with its only `enter`; every `return` in it is directly
//! preceded by `leave`, and every `leave` is directly followed by a
//! `return`. Procedures and entrypoints never open transactions. The
//! native backend fuses each `leave; return` pair, so this shape is
//! required, not just conventional.

use crate::error::VerifyError;
use gbs_common::{CompiledProgram, Instruction, RoutineKind};

/// Run the transaction bracket check.
pub fn check_transactions(program: &CompiledProgram) -> Vec<VerifyError> {
    let mut errors = Vec::new();

    for routine in program.routines() {
        let code = routine.instructions();
        let name = || routine.name.clone();

        if routine.kind != RoutineKind::Function {
            for (at, instr) in code.iter().enumerate() {
                if matches!(instr, Instruction::Enter | Instruction::Leave) {
                    errors.push(VerifyError::TransactionOutsideFunction { routine: name(), at });
                }
            }
            continue;
        }

        if code.first() != Some(&Instruction::Enter) {
            errors.push(VerifyError::MissingEnter { routine: name() });
        }
        for (at, instr) in code.iter().enumerate() {
            match instr {
                Instruction::Enter if at > 0 => {
                    errors.push(VerifyError::MisplacedEnter { routine: name(), at });
                }
                Instruction::Leave => {
                    if !matches!(code.get(at + 1), Some(Instruction::Return(_))) {
                        errors.push(VerifyError::LeaveWithoutReturn { routine: name(), at });
                    }
                }
                Instruction::Return(_) => {
                    let after_leave = at > 0 && code[at - 1] == Instruction::Leave;
                    if !after_leave {
                        errors.push(VerifyError::ReturnWithoutLeave { routine: name(), at });
                    }
                }
                _ => {}
            }
        }
    }

    errors
}
