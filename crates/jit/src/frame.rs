//! Stack-slot assignment for one routine.
//!
//! ```text
//! [rbp + 8*(k+1)]  parameter k (k = 1 is the last declared)
//! [rbp + 8]        return address
//! [rbp]            caller's rbp
//! [rbp - 8*k]      local k, in first-use order
//! ```

use crate::error::JitError;
use crate::x64::{Gpr, Mem};
use gbs_common::{polyname_base, Instruction, Routine, RoutineKind};
use std::collections::HashMap;

/// Where a variable lives relative to `rbp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Param(usize),
    Local(usize),
}

/// Byte size of `words` stack words as a displacement.
pub fn word_offset(words: usize) -> Result<i32, JitError> {
    i32::try_from(words)
        .ok()
        .and_then(|w| w.checked_mul(8))
        .ok_or(JitError::FrameTooLarge { words })
}

impl Slot {
    pub fn mem(self) -> Result<Mem, JitError> {
        Ok(match self {
            Slot::Param(k) => Mem::new(Gpr::Rbp, word_offset(k.saturating_add(1))?),
            Slot::Local(k) => Mem::new(Gpr::Rbp, -word_offset(k)?),
        })
    }
}

/// Slot table for a routine's parameters and locals.
#[derive(Debug, Clone, Default)]
pub struct FrameLayout {
    slots: HashMap<String, Slot>,
    locals: usize,
    params: usize,
}

impl FrameLayout {
    pub fn of(routine: &Routine) -> Self {
        let mut layout = Self {
            params: routine.params.len(),
            ..Self::default()
        };
        for (i, param) in routine.params.iter().enumerate() {
            layout
                .slots
                .insert(param.clone(), Slot::Param(routine.params.len() - i));
        }
        for instr in routine.instructions() {
            match instr {
                Instruction::PushVar(name)
                | Instruction::PopVar(name)
                | Instruction::DeleteVar(name) => layout.local(name),
                Instruction::ReturnNamed { names, .. } => {
                    for name in names {
                        layout.local(polyname_base(name));
                    }
                }
                _ => {}
            }
        }
        layout
    }

    fn local(&mut self, name: &str) {
        if !self.slots.contains_key(name) {
            self.locals += 1;
            self.slots.insert(name.to_string(), Slot::Local(self.locals));
        }
    }

    pub fn slot(&self, name: &str) -> Option<Slot> {
        self.slots.get(name).copied()
    }

    pub fn locals(&self) -> usize {
        self.locals
    }

    pub fn params(&self) -> usize {
        self.params
    }
}

/// How many values a routine leaves for its caller: the count of a
/// function's first `return`, zero for everything else.
pub fn result_count(routine: &Routine) -> usize {
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
