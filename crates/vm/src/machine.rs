//! Interpreter state: operand stack, activation records, step budget.

use crate::error::{CallTrace, Fault, Frame};
use gbs_common::{Board, CompiledProgram, FaultKind, Routine, Value};
use std::collections::{BTreeMap, HashSet};

/// The runtime frame of one in-progress routine call.
#[derive(Debug, Clone)]
pub struct ActivationRecord<'p> {
    /// Module the routine was defined in; calls resolve against it.
    pub module: &'p CompiledProgram,
    pub routine: &'p Routine,
    /// Index of the instruction being executed.
    pub ip: usize,
    pub locals: BTreeMap<String, Value>,
    /// Loop indices that may not be reassigned.
    pub immutable: HashSet<String>,
}

impl<'p> ActivationRecord<'p> {
    pub fn new(module: &'p CompiledProgram, routine: &'p Routine) -> Self {
        Self {
            module,
            routine,
            ip: 0,
            locals: BTreeMap::new(),
            immutable: HashSet::new(),
        }
    }

    fn frame(&self) -> Frame {
        Frame {
            kind: self.routine.kind,
            routine: self.routine.name.clone(),
            module: self.module.module().to_string(),
            ip: self.ip,
        }
    }
}

/// The Gobstones stack interpreter.
///
/// Holds the program, the board it mutates, the shared operand stack and
/// the call stack. The last entry of `frames` is the running frame; the
/// rest are suspended callers.
pub struct Interpreter<'p, 'b> {
    pub(crate) program: &'p CompiledProgram,
    pub(crate) board: &'b mut Board,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<ActivationRecord<'p>>,
    pub(crate) steps: u64,
    pub(crate) step_limit: Option<u64>,
}

impl<'p, 'b> Interpreter<'p, 'b> {
    pub fn new(program: &'p CompiledProgram, board: &'b mut Board) -> Self {
        Self {
            program,
            board,
            stack: Vec::new(),
            frames: Vec::new(),
            steps: 0,
            step_limit: None,
        }
    }

    /// Stop with `StepLimitExceeded` after `limit` instructions.
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = Some(limit);
        self
    }

    /// Number of instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Number of unfinished calls.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Build a fault carrying a backtrace of the current call stack.
    pub(crate) fn fault(&self, kind: FaultKind, message: impl Into<String>) -> Fault {
        let frames = self.frames.iter().rev().map(ActivationRecord::frame).collect();
        let locals = self
            .frames
            .last()
            .map(|ar| {
                ar.locals
                    .iter()
                    .filter(|(name, _)| !name.starts_with('_'))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Fault {
            kind,
            message: message.into(),
            trace: CallTrace { frames, locals },
        }
    }

    pub(crate) fn current(&self) -> Result<&ActivationRecord<'p>, Fault> {
        self.frames
            .last()
            .ok_or_else(|| Fault::new(FaultKind::MalformedBytecode, "no active routine"))
    }

    pub(crate) fn current_mut(&mut self) -> Result<&mut ActivationRecord<'p>, Fault> {
        self.frames
            .last_mut()
            .ok_or_else(|| Fault::new(FaultKind::MalformedBytecode, "no active routine"))
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> Result<Value, Fault> {
        match self.stack.pop() {
            Some(value) => Ok(value),
            None => Err(self.fault(FaultKind::MalformedBytecode, "operand stack underflow")),
        }
    }

    /// Pop `n` values, returned in the order they were pushed.
    pub(crate) fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, Fault> {
        if self.stack.len() < n {
            return Err(self.fault(FaultKind::MalformedBytecode, "operand stack underflow"));
        }
        let at = self.stack.len() - n;
        Ok(self.stack.split_off(at))
    }

    /// Move the running frame to its next instruction.
    pub(crate) fn advance(&mut self) -> Result<(), Fault> {
        self.current_mut()?.ip += 1;
        Ok(())
    }

    /// Transfer the running frame to the resolved target of the jump at `at`.
    pub(crate) fn jump(&mut self, at: usize) -> Result<(), Fault> {
        let frame = self.current()?;
        match frame.routine.target(at) {
            Some(target) => {
                self.current_mut()?.ip = target;
                Ok(())
            }
            None => Err(self.fault(
                FaultKind::MalformedBytecode,
                format!("unresolved jump at instruction {at}"),
            )),
        }
    }

    pub(crate) fn count_step(&mut self) -> Result<(), Fault> {
        self.steps += 1;
        match self.step_limit {
            Some(limit) if self.steps > limit => Err(self.fault(
                FaultKind::StepLimitExceeded,
                format!("execution exceeded {limit} steps"),
            )),
            _ => Ok(()),
        }
    }
}
