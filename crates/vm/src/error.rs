//! Runtime faults raised by the interpreter.
//!
//! Every fault carries its [`FaultKind`], a human-readable message and a
//! [`CallTrace`] captured at the failing instruction. Faults are never
//! recovered inside the run loop.

use gbs_common::{FaultKind, RoutineKind, Value};
use std::fmt;
use thiserror::Error;

/// One suspended or running call, as reported in a backtrace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: RoutineKind,
    pub routine: String,
    pub module: String,
    /// Instruction index the frame was executing.
    pub ip: usize,
}

/// Call stack (most recent first) and the failing frame's locals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallTrace {
    pub frames: Vec<Frame>,
    /// Bindings of the failing frame, sorted by name. Names starting with
    /// `_` are compiler temporaries and are left out.
    pub locals: Vec<(String, Value)>,
}

impl CallTrace {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl fmt::Display for CallTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        write!(f, "\n\nAt:")?;
        for frame in &self.frames {
            write!(f, "\n    {} {} at {}", frame.kind, frame.routine, frame.ip)?;
        }
        if !self.locals.is_empty() {
            write!(f, "\nLocals:")?;
            for (name, value) in &self.locals {
                write!(f, "\n    {name} = {value}")?;
            }
        }
        Ok(())
    }
}

/// A structured runtime failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{trace}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    pub trace: CallTrace,
}

impl Fault {
    /// A fault with no backtrace, for failures before any frame exists.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: CallTrace::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_without_frames_is_just_the_message() {
        let fault = Fault::new(FaultKind::UndefinedRoutine, "Program has no entrypoint");
        assert_eq!(fault.to_string(), "Program has no entrypoint");
    }

    #[test]
    fn fault_lists_frames_and_locals() {
        let fault = Fault {
            kind: FaultKind::ExplicitThrow,
            message: "boom".to_string(),
            trace: CallTrace {
                frames: vec![
                    Frame {
                        kind: RoutineKind::Procedure,
                        routine: "Inner".to_string(),
                        module: "main".to_string(),
                        ip: 4,
                    },
                    Frame {
                        kind: RoutineKind::Entrypoint,
                        routine: "program".to_string(),
                        module: "main".to_string(),
                        ip: 1,
                    },
                ],
                locals: vec![("n".to_string(), Value::Int(3))],
            },
        };
        assert_eq!(
            fault.to_string(),
            "boom\n\nAt:\n    procedure Inner at 4\n    entrypoint program at 1\nLocals:\n    n = 3"
        );
    }
}
