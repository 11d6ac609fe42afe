//! Error types shared by the Gobstones engines.

use crate::value::{Color, Direction};
use std::fmt;
use thiserror::Error;

/// Classification of every runtime failure either engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    UninitializedVariable,
    TypeMismatch,
    UndefinedRoutine,
    ArityMismatch,
    /// Illegal board operation: empty take or off-board move.
    SelfDestruction,
    ExplicitThrow,
    DivisionByZero,
    NegativeExponent,
    /// Unknown opcode, unresolved label, stack underflow.
    MalformedBytecode,
    ImmutableAssignment,
    StepLimitExceeded,
}

impl FaultKind {
    pub fn name(self) -> &'static str {
        match self {
            FaultKind::UninitializedVariable => "uninitialized variable",
            FaultKind::TypeMismatch => "type mismatch",
            FaultKind::UndefinedRoutine => "undefined routine",
            FaultKind::ArityMismatch => "arity mismatch",
            FaultKind::SelfDestruction => "self destruction",
            FaultKind::ExplicitThrow => "explicit throw",
            FaultKind::DivisionByZero => "division by zero",
            FaultKind::NegativeExponent => "negative exponent",
            FaultKind::MalformedBytecode => "malformed bytecode",
            FaultKind::ImmutableAssignment => "immutable assignment",
            FaultKind::StepLimitExceeded => "step limit exceeded",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failures raised by [`Board`](crate::Board) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("Cannot take {count} stone(s) of color {color}: only {available} present")]
    CannotTake {
        color: &'static str,
        count: u32,
        available: u32,
    },

    #[error("Cannot move {direction}: the head would fall off the board")]
    CannotMove { direction: &'static str },

    #[error("pop_state without a matching push_state")]
    UnbalancedState,

    #[error("board size must be at least 1x1, got {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("head ({x}, {y}) lies outside a {width}x{height} board")]
    HeadOutOfBounds { x: u32, y: u32, width: u32, height: u32 },

    #[error("native board buffer has {actual} bytes, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
}

impl BoardError {
    pub fn cannot_take(color: Color, count: u32, available: u32) -> Self {
        BoardError::CannotTake {
            color: color.name(),
            count,
            available,
        }
    }

    pub fn cannot_move(direction: Direction) -> Self {
        BoardError::CannotMove {
            direction: direction.name(),
        }
    }
}

/// A failure raised by a builtin primitive, before the engine attaches
/// a backtrace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PrimitiveError {
    pub kind: FaultKind,
    pub message: String,
}

impl PrimitiveError {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(FaultKind::TypeMismatch, message)
    }
}

impl From<BoardError> for PrimitiveError {
    fn from(err: BoardError) -> Self {
        PrimitiveError::new(FaultKind::SelfDestruction, err.to_string())
    }
}

/// Errors detected while building routines and programs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("routine {routine}: label {label} is defined twice")]
    DuplicateLabel { routine: String, label: String },

    #[error("routine {routine}: jump at instruction {at} targets unknown label {label}")]
    UnresolvedLabel {
        routine: String,
        at: usize,
        label: String,
    },

    #[error("routine {0} is defined twice")]
    DuplicateRoutine(String),
}
