//! Error types for the GBO object reader.

use gbs_common::LoadError;
use thiserror::Error;

/// Errors produced while reading a `GBO/1.0` object.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    /// The first line is not the `GBO/1.0` header.
    #[error("line {line}: expected header line \"GBO/1.0\", found '{found}'")]
    MissingHeader { line: usize, found: String },

    /// An unrecognized opcode mnemonic was encountered.
    #[error("line {line}: unknown opcode '{token}'")]
    UnknownOpcode { line: usize, token: String },

    /// A routine header does not start with procedure, function or entrypoint.
    #[error("line {line}: unknown routine kind '{token}'")]
    UnknownRoutineKind { line: usize, token: String },

    /// An opcode did not have enough arguments.
    #[error("line {line}: {opcode} expects {expected} argument(s)")]
    MissingArgument {
        line: usize,
        opcode: &'static str,
        expected: usize,
    },

    /// A count could not be parsed.
    #[error("line {line}: invalid number '{token}'")]
    InvalidNumber { line: usize, token: String },

    /// A literal is not an integer, boolean, color, direction or tuple.
    #[error("line {line}: unknown constant {token}")]
    UnknownConstant { line: usize, token: String },

    /// A token appeared where it was not expected.
    #[error("line {line}: unexpected token '{token}'")]
    UnexpectedToken { line: usize, token: String },

    /// A string literal is missing its closing quote.
    #[error("line {line}: unterminated string literal")]
    UnterminatedString { line: usize },

    /// The text ended early.
    #[error("line {line}: unexpected end of object, expected {expected}")]
    UnexpectedEof { line: usize, expected: &'static str },

    /// Two routines share a name.
    #[error("line {line}: routine {name} is defined twice")]
    DuplicateRoutine { line: usize, name: String },

    /// A routine failed to load (bad labels).
    #[error("line {line}: {source}")]
    Load {
        line: usize,
        #[source]
        source: LoadError,
    },
}

impl AsmError {
    /// Line the error was reported at (1-based).
    pub fn line(&self) -> usize {
        match self {
            AsmError::MissingHeader { line, .. }
            | AsmError::UnknownOpcode { line, .. }
            | AsmError::UnknownRoutineKind { line, .. }
            | AsmError::MissingArgument { line, .. }
            | AsmError::InvalidNumber { line, .. }
            | AsmError::UnknownConstant { line, .. }
            | AsmError::UnexpectedToken { line, .. }
            | AsmError::UnterminatedString { line }
            | AsmError::UnexpectedEof { line, .. }
            | AsmError::DuplicateRoutine { line, .. }
            | AsmError::Load { line, .. } => *line,
        }
    }
}
