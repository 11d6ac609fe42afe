//! Error types for the native backend.

use gbs_common::BoardError;
use gbs_verifier::VerifyError;
use thiserror::Error;

fn joined(errors: &[VerifyError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from code generation, loading and native execution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JitError {
    /// The program uses a construct the native backend cannot express.
    #[error("not supported by the native backend: {0}")]
    Unsupported(String),

    /// A returned variable carries no `@Type` suffix, so its native word
    /// cannot be decoded.
    #[error("result \"{name}\" has no native type (expected an @Int, @Bool, @Color or @Dir suffix)")]
    UntypedResult { name: String },

    /// The bytecode breaks the stack or transaction shape native frames
    /// depend on.
    #[error("bytecode rejected: {}", joined(.0))]
    Rejected(Vec<VerifyError>),

    /// A frame offset does not fit a 32-bit displacement.
    #[error("{words} stack words do not fit a native frame")]
    FrameTooLarge { words: usize },

    /// The program has no routine to start from.
    #[error("program has no entrypoint")]
    NoEntrypoint,

    /// A jump or call targets a label that was never bound.
    #[error("label {0} is referenced but never bound")]
    UndefinedLabel(u32),

    /// A label was bound at two places.
    #[error("label {0} is bound twice")]
    LabelRebound(u32),

    /// Native code cannot run on this host.
    #[error("native execution is not available on this host")]
    Unavailable,

    /// Executable memory could not be mapped.
    #[error("could not map {size} bytes of executable memory")]
    MapFailed { size: usize },

    /// The native code stopped with a runtime fault.
    #[error("{message}")]
    Fault { message: String },

    /// The board buffer came back malformed.
    #[error(transparent)]
    Board(#[from] BoardError),
}
