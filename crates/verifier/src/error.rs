//! Verification errors for compiled Gobstones programs.
//!
//! Errors that point at code carry the routine name and the instruction
//! index (`at`). The verifier collects ALL errors, not just the first.

use thiserror::Error;

/// Errors found during static verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    // --- Entrypoint ---
    /// No routine is marked as entrypoint and none has a fallback name.
    #[error("program has no entrypoint")]
    MissingEntrypoint,

    /// More than one routine is marked as entrypoint.
    #[error("program has {count} entrypoints: {names}")]
    MultipleEntrypoints { count: usize, names: String },

    // --- Calls ---
    /// A call names no builtin, routine or external routine.
    #[error("{routine}@{at}: call to undefined routine \"{name}\"")]
    UndefinedRoutine {
        routine: String,
        at: usize,
        name: String,
    },

    /// A call passes the wrong number of arguments.
    #[error("{routine}@{at}: \"{name}\" expects {expected} argument(s), called with {found}")]
    ArityMismatch {
        routine: String,
        at: usize,
        name: String,
        expected: usize,
        found: usize,
    },

    /// returnVars outside an entrypoint, or with a name count that does not
    /// match its value count.
    #[error("{routine}@{at}: malformed returnVars ({reason})")]
    MalformedReturnNamed {
        routine: String,
        at: usize,
        reason: &'static str,
    },

    // --- Transactions ---
    /// A function body does not open with `enter`.
    #[error("{routine}: function body does not start with enter")]
    MissingEnter { routine: String },

    /// `enter` anywhere but the first instruction of a function.
    #[error("{routine}@{at}: enter must be the first instruction")]
    MisplacedEnter { routine: String, at: usize },

    /// `leave` not immediately followed by `return`.
    #[error("{routine}@{at}: leave must be followed by return")]
    LeaveWithoutReturn { routine: String, at: usize },

    /// A function returns without closing its transaction first.
    #[error("{routine}@{at}: function returns without leave")]
    ReturnWithoutLeave { routine: String, at: usize },

    /// `enter` or `leave` in a procedure or entrypoint.
    #[error("{routine}@{at}: board transaction outside a function")]
    TransactionOutsideFunction { routine: String, at: usize },

    // --- Stack ---
    /// An instruction pops more values than the stack holds.
    #[error("{routine}@{at}: stack underflow (depth {depth}, needs {needed})")]
    StackUnderflow {
        routine: String,
        at: usize,
        depth: usize,
        needed: usize,
    },

    /// Two control-flow paths reach an instruction with different depths.
    #[error("{routine}@{at}: inconsistent stack depth ({first} vs {second})")]
    InconsistentDepth {
        routine: String,
        at: usize,
        first: usize,
        second: usize,
    },

    /// A return leaves values other than its results on the stack.
    #[error("{routine}@{at}: return {expected} with {depth} value(s) on the stack")]
    UnbalancedReturn {
        routine: String,
        at: usize,
        expected: usize,
        depth: usize,
    },

    /// A function's returns leave different numbers of values.
    #[error("{routine}@{at}: return {found} but the first return of the function is return {first}")]
    MixedReturnCounts {
        routine: String,
        at: usize,
        first: usize,
        found: usize,
    },

    /// Execution can run past the last instruction.
    #[error("{routine}: control reaches the end of the routine without returning")]
    FallsOffEnd { routine: String },
}
