//! Gobstones common types.
//!
//! This crate provides the data shared by the interpreter, the verifier,
//! the object-file assembler and the native backend:
//!
//! - [`Value`], [`Color`], [`Direction`]: runtime values
//! - [`Instruction`]: the closed bytecode instruction set
//! - [`Routine`] and [`CompiledProgram`]: routines with labels resolved at load
//! - [`BuiltinTable`]: primitive operations callable from bytecode
//! - [`Board`]: the grid, its head and its transactional [`ChangeLog`]
//! - [`buffer`]: the flat byte layout native code reads and writes
//! - [`FaultKind`]: the runtime failure taxonomy

pub mod board;
pub mod buffer;
pub mod builtins;
pub mod error;
pub mod instruction;
pub mod program;
pub mod value;

// Re-export commonly used types at the crate root.
pub use board::{Board, Cell, Change, ChangeLog};
pub use builtins::{Builtin, BuiltinTable, Primitive};
pub use error::{BoardError, FaultKind, LoadError, PrimitiveError};
pub use instruction::{polyname_base, polyname_type, Instruction};
pub use program::{CallTarget, CompiledProgram, ExternalRoutine, Routine, RoutineKind};
pub use value::{Color, Direction, Value, ValueType, ALL_COLORS, ALL_DIRECTIONS};
