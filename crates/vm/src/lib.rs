//! Gobstones stack interpreter.
//!
//! The interpreter executes one routine's instructions at a time against:
//! - An operand stack shared by all frames
//! - The running [`ActivationRecord`] and the suspended callers below it
//! - The [`Board`], which function bodies mutate inside transactions
//!
//! # Usage
//!
//! ```
//! use gbs_common::{Board, CompiledProgram, Instruction, Routine, RoutineKind, Value};
//! use gbs_vm::run;
//!
//! let program = CompiledProgram::new(vec![Routine::new(
//!     RoutineKind::Entrypoint,
//!     "program",
//!     vec![],
//!     vec![
//!         Instruction::PushConst(Value::Int(1)),
//!         Instruction::PushConst(Value::Int(2)),
//!         Instruction::Call { name: "+".into(), argc: 2 },
//!         Instruction::PopVar("x".into()),
//!         Instruction::ReturnNamed { n: 1, names: vec!["x".into()] },
//!     ],
//! )
//! .unwrap()])
//! .unwrap();
//!
//! let mut board = Board::new(3, 3).unwrap();
//! let result = run(&program, &mut board).unwrap();
//! assert_eq!(result, vec![("x".to_string(), Value::Int(3))]);
//! ```

pub mod error;
pub mod execute;
pub mod machine;

pub use error::{CallTrace, Fault, Frame};
pub use execute::Bindings;
pub use machine::{ActivationRecord, Interpreter};

use gbs_common::{Board, CompiledProgram};

/// Run a program's entrypoint against `board` and return its named results.
///
/// The board is mutated in place; clone it first to keep the input.
///
/// # Errors
///
/// Returns a [`Fault`] with kind, message and backtrace if execution fails
/// (self destruction, explicit throw, type mismatch, etc.).
pub fn run(program: &CompiledProgram, board: &mut Board) -> Result<Bindings, Fault> {
    Interpreter::new(program, board).execute()
}
