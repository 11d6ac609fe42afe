//! x86-64 registers, operands and instruction encoding.

pub mod encoder;
pub mod registers;

pub use registers::{AluOp, Cond, Gpr, Mem};
