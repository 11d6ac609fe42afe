//! x86-64 native backend for Gobstones bytecode.
//!
//! A [`CompiledProgram`] is translated into one blob of position-independent
//! machine code, mapped executable through a [`NativeTarget`], and run
//! against a [`Board`](gbs_common::Board) encoded in its flat byte layout.
//!
//! ```text
//! CompiledProgram ──compile──▶ MachineCode ──load──▶ NativeFunction ──run──▶ Bindings
//! ```
//!
//! # Modules
//!
//! - [`x64`]: registers and the byte-level instruction encoder
//! - [`asm`]: the symbolic instruction list and two-pass label resolution
//! - [`frame`]: stack slots for parameters and locals
//! - [`codegen`]: per-instruction translation, entry stub and fault stubs
//! - [`memory`]: executable mappings and the [`NativeTarget`] seam
//! - [`invoke`]: calling the entry stub and decoding its results
//!
//! Only typed instances of the polymorphic builtins (`next@Color`, ...)
//! can be compiled, and the entrypoint's returned names must carry an
//! `@Int`, `@Bool`, `@Color` or `@Dir` suffix so their words can be decoded.
//! Tuples are not supported.
//!
//! Where [`default_target`] is [`Unavailable`], callers are expected to
//! fall back to the interpreter.

pub mod asm;
pub mod codegen;
pub mod error;
pub mod frame;
pub mod invoke;
pub mod memory;
pub mod templates;
pub mod x64;

pub use codegen::{compile, MachineCode, FAULT_SENTINEL};
pub use error::JitError;
pub use invoke::{Bindings, NativeFunction};
pub use memory::{default_target, ExecutableMemory, MmapTarget, NativeTarget, Unavailable};

use gbs_common::CompiledProgram;

/// Map compiled code through `target`.
pub fn load(code: MachineCode, target: &dyn NativeTarget) -> Result<NativeFunction, JitError> {
    let memory = target.load(&code.bytes)?;
    Ok(NativeFunction::new(memory, code))
}

/// Compile `program` and load it on the host's default target.
pub fn compile_native(program: &CompiledProgram) -> Result<NativeFunction, JitError> {
    let code = compile(program)?;
    load(code, default_target().as_ref())
}
