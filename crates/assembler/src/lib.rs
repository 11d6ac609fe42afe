//! Gobstones object files: the `GBO/1.0` text format.
//!
//! An object is a header line, a list of routines, and a `%%` terminator:
//!
//! ```text
//! GBO/1.0
//! entrypoint program
//!     pushConst 1
//!     pushConst 2
//!     call + 2
//!     popTo x
//!     returnVars 1 x@Int
//! end
//!
//! %%
//! ```
//!
//! # Usage
//!
//! ```
//! use gbs_assembler::{read_object, write_object, Style};
//!
//! let text = "GBO/1.0\nentrypoint program\n    pushConst 1\n    popTo x\n    returnVars 1 x@Int\nend\n\n%%\n";
//! let program = read_object(text).unwrap();
//! assert_eq!(program.routines().len(), 1);
//!
//! let compact = write_object(&program, Style::Compact);
//! assert!(compact.starts_with("GBO/1.0\nE $program"));
//! ```
//!
//! # Styles
//!
//! The writer emits either style; the reader accepts both, even mixed
//! within one object. Re-reading written output gives a program that runs
//! the same: the verbose style keeps every name, the compact style keeps
//! builtins, the entrypoint and the names returned by `returnVars`.

pub mod error;

mod lexer;
mod mnemonic;
mod parser;
mod writer;

pub use error::AsmError;
pub use writer::{Mangler, Style};

use gbs_common::CompiledProgram;

/// Read object text into a program with the standard builtins.
///
/// Returns the first error encountered.
pub fn read_object(text: &str) -> Result<CompiledProgram, AsmError> {
    parser::parse_object(text)
}

/// Write a program, and every module it links against, as object text.
pub fn write_object(program: &CompiledProgram, style: Style) -> String {
    writer::write_object(program, style)
}
