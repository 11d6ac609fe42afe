//! Gobstones verifier: static checks for compiled programs.
//!
//! The verifier checks a [`CompiledProgram`] BEFORE execution.
//! It collects ALL errors (not just the first) and returns them.
//! Label resolution already happened when each routine was built.
//!
//! # Usage
//!
//! ```
//! use gbs_common::{CompiledProgram, Instruction, Routine, RoutineKind, Value};
//! use gbs_verifier::verify;
//!
//! let program = CompiledProgram::new(vec![Routine::new(
//!     RoutineKind::Entrypoint,
//!     "program",
//!     vec![],
//!     vec![
//!         Instruction::PushConst(Value::Int(42)),
//!         Instruction::PopVar("x".into()),
//!         Instruction::ReturnNamed { n: 1, names: vec!["x".into()] },
//!     ],
//! )
//! .unwrap()])
//! .unwrap();
//!
//! assert!(verify(&program).is_ok());
//! ```
//!
//! # Passes
//!
//! 1. **Entrypoint**: exactly one routine to start from
//! 2. **Calls**: targets exist, arities match, returnVars placement
//! 3. **Transactions**: enter/leave brackets around function bodies
//! 4. **Stack**: operand-stack balance along every path

pub mod calls;
pub mod entry;
pub mod error;
pub mod stack;
pub mod transactions;

pub use error::VerifyError;

use gbs_common::CompiledProgram;

/// Verify a program for correctness.
///
/// Returns `Ok(())` if the program passes all checks, or
/// `Err(Vec<VerifyError>)` with all errors found.
///
/// If the call pass finds errors, the stack pass is skipped: the stack
/// effect of an unresolved or mis-called routine is unknown.
pub fn verify(program: &CompiledProgram) -> Result<(), Vec<VerifyError>> {
    let mut all_errors = Vec::new();

    // Pass 1: Entrypoint
    all_errors.extend(entry::check_entrypoint(program));

    // Pass 2: Calls
    let call_errors = calls::check_calls(program);
    let calls_ok = call_errors.is_empty();
    all_errors.extend(call_errors);

    // Pass 3: Transactions
    all_errors.extend(transactions::check_transactions(program));

    // Pass 4: Stack
    if calls_ok {
        all_errors.extend(stack::check_stack(program));
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors)
    }
}

/// Check the shape native code relies on: transaction brackets and stack
/// balance. Unlike [`verify`], a module without an entrypoint passes, and
/// calls that always fault are allowed since they end their path.
pub fn verify_layout(program: &CompiledProgram) -> Result<(), Vec<VerifyError>> {
    let mut errors = transactions::check_transactions(program);
    errors.extend(stack::check_stack(program));
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
