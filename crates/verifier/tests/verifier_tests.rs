//! Integration tests for the Gobstones verifier.

use gbs_common::{CompiledProgram, Instruction, Routine, RoutineKind, Value};
use gbs_verifier::{verify, verify_layout, VerifyError};

fn routine(kind: RoutineKind, name: &str, params: &[&str], code: Vec<Instruction>) -> Routine {
    let params = params.iter().map(|p| p.to_string()).collect();
    Routine::new(kind, name, params, code).unwrap()
}

fn entry(code: Vec<Instruction>) -> Routine {
    routine(RoutineKind::Entrypoint, "program", &[], code)
}

fn program(routines: Vec<Routine>) -> CompiledProgram {
    CompiledProgram::new(routines).unwrap()
}

fn int(n: i64) -> Instruction {
    Instruction::PushConst(Value::Int(n))
}

fn call(name: &str, argc: usize) -> Instruction {
    Instruction::Call {
        name: name.to_string(),
        argc,
    }
}

fn return_named(names: &[&str]) -> Instruction {
    Instruction::ReturnNamed {
        n: names.len(),
        names: names.iter().map(|n| n.to_string()).collect(),
    }
}

fn errors_of(p: &CompiledProgram) -> Vec<VerifyError> {
    verify(p).expect_err("program should be rejected")
}

// ========================================================
// Valid programs pass verification
// ========================================================

#[test]
fn accept_add_and_return_named() {
    let p = program(vec![entry(vec![
        int(1),
        int(2),
        call("+", 2),
        Instruction::PopVar("x".into()),
        return_named(&["x@Int"]),
    ])]);
    assert!(verify(&p).is_ok());
}

#[test]
fn accept_function_with_transaction() {
    let double = routine(
        RoutineKind::Function,
        "double",
        &["n"],
        vec![
            Instruction::Enter,
            Instruction::PushVar("n".into()),
            Instruction::PushVar("n".into()),
            call("+", 2),
            Instruction::Leave,
            Instruction::Return(1),
        ],
    );
    let p = program(vec![
        double,
        entry(vec![
            int(4),
            call("double", 1),
            Instruction::PopVar("x".into()),
            return_named(&["x@Int"]),
        ]),
    ]);
    assert!(verify(&p).is_ok());
}

#[test]
fn accept_loop_with_consistent_depth() {
    let p = program(vec![entry(vec![
        int(0),
        Instruction::PopVar("i".into()),
        Instruction::Label("top".into()),
        Instruction::PushVar("i".into()),
        int(3),
        call("<", 2),
        Instruction::JumpIfFalse("done".into()),
        Instruction::PushVar("i".into()),
        int(1),
        call("+", 2),
        Instruction::PopVar("i".into()),
        Instruction::Jump("top".into()),
        Instruction::Label("done".into()),
        return_named(&["i@Int"]),
    ])]);
    assert!(verify(&p).is_ok());
}

#[test]
fn accept_throw_without_return() {
    let p = program(vec![entry(vec![Instruction::Throw("boom".into())])]);
    assert!(verify(&p).is_ok());
}

// ========================================================
// Entrypoint
// ========================================================

#[test]
fn reject_missing_entrypoint() {
    let p = program(vec![routine(
        RoutineKind::Procedure,
        "Helper",
        &[],
        vec![Instruction::Return(0)],
    )]);
    assert_eq!(errors_of(&p), vec![VerifyError::MissingEntrypoint]);
}

// ========================================================
// Calls
// ========================================================

#[test]
fn reject_undefined_routine() {
    let p = program(vec![entry(vec![call("Nope", 0), return_named(&[])])]);
    assert_eq!(
        errors_of(&p),
        vec![VerifyError::UndefinedRoutine {
            routine: "program".into(),
            at: 0,
            name: "Nope".into(),
        }]
    );
}

#[test]
fn reject_builtin_arity_mismatch() {
    let p = program(vec![entry(vec![
        Instruction::PushConst(Value::Dir(gbs_common::Direction::North)),
        int(1),
        call("Move", 2),
        return_named(&[]),
    ])]);
    assert_eq!(
        errors_of(&p),
        vec![VerifyError::ArityMismatch {
            routine: "program".into(),
            at: 2,
            name: "Move".into(),
            expected: 1,
            found: 2,
        }]
    );
}

#[test]
fn reject_return_named_outside_entrypoint() {
    let helper = routine(RoutineKind::Procedure, "Helper", &[], vec![return_named(&[])]);
    let p = program(vec![helper, entry(vec![call("Helper", 0), return_named(&[])])]);
    let errors = errors_of(&p);
    assert!(errors.iter().any(|e| matches!(
        e,
        VerifyError::MalformedReturnNamed { routine, reason: "outside the entrypoint", .. }
            if routine == "Helper"
    )));
}

#[test]
fn reject_return_named_count_mismatch() {
    let p = program(vec![entry(vec![Instruction::ReturnNamed {
        n: 2,
        names: vec!["x".into()],
    }])]);
    assert!(matches!(
        errors_of(&p).as_slice(),
        [VerifyError::MalformedReturnNamed { .. }]
    ));
}

// ========================================================
// Transactions
// ========================================================

#[test]
fn reject_function_without_enter() {
    let f = routine(
        RoutineKind::Function,
        "f",
        &[],
        vec![int(1), Instruction::Leave, Instruction::Return(1)],
    );
    let p = program(vec![f, entry(vec![return_named(&[])])]);
    assert!(errors_of(&p).contains(&VerifyError::MissingEnter {
        routine: "f".into()
    }));
}

#[test]
fn reject_leave_not_followed_by_return() {
    let f = routine(
        RoutineKind::Function,
        "f",
        &[],
        vec![
            Instruction::Enter,
            Instruction::Leave,
            int(1),
            Instruction::Return(1),
        ],
    );
    let p = program(vec![f, entry(vec![return_named(&[])])]);
    let errors = errors_of(&p);
    assert!(errors.contains(&VerifyError::LeaveWithoutReturn {
        routine: "f".into(),
        at: 1
    }));
    assert!(errors.contains(&VerifyError::ReturnWithoutLeave {
        routine: "f".into(),
        at: 3
    }));
}

#[test]
fn reject_enter_in_procedure() {
    let p = program(vec![entry(vec![Instruction::Enter, return_named(&[])])]);
    assert_eq!(
        errors_of(&p),
        vec![VerifyError::TransactionOutsideFunction {
            routine: "program".into(),
            at: 0
        }]
    );
}

// ========================================================
// Stack
// ========================================================

#[test]
fn reject_stack_underflow() {
    let p = program(vec![entry(vec![int(1), call("+", 2), return_named(&[])])]);
    assert_eq!(
        errors_of(&p),
        vec![VerifyError::StackUnderflow {
            routine: "program".into(),
            at: 1,
            depth: 1,
            needed: 2,
        }]
    );
}

#[test]
fn reject_inconsistent_depth_at_join() {
    let p = program(vec![entry(vec![
        Instruction::PushConst(Value::Bool(true)),
        Instruction::JumpIfFalse("join".into()),
        int(7),
        Instruction::Label("join".into()),
        return_named(&[]),
    ])]);
    assert!(matches!(
        errors_of(&p).as_slice(),
        [VerifyError::InconsistentDepth { at: 4, .. }]
    ));
}

#[test]
fn reject_unbalanced_return() {
    let f = routine(
        RoutineKind::Function,
        "f",
        &[],
        vec![
            Instruction::Enter,
            int(1),
            int(2),
            Instruction::Leave,
            Instruction::Return(1),
        ],
    );
    let p = program(vec![f, entry(vec![return_named(&[])])]);
    assert_eq!(
        errors_of(&p),
        vec![VerifyError::UnbalancedReturn {
            routine: "f".into(),
            at: 4,
            expected: 1,
            depth: 2,
        }]
    );
}

#[test]
fn reject_falling_off_the_end() {
    let p = program(vec![entry(vec![int(1), Instruction::PopVar("x".into())])]);
    assert_eq!(
        errors_of(&p),
        vec![VerifyError::FallsOffEnd {
            routine: "program".into()
        }]
    );
}

#[test]
fn reject_enter_after_the_first_instruction() {
    let f = routine(
        RoutineKind::Function,
        "f",
        &[],
        vec![
            Instruction::Enter,
            Instruction::Enter,
            int(1),
            Instruction::Leave,
            Instruction::Return(1),
        ],
    );
    let p = program(vec![f, entry(vec![return_named(&[])])]);
    assert_eq!(
        errors_of(&p),
        vec![VerifyError::MisplacedEnter {
            routine: "f".into(),
            at: 1,
        }]
    );
}

#[test]
fn reject_returns_with_different_counts() {
    let f = routine(
        RoutineKind::Function,
        "f",
        &["b"],
        vec![
            Instruction::Enter,
            Instruction::PushVar("b".into()),
            Instruction::JumpIfFalse("two".into()),
            int(1),
            Instruction::Leave,
            Instruction::Return(1),
            Instruction::Label("two".into()),
            int(1),
            int(2),
            Instruction::Leave,
            Instruction::Return(2),
        ],
    );
    let p = program(vec![f, entry(vec![return_named(&[])])]);
    assert_eq!(
        errors_of(&p),
        vec![VerifyError::MixedReturnCounts {
            routine: "f".into(),
            at: 10,
            first: 1,
            found: 2,
        }]
    );
}

// ========================================================
// Layout checks
// ========================================================

#[test]
fn layout_accepts_a_module_without_entrypoint() {
    let f = routine(
        RoutineKind::Function,
        "f",
        &[],
        vec![
            Instruction::Enter,
            int(1),
            Instruction::Leave,
            Instruction::Return(1),
        ],
    );
    let p = program(vec![f]);
    assert!(verify(&p).is_err());
    assert!(verify_layout(&p).is_ok());
}

#[test]
fn layout_lets_a_faulting_call_end_its_path() {
    // The popTo after the call is never reached.
    let p = program(vec![entry(vec![
        call("Nope", 0),
        Instruction::PopVar("x".into()),
        return_named(&["x@Int"]),
    ])]);
    assert!(verify_layout(&p).is_ok());
    assert!(matches!(
        errors_of(&p).as_slice(),
        [VerifyError::UndefinedRoutine { .. }]
    ));
}

#[test]
fn layout_rejects_extra_values_inside_a_transaction() {
    let f = routine(
        RoutineKind::Function,
        "f",
        &[],
        vec![
            Instruction::Enter,
            int(100),
            int(5),
            Instruction::Leave,
            Instruction::Return(1),
        ],
    );
    let p = program(vec![
        f,
        entry(vec![
            call("f", 0),
            Instruction::PopVar("r".into()),
            Instruction::PushConst(Value::Color(gbs_common::Color::Red)),
            call("PutStone", 1),
            return_named(&[]),
        ]),
    ]);
    assert_eq!(
        verify_layout(&p),
        Err(vec![VerifyError::UnbalancedReturn {
            routine: "f".into(),
            at: 4,
            expected: 1,
            depth: 2,
        }])
    );
}

// ========================================================
// Multiple errors collected
// ========================================================

#[test]
fn collect_errors_across_passes() {
    let f = routine(
        RoutineKind::Function,
        "f",
        &[],
        vec![int(1), Instruction::Return(1)],
    );
    let p = program(vec![f, entry(vec![call("Nope", 0), return_named(&[])])]);
    let errors = errors_of(&p);
    assert!(errors.len() >= 3, "expected several errors, got {errors:?}");
    assert!(errors
        .iter()
        .any(|e| matches!(e, VerifyError::UndefinedRoutine { .. })));
    assert!(errors
        .iter()
        .any(|e| matches!(e, VerifyError::MissingEnter { .. })));
}

// ========================================================
// Object files
// ========================================================

#[test]
fn accept_object_file() {
    let text = "GBO/1.0\n\
                entrypoint program\n\
                pushConst 3\n\
                popTo n\n\
                returnVars 1 n@Int\n\
                end\n\
                %%\n";
    let p = gbs_assembler::read_object(text).unwrap();
    assert!(verify(&p).is_ok());
}
