//! The native backend against the interpreter.
//!
//! Every program here runs on both engines from the same starting board;
//! results, final boards and fault messages must agree. Tests return early
//! when the host cannot run native code.

use gbs_assembler::read_object;
use gbs_common::{Board, Color, CompiledProgram, Value};
use gbs_jit::{compile, compile_native, default_target, JitError};
use gbs_verifier::VerifyError;
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================
// Helper functions
// ============================================================

#[derive(Debug, PartialEq)]
enum Outcome {
    Done(Vec<(String, Value)>, Board),
    Failed(String),
}

fn native_available() -> bool {
    default_target().is_available()
}

fn interpreted(text: &str, board: Board) -> Outcome {
    interpret_program(&read_object(text).unwrap(), board)
}

fn native(text: &str, board: Board) -> Outcome {
    run_native_program(&read_object(text).unwrap(), board)
}

fn interpret_program(program: &CompiledProgram, mut board: Board) -> Outcome {
    match gbs_vm::run(program, &mut board) {
        Ok(bindings) => Outcome::Done(bindings, board),
        Err(fault) => Outcome::Failed(fault.message),
    }
}

fn run_native_program(program: &CompiledProgram, mut board: Board) -> Outcome {
    let function = compile_native(program).unwrap();
    match function.run(&mut board) {
        Ok(bindings) => Outcome::Done(bindings, board),
        Err(JitError::Fault { message }) => Outcome::Failed(message),
        Err(other) => panic!("native run failed outside the program: {other}"),
    }
}

/// Run on both engines, check they agree, and return the outcome.
fn agree(text: &str, board: Board) -> Outcome {
    let expected = interpreted(text, board.clone());
    let actual = native(text, board);
    assert_eq!(actual, expected, "engines disagree on:\n{text}");
    actual
}

fn int(name: &str, n: i64) -> (String, Value) {
    (name.to_string(), Value::Int(n))
}

// ============================================================
// Scenarios
// ============================================================

#[test]
fn add_two_constants() {
    if !native_available() {
        return;
    }
    let text = "\
GBO/1.0
entrypoint program
    pushConst 1
    pushConst 2
    call + 2
    popTo x
    returnVars 1 x@Int
end
%%
";
    let outcome = agree(text, Board::new(3, 3).unwrap());
    assert_eq!(
        outcome,
        Outcome::Done(vec![int("x", 3)], Board::new(3, 3).unwrap())
    );
}

#[test]
fn third_move_east_falls_off() {
    if !native_available() {
        return;
    }
    let two = "\
GBO/1.0
entrypoint program
    pushConst East
    call Move 1
    pushConst East
    call Move 1
    return 0
end
%%
";
    match agree(two, Board::new(3, 3).unwrap()) {
        Outcome::Done(_, board) => assert_eq!(board.head(), (2, 0)),
        other => panic!("unexpected {other:?}"),
    }

    let three = two.replace("    return 0", "    pushConst East\n    call Move 1\n    return 0");
    assert_eq!(
        agree(&three, Board::new(3, 3).unwrap()),
        Outcome::Failed("Cannot move East: the head would fall off the board".to_string())
    );
}

#[test]
fn function_mutations_are_rolled_back() {
    if !native_available() {
        return;
    }
    let text = "\
GBO/1.0
function f
    enter
    pushConst Green
    call PutStone 1
    pushConst North
    call Move 1
    pushConst 5
    leave
    return 1
end

entrypoint program
    call f 0
    popTo r
    pushConst Green
    call numStones 1
    popTo g
    returnVars 2 r@Int g@Int
end
%%
";
    match agree(text, Board::new(2, 2).unwrap()) {
        Outcome::Done(bindings, board) => {
            assert_eq!(bindings, vec![int("r", 5), int("g", 0)]);
            assert_eq!(board.head(), (0, 0));
            assert_eq!(board, Board::new(2, 2).unwrap());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn procedure_mutations_persist() {
    if !native_available() {
        return;
    }
    let text = "\
GBO/1.0
procedure Mark color
    pushFrom color
    call PutStone 1
    pushConst East
    call Move 1
    return 0
end

entrypoint program
    pushConst Red
    call Mark 1
    pushConst Blue
    call Mark 1
    return 0
end
%%
";
    match agree(text, Board::new(3, 1).unwrap()) {
        Outcome::Done(_, board) => {
            assert_eq!(board.head(), (2, 0));
            assert_eq!(board.cell(0, 0).map(|c| c.count(Color::Red)), Some(1));
            assert_eq!(board.cell(1, 0).map(|c| c.count(Color::Blue)), Some(1));
        }
        other => panic!("unexpected {other:?}"),
    }
}

// ============================================================
// Calls and control flow
// ============================================================

const FACTORIAL: &str = "\
GBO/1.0
function fact n
    enter
    pushFrom n
    pushConst 0
    call == 2
    jumpIfFalse recurse
    pushConst 1
    leave
    return 1
    label recurse
    pushFrom n
    pushFrom n
    pushConst 1
    call - 2
    call fact 1
    call * 2
    leave
    return 1
end

entrypoint program
    pushConst 10
    call fact 1
    popTo r
    returnVars 1 r@Int
end
%%
";

#[test]
fn recursive_factorial() {
    if !native_available() {
        return;
    }
    match agree(FACTORIAL, Board::new(2, 3).unwrap()) {
        Outcome::Done(bindings, _) => assert_eq!(bindings, vec![int("r", 3_628_800)]),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn parameters_keep_declaration_order() {
    if !native_available() {
        return;
    }
    let text = "\
GBO/1.0
function minus a b
    enter
    pushFrom a
    pushFrom b
    call - 2
    leave
    return 1
end

function pair
    enter
    pushConst 7
    pushConst 9
    leave
    return 2
end

entrypoint program
    pushConst 10
    pushConst 3
    call minus 2
    popTo d
    call pair 0
    popTo second
    popTo first
    returnVars 3 d@Int first@Int second@Int
end
%%
";
    match agree(text, Board::new(1, 1).unwrap()) {
        Outcome::Done(bindings, _) => assert_eq!(
            bindings,
            vec![int("d", 7), int("first", 7), int("second", 9)]
        ),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn jump_if_not_in_over_colors() {
    if !native_available() {
        return;
    }
    for color in ["Blue", "Black", "Red", "Green"] {
        let text = format!(
            "\
GBO/1.0
entrypoint program
    pushConst {color}
    jumpIfNotIn other Red Green
    pushConst True
    popTo hit
    returnVars 1 hit@Bool
    label other
    pushConst False
    popTo hit
    returnVars 1 hit@Bool
end
%%
"
        );
        let expected = matches!(color, "Red" | "Green");
        match agree(&text, Board::new(1, 1).unwrap()) {
            Outcome::Done(bindings, _) => {
                assert_eq!(bindings, vec![("hit".to_string(), Value::Bool(expected))])
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[test]
fn loop_fills_a_row() {
    if !native_available() {
        return;
    }
    let text = "\
GBO/1.0
entrypoint program
    label top
    pushConst Black
    call PutStone 1
    pushConst East
    call canMove 1
    jumpIfFalse done
    pushConst East
    call Move 1
    jump top
    label done
    pushConst West
    call GoToBoundary 1
    pushConst Black
    call existStones 1
    popTo any
    returnVars 1 any@Bool
end
%%
";
    match agree(text, Board::new(5, 2).unwrap()) {
        Outcome::Done(bindings, board) => {
            assert_eq!(bindings, vec![("any".to_string(), Value::Bool(true))]);
            assert_eq!(board.head(), (0, 0));
            assert_eq!(board.total_stones(), 5);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn enumeration_builtins() {
    if !native_available() {
        return;
    }
    let text = "\
GBO/1.0
entrypoint program
    call maxColor 0
    call next@Color 1
    popTo c
    call minDir 0
    call opposite@Dir 1
    call prev@Dir 1
    popTo d
    pushConst 4
    call unary-@Int 1
    popTo n
    pushConst False
    call next@Bool 1
    popTo b
    returnVars 4 c@Color d@Dir n@Int b@Bool
end
%%
";
    match agree(text, Board::new(1, 1).unwrap()) {
        Outcome::Done(bindings, _) => assert_eq!(
            bindings,
            vec![
                ("c".to_string(), Value::Color(Color::Blue)),
                ("d".to_string(), Value::Dir(gbs_common::Direction::East)),
                int("n", -4),
                ("b".to_string(), Value::Bool(true)),
            ]
        ),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn clear_board_and_go_to_origin() {
    if !native_available() {
        return;
    }
    let text = "\
GBO/1.0
entrypoint program
    pushConst Red
    call PutStone 1
    pushConst North
    call GoToBoundary 1
    pushConst Green
    call PutStone 1
    call ClearBoard 0
    call GoToOrigin 0
    return 0
end
%%
";
    let mut start = Board::with_head(3, 4, 1, 1).unwrap();
    start.put(Color::Blue, 3);
    match agree(text, start) {
        Outcome::Done(_, board) => assert_eq!(board, Board::new(3, 4).unwrap()),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn linked_module_routines() {
    if !native_available() {
        return;
    }
    let library = read_object(
        "\
GBO/1.0
function Double x
    enter
    pushConst Blue
    call PutStone 1
    pushFrom x
    pushFrom x
    call + 2
    leave
    return 1
end

procedure Paint c
    pushFrom c
    call PutStone 1
    pushConst North
    call Move 1
    return 0
end
%%
",
    )
    .unwrap()
    .with_module("lib");
    let library = Arc::new(library);

    let mut main = read_object(
        "\
GBO/1.0
entrypoint program
    pushConst 21
    call twice 1
    popTo x
    pushConst Red
    call Paint 1
    pushConst Blue
    call numStones 1
    popTo blue
    returnVars 2 x@Int blue@Int
end
%%
",
    )
    .unwrap();
    main.link_external("twice", Arc::clone(&library), "Double");
    main.link_external("Paint", library, "Paint");

    let expected = interpret_program(&main, Board::new(2, 2).unwrap());
    let actual = run_native_program(&main, Board::new(2, 2).unwrap());
    assert_eq!(actual, expected);
    match actual {
        Outcome::Done(bindings, board) => {
            assert_eq!(bindings, vec![int("x", 42), int("blue", 0)]);
            assert_eq!(board.head(), (0, 1));
            assert_eq!(board.cell(0, 0).map(|c| c.count(Color::Red)), Some(1));
            assert_eq!(board.total_stones(), 1);
        }
        other => panic!("unexpected {other:?}"),
    }
}

// ============================================================
// Faults
// ============================================================

#[test]
fn take_from_empty_cell() {
    if !native_available() {
        return;
    }
    let text = "\
GBO/1.0
entrypoint program
    pushConst Black
    call TakeStone 1
    return 0
end
%%
";
    assert_eq!(
        agree(text, Board::new(2, 2).unwrap()),
        Outcome::Failed("Cannot take 1 stone(s) of color Black: only 0 present".to_string())
    );
}

#[test]
fn uninitialized_variable() {
    if !native_available() {
        return;
    }
    let text = "\
GBO/1.0
entrypoint program
    pushConst 1
    popTo x
    delVar x
    pushFrom x
    popTo y
    returnVars 1 y@Int
end
%%
";
    assert_eq!(
        agree(text, Board::new(1, 1).unwrap()),
        Outcome::Failed("Uninitialized variable \"x\"".to_string())
    );
}

#[test]
fn explicit_throw_and_arithmetic_faults() {
    if !native_available() {
        return;
    }
    let throw = "GBO/1.0\nentrypoint program\n    THROW_ERROR \"boom; said the program\"\nend\n%%\n";
    assert_eq!(
        agree(throw, Board::new(1, 1).unwrap()),
        Outcome::Failed("boom; said the program".to_string())
    );

    for (op, b, message) in [
        ("div", 0, "Division by zero"),
        ("mod", 0, "Division by zero"),
        ("^", -1, "Negative exponent"),
    ] {
        let text = format!(
            "GBO/1.0\nentrypoint program\n    pushConst 3\n    pushConst {b}\n    call {op} 2\n    popTo r\n    returnVars 1 r@Int\nend\n%%\n"
        );
        assert_eq!(
            agree(&text, Board::new(1, 1).unwrap()),
            Outcome::Failed(message.to_string())
        );
    }
}

#[test]
fn fault_leaves_the_board_alone() {
    if !native_available() {
        return;
    }
    let text = "\
GBO/1.0
entrypoint program
    pushConst Red
    call PutStone 1
    THROW_ERROR \"stop\"
end
%%
";
    let program = read_object(text).unwrap();
    let function = compile_native(&program).unwrap();
    let mut board = Board::new(2, 2).unwrap();
    let err = function.run(&mut board).unwrap_err();
    assert_eq!(err, JitError::Fault { message: "stop".to_string() });
    assert_eq!(board, Board::new(2, 2).unwrap());
}

// ============================================================
// Compile-time rejections
// ============================================================

#[test]
fn untyped_polymorphic_call_is_rejected() {
    let text = "\
GBO/1.0
entrypoint program
    pushConst Red
    call next 1
    popTo c
    returnVars 1 c@Color
end
%%
";
    let program = read_object(text).unwrap();
    assert!(matches!(compile(&program), Err(JitError::Unsupported(_))));
}

#[test]
fn unbalanced_transaction_is_refused_before_running() {
    let text = "\
GBO/1.0
function f
    enter
    pushConst 100
    pushConst 5
    leave
    return 1
end

entrypoint program
    call f 0
    popTo r
    pushConst Red
    call PutStone 1
    return 0
end
%%
";
    let program = read_object(text).unwrap();
    assert!(gbs_verifier::verify(&program).is_err());
    assert_eq!(
        compile_native(&program).err(),
        Some(JitError::Rejected(vec![VerifyError::UnbalancedReturn {
            routine: "f".to_string(),
            at: 4,
            expected: 1,
            depth: 2,
        }]))
    );
}

#[test]
fn largest_integer_literal_stays_with_the_interpreter() {
    let text = "\
GBO/1.0
entrypoint program
    pushConst 9223372036854775807
    popTo x
    returnVars 1 x@Int
end
%%
";
    assert_eq!(
        interpreted(text, Board::new(1, 1).unwrap()),
        Outcome::Done(vec![int("x", i64::MAX)], Board::new(1, 1).unwrap())
    );
    let program = read_object(text).unwrap();
    assert!(matches!(compile(&program), Err(JitError::Unsupported(_))));
}

#[test]
fn compiled_function_can_run_twice() {
    if !native_available() {
        return;
    }
    let program = read_object(FACTORIAL).unwrap();
    let function = compile_native(&program).unwrap();
    for _ in 0..2 {
        let mut board = Board::new(1, 1).unwrap();
        assert_eq!(function.run(&mut board).unwrap(), vec![int("r", 3_628_800)]);
    }
}

// ============================================================
// Property tests
// ============================================================

fn arithmetic_program(op: &str, a: i64, b: i64) -> String {
    format!(
        "GBO/1.0\nentrypoint program\n    pushConst {a}\n    pushConst {b}\n    call {op} 2\n    popTo r\n    returnVars 1 r@Int\nend\n%%\n"
    )
}

proptest! {
    /// Floor division, modulo and friends agree on every operand pair,
    /// including the ones that fault.
    #[test]
    fn arithmetic_agrees(
        op in prop::sample::select(vec!["+", "-", "*", "div", "mod", "^"]),
        a in prop_oneof![-1000i64..1000, Just(i64::MIN), Just(i64::MAX - 1)],
        b in prop_oneof![-20i64..20, Just(-1i64), Just(i64::MIN)],
    ) {
        if !native_available() {
            return Ok(());
        }
        let text = arithmetic_program(op, a, b);
        let expected = interpreted(&text, Board::new(1, 1).unwrap());
        // A computed i64::MAX is the native unassigned marker.
        if let Outcome::Done(bindings, _) = &expected {
            if bindings == &vec![int("r", i64::MAX)] {
                return Ok(());
            }
        }
        let actual = native(&text, Board::new(1, 1).unwrap());
        prop_assert_eq!(actual, expected);
    }

    /// Relational operators agree on integers.
    #[test]
    fn comparisons_agree(
        op in prop::sample::select(vec!["==", "/=", "<", "<=", ">=", ">"]),
        a in -5i64..5,
        b in -5i64..5,
    ) {
        if !native_available() {
            return Ok(());
        }
        let text = format!(
            "GBO/1.0\nentrypoint program\n    pushConst {a}\n    pushConst {b}\n    call {op} 2\n    popTo r\n    returnVars 1 r@Bool\nend\n%%\n"
        );
        let expected = interpreted(&text, Board::new(1, 1).unwrap());
        let actual = native(&text, Board::new(1, 1).unwrap());
        prop_assert_eq!(actual, expected);
    }
}
