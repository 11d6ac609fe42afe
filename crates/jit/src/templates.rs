//! Inline machine-code templates for the builtin operations.
//!
//! Every template consumes its arguments from the native stack and pushes
//! the result, if any, so a builtin call costs no `call`. Faults jump to
//! the interned stub for their message, which matches the interpreter's.

use crate::asm::Inst::*;
use crate::codegen::Emitter;
use crate::error::JitError;
use crate::x64::{AluOp, Cond, Gpr, Mem};
use gbs_common::{BoardError, ALL_COLORS, ALL_DIRECTIONS};

use Gpr::{Rax, Rbx, Rcx, Rdx, R10, R11, R12, R13, R14, R9};

/// Inline the builtin `name`. Returns `Unsupported` for builtins without a
/// native template, including untyped polymorphic names.
pub fn emit_builtin(em: &mut Emitter, name: &str) -> Result<(), JitError> {
    match name {
        // ---- Board ----
        "PutStone" => put_stone(em),
        "TakeStone" => take_stone(em),
        "Move" => move_head(em),
        "GoToBoundary" => go_to_boundary(em),
        "GoToOrigin" => {
            em.emit(Alu(AluOp::Xor, R11, R11));
            em.emit(Alu(AluOp::Xor, R12, R12));
        }
        "ClearBoard" => clear_board(em),
        "numStones" => {
            em.emit(Pop(Rcx));
            cell_address(em);
            em.emit(Load32(Rax, Mem::base(Rax)));
            em.emit(Push(Rax));
        }
        "existStones" => {
            em.emit(Pop(Rcx));
            cell_address(em);
            em.emit(Load32(Rax, Mem::base(Rax)));
            em.emit(TestRR(Rax, Rax));
            push_flag(em, Cond::NE);
        }
        "canMove" => can_move(em),

        // ---- Enumeration bounds ----
        "minBool" | "minColor" | "minDir" => em.emit(PushImm(0)),
        "maxBool" => em.emit(PushImm(1)),
        "maxColor" | "maxDir" => em.emit(PushImm(3)),

        // ---- Typed polymorphic ----
        "next@Int" => unary(em, &[AluRI(AluOp::Add, Rax, 1)]),
        "prev@Int" => unary(em, &[AluRI(AluOp::Sub, Rax, 1)]),
        "next@Bool" | "prev@Bool" | "opposite@Bool" | "not" => {
            unary(em, &[AluRI(AluOp::Xor, Rax, 1)])
        }
        "next@Color" | "next@Dir" => {
            unary(em, &[AluRI(AluOp::Add, Rax, 1), AluRI(AluOp::And, Rax, 3)])
        }
        "prev@Color" | "prev@Dir" => {
            unary(em, &[AluRI(AluOp::Add, Rax, 3), AluRI(AluOp::And, Rax, 3)])
        }
        "opposite@Int" | "unary-@Int" => unary(em, &[Neg(Rax)]),
        "opposite@Dir" | "unary-@Dir" => {
            unary(em, &[AluRI(AluOp::Add, Rax, 2), AluRI(AluOp::And, Rax, 3)])
        }
        "next" | "prev" | "opposite" | "unary-" => {
            return Err(JitError::Unsupported(format!(
                "untyped polymorphic builtin \"{name}\""
            )))
        }

        // ---- Relational ----
        "==" => compare(em, Cond::E),
        "/=" => compare(em, Cond::NE),
        "<" => compare(em, Cond::L),
        "<=" => compare(em, Cond::LE),
        ">=" => compare(em, Cond::GE),
        ">" => compare(em, Cond::G),

        // ---- Logical and arithmetic ----
        "&&" => binary(em, Alu(AluOp::And, Rax, Rcx)),
        "||" => binary(em, Alu(AluOp::Or, Rax, Rcx)),
        "+" => binary(em, Alu(AluOp::Add, Rax, Rcx)),
        "-" => binary(em, Alu(AluOp::Sub, Rax, Rcx)),
        "*" => binary(em, Imul(Rax, Rcx)),
        "^" => power(em),
        "div" => floor_division(em, Quotient::Div),
        "mod" => floor_division(em, Quotient::Mod),

        _ => {
            return Err(JitError::Unsupported(format!(
                "builtin \"{name}\" has no native template"
            )))
        }
    }
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

/// `rax` = address of the head cell's counter for the color in `rcx`,
/// taken modulo 4 so the address stays inside the cell.
/// `rcx` is preserved.
fn cell_address(em: &mut Emitter) {
    em.emit(MovRR(Rax, R13));
    em.emit(Imul(Rax, R12));
    em.emit(Alu(AluOp::Add, Rax, R11));
    em.emit(Shl(Rax, 4));
    em.emit(Alu(AluOp::Add, Rax, Rbx));
    em.emit(MovRR(Rdx, Rcx));
    em.emit(AluRI(AluOp::And, Rdx, 3));
    em.emit(Shl(Rdx, 2));
    em.emit(Alu(AluOp::Add, Rax, Rdx));
}

/// Push 1 if `cond` holds on the current flags, else 0.
fn push_flag(em: &mut Emitter, cond: Cond) {
    em.emit(Setcc(cond, Rax));
    em.emit(MovzxB(Rax, Rax));
    em.emit(Push(Rax));
}

/// Dispatch on an enumeration index in `reg` (0..=3). Every arm falls
/// through to a common exit.
fn switch4(em: &mut Emitter, reg: Gpr, mut arm: impl FnMut(&mut Emitter, usize)) {
    let cases = [em.label(), em.label(), em.label(), em.label()];
    let done = em.label();
    for (i, case) in cases.iter().take(3).enumerate() {
        em.emit(AluRI(AluOp::Cmp, reg, i as i32));
        em.emit(Jcc(Cond::E, *case));
    }
    em.emit(Jmp(cases[3]));
    for (i, case) in cases.into_iter().enumerate() {
        em.bind(case);
        arm(em, i);
        em.emit(Jmp(done));
    }
    em.bind(done);
}

fn unary(em: &mut Emitter, body: &[crate::asm::Inst]) {
    em.emit(Pop(Rax));
    for inst in body {
        em.emit(*inst);
    }
    em.emit(Push(Rax));
}

/// `rax op= rcx` with `rcx` the top of stack and `rax` the one beneath.
fn binary(em: &mut Emitter, op: crate::asm::Inst) {
    em.emit(Pop(Rcx));
    em.emit(Pop(Rax));
    em.emit(op);
    em.emit(Push(Rax));
}

fn compare(em: &mut Emitter, cond: Cond) {
    em.emit(Pop(Rcx));
    em.emit(Pop(Rax));
    em.emit(Alu(AluOp::Cmp, Rax, Rcx));
    push_flag(em, cond);
}

// =============================================================================
// Board
// =============================================================================

fn put_stone(em: &mut Emitter) {
    em.emit(Pop(Rcx));
    cell_address(em);
    em.emit(Load32(Rdx, Mem::base(Rax)));
    em.emit(AluRI(AluOp::Add, Rdx, 1));
    em.emit(Store32(Mem::base(Rax), Rdx));
}

fn take_stone(em: &mut Emitter) {
    let ok = em.label();
    em.emit(Pop(Rcx));
    cell_address(em);
    em.emit(Load32(Rdx, Mem::base(Rax)));
    em.emit(TestRR(Rdx, Rdx));
    em.emit(Jcc(Cond::NE, ok));
    switch4(em, Rcx, |em, i| {
        let boom = em.boom(&BoardError::cannot_take(ALL_COLORS[i], 1, 0).to_string());
        em.emit(Jmp(boom));
    });
    em.bind(ok);
    em.emit(AluRI(AluOp::Sub, Rdx, 1));
    em.emit(Store32(Mem::base(Rax), Rdx));
}

fn move_head(em: &mut Emitter) {
    em.emit(Pop(Rcx));
    switch4(em, Rcx, |em, i| {
        let direction = ALL_DIRECTIONS[i];
        let boom = em.boom(&BoardError::cannot_move(direction).to_string());
        match i {
            // North and East: coordinate + 1 must stay below the bound
            0 | 1 => {
                let (coord, bound) = if i == 0 { (R12, R14) } else { (R11, R13) };
                em.emit(MovRR(Rax, coord));
                em.emit(AluRI(AluOp::Add, Rax, 1));
                em.emit(Alu(AluOp::Cmp, Rax, bound));
                em.emit(Jcc(Cond::GE, boom));
                em.emit(MovRR(coord, Rax));
            }
            _ => {
                let coord = if i == 2 { R12 } else { R11 };
                em.emit(TestRR(coord, coord));
                em.emit(Jcc(Cond::E, boom));
                em.emit(AluRI(AluOp::Sub, coord, 1));
            }
        }
    });
}

fn go_to_boundary(em: &mut Emitter) {
    em.emit(Pop(Rcx));
    switch4(em, Rcx, |em, i| match i {
        0 => {
            em.emit(MovRR(R12, R14));
            em.emit(AluRI(AluOp::Sub, R12, 1));
        }
        1 => {
            em.emit(MovRR(R11, R13));
            em.emit(AluRI(AluOp::Sub, R11, 1));
        }
        2 => em.emit(Alu(AluOp::Xor, R12, R12)),
        _ => em.emit(Alu(AluOp::Xor, R11, R11)),
    });
}

fn can_move(em: &mut Emitter) {
    em.emit(Pop(Rcx));
    switch4(em, Rcx, |em, i| match i {
        0 | 1 => {
            let (coord, bound) = if i == 0 { (R12, R14) } else { (R11, R13) };
            em.emit(MovRR(Rax, coord));
            em.emit(AluRI(AluOp::Add, Rax, 1));
            em.emit(Alu(AluOp::Cmp, Rax, bound));
            em.emit(Setcc(Cond::L, Rax));
        }
        _ => {
            let coord = if i == 2 { R12 } else { R11 };
            em.emit(TestRR(coord, coord));
            em.emit(Setcc(Cond::NE, Rax));
        }
    });
    em.emit(MovzxB(Rax, Rax));
    em.emit(Push(Rax));
}

fn clear_board(em: &mut Emitter) {
    let top = em.label();
    let done = em.label();
    em.emit(MovRR(Rax, R13));
    em.emit(Imul(Rax, R14));
    em.emit(Shl(Rax, 4));
    em.emit(MovRR(Rdx, Rbx));
    em.emit(MovRR(R10, Rbx));
    em.emit(Alu(AluOp::Add, R10, Rax));
    em.emit(Alu(AluOp::Xor, Rcx, Rcx));
    em.bind(top);
    em.emit(Alu(AluOp::Cmp, Rdx, R10));
    em.emit(Jcc(Cond::AE, done));
    em.emit(Store(Mem::base(Rdx), Rcx));
    em.emit(AluRI(AluOp::Add, Rdx, 8));
    em.emit(Jmp(top));
    em.bind(done);
}

// =============================================================================
// Arithmetic
// =============================================================================

/// Square-and-multiply; products wrap.
fn power(em: &mut Emitter) {
    let negative = em.boom("Negative exponent");
    let top = em.label();
    let skip = em.label();
    let done = em.label();
    em.emit(Pop(Rcx));
    em.emit(Pop(R9));
    em.emit(AluRI(AluOp::Cmp, Rcx, 0));
    em.emit(Jcc(Cond::L, negative));
    em.emit(MovRI(Rax, 1));
    em.bind(top);
    em.emit(TestRR(Rcx, Rcx));
    em.emit(Jcc(Cond::E, done));
    em.emit(MovRR(Rdx, Rcx));
    em.emit(AluRI(AluOp::And, Rdx, 1));
    em.emit(Jcc(Cond::E, skip));
    em.emit(Imul(Rax, R9));
    em.bind(skip);
    em.emit(Imul(R9, R9));
    em.emit(Shr(Rcx, 1));
    em.emit(Jmp(top));
    em.bind(done);
    em.emit(Push(Rax));
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quotient {
    Div,
    Mod,
}

/// Division rounded toward negative infinity. A divisor of -1 is handled
/// apart since `idiv` traps on `MIN / -1`.
fn floor_division(em: &mut Emitter, which: Quotient) {
    let by_zero = em.boom("Division by zero");
    let normal = em.label();
    let exact = em.label();
    let end = em.label();

    em.emit(Pop(Rcx));
    em.emit(Pop(Rax));
    em.emit(TestRR(Rcx, Rcx));
    em.emit(Jcc(Cond::E, by_zero));
    em.emit(AluRI(AluOp::Cmp, Rcx, -1));
    em.emit(Jcc(Cond::NE, normal));
    match which {
        Quotient::Div => {
            em.emit(Neg(Rax));
            em.emit(Push(Rax));
        }
        Quotient::Mod => em.emit(PushImm(0)),
    }
    em.emit(Jmp(end));

    em.bind(normal);
    em.emit(Cqo);
    em.emit(Idiv(Rcx));
    // a nonzero remainder whose sign differs from the divisor's
    em.emit(TestRR(Rdx, Rdx));
    em.emit(Jcc(Cond::E, exact));
    em.emit(MovRR(R9, Rdx));
    em.emit(Alu(AluOp::Xor, R9, Rcx));
    em.emit(AluRI(AluOp::Cmp, R9, 0));
    em.emit(Jcc(Cond::GE, exact));
    match which {
        Quotient::Div => em.emit(AluRI(AluOp::Sub, Rax, 1)),
        Quotient::Mod => em.emit(Alu(AluOp::Add, Rdx, Rcx)),
    }
    em.bind(exact);
    em.emit(Push(if which == Quotient::Div { Rax } else { Rdx }));
    em.bind(end);
}
