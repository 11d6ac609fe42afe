//! Builtin primitives and the table the engines look them up in.
//!
//! Polymorphic operations (`next`, `prev`, `opposite`, `unary-`) are also
//! registered under typed polynames such as `next@Color`. The interpreter
//! treats both spellings alike; the native backend only accepts the typed
//! ones because it needs to know the operand's representation.

use crate::board::Board;
use crate::error::{FaultKind, PrimitiveError};
use crate::program::RoutineKind;
use crate::value::{Color, Direction, Value, ValueType};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Signature of a builtin implementation. Arguments arrive in declaration
/// order. Procedures return `None`.
pub type Primitive = fn(&mut Board, &[Value]) -> Result<Option<Value>, PrimitiveError>;

/// One builtin: its name, kind, parameter names and implementation.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub kind: RoutineKind,
    pub params: &'static [&'static str],
    pub primitive: Primitive,
}

impl Builtin {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Name-keyed builtin table.
#[derive(Debug, Clone, Default)]
pub struct BuiltinTable {
    entries: HashMap<&'static str, Builtin>,
}

/// Polymorphic builtins and the operand types they have typed instances for.
pub const POLYMORPHIC: [(&str, &[ValueType]); 4] = [
    ("next", &[ValueType::Int, ValueType::Bool, ValueType::Color, ValueType::Dir]),
    ("prev", &[ValueType::Int, ValueType::Bool, ValueType::Color, ValueType::Dir]),
    ("opposite", &[ValueType::Int, ValueType::Bool, ValueType::Dir]),
    ("unary-", &[ValueType::Int, ValueType::Dir]),
];

const X: &[&str] = &["x"];
const XY: &[&str] = &["x", "y"];
const COLOR: &[&str] = &["color"];
const DIR: &[&str] = &["dir"];
const NONE: &[&str] = &[];

impl BuiltinTable {
    /// The builtins every program can call.
    pub fn standard() -> Self {
        use RoutineKind::{Function as F, Procedure as P};

        let mut table = Self::default();
        let base: [(&'static str, RoutineKind, &'static [&'static str], Primitive); 34] = [
            ("PutStone", P, COLOR, put_stone),
            ("TakeStone", P, COLOR, take_stone),
            ("Move", P, DIR, move_head),
            ("GoToBoundary", P, DIR, go_to_boundary),
            ("GoToOrigin", P, NONE, go_to_origin),
            ("ClearBoard", P, NONE, clear_board),
            ("numStones", F, COLOR, num_stones),
            ("existStones", F, COLOR, exist_stones),
            ("canMove", F, DIR, can_move),
            ("minBool", F, NONE, |_, _| Ok(Some(Value::Bool(false)))),
            ("maxBool", F, NONE, |_, _| Ok(Some(Value::Bool(true)))),
            ("minColor", F, NONE, |_, _| Ok(Some(Value::Color(Color::Blue)))),
            ("maxColor", F, NONE, |_, _| Ok(Some(Value::Color(Color::Green)))),
            ("minDir", F, NONE, |_, _| Ok(Some(Value::Dir(Direction::North)))),
            ("maxDir", F, NONE, |_, _| Ok(Some(Value::Dir(Direction::West)))),
            ("next", F, X, next),
            ("prev", F, X, prev),
            ("opposite", F, X, opposite),
            ("unary-", F, X, negate),
            ("==", F, XY, |_, a| relational(a, Ordering::is_eq)),
            ("/=", F, XY, |_, a| relational(a, Ordering::is_ne)),
            ("<", F, XY, |_, a| relational(a, Ordering::is_lt)),
            ("<=", F, XY, |_, a| relational(a, Ordering::is_le)),
            (">=", F, XY, |_, a| relational(a, Ordering::is_ge)),
            (">", F, XY, |_, a| relational(a, Ordering::is_gt)),
            ("not", F, X, not),
            ("&&", F, XY, |_, a| logical(a, |x, y| x && y)),
            ("||", F, XY, |_, a| logical(a, |x, y| x || y)),
            ("+", F, XY, |_, a| arithmetic(a, |x, y| Ok(x.wrapping_add(y)))),
            ("-", F, XY, |_, a| arithmetic(a, |x, y| Ok(x.wrapping_sub(y)))),
            ("*", F, XY, |_, a| arithmetic(a, |x, y| Ok(x.wrapping_mul(y)))),
            ("^", F, XY, |_, a| arithmetic(a, int_pow)),
            ("div", F, XY, |_, a| arithmetic(a, floor_div)),
            ("mod", F, XY, |_, a| arithmetic(a, floor_mod)),
        ];
        for (name, kind, params, primitive) in base {
            table.insert(Builtin {
                name,
                kind,
                params,
                primitive,
            });
        }

        for (name, types) in POLYMORPHIC {
            let untyped = table.entries[name];
            for ty in types {
                let polyname: &'static str = typed_name(name, *ty);
                table.insert(Builtin {
                    name: polyname,
                    ..untyped
                });
            }
        }
        table
    }

    pub fn insert(&mut self, builtin: Builtin) {
        self.entries.insert(builtin.name, builtin);
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All builtin names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// The static polyname for a polymorphic builtin instantiated at `ty`.
fn typed_name(name: &str, ty: ValueType) -> &'static str {
    const NAMES: [[&str; 4]; 4] = [
        ["next@Int", "next@Bool", "next@Color", "next@Dir"],
        ["prev@Int", "prev@Bool", "prev@Color", "prev@Dir"],
        ["opposite@Int", "opposite@Bool", "opposite@Color", "opposite@Dir"],
        ["unary-@Int", "unary-@Bool", "unary-@Color", "unary-@Dir"],
    ];
    let row = match name {
        "next" => 0,
        "prev" => 1,
        "opposite" => 2,
        _ => 3,
    };
    let col = match ty {
        ValueType::Int => 0,
        ValueType::Bool => 1,
        ValueType::Color => 2,
        _ => 3,
    };
    NAMES[row][col]
}

// ---- Argument helpers ----

fn expect_color(args: &[Value], op: &str) -> Result<Color, PrimitiveError> {
    match args.first() {
        Some(Value::Color(c)) => Ok(*c),
        _ => Err(PrimitiveError::type_mismatch(format!(
            "The argument to {op} should be a color"
        ))),
    }
}

fn expect_dir(args: &[Value], op: &str) -> Result<Direction, PrimitiveError> {
    match args.first() {
        Some(Value::Dir(d)) => Ok(*d),
        _ => Err(PrimitiveError::type_mismatch(format!(
            "The argument to {op} should be a direction"
        ))),
    }
}

fn pair(args: &[Value]) -> Result<(&Value, &Value), PrimitiveError> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(PrimitiveError::new(
            FaultKind::ArityMismatch,
            format!("expected 2 operands, received {}", args.len()),
        )),
    }
}

// ---- Board ----

fn put_stone(board: &mut Board, args: &[Value]) -> Result<Option<Value>, PrimitiveError> {
    board.put(expect_color(args, "PutStone")?, 1);
    Ok(None)
}

fn take_stone(board: &mut Board, args: &[Value]) -> Result<Option<Value>, PrimitiveError> {
    board.take(expect_color(args, "TakeStone")?, 1)?;
    Ok(None)
}

fn move_head(board: &mut Board, args: &[Value]) -> Result<Option<Value>, PrimitiveError> {
    board.move_head(expect_dir(args, "Move")?, 1)?;
    Ok(None)
}

fn go_to_boundary(board: &mut Board, args: &[Value]) -> Result<Option<Value>, PrimitiveError> {
    board.go_to_boundary(expect_dir(args, "GoToBoundary")?);
    Ok(None)
}

fn go_to_origin(board: &mut Board, _args: &[Value]) -> Result<Option<Value>, PrimitiveError> {
    board.go_to_origin();
    Ok(None)
}

fn clear_board(board: &mut Board, _args: &[Value]) -> Result<Option<Value>, PrimitiveError> {
    board.clear();
    Ok(None)
}

fn num_stones(board: &mut Board, args: &[Value]) -> Result<Option<Value>, PrimitiveError> {
    let color = expect_color(args, "numStones")?;
    Ok(Some(Value::Int(board.num_stones(color) as i64)))
}

fn exist_stones(board: &mut Board, args: &[Value]) -> Result<Option<Value>, PrimitiveError> {
    let color = expect_color(args, "existStones")?;
    Ok(Some(Value::Bool(board.exist_stones(color))))
}

fn can_move(board: &mut Board, args: &[Value]) -> Result<Option<Value>, PrimitiveError> {
    let dir = expect_dir(args, "canMove")?;
    Ok(Some(Value::Bool(board.can_move(dir))))
}

// ---- Enumerations ----

fn next(_: &mut Board, args: &[Value]) -> Result<Option<Value>, PrimitiveError> {
    let value = match args.first() {
        Some(Value::Int(n)) => Value::Int(n.wrapping_add(1)),
        Some(Value::Bool(b)) => Value::Bool(!b),
        Some(Value::Color(c)) => Value::Color(c.next()),
        Some(Value::Dir(d)) => Value::Dir(d.next()),
        _ => return Err(PrimitiveError::type_mismatch("The argument to next should be a scalar")),
    };
    Ok(Some(value))
}

fn prev(_: &mut Board, args: &[Value]) -> Result<Option<Value>, PrimitiveError> {
    let value = match args.first() {
        Some(Value::Int(n)) => Value::Int(n.wrapping_sub(1)),
        Some(Value::Bool(b)) => Value::Bool(!b),
        Some(Value::Color(c)) => Value::Color(c.prev()),
        Some(Value::Dir(d)) => Value::Dir(d.prev()),
        _ => return Err(PrimitiveError::type_mismatch("The argument to prev should be a scalar")),
    };
    Ok(Some(value))
}

fn opposite(_: &mut Board, args: &[Value]) -> Result<Option<Value>, PrimitiveError> {
    let value = match args.first() {
        Some(Value::Int(n)) => Value::Int(n.wrapping_neg()),
        Some(Value::Bool(b)) => Value::Bool(!b),
        Some(Value::Dir(d)) => Value::Dir(d.opposite()),
        _ => {
            return Err(PrimitiveError::type_mismatch(
                "The argument to opposite should be a direction or an integer",
            ))
        }
    };
    Ok(Some(value))
}

fn negate(_: &mut Board, args: &[Value]) -> Result<Option<Value>, PrimitiveError> {
    let value = match args.first() {
        Some(Value::Int(n)) => Value::Int(n.wrapping_neg()),
        Some(Value::Dir(d)) => Value::Dir(d.opposite()),
        _ => {
            return Err(PrimitiveError::type_mismatch(
                "The argument to unary minus should be a direction or an integer",
            ))
        }
    };
    Ok(Some(value))
}

// ---- Operators ----

fn relational(args: &[Value], test: fn(Ordering) -> bool) -> Result<Option<Value>, PrimitiveError> {
    let (a, b) = pair(args)?;
    let ordering = a.compare(b).ok_or_else(|| {
        PrimitiveError::type_mismatch("Relational operation between values of different types")
    })?;
    Ok(Some(Value::Bool(test(ordering))))
}

fn not(_: &mut Board, args: &[Value]) -> Result<Option<Value>, PrimitiveError> {
    match args.first() {
        Some(Value::Bool(b)) => Ok(Some(Value::Bool(!b))),
        _ => Err(PrimitiveError::type_mismatch(
            "Logical operation over non-boolean values",
        )),
    }
}

fn logical(args: &[Value], op: fn(bool, bool) -> bool) -> Result<Option<Value>, PrimitiveError> {
    match pair(args)? {
        (Value::Bool(a), Value::Bool(b)) => Ok(Some(Value::Bool(op(*a, *b)))),
        _ => Err(PrimitiveError::type_mismatch(
            "Logical operation over non-boolean values",
        )),
    }
}

fn arithmetic(
    args: &[Value],
    op: fn(i64, i64) -> Result<i64, PrimitiveError>,
) -> Result<Option<Value>, PrimitiveError> {
    match pair(args)? {
        (Value::Int(a), Value::Int(b)) => Ok(Some(Value::Int(op(*a, *b)?))),
        _ => Err(PrimitiveError::type_mismatch(
            "Arithmetic operation over non-numeric values",
        )),
    }
}

/// `base ^ exp` by square-and-multiply, wrapping on overflow.
pub fn int_pow(base: i64, exp: i64) -> Result<i64, PrimitiveError> {
    if exp < 0 {
        return Err(PrimitiveError::new(
            FaultKind::NegativeExponent,
            "Negative exponent",
        ));
    }
    let (mut base, mut exp, mut acc) = (base, exp, 1i64);
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    Ok(acc)
}

fn division_by_zero() -> PrimitiveError {
    PrimitiveError::new(FaultKind::DivisionByZero, "Division by zero")
}

/// Quotient rounded toward negative infinity.
pub fn floor_div(a: i64, b: i64) -> Result<i64, PrimitiveError> {
    if b == 0 {
        return Err(division_by_zero());
    }
    let q = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

/// Remainder with the sign of the divisor.
pub fn floor_mod(a: i64, b: i64) -> Result<i64, PrimitiveError> {
    if b == 0 {
        return Err(division_by_zero());
    }
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}
