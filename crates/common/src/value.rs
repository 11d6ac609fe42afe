//! Runtime value representation shared by both engines.
//!
//! Values are what live on the operand stack and in local bindings.
//! The native backend flattens every scalar to an `i64` (see
//! [`Value::to_native`]); tuples exist only in the interpreter.

use std::cmp::Ordering;
use std::fmt;

/// One of the four stone colors, in board-cell order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Color {
    Blue = 0,
    Black = 1,
    Red = 2,
    Green = 3,
}

/// All colors in ordinal order.
pub const ALL_COLORS: [Color; 4] = [Color::Blue, Color::Black, Color::Red, Color::Green];

impl Color {
    /// Color with the given ordinal, taken modulo 4.
    pub fn from_index(index: i64) -> Self {
        ALL_COLORS[index.rem_euclid(4) as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Self {
        Self::from_index(self as i64 + 1)
    }

    pub fn prev(self) -> Self {
        Self::from_index(self as i64 - 1)
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::Blue => "Blue",
            Color::Black => "Black",
            Color::Red => "Red",
            Color::Green => "Green",
        }
    }
}

/// One of the four head directions.
///
/// North increases `y`, East increases `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

/// All directions in ordinal order.
pub const ALL_DIRECTIONS: [Direction; 4] = [
    Direction::North,
    Direction::East,
    Direction::South,
    Direction::West,
];

impl Direction {
    /// Direction with the given ordinal, taken modulo 4.
    pub fn from_index(index: i64) -> Self {
        ALL_DIRECTIONS[index.rem_euclid(4) as usize]
    }

    pub fn next(self) -> Self {
        Self::from_index(self as i64 + 1)
    }

    pub fn prev(self) -> Self {
        Self::from_index(self as i64 - 1)
    }

    pub fn opposite(self) -> Self {
        Self::from_index(self as i64 + 2)
    }

    /// Unit displacement `(dx, dy)` of one step in this direction.
    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "North",
            Direction::East => "East",
            Direction::South => "South",
            Direction::West => "West",
        }
    }
}

/// Name of a value's type, as used in `@Type` polynames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    Bool,
    Color,
    Dir,
    Tuple,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Int => "Int",
            ValueType::Bool => "Bool",
            ValueType::Color => "Color",
            ValueType::Dir => "Dir",
            ValueType::Tuple => "Tuple",
        }
    }

    /// Parse a polyname type suffix. `Direction` is accepted for `Dir`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Int" => Some(ValueType::Int),
            "Bool" => Some(ValueType::Bool),
            "Color" => Some(ValueType::Color),
            "Dir" | "Direction" => Some(ValueType::Dir),
            "Tuple" => Some(ValueType::Tuple),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Color(Color),
    Dir(Direction),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Int,
            Value::Bool(_) => ValueType::Bool,
            Value::Color(_) => ValueType::Color,
            Value::Dir(_) => ValueType::Dir,
            Value::Tuple(_) => ValueType::Tuple,
        }
    }

    /// Compare two values of the same type.
    ///
    /// Returns `None` when the tags differ; relational builtins turn that
    /// into a type error. Tuples compare lexicographically.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Color(a), Value::Color(b)) => Some(a.cmp(b)),
            (Value::Dir(a), Value::Dir(b)) => Some(a.cmp(b)),
            (Value::Tuple(a), Value::Tuple(b)) => {
                if a.len() != b.len() {
                    return None;
                }
                for (x, y) in a.iter().zip(b) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        unequal => return Some(unequal),
                    }
                }
                Some(Ordering::Equal)
            }
            _ => None,
        }
    }

    /// Flatten a scalar to its native word. Tuples have no native form.
    pub fn to_native(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            Value::Color(c) => Some(*c as i64),
            Value::Dir(d) => Some(*d as i64),
            Value::Tuple(_) => None,
        }
    }

    /// Rebuild a scalar from its native word.
    pub fn from_native(word: i64, ty: ValueType) -> Option<Value> {
        match ty {
            ValueType::Int => Some(Value::Int(word)),
            ValueType::Bool => Some(Value::Bool(word != 0)),
            ValueType::Color => Some(Value::Color(Color::from_index(word))),
            ValueType::Dir => Some(Value::Dir(Direction::from_index(word))),
            ValueType::Tuple => None,
        }
    }

    /// Parse a literal as written in object files and on the command line.
    pub fn parse_literal(text: &str) -> Option<Value> {
        let text = text.trim();
        if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            if inner.trim().is_empty() {
                return Some(Value::Tuple(Vec::new()));
            }
            return split_tuple(inner)
                .into_iter()
                .map(Value::parse_literal)
                .collect::<Option<Vec<_>>>()
                .map(Value::Tuple);
        }
        match text {
            "True" => Some(Value::Bool(true)),
            "False" => Some(Value::Bool(false)),
            "North" => Some(Value::Dir(Direction::North)),
            "East" => Some(Value::Dir(Direction::East)),
            "South" => Some(Value::Dir(Direction::South)),
            "West" => Some(Value::Dir(Direction::West)),
            "Blue" | "Color0" => Some(Value::Color(Color::Blue)),
            "Black" | "Color1" => Some(Value::Color(Color::Black)),
            "Red" | "Color2" => Some(Value::Color(Color::Red)),
            "Green" | "Color3" => Some(Value::Color(Color::Green)),
            _ => text.parse::<i64>().ok().map(Value::Int),
        }
    }
}

/// Split the inside of a tuple literal on top-level commas.
fn split_tuple(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in inner.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Color(c) => f.write_str(c.name()),
            Value::Dir(d) => f.write_str(d.name()),
            Value::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}
