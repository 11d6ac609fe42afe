//! Reader for `GBO/1.0` object text.
//!
//! Accepts verbose and compact spellings interchangeably, line by line.

use crate::error::AsmError;
use crate::lexer::{quote, tokenize_line, Token};
use crate::mnemonic::{self, canonical_opcode, is_end, routine_kind};
use gbs_common::{CompiledProgram, Instruction, Routine, Value};
use std::collections::HashSet;

/// Non-blank lines of the object, tokenized on demand.
struct Lines<'a> {
    inner: std::iter::Enumerate<std::str::Lines<'a>>,
    last: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.lines().enumerate(),
            last: 0,
        }
    }

    /// Next line with at least one token, with its 1-based number.
    fn next_tokens(&mut self) -> Result<Option<(usize, Vec<Token>)>, AsmError> {
        for (idx, line) in self.inner.by_ref() {
            let line_num = idx + 1;
            self.last = line_num;
            let tokens = tokenize_line(line, line_num)?;
            if !tokens.is_empty() {
                return Ok(Some((line_num, tokens)));
            }
        }
        Ok(None)
    }

    fn eof(&self, expected: &'static str) -> AsmError {
        AsmError::UnexpectedEof {
            line: self.last,
            expected,
        }
    }
}

/// Routine names may carry the verbose mangler's leading `$`.
fn unmangle(name: &str) -> &str {
    name.strip_prefix('$').unwrap_or(name)
}

/// Parse a whole object into a program.
pub(crate) fn parse_object(text: &str) -> Result<CompiledProgram, AsmError> {
    let mut lines = Lines::new(text);

    let (line, header) = lines
        .next_tokens()?
        .ok_or_else(|| lines.eof("header line \"GBO/1.0\""))?;
    if !matches!(header.as_slice(), [Token::Word(w)] if w == mnemonic::HEADER) {
        let found = header.iter().map(Token::text).collect::<Vec<_>>().join(" ");
        return Err(AsmError::MissingHeader { line, found });
    }

    let mut routines = Vec::new();
    let mut seen = HashSet::new();
    loop {
        let (line, tokens) = lines
            .next_tokens()?
            .ok_or_else(|| lines.eof(mnemonic::TERMINATOR))?;
        if tokens[0].text() == mnemonic::TERMINATOR {
            expect_end(&tokens[1..], line)?;
            break;
        }
        let routine = parse_routine(line, &tokens, &mut lines)?;
        if !seen.insert(routine.name.clone()) {
            return Err(AsmError::DuplicateRoutine {
                line,
                name: routine.name,
            });
        }
        routines.push(routine);
    }

    CompiledProgram::new(routines).map_err(|source| AsmError::Load {
        line: lines.last,
        source,
    })
}

/// Parse a routine header at `line` and its body up to `end`.
fn parse_routine(
    line: usize,
    header: &[Token],
    lines: &mut Lines<'_>,
) -> Result<Routine, AsmError> {
    let keyword = word(header, 0, line, "routine header", 2)?;
    let kind = routine_kind(keyword).ok_or_else(|| AsmError::UnknownRoutineKind {
        line,
        token: keyword.to_string(),
    })?;
    let name = unmangle(word(header, 1, line, "routine header", 2)?).to_string();
    let params = (2..header.len())
        .map(|i| word(header, i, line, "routine header", i + 1).map(str::to_string))
        .collect::<Result<Vec<_>, _>>()?;

    let mut code = Vec::new();
    loop {
        let (op_line, tokens) = lines.next_tokens()?.ok_or_else(|| lines.eof(mnemonic::END))?;
        if is_end(tokens[0].text()) {
            expect_end(&tokens[1..], op_line)?;
            break;
        }
        code.push(parse_op(op_line, &tokens)?);
    }

    Routine::new(kind, name, params, code).map_err(|source| AsmError::Load { line, source })
}

/// Parse one op line into an instruction.
pub(crate) fn parse_op(line: usize, tokens: &[Token]) -> Result<Instruction, AsmError> {
    let first = tokens[0].text();
    let op = canonical_opcode(first).ok_or_else(|| AsmError::UnknownOpcode {
        line,
        token: first.to_string(),
    })?;
    let args = &tokens[1..];

    let instr = match op {
        "pushConst" => {
            let literal = word(args, 0, line, op, 1)?;
            expect_end(&args[1..], line)?;
            Instruction::PushConst(constant(literal, line)?)
        }
        "pushFrom" | "popTo" | "delVar" | "setImmutable" | "unsetImmutable" => {
            let name = word(args, 0, line, op, 1)?.to_string();
            expect_end(&args[1..], line)?;
            match op {
                "pushFrom" => Instruction::PushVar(name),
                "popTo" => Instruction::PopVar(name),
                "delVar" => Instruction::DeleteVar(name),
                "setImmutable" => Instruction::SetImmutable(name),
                _ => Instruction::ClearImmutable(name),
            }
        }
        "call" => {
            let name = unmangle(word(args, 0, line, op, 2)?).to_string();
            let argc = count(args, 1, line, op, 2)?;
            expect_end(&args[2..], line)?;
            Instruction::Call { name, argc }
        }
        "THROW_ERROR" => {
            let message = args
                .first()
                .map(|t| t.text().to_string())
                .ok_or(AsmError::MissingArgument {
                    line,
                    opcode: op,
                    expected: 1,
                })?;
            expect_end(&args[1..], line)?;
            Instruction::Throw(message)
        }
        "label" | "jump" | "jumpIfFalse" => {
            let label = word(args, 0, line, op, 1)?.to_string();
            expect_end(&args[1..], line)?;
            match op {
                "label" => Instruction::Label(label),
                "jump" => Instruction::Jump(label),
                _ => Instruction::JumpIfFalse(label),
            }
        }
        "jumpIfNotIn" => {
            let label = word(args, 0, line, op, 1)?.to_string();
            let values = (1..args.len())
                .map(|i| constant(word(args, i, line, op, i + 1)?, line))
                .collect::<Result<Vec<_>, _>>()?;
            Instruction::JumpIfNotIn { values, label }
        }
        "return" => {
            let n = count(args, 0, line, op, 1)?;
            expect_end(&args[1..], line)?;
            Instruction::Return(n)
        }
        "returnVars" => {
            let n = count(args, 0, line, op, 1)?;
            let names = (1..args.len())
                .map(|i| word(args, i, line, op, i + 1).map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?;
            Instruction::ReturnNamed { n, names }
        }
        "enter" => {
            expect_end(args, line)?;
            Instruction::Enter
        }
        _ => {
            expect_end(args, line)?;
            Instruction::Leave
        }
    };
    Ok(instr)
}

/// The bare word at `idx`; strings are rejected.
fn word<'t>(
    tokens: &'t [Token],
    idx: usize,
    line: usize,
    opcode: &'static str,
    expected: usize,
) -> Result<&'t str, AsmError> {
    match tokens.get(idx) {
        Some(Token::Word(w)) => Ok(w),
        Some(Token::Str(s)) => Err(AsmError::UnexpectedToken {
            line,
            token: quote(s),
        }),
        None => Err(AsmError::MissingArgument {
            line,
            opcode,
            expected,
        }),
    }
}

fn count(
    tokens: &[Token],
    idx: usize,
    line: usize,
    opcode: &'static str,
    expected: usize,
) -> Result<usize, AsmError> {
    let text = word(tokens, idx, line, opcode, expected)?;
    text.parse().map_err(|_| AsmError::InvalidNumber {
        line,
        token: text.to_string(),
    })
}

fn constant(text: &str, line: usize) -> Result<Value, AsmError> {
    Value::parse_literal(text).ok_or_else(|| AsmError::UnknownConstant {
        line,
        token: text.to_string(),
    })
}

/// Verify no extra tokens remain.
fn expect_end(tokens: &[Token], line: usize) -> Result<(), AsmError> {
    match tokens.first() {
        None => Ok(()),
        Some(Token::Word(w)) => Err(AsmError::UnexpectedToken {
            line,
            token: w.clone(),
        }),
        Some(Token::Str(s)) => Err(AsmError::UnexpectedToken {
            line,
            token: quote(s),
        }),
    }
}
