//! Verbose and compact spellings of opcodes and routine headers.

use gbs_common::RoutineKind;

/// `(verbose, compact)` opcode spellings.
const OPCODES: [(&str, &str); 16] = [
    ("pushConst", "p"),
    ("pushFrom", "v"),
    ("popTo", "a"),
    ("call", "c"),
    ("THROW_ERROR", "b"),
    ("label", "l"),
    ("jump", "j"),
    ("jumpIfFalse", "f"),
    ("jumpIfNotIn", "n"),
    ("return", "r"),
    ("returnVars", "x"),
    ("enter", "e"),
    ("leave", "z"),
    ("delVar", "d"),
    ("setImmutable", "s"),
    ("unsetImmutable", "u"),
];

const KINDS: [(RoutineKind, &str); 3] = [
    (RoutineKind::Procedure, "P"),
    (RoutineKind::Function, "F"),
    (RoutineKind::Entrypoint, "E"),
];

pub(crate) const END: &str = "end";
pub(crate) const END_COMPACT: &str = "X";
pub(crate) const HEADER: &str = "GBO/1.0";
pub(crate) const TERMINATOR: &str = "%%";

/// Verbose mnemonic for either spelling of an opcode.
pub(crate) fn canonical_opcode(word: &str) -> Option<&'static str> {
    OPCODES
        .iter()
        .find(|(verbose, compact)| *verbose == word || *compact == word)
        .map(|(verbose, _)| *verbose)
}

pub(crate) fn compact_opcode(verbose: &'static str) -> &'static str {
    OPCODES
        .iter()
        .find(|(v, _)| *v == verbose)
        .map(|(_, compact)| *compact)
        .unwrap_or(verbose)
}

/// Routine kind for either spelling of a header keyword.
pub(crate) fn routine_kind(word: &str) -> Option<RoutineKind> {
    RoutineKind::from_keyword(word).or_else(|| {
        KINDS
            .iter()
            .find(|(_, compact)| *compact == word)
            .map(|(kind, _)| *kind)
    })
}

pub(crate) fn compact_kind(kind: RoutineKind) -> &'static str {
    KINDS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, compact)| *compact)
        .unwrap_or("P")
}

pub(crate) fn is_end(word: &str) -> bool {
    word == END || word == END_COMPACT
}
