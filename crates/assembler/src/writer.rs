//! Writer for `GBO/1.0` object text, plus the name [`Mangler`].
//!
//! A program and every module it links against are flattened into one
//! object. Routines are written sorted by their mangled name.

use crate::lexer::quote;
use crate::mnemonic::{self, compact_kind, compact_opcode};
use gbs_common::{polyname_base, CompiledProgram, Instruction, Routine, RoutineKind};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    /// Indented, original names, full mnemonics.
    #[default]
    Verbose,
    /// One-letter opcodes, generated routine/variable/label names.
    Compact,
}

/// Renames routines, variables and labels for one writing session.
///
/// In verbose style, routines become `module$name` (just `$name` in the
/// root module) and everything else is kept. In compact style, routines,
/// variables and labels get short generated ids from per-session
/// counters. Builtins, the entrypoint and variables named by `returnVars`
/// keep their names in both styles.
#[derive(Debug)]
pub struct Mangler {
    style: Style,
    root: String,
    routines: HashMap<(String, String), String>,
    variables: HashMap<String, String>,
    labels: HashMap<String, String>,
    keep: HashSet<String>,
    next_routine: usize,
    next_variable: usize,
    next_label: usize,
}

/// Digits for generated ids.
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";

fn base_alpha(mut n: usize) -> String {
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(ALPHABET[n % ALPHABET.len()] as char);
        n /= ALPHABET.len();
    }
    digits.iter().rev().collect()
}

impl Mangler {
    /// A fresh session for writing the program whose module is `root`.
    pub fn new(style: Style, root: impl Into<String>) -> Self {
        Self {
            style,
            root: root.into(),
            routines: HashMap::new(),
            variables: HashMap::new(),
            labels: HashMap::new(),
            keep: HashSet::new(),
            next_routine: 0,
            next_variable: 0,
            next_label: 0,
        }
    }

    pub fn style(&self) -> Style {
        self.style
    }

    /// Mangled name for a call to `name` from inside `program`.
    pub fn routine(&mut self, program: &CompiledProgram, name: &str) -> String {
        if program.builtins().contains(name) {
            return name.to_string();
        }
        if let Some(routine) = program.routine(name) {
            let prefix = if program.module() == self.root {
                ""
            } else {
                program.module()
            };
            let verbose = format!("{prefix}${name}");
            let is_entry = routine.kind == RoutineKind::Entrypoint
                || program.entrypoint().is_some_and(|e| e.name == name);
            if self.style == Style::Verbose || is_entry {
                return verbose;
            }
            let key = (program.module().to_string(), name.to_string());
            if let Some(id) = self.routines.get(&key) {
                return id.clone();
            }
            let id = format!("R{}", base_alpha(self.next_routine));
            self.next_routine += 1;
            self.routines.insert(key, id.clone());
            return id;
        }
        match program.external(name) {
            Some(ext) => {
                let module = ext.module.clone();
                self.routine(&module, &ext.routine)
            }
            None => name.to_string(),
        }
    }

    /// Keep the names `routine` returns through `returnVars` unmangled.
    pub fn keep_result_names(&mut self, routine: &Routine) {
        self.keep.clear();
        for instr in routine.instructions() {
            if let Instruction::ReturnNamed { names, .. } = instr {
                self.keep
                    .extend(names.iter().map(|n| polyname_base(n).to_string()));
            }
        }
    }

    pub fn variable(&mut self, name: &str) -> String {
        if self.style == Style::Verbose || self.keep.contains(name) {
            return name.to_string();
        }
        if let Some(id) = self.variables.get(name) {
            return id.clone();
        }
        let id = format!("V{}", base_alpha(self.next_variable));
        self.next_variable += 1;
        self.variables.insert(name.to_string(), id.clone());
        id
    }

    pub fn label(&mut self, name: &str) -> String {
        if self.style == Style::Verbose {
            return name.to_string();
        }
        if let Some(id) = self.labels.get(name) {
            return id.clone();
        }
        let id = format!("L{}", base_alpha(self.next_label));
        self.next_label += 1;
        self.labels.insert(name.to_string(), id.clone());
        id
    }

    pub fn opcode(&self, mnemonic: &'static str) -> &'static str {
        match self.style {
            Style::Verbose => mnemonic,
            Style::Compact => compact_opcode(mnemonic),
        }
    }

    pub fn kind(&self, kind: RoutineKind) -> &'static str {
        match self.style {
            Style::Verbose => kind.keyword(),
            Style::Compact => compact_kind(kind),
        }
    }

    pub fn end(&self) -> &'static str {
        match self.style {
            Style::Verbose => mnemonic::END,
            Style::Compact => mnemonic::END_COMPACT,
        }
    }

    pub fn indent(&self) -> &'static str {
        match self.style {
            Style::Verbose => "    ",
            Style::Compact => "",
        }
    }
}

/// The program plus every module reachable through its externals,
/// dependencies first, each module once.
fn collect_programs<'a>(program: &'a CompiledProgram, out: &mut Vec<&'a CompiledProgram>) {
    if out.iter().any(|p| p.module() == program.module()) {
        return;
    }
    for (_, ext) in program.externals() {
        if ext.module.module() != program.module() {
            collect_programs(&ext.module, out);
        }
    }
    out.push(program);
}

/// Write a program as object text.
pub fn write_object(program: &CompiledProgram, style: Style) -> String {
    let mut mangler = Mangler::new(style, program.module());

    let mut programs = Vec::new();
    collect_programs(program, &mut programs);

    // Same mangled name means same implementation; later entries win.
    let mut table: BTreeMap<String, (&CompiledProgram, &Routine)> = BTreeMap::new();
    for prog in &programs {
        for routine in prog.routines() {
            let name = mangler.routine(prog, &routine.name);
            table.insert(name, (*prog, routine));
        }
    }

    let mut lines = vec![mnemonic::HEADER.to_string()];
    for (name, (prog, routine)) in &table {
        write_routine(&mut lines, &mut mangler, name, prog, routine);
    }
    lines.push(mnemonic::TERMINATOR.to_string());

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn write_routine(
    lines: &mut Vec<String>,
    mangler: &mut Mangler,
    name: &str,
    program: &CompiledProgram,
    routine: &Routine,
) {
    mangler.keep_result_names(routine);

    let mut header = format!("{} {}", mangler.kind(routine.kind), name);
    for param in &routine.params {
        header.push(' ');
        header.push_str(&mangler.variable(param));
    }
    lines.push(header);

    for instr in routine.instructions() {
        let text = op_text(mangler, program, instr);
        lines.push(format!("{}{}", mangler.indent(), text));
    }
    lines.push(mangler.end().to_string());
    lines.push(String::new());
}

fn op_text(mangler: &mut Mangler, program: &CompiledProgram, instr: &Instruction) -> String {
    let op = mangler.opcode(instr.mnemonic());
    match instr {
        Instruction::PushConst(value) => format!("{op} {value}"),
        Instruction::PushVar(name)
        | Instruction::PopVar(name)
        | Instruction::DeleteVar(name)
        | Instruction::SetImmutable(name)
        | Instruction::ClearImmutable(name) => format!("{op} {}", mangler.variable(name)),
        Instruction::Call { name, argc } => {
            format!("{op} {} {argc}", mangler.routine(program, name))
        }
        Instruction::Throw(message) => format!("{op} {}", quote(message)),
        Instruction::Label(label) | Instruction::Jump(label) | Instruction::JumpIfFalse(label) => {
            format!("{op} {}", mangler.label(label))
        }
        Instruction::JumpIfNotIn { values, label } => {
            let mut text = format!("{op} {}", mangler.label(label));
            for value in values {
                text.push(' ');
                text.push_str(&value.to_string());
            }
            text
        }
        Instruction::Return(n) => format!("{op} {n}"),
        Instruction::ReturnNamed { n, names } => {
            let mut text = format!("{op} {n}");
            for name in names {
                text.push(' ');
                text.push_str(name);
            }
            text
        }
        Instruction::Enter | Instruction::Leave => op.to_string(),
    }
}
