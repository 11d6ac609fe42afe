//! Routines and compiled programs.
//!
//! A [`Routine`] resolves its labels once, at construction: every jump
//! stores the index of the instruction after its target label, so the
//! engines never look a label up by name while running.

use crate::builtins::{Builtin, BuiltinTable};
use crate::error::LoadError;
use crate::instruction::Instruction;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What kind of routine a definition is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutineKind {
    Procedure,
    Function,
    Entrypoint,
}

impl RoutineKind {
    pub fn keyword(self) -> &'static str {
        match self {
            RoutineKind::Procedure => "procedure",
            RoutineKind::Function => "function",
            RoutineKind::Entrypoint => "entrypoint",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "procedure" => Some(RoutineKind::Procedure),
            "function" => Some(RoutineKind::Function),
            "entrypoint" => Some(RoutineKind::Entrypoint),
            _ => None,
        }
    }
}

impl fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A named procedure, function or entrypoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routine {
    pub kind: RoutineKind,
    pub name: String,
    pub params: Vec<String>,
    instructions: Vec<Instruction>,
    /// For each instruction, the resolved jump destination (if it jumps).
    targets: Vec<Option<usize>>,
}

impl Routine {
    /// Build a routine and resolve its labels.
    pub fn new(
        kind: RoutineKind,
        name: impl Into<String>,
        params: Vec<String>,
        instructions: Vec<Instruction>,
    ) -> Result<Self, LoadError> {
        let name = name.into();

        let mut labels = HashMap::new();
        for (i, instr) in instructions.iter().enumerate() {
            if let Instruction::Label(label) = instr {
                if labels.insert(label.as_str(), i + 1).is_some() {
                    return Err(LoadError::DuplicateLabel {
                        routine: name,
                        label: label.clone(),
                    });
                }
            }
        }

        let mut targets = Vec::with_capacity(instructions.len());
        for (at, instr) in instructions.iter().enumerate() {
            let target = match instr.jump_target() {
                Some(label) => Some(*labels.get(label).ok_or_else(|| {
                    LoadError::UnresolvedLabel {
                        routine: name.clone(),
                        at,
                        label: label.to_string(),
                    }
                })?),
                None => None,
            };
            targets.push(target);
        }

        Ok(Self {
            kind,
            name,
            params,
            instructions,
            targets,
        })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Resolved destination of the jump at `at`.
    pub fn target(&self, at: usize) -> Option<usize> {
        self.targets.get(at).copied().flatten()
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// A routine defined in another module.
#[derive(Debug, Clone)]
pub struct ExternalRoutine {
    pub module: Arc<CompiledProgram>,
    pub routine: String,
}

/// What a `Call` name refers to.
#[derive(Debug, Clone, Copy)]
pub enum CallTarget<'a> {
    Builtin(&'a Builtin),
    Routine(&'a Routine),
    External {
        module: &'a CompiledProgram,
        routine: &'a Routine,
    },
}

/// A routine table plus the builtins and external routines it may call.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    module: String,
    routines: Vec<Routine>,
    index: HashMap<String, usize>,
    builtins: BuiltinTable,
    externals: HashMap<String, ExternalRoutine>,
}

/// Names looked up, in order, when no routine is marked as entrypoint.
pub const ENTRYPOINT_NAMES: [&str; 3] = ["program", "interactive", "Main"];

impl CompiledProgram {
    /// A program in module `main` with the standard builtins.
    pub fn new(routines: Vec<Routine>) -> Result<Self, LoadError> {
        let mut index = HashMap::new();
        for (i, routine) in routines.iter().enumerate() {
            if index.insert(routine.name.clone(), i).is_some() {
                return Err(LoadError::DuplicateRoutine(routine.name.clone()));
            }
        }
        Ok(Self {
            module: "main".to_string(),
            routines,
            index,
            builtins: BuiltinTable::standard(),
            externals: HashMap::new(),
        })
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn with_builtins(mut self, builtins: BuiltinTable) -> Self {
        self.builtins = builtins;
        self
    }

    /// Make `name` callable here as `routine` of another module.
    pub fn link_external(
        &mut self,
        name: impl Into<String>,
        module: Arc<CompiledProgram>,
        routine: impl Into<String>,
    ) {
        self.externals.insert(
            name.into(),
            ExternalRoutine {
                module,
                routine: routine.into(),
            },
        );
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn routines(&self) -> &[Routine] {
        &self.routines
    }

    pub fn routine(&self, name: &str) -> Option<&Routine> {
        self.index.get(name).map(|&i| &self.routines[i])
    }

    pub fn builtins(&self) -> &BuiltinTable {
        &self.builtins
    }

    pub fn external(&self, name: &str) -> Option<&ExternalRoutine> {
        self.externals.get(name)
    }

    /// External routines, sorted by local name.
    pub fn externals(&self) -> Vec<(&str, &ExternalRoutine)> {
        let mut all: Vec<_> = self
            .externals
            .iter()
            .map(|(name, ext)| (name.as_str(), ext))
            .collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all
    }

    /// The routine where execution starts.
    pub fn entrypoint(&self) -> Option<&Routine> {
        self.routines
            .iter()
            .find(|r| r.kind == RoutineKind::Entrypoint)
            .or_else(|| ENTRYPOINT_NAMES.iter().find_map(|name| self.routine(name)))
    }

    /// Resolve a call name: builtins first, then local routines, then
    /// external routines.
    pub fn resolve(&self, name: &str) -> Option<CallTarget<'_>> {
        if let Some(builtin) = self.builtins.get(name) {
            return Some(CallTarget::Builtin(builtin));
        }
        if let Some(routine) = self.routine(name) {
            return Some(CallTarget::Routine(routine));
        }
        let ext = self.externals.get(name)?;
        let routine = ext.module.routine(&ext.routine)?;
        Some(CallTarget::External {
            module: &ext.module,
            routine,
        })
    }
}
