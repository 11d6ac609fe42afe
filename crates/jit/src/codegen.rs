//! Bytecode to x86-64 translation.
//!
//! Every routine of the program and of the modules it links against is
//! compiled into one code blob:
//!
//! ```text
//! offset 0   entry stub   (SysV: fn(board, results) -> i64)
//!            routines     (one per module routine)
//!            fault stubs  (one per distinct message)
//! ```
//!
//! Register roles while routines run:
//!
//! | reg   | holds                   | reg   | holds          |
//! |-------|-------------------------|-------|----------------|
//! | `rbx` | cell array              | `r15` | result buffer  |
//! | `r11` | head x                  | `rsi` | checkpoint rsp |
//! | `r12` | head y                  | `rdi` | return values  |
//! | `r13` | width                   | `rax rcx rdx r9 r10` | scratch |
//! | `r14` | height                  |       |                |

use crate::asm::{Assembler, Inst, Label};
use crate::error::JitError;
use crate::frame::{result_count, word_offset, FrameLayout};
use crate::templates;
use crate::x64::{AluOp, Cond, Gpr, Mem};
use gbs_common::{
    polyname_base, polyname_type, CallTarget, CompiledProgram, Instruction, Routine, RoutineKind,
    ValueType,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

use Gpr::{Rax, Rbp, Rbx, Rcx, Rdi, Rdx, Rsi, Rsp, R10, R11, R12, R13, R14, R15, R9};
use Inst::*;

/// Returned in `rax` by a fault stub. Also the value of an unassigned local.
pub const FAULT_SENTINEL: i64 = 0x7fff_ffff_ffff_ffff;
pub const UNDEFINED: i64 = FAULT_SENTINEL;

/// Capacity reserved for a fault message, NUL included.
pub const MESSAGE_CAPACITY: usize = 512;

/// Position-independent machine code for a whole program. Only
/// [`compile`] builds one, so loaded code always came from checked
/// bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineCode {
    pub(crate) bytes: Vec<u8>,
    /// Offset of the entry stub.
    pub(crate) entry: usize,
    /// Base name and type of each value the entrypoint returns.
    pub(crate) results: Vec<(String, ValueType)>,
}

impl MachineCode {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn entry(&self) -> usize {
        self.entry
    }

    pub fn results(&self) -> &[(String, ValueType)] {
        &self.results
    }
}

// =============================================================================
// Emitter
// =============================================================================

/// An assembler plus the fault stubs requested so far.
#[derive(Debug, Default)]
pub struct Emitter {
    asm: Assembler,
    booms: HashMap<String, Label>,
    /// Messages in request order, so stub layout is deterministic.
    pending: Vec<(String, Label)>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, inst: Inst) {
        self.asm.emit(inst);
    }

    pub fn label(&mut self) -> Label {
        self.asm.new_label()
    }

    pub fn bind(&mut self, label: Label) {
        self.asm.bind(label);
    }

    /// The stub that aborts with `message`, created on first request.
    pub fn boom(&mut self, message: &str) -> Label {
        if let Some(label) = self.booms.get(message) {
            return *label;
        }
        let label = self.asm.new_label();
        self.booms.insert(message.to_string(), label);
        self.pending.push((message.to_string(), label));
        label
    }

    pub fn boom_count(&self) -> usize {
        self.booms.len()
    }

    /// Emit every requested fault stub.
    pub fn finish_stubs(&mut self) {
        for (message, label) in std::mem::take(&mut self.pending) {
            self.asm.bind(label);
            for (i, chunk) in message_words(&message).into_iter().enumerate() {
                self.asm.emit(MovRI(Rax, chunk));
                self.asm.emit(Store(Mem::new(R15, 8 * i as i32), Rax));
            }
            self.asm.emit(MovRI(Rax, FAULT_SENTINEL));
            self.asm.emit(MovRR(Rsp, Rsi));
            restore_callee_saved(&mut self.asm);
            self.asm.emit(Ret);
        }
    }

    pub fn into_code(self) -> Result<Vec<u8>, JitError> {
        self.asm.finish().map(|(code, _)| code)
    }
}

/// A message as NUL-terminated little-endian words, cut to fit the
/// result buffer without splitting a character.
fn message_words(message: &str) -> Vec<i64> {
    let mut end = message.len().min(MESSAGE_CAPACITY - 1);
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    let mut bytes = message.as_bytes()[..end].to_vec();
    bytes.push(0);
    bytes
        .chunks(8)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            i64::from_le_bytes(word)
        })
        .collect()
}

fn save_callee_saved(asm: &mut Assembler) {
    asm.emit(Push(Rbp));
    asm.emit(MovRR(Rbp, Rsp));
    for reg in [Rbx, R12, R13, R14, R15] {
        asm.emit(Push(reg));
    }
}

fn restore_callee_saved(asm: &mut Assembler) {
    for reg in [R15, R14, R13, R12, Rbx, Rbp] {
        asm.emit(Pop(reg));
    }
}

// =============================================================================
// Program
// =============================================================================

/// The program and every module reachable through its externals, each
/// once, root first.
fn modules(root: &CompiledProgram) -> Vec<&CompiledProgram> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut work = vec![root];
    while let Some(program) = work.pop() {
        if !seen.insert(program.module()) {
            continue;
        }
        out.push(program);
        for (_, ext) in program.externals().into_iter().rev() {
            work.push(&ext.module);
        }
    }
    out
}

/// Result names and types from the entrypoint's first `returnVars`.
fn entry_results(entry: &Routine) -> Result<Vec<(String, ValueType)>, JitError> {
    let names = entry.instructions().iter().find_map(|instr| match instr {
        Instruction::ReturnNamed { names, .. } => Some(names),
        _ => None,
    });
    let Some(names) = names else {
        return Ok(Vec::new());
    };
    names
        .iter()
        .map(|name| {
            let ty = polyname_type(name)
                .and_then(ValueType::from_name)
                .filter(|ty| *ty != ValueType::Tuple)
                .ok_or_else(|| JitError::UntypedResult {
                    name: name.clone(),
                })?;
            Ok((polyname_base(name).to_string(), ty))
        })
        .collect()
}

/// Compile a program, its entrypoint and everything it can call.
#[instrument(skip_all, name = "jit")]
pub fn compile(program: &CompiledProgram) -> Result<MachineCode, JitError> {
    let entry = program.entrypoint().ok_or(JitError::NoEntrypoint)?;
    let results = entry_results(entry)?;
    let modules = modules(program);
    for module in &modules {
        gbs_verifier::verify_layout(module).map_err(JitError::Rejected)?;
    }

    let mut em = Emitter::new();
    let mut routines: HashMap<(&str, &str), Label> = HashMap::new();
    for module in &modules {
        for routine in module.routines() {
            routines.insert((module.module(), routine.name.as_str()), em.label());
        }
    }
    let entry_label = routines
        .get(&(program.module(), entry.name.as_str()))
        .copied()
        .ok_or(JitError::NoEntrypoint)?;

    // ---- Entry stub ----
    save_callee_saved(&mut em.asm);
    em.emit(MovRR(R15, Rsi));
    em.emit(MovRR(Rsi, Rsp));
    em.emit(Load32(R13, Mem::new(Rdi, 0)));
    em.emit(Load32(R14, Mem::new(Rdi, 4)));
    em.emit(Load32(R11, Mem::new(Rdi, 8)));
    em.emit(Load32(R12, Mem::new(Rdi, 12)));
    em.emit(Lea(Rbx, Mem::new(Rdi, 16)));
    em.emit(Call(entry_label));
    for i in 0..results.len() {
        em.emit(Load(Rax, return_value(i)?));
        em.emit(Store(Mem::new(R15, word_offset(i)?), Rax));
    }
    em.emit(Store32(Mem::new(Rbx, -8), R11));
    em.emit(Store32(Mem::new(Rbx, -4), R12));
    em.emit(Alu(AluOp::Xor, Rax, Rax));
    restore_callee_saved(&mut em.asm);
    em.emit(Ret);

    // ---- Routines ----
    let mut count = 0;
    for module in &modules {
        for routine in module.routines() {
            let label = routines[&(module.module(), routine.name.as_str())];
            RoutineCompiler {
                em: &mut em,
                module,
                routine,
                layout: FrameLayout::of(routine),
                routines: &routines,
            }
            .compile(label)?;
            count += 1;
        }
    }

    let stubs = em.boom_count();
    em.finish_stubs();
    let bytes = em.into_code()?;
    debug!(
        routines = count,
        modules = modules.len(),
        fault_stubs = stubs,
        bytes = bytes.len(),
        "compiled"
    );
    Ok(MachineCode {
        bytes,
        entry: 0,
        results,
    })
}

/// Where return value `i` sits after a callee's epilogue.
fn return_value(i: usize) -> Result<Mem, JitError> {
    Ok(Mem::new(Rdi, -word_offset(i.saturating_add(1))?))
}

// =============================================================================
// Routines
// =============================================================================

struct RoutineCompiler<'a, 'p> {
    em: &'a mut Emitter,
    module: &'p CompiledProgram,
    routine: &'p Routine,
    layout: FrameLayout,
    routines: &'a HashMap<(&'p str, &'p str), Label>,
}

impl<'a, 'p> RoutineCompiler<'a, 'p> {
    fn compile(mut self, start: Label) -> Result<(), JitError> {
        let mut labels = HashMap::new();
        for instr in self.routine.instructions() {
            if let Instruction::Label(name) = instr {
                labels.insert(name.as_str(), self.em.label());
            }
        }

        self.em.bind(start);
        self.em.emit(Push(Rbp));
        self.em.emit(MovRR(Rbp, Rsp));
        if self.layout.locals() > 0 {
            self.em.emit(MovRI(Rax, UNDEFINED));
            for _ in 0..self.layout.locals() {
                self.em.emit(Push(Rax));
            }
        }

        let code = self.routine.instructions();
        let mut at = 0;
        while at < code.len() {
            match &code[at] {
                Instruction::Leave => match code.get(at + 1) {
                    Some(Instruction::Return(n)) => {
                        self.leave_and_return(*n)?;
                        at += 1;
                    }
                    _ => {
                        return Err(JitError::Unsupported(format!(
                            "{} {}: leave not followed by return",
                            self.routine.kind, self.routine.name
                        )))
                    }
                },
                instr => self.instruction(instr, &labels)?,
            }
            at += 1;
        }

        let fell_off = format!(
            "{} {} ended without returning",
            self.routine.kind, self.routine.name
        );
        let boom = self.em.boom(&fell_off);
        self.em.emit(Jmp(boom));
        Ok(())
    }

    fn instruction(
        &mut self,
        instr: &Instruction,
        labels: &HashMap<&str, Label>,
    ) -> Result<(), JitError> {
        let jump_label = |name: &str| {
            labels
                .get(name)
                .copied()
                .ok_or_else(|| JitError::Unsupported(format!("jump to unknown label {name}")))
        };
        match instr {
            Instruction::PushConst(value) => {
                let word = value.to_native().ok_or_else(|| {
                    JitError::Unsupported(format!("tuple constant {value}"))
                })?;
                if word == UNDEFINED {
                    return Err(JitError::Unsupported(format!(
                        "integer literal {value} is too big for a native word"
                    )));
                }
                self.push_word(word);
            }
            Instruction::PushVar(name) => self.push_var(name)?,
            Instruction::PopVar(name) => {
                let slot = self.slot(name)?;
                self.em.emit(PopMem(slot));
            }
            Instruction::DeleteVar(name) => {
                let slot = self.slot(name)?;
                self.em.emit(MovRI(Rax, UNDEFINED));
                self.em.emit(Store(slot, Rax));
            }
            Instruction::SetImmutable(_) | Instruction::ClearImmutable(_) => {}

            Instruction::Label(name) => {
                let label = jump_label(name)?;
                self.em.bind(label);
            }
            Instruction::Jump(name) => {
                let label = jump_label(name)?;
                self.em.emit(Jmp(label));
            }
            Instruction::JumpIfFalse(name) => {
                let label = jump_label(name)?;
                self.em.emit(Pop(Rax));
                self.em.emit(TestRR(Rax, Rax));
                self.em.emit(Jcc(Cond::E, label));
            }
            Instruction::JumpIfNotIn { values, label } => {
                let target = jump_label(label)?;
                let matched = self.em.label();
                self.em.emit(Pop(Rax));
                for value in values {
                    let word = value.to_native().ok_or_else(|| {
                        JitError::Unsupported(format!("tuple constant {value}"))
                    })?;
                    match i32::try_from(word) {
                        Ok(imm) => self.em.emit(AluRI(AluOp::Cmp, Rax, imm)),
                        Err(_) => {
                            self.em.emit(MovRI(Rcx, word));
                            self.em.emit(Alu(AluOp::Cmp, Rax, Rcx));
                        }
                    }
                    self.em.emit(Jcc(Cond::E, matched));
                }
                self.em.emit(Jmp(target));
                self.em.bind(matched);
            }
            Instruction::Throw(message) => {
                let boom = self.em.boom(message);
                self.em.emit(Jmp(boom));
            }

            Instruction::Call { name, argc } => self.call(name, *argc)?,
            Instruction::Return(n) => self.ret(*n)?,
            Instruction::ReturnNamed { n, names } => {
                for name in names {
                    self.push_var(polyname_base(name))?;
                }
                self.ret(*n)?;
            }

            Instruction::Enter => self.enter(),
            // Fused with the following return by the caller.
            Instruction::Leave => {}
        }
        Ok(())
    }

    fn slot(&self, name: &str) -> Result<Mem, JitError> {
        self.layout
            .slot(name)
            .ok_or_else(|| JitError::Unsupported(format!("variable {name} has no slot")))?
            .mem()
    }

    fn push_word(&mut self, word: i64) {
        match i32::try_from(word) {
            Ok(imm) => self.em.emit(PushImm(imm)),
            Err(_) => {
                self.em.emit(MovRI(Rax, word));
                self.em.emit(Push(Rax));
            }
        }
    }

    fn push_var(&mut self, name: &str) -> Result<(), JitError> {
        let slot = self.slot(name)?;
        let boom = self.em.boom(&format!("Uninitialized variable \"{name}\""));
        self.em.emit(Load(Rax, slot));
        self.em.emit(MovRI(Rcx, UNDEFINED));
        self.em.emit(Alu(AluOp::Cmp, Rax, Rcx));
        self.em.emit(Jcc(Cond::E, boom));
        self.em.emit(Push(Rax));
        Ok(())
    }

    fn call(&mut self, name: &str, argc: usize) -> Result<(), JitError> {
        let (module, callee) = match self.module.resolve(name) {
            None => {
                let boom = self.em.boom(&format!("function \"{name}\" is not defined"));
                self.em.emit(Jmp(boom));
                return Ok(());
            }
            Some(CallTarget::Builtin(builtin)) => {
                if builtin.arity() != argc {
                    let params: Vec<String> =
                        builtin.params.iter().map(|p| p.to_string()).collect();
                    self.arity_fault(builtin.kind, builtin.name, &params, argc);
                    return Ok(());
                }
                return templates::emit_builtin(self.em, builtin.name);
            }
            Some(CallTarget::Routine(routine)) => (self.module, routine),
            Some(CallTarget::External { module, routine }) => (module, routine),
        };
        if callee.arity() != argc {
            self.arity_fault(callee.kind, &callee.name, &callee.params, argc);
            return Ok(());
        }

        let label = self
            .routines
            .get(&(module.module(), callee.name.as_str()))
            .copied()
            .ok_or_else(|| {
                JitError::Unsupported(format!(
                    "routine {} of module {} was not compiled",
                    callee.name,
                    module.module()
                ))
            })?;
        self.em.emit(Call(label));
        if argc > 0 {
            self.em.emit(AluRI(AluOp::Add, Rsp, word_offset(argc)?));
        }
        for i in 0..result_count(callee) {
            self.em.emit(PushMem(return_value(i)?));
        }
        Ok(())
    }

    fn arity_fault(&mut self, kind: RoutineKind, name: &str, params: &[String], argc: usize) {
        let amount = if argc > params.len() { "many" } else { "few" };
        let message = format!(
            "Too {amount} arguments for {kind} \"{name}\".\nExpected {} ({}), received {argc}",
            params.len(),
            params.join(", "),
        );
        let boom = self.em.boom(&message);
        self.em.emit(Jmp(boom));
    }

    /// Leave `n` results just below `rdi` and return.
    fn ret(&mut self, n: usize) -> Result<(), JitError> {
        if n > 0 {
            self.em.emit(AluRI(AluOp::Add, Rsp, word_offset(n)?));
        }
        self.em.emit(MovRR(Rdi, Rsp));
        self.epilogue();
        Ok(())
    }

    fn epilogue(&mut self) {
        self.em.emit(MovRR(Rsp, Rbp));
        self.em.emit(Pop(Rbp));
        self.em.emit(Ret);
    }

    /// `rax` = byte size of the cell array.
    fn snapshot_size(&mut self) {
        self.em.emit(MovRR(Rax, R13));
        self.em.emit(Imul(Rax, R14));
        self.em.emit(Shl(Rax, 4));
    }

    /// Copy qwords from `[rdx]` to `[r9]` while the cursor in `bound_reg`
    /// stays below `r10`.
    fn copy_loop(&mut self, bound_reg: Gpr) {
        let top = self.em.label();
        let done = self.em.label();
        self.em.bind(top);
        self.em.emit(Alu(AluOp::Cmp, bound_reg, R10));
        self.em.emit(Jcc(Cond::AE, done));
        self.em.emit(Load(Rcx, Mem::base(Rdx)));
        self.em.emit(Store(Mem::base(R9), Rcx));
        self.em.emit(AluRI(AluOp::Add, Rdx, 8));
        self.em.emit(AluRI(AluOp::Add, R9, 8));
        self.em.emit(Jmp(top));
        self.em.bind(done);
    }

    /// Snapshot the cells and the head onto the stack.
    fn enter(&mut self) {
        self.snapshot_size();
        self.em.emit(Alu(AluOp::Sub, Rsp, Rax));
        self.em.emit(MovRR(Rdx, Rbx));
        self.em.emit(MovRR(R9, Rsp));
        self.em.emit(MovRR(R10, Rbx));
        self.em.emit(Alu(AluOp::Add, R10, Rax));
        self.copy_loop(Rdx);
        self.em.emit(Push(R11));
        self.em.emit(Push(R12));
    }

    /// Return `n` results, then restore the snapshot taken by `enter`.
    fn leave_and_return(&mut self, n: usize) -> Result<(), JitError> {
        if n > 0 {
            self.em.emit(AluRI(AluOp::Add, Rsp, word_offset(n)?));
        }
        self.em.emit(MovRR(Rdi, Rsp));
        self.em.emit(Pop(R12));
        self.em.emit(Pop(R11));
        self.snapshot_size();
        self.em.emit(MovRR(Rdx, Rsp));
        self.em.emit(MovRR(R9, Rbx));
        self.em.emit(MovRR(R10, Rbx));
        self.em.emit(Alu(AluOp::Add, R10, Rax));
        self.copy_loop(R9);
        self.epilogue();
        Ok(())
    }
}
