//! Symbolic instruction list and the two-pass assembler.
//!
//! Code generation appends [`Inst`]s that name their branch targets by
//! [`Label`]. [`Assembler::finish`] encodes everything in a first pass,
//! recording where each label is bound and where each rel32 needs it, then
//! patches every displacement in a second pass.

use crate::error::JitError;
use crate::x64::encoder as enc;
use crate::x64::{AluOp, Cond, Gpr, Mem};

/// A branch target. Created unbound by [`Assembler::new_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

impl Label {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// One machine instruction, or a label binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inst {
    MovRR(Gpr, Gpr),
    MovRI(Gpr, i64),
    Load(Gpr, Mem),
    Store(Mem, Gpr),
    Load32(Gpr, Mem),
    Store32(Mem, Gpr),
    Lea(Gpr, Mem),
    Alu(AluOp, Gpr, Gpr),
    AluRI(AluOp, Gpr, i32),
    TestRR(Gpr, Gpr),
    Imul(Gpr, Gpr),
    Neg(Gpr),
    Idiv(Gpr),
    Cqo,
    Shl(Gpr, u8),
    Shr(Gpr, u8),
    Push(Gpr),
    Pop(Gpr),
    PushImm(i32),
    PushMem(Mem),
    PopMem(Mem),
    Setcc(Cond, Gpr),
    MovzxB(Gpr, Gpr),
    Jmp(Label),
    Jcc(Cond, Label),
    Call(Label),
    Ret,
    Bind(Label),
}

/// Collects instructions and resolves labels into position-independent
/// machine code.
#[derive(Debug, Default)]
pub struct Assembler {
    insts: Vec<Inst>,
    labels: u32,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_label(&mut self) -> Label {
        let label = Label(self.labels);
        self.labels += 1;
        label
    }

    pub fn emit(&mut self, inst: Inst) {
        self.insts.push(inst);
    }

    pub fn bind(&mut self, label: Label) {
        self.insts.push(Inst::Bind(label));
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Encode and link. Returns the code and the offset of every label.
    pub fn finish(self) -> Result<(Vec<u8>, Vec<Option<usize>>), JitError> {
        let mut code = Vec::with_capacity(self.insts.len() * 4);
        let mut offsets: Vec<Option<usize>> = vec![None; self.labels as usize];
        // (offset of the rel32 field, target)
        let mut patches: Vec<(usize, Label)> = Vec::new();

        for inst in &self.insts {
            match *inst {
                Inst::Bind(label) => {
                    let slot = &mut offsets[label.0 as usize];
                    if slot.is_some() {
                        return Err(JitError::LabelRebound(label.0));
                    }
                    *slot = Some(code.len());
                }
                Inst::Jmp(label) => {
                    enc::jmp(&mut code, 0);
                    patches.push((code.len() - 4, label));
                }
                Inst::Jcc(cond, label) => {
                    enc::jcc(&mut code, cond, 0);
                    patches.push((code.len() - 4, label));
                }
                Inst::Call(label) => {
                    enc::call(&mut code, 0);
                    patches.push((code.len() - 4, label));
                }
                other => encode(&mut code, other),
            }
        }

        for (site, label) in patches {
            let target = offsets[label.0 as usize].ok_or(JitError::UndefinedLabel(label.0))?;
            let rel = target as i64 - (site as i64 + 4);
            code[site..site + 4].copy_from_slice(&(rel as i32).to_le_bytes());
        }

        Ok((code, offsets))
    }
}

/// Encode a non-branch instruction.
fn encode(out: &mut Vec<u8>, inst: Inst) {
    match inst {
        Inst::MovRR(dst, src) => enc::mov_rr(out, dst, src),
        Inst::MovRI(dst, imm) => enc::mov_ri64(out, dst, imm),
        Inst::Load(dst, mem) => enc::load(out, dst, mem),
        Inst::Store(mem, src) => enc::store(out, mem, src),
        Inst::Load32(dst, mem) => enc::load32(out, dst, mem),
        Inst::Store32(mem, src) => enc::store32(out, mem, src),
        Inst::Lea(dst, mem) => enc::lea(out, dst, mem),
        Inst::Alu(op, dst, src) => enc::alu_rr(out, op, dst, src),
        Inst::AluRI(op, dst, imm) => enc::alu_ri(out, op, dst, imm),
        Inst::TestRR(a, b) => enc::test_rr(out, a, b),
        Inst::Imul(dst, src) => enc::imul_rr(out, dst, src),
        Inst::Neg(reg) => enc::neg(out, reg),
        Inst::Idiv(reg) => enc::idiv(out, reg),
        Inst::Cqo => enc::cqo(out),
        Inst::Shl(reg, n) => enc::shl_ri(out, reg, n),
        Inst::Shr(reg, n) => enc::shr_ri(out, reg, n),
        Inst::Push(reg) => enc::push_r(out, reg),
        Inst::Pop(reg) => enc::pop_r(out, reg),
        Inst::PushImm(imm) => enc::push_imm(out, imm),
        Inst::PushMem(mem) => enc::push_mem(out, mem),
        Inst::PopMem(mem) => enc::pop_mem(out, mem),
        Inst::Setcc(cond, reg) => enc::setcc(out, cond, reg),
        Inst::MovzxB(dst, src) => enc::movzx_rb(out, dst, src),
        Inst::Ret => enc::ret(out),
        Inst::Jmp(_) | Inst::Jcc(..) | Inst::Call(_) | Inst::Bind(_) => {}
    }
}
