//! x86-64 instruction encoder.
//!
//! Each function appends one encoded instruction to a byte buffer.
//!
//! # Encoding Reference
//! ```text
//! [REX] [Opcode] [ModR/M] [SIB] [Disp] [Imm]
//! ```
//! Only `[base + disp]` memory operands are needed; there is no index
//! register and no RIP-relative form.

use super::registers::{AluOp, Cond, Gpr, Mem};

// =============================================================================
// Prefix and operand bytes
// =============================================================================

/// REX prefix: 0100WRXB.
#[inline]
const fn rex(w: bool, r: bool, b: bool) -> u8 {
    0x40 | ((w as u8) << 3) | ((r as u8) << 2) | (b as u8)
}

#[inline]
const fn modrm(mod_: u8, reg: u8, rm: u8) -> u8 {
    (mod_ << 6) | ((reg & 0x7) << 3) | (rm & 0x7)
}

/// SIB byte with no index and the given base: scale=00, index=100.
#[inline]
const fn sib_no_index(base: u8) -> u8 {
    (0b100 << 3) | (base & 0x7)
}

fn push_rex(out: &mut Vec<u8>, w: bool, r: bool, b: bool) {
    if w || r || b {
        out.push(rex(w, r, b));
    }
}

/// ModR/M, optional SIB and displacement for `[base + disp]`.
fn mem_operand(out: &mut Vec<u8>, reg: u8, mem: Mem) {
    let base = mem.base;
    let (mod_, disp_len) = if mem.disp == 0 && !base.needs_displacement() {
        (0b00, 0)
    } else if mem.disp_fits_i8() {
        (0b01, 1)
    } else {
        (0b10, 4)
    };

    if base.needs_sib_as_base() {
        out.push(modrm(mod_, reg, 0b100));
        out.push(sib_no_index(base.low_bits()));
    } else {
        out.push(modrm(mod_, reg, base.low_bits()));
    }

    match disp_len {
        1 => out.push(mem.disp as i8 as u8),
        4 => out.extend_from_slice(&mem.disp.to_le_bytes()),
        _ => {}
    }
}

/// `OP r/m, r` with a register destination.
fn encode_rr(out: &mut Vec<u8>, w: bool, opcode: &[u8], reg: Gpr, rm: Gpr) {
    push_rex(out, w, reg.high_bit(), rm.high_bit());
    out.extend_from_slice(opcode);
    out.push(modrm(0b11, reg.low_bits(), rm.low_bits()));
}

/// `OP` with a register in the reg field and a memory operand.
fn encode_rm(out: &mut Vec<u8>, w: bool, opcode: &[u8], reg: Gpr, mem: Mem) {
    push_rex(out, w, reg.high_bit(), mem.base.high_bit());
    out.extend_from_slice(opcode);
    mem_operand(out, reg.low_bits(), mem);
}

/// `OP /digit` on a register.
fn encode_digit_r(out: &mut Vec<u8>, w: bool, opcode: u8, digit: u8, rm: Gpr) {
    push_rex(out, w, false, rm.high_bit());
    out.push(opcode);
    out.push(modrm(0b11, digit, rm.low_bits()));
}

/// `OP /digit` on memory.
fn encode_digit_m(out: &mut Vec<u8>, w: bool, opcode: u8, digit: u8, mem: Mem) {
    push_rex(out, w, false, mem.base.high_bit());
    out.push(opcode);
    mem_operand(out, digit, mem);
}

// =============================================================================
// Data movement
// =============================================================================

/// MOV r64, r64
pub fn mov_rr(out: &mut Vec<u8>, dst: Gpr, src: Gpr) {
    encode_rr(out, true, &[0x89], src, dst);
}

/// MOV r64, imm64 (REX.W + B8 + rd)
pub fn mov_ri64(out: &mut Vec<u8>, dst: Gpr, imm: i64) {
    out.push(rex(true, false, dst.high_bit()));
    out.push(0xB8 + dst.low_bits());
    out.extend_from_slice(&imm.to_le_bytes());
}

/// MOV r64, [mem]
pub fn load(out: &mut Vec<u8>, dst: Gpr, mem: Mem) {
    encode_rm(out, true, &[0x8B], dst, mem);
}

/// MOV [mem], r64
pub fn store(out: &mut Vec<u8>, mem: Mem, src: Gpr) {
    encode_rm(out, true, &[0x89], src, mem);
}

/// MOV r32, [mem]; the upper half of the register is zeroed.
pub fn load32(out: &mut Vec<u8>, dst: Gpr, mem: Mem) {
    encode_rm(out, false, &[0x8B], dst, mem);
}

/// MOV [mem], r32
pub fn store32(out: &mut Vec<u8>, mem: Mem, src: Gpr) {
    encode_rm(out, false, &[0x89], src, mem);
}

/// LEA r64, [mem]
pub fn lea(out: &mut Vec<u8>, dst: Gpr, mem: Mem) {
    encode_rm(out, true, &[0x8D], dst, mem);
}

/// MOVZX r64, r8
pub fn movzx_rb(out: &mut Vec<u8>, dst: Gpr, src: Gpr) {
    encode_rr(out, true, &[0x0F, 0xB6], dst, src);
}

// =============================================================================
// Arithmetic
// =============================================================================

/// ADD/OR/AND/SUB/XOR/CMP r64, r64
pub fn alu_rr(out: &mut Vec<u8>, op: AluOp, dst: Gpr, src: Gpr) {
    encode_rr(out, true, &[op.rr_opcode()], src, dst);
}

/// ADD/OR/AND/SUB/XOR/CMP r64, imm (sign-extended imm8 when it fits)
pub fn alu_ri(out: &mut Vec<u8>, op: AluOp, dst: Gpr, imm: i32) {
    if (i8::MIN as i32..=i8::MAX as i32).contains(&imm) {
        encode_digit_r(out, true, 0x83, op as u8, dst);
        out.push(imm as i8 as u8);
    } else {
        encode_digit_r(out, true, 0x81, op as u8, dst);
        out.extend_from_slice(&imm.to_le_bytes());
    }
}

/// TEST r64, r64
pub fn test_rr(out: &mut Vec<u8>, a: Gpr, b: Gpr) {
    encode_rr(out, true, &[0x85], b, a);
}

/// IMUL r64, r64
pub fn imul_rr(out: &mut Vec<u8>, dst: Gpr, src: Gpr) {
    encode_rr(out, true, &[0x0F, 0xAF], dst, src);
}

/// NEG r64
pub fn neg(out: &mut Vec<u8>, reg: Gpr) {
    encode_digit_r(out, true, 0xF7, 3, reg);
}

/// IDIV r64: signed divide rdx:rax.
pub fn idiv(out: &mut Vec<u8>, reg: Gpr) {
    encode_digit_r(out, true, 0xF7, 7, reg);
}

/// CQO: sign-extend rax into rdx.
pub fn cqo(out: &mut Vec<u8>) {
    out.extend_from_slice(&[0x48, 0x99]);
}

/// SHL r64, imm8
pub fn shl_ri(out: &mut Vec<u8>, reg: Gpr, amount: u8) {
    encode_digit_r(out, true, 0xC1, 4, reg);
    out.push(amount);
}

/// SHR r64, imm8
pub fn shr_ri(out: &mut Vec<u8>, reg: Gpr, amount: u8) {
    encode_digit_r(out, true, 0xC1, 5, reg);
    out.push(amount);
}

/// SETcc r8. Registers past `bl` get a REX prefix so they name the low
/// byte (`spl`..`dil`, `r8b`..) rather than `ah`..`bh`.
pub fn setcc(out: &mut Vec<u8>, cond: Cond, reg: Gpr) {
    if reg.encoding() >= 4 {
        out.push(rex(false, false, reg.high_bit()));
    }
    out.push(0x0F);
    out.push(0x90 + cond as u8);
    out.push(modrm(0b11, 0, reg.low_bits()));
}

// =============================================================================
// Stack
// =============================================================================

/// PUSH r64
pub fn push_r(out: &mut Vec<u8>, reg: Gpr) {
    push_rex(out, false, false, reg.high_bit());
    out.push(0x50 + reg.low_bits());
}

/// POP r64
pub fn pop_r(out: &mut Vec<u8>, reg: Gpr) {
    push_rex(out, false, false, reg.high_bit());
    out.push(0x58 + reg.low_bits());
}

/// PUSH imm (sign-extended to 64 bits)
pub fn push_imm(out: &mut Vec<u8>, imm: i32) {
    if (i8::MIN as i32..=i8::MAX as i32).contains(&imm) {
        out.push(0x6A);
        out.push(imm as i8 as u8);
    } else {
        out.push(0x68);
        out.extend_from_slice(&imm.to_le_bytes());
    }
}

/// PUSH qword [mem]
pub fn push_mem(out: &mut Vec<u8>, mem: Mem) {
    encode_digit_m(out, false, 0xFF, 6, mem);
}

/// POP qword [mem]
pub fn pop_mem(out: &mut Vec<u8>, mem: Mem) {
    encode_digit_m(out, false, 0x8F, 0, mem);
}

// =============================================================================
// Control flow
// =============================================================================

/// JMP rel32
pub fn jmp(out: &mut Vec<u8>, rel: i32) {
    out.push(0xE9);
    out.extend_from_slice(&rel.to_le_bytes());
}

/// Jcc rel32
pub fn jcc(out: &mut Vec<u8>, cond: Cond, rel: i32) {
    out.push(0x0F);
    out.push(0x80 + cond as u8);
    out.extend_from_slice(&rel.to_le_bytes());
}

/// CALL rel32
pub fn call(out: &mut Vec<u8>, rel: i32) {
    out.push(0xE8);
    out.extend_from_slice(&rel.to_le_bytes());
}

/// RET
pub fn ret(out: &mut Vec<u8>) {
    out.push(0xC3);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(f: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
        let mut out = Vec::new();
        f(&mut out);
        out
    }

    // ========================================================
    // Register forms
    // ========================================================

    #[test]
    fn mov_register_to_register() {
        assert_eq!(enc(|o| mov_rr(o, Gpr::Rax, Gpr::Rcx)), [0x48, 0x89, 0xC8]);
        assert_eq!(enc(|o| mov_rr(o, Gpr::R15, Gpr::Rsi)), [0x49, 0x89, 0xF7]);
        assert_eq!(enc(|o| mov_rr(o, Gpr::Rsi, Gpr::Rsp)), [0x48, 0x89, 0xE6]);
    }

    #[test]
    fn mov_imm64() {
        assert_eq!(
            enc(|o| mov_ri64(o, Gpr::Rax, 0x7fff_ffff_ffff_ffff)),
            [0x48, 0xB8, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]
        );
        assert_eq!(enc(|o| mov_ri64(o, Gpr::R9, 1))[..2], [0x49, 0xB9]);
    }

    #[test]
    fn alu_forms() {
        assert_eq!(enc(|o| alu_rr(o, AluOp::Add, Gpr::Rax, Gpr::Rcx)), [0x48, 0x01, 0xC8]);
        assert_eq!(enc(|o| alu_rr(o, AluOp::Cmp, Gpr::Rcx, Gpr::R14)), [0x4C, 0x39, 0xF1]);
        assert_eq!(enc(|o| alu_ri(o, AluOp::Cmp, Gpr::Rax, 1)), [0x48, 0x83, 0xF8, 0x01]);
        assert_eq!(enc(|o| alu_ri(o, AluOp::Cmp, Gpr::Rcx, -1)), [0x48, 0x83, 0xF9, 0xFF]);
        assert_eq!(enc(|o| alu_ri(o, AluOp::Sub, Gpr::R11, 1)), [0x49, 0x83, 0xEB, 0x01]);
        assert_eq!(
            enc(|o| alu_ri(o, AluOp::Add, Gpr::Rsp, 0x100)),
            [0x48, 0x81, 0xC4, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(enc(|o| test_rr(o, Gpr::Rax, Gpr::Rax)), [0x48, 0x85, 0xC0]);
    }

    #[test]
    fn multiply_divide_shift() {
        assert_eq!(enc(|o| imul_rr(o, Gpr::Rax, Gpr::R9)), [0x49, 0x0F, 0xAF, 0xC1]);
        assert_eq!(enc(|o| imul_rr(o, Gpr::Rax, Gpr::R14)), [0x49, 0x0F, 0xAF, 0xC6]);
        assert_eq!(enc(|o| neg(o, Gpr::Rax)), [0x48, 0xF7, 0xD8]);
        assert_eq!(enc(|o| idiv(o, Gpr::Rcx)), [0x48, 0xF7, 0xF9]);
        assert_eq!(enc(cqo), [0x48, 0x99]);
        assert_eq!(enc(|o| shl_ri(o, Gpr::Rax, 4)), [0x48, 0xC1, 0xE0, 0x04]);
        assert_eq!(enc(|o| shr_ri(o, Gpr::Rcx, 1)), [0x48, 0xC1, 0xE9, 0x01]);
    }

    #[test]
    fn set_and_extend() {
        assert_eq!(enc(|o| setcc(o, Cond::E, Gpr::Rax)), [0x0F, 0x94, 0xC0]);
        assert_eq!(enc(|o| setcc(o, Cond::L, Gpr::Rcx)), [0x0F, 0x9C, 0xC1]);
        assert_eq!(enc(|o| setcc(o, Cond::NE, Gpr::Rsi)), [0x40, 0x0F, 0x95, 0xC6]);
        assert_eq!(enc(|o| movzx_rb(o, Gpr::Rax, Gpr::Rax)), [0x48, 0x0F, 0xB6, 0xC0]);
    }

    // ========================================================
    // Memory forms
    // ========================================================

    #[test]
    fn memory_operands() {
        // [rsp + 8] needs a SIB byte
        assert_eq!(
            enc(|o| load(o, Gpr::Rax, Mem::new(Gpr::Rsp, 8))),
            [0x48, 0x8B, 0x44, 0x24, 0x08]
        );
        // [rbp - 8]
        assert_eq!(
            enc(|o| load(o, Gpr::Rax, Mem::new(Gpr::Rbp, -8))),
            [0x48, 0x8B, 0x45, 0xF8]
        );
        // [r13] needs disp8 = 0
        assert_eq!(
            enc(|o| load(o, Gpr::Rcx, Mem::base(Gpr::R13))),
            [0x49, 0x8B, 0x4D, 0x00]
        );
        // [r12] needs a SIB byte
        assert_eq!(
            enc(|o| load(o, Gpr::Rax, Mem::base(Gpr::R12))),
            [0x49, 0x8B, 0x04, 0x24]
        );
        // disp32
        assert_eq!(
            enc(|o| store(o, Mem::new(Gpr::R15, 504), Gpr::Rax)),
            [0x49, 0x89, 0x87, 0xF8, 0x01, 0x00, 0x00]
        );
        assert_eq!(
            enc(|o| store(o, Mem::new(Gpr::R15, 8), Gpr::Rax)),
            [0x49, 0x89, 0x47, 0x08]
        );
    }

    #[test]
    fn dword_memory() {
        assert_eq!(enc(|o| load32(o, Gpr::R13, Mem::base(Gpr::Rdi))), [0x44, 0x8B, 0x2F]);
        assert_eq!(
            enc(|o| load32(o, Gpr::R12, Mem::new(Gpr::Rdi, 12))),
            [0x44, 0x8B, 0x67, 0x0C]
        );
        assert_eq!(enc(|o| load32(o, Gpr::Rdx, Mem::base(Gpr::Rax))), [0x8B, 0x10]);
        assert_eq!(
            enc(|o| store32(o, Mem::new(Gpr::Rbx, -8), Gpr::R11)),
            [0x44, 0x89, 0x5B, 0xF8]
        );
    }

    #[test]
    fn lea_and_stack_memory() {
        assert_eq!(
            enc(|o| lea(o, Gpr::Rbx, Mem::new(Gpr::Rdi, 16))),
            [0x48, 0x8D, 0x5F, 0x10]
        );
        assert_eq!(enc(|o| push_mem(o, Mem::new(Gpr::Rdi, -8))), [0xFF, 0x77, 0xF8]);
        assert_eq!(enc(|o| push_mem(o, Mem::new(Gpr::Rbp, 16))), [0xFF, 0x75, 0x10]);
        assert_eq!(enc(|o| pop_mem(o, Mem::new(Gpr::Rbp, -16))), [0x8F, 0x45, 0xF0]);
    }

    // ========================================================
    // Stack and control flow
    // ========================================================

    #[test]
    fn push_pop() {
        assert_eq!(enc(|o| push_r(o, Gpr::Rbp)), [0x55]);
        assert_eq!(enc(|o| push_r(o, Gpr::R12)), [0x41, 0x54]);
        assert_eq!(enc(|o| pop_r(o, Gpr::R15)), [0x41, 0x5F]);
        assert_eq!(enc(|o| push_imm(o, 5)), [0x6A, 0x05]);
        assert_eq!(enc(|o| push_imm(o, -1)), [0x6A, 0xFF]);
        assert_eq!(enc(|o| push_imm(o, 1000)), [0x68, 0xE8, 0x03, 0x00, 0x00]);
    }

    #[test]
    fn branches() {
        assert_eq!(enc(|o| jmp(o, -5)), [0xE9, 0xFB, 0xFF, 0xFF, 0xFF]);
        assert_eq!(enc(|o| jcc(o, Cond::GE, 0x10)), [0x0F, 0x8D, 0x10, 0x00, 0x00, 0x00]);
        assert_eq!(enc(|o| call(o, 0)), [0xE8, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(enc(ret), [0xC3]);
    }
}
