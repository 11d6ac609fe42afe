//! Register and operand definitions.

/// A 64-bit general-purpose register, in hardware encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gpr {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Gpr {
    /// Get the hardware encoding (0-15).
    #[inline(always)]
    pub const fn encoding(self) -> u8 {
        self as u8
    }

    /// Low 3 bits, as placed in ModR/M and SIB fields.
    #[inline(always)]
    pub const fn low_bits(self) -> u8 {
        self.encoding() & 0x7
    }

    /// Bit 3, carried by the REX prefix.
    #[inline(always)]
    pub const fn high_bit(self) -> bool {
        self.encoding() >= 8
    }

    /// RSP and R12 as a base need a SIB byte.
    #[inline(always)]
    pub const fn needs_sib_as_base(self) -> bool {
        self.low_bits() == 4
    }

    /// RBP and R13 as a base need an explicit displacement: encoding
    /// 0b101 with mod=00 means `[rip + disp32]`.
    #[inline(always)]
    pub const fn needs_displacement(self) -> bool {
        self.low_bits() == 5
    }
}

/// A `[base + disp]` memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mem {
    pub base: Gpr,
    pub disp: i32,
}

impl Mem {
    #[inline]
    pub const fn new(base: Gpr, disp: i32) -> Self {
        Mem { base, disp }
    }

    #[inline]
    pub const fn base(base: Gpr) -> Self {
        Mem { base, disp: 0 }
    }

    #[inline]
    pub const fn disp_fits_i8(&self) -> bool {
        self.disp >= i8::MIN as i32 && self.disp <= i8::MAX as i32
    }
}

/// Condition codes, as the low nibble of `Jcc`/`SETcc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cond {
    /// Below (unsigned <).
    B = 0x2,
    /// Above or equal (unsigned >=).
    AE = 0x3,
    E = 0x4,
    NE = 0x5,
    L = 0xC,
    GE = 0xD,
    LE = 0xE,
    G = 0xF,
}

/// Two-operand integer ALU operations. The discriminant is the `/digit`
/// of the immediate forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AluOp {
    Add = 0,
    Or = 1,
    And = 4,
    Sub = 5,
    Xor = 6,
    Cmp = 7,
}

impl AluOp {
    /// Opcode of the `OP r/m64, r64` form.
    #[inline]
    pub const fn rr_opcode(self) -> u8 {
        ((self as u8) << 3) | 0x01
    }
}
