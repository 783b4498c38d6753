use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct Flags: u32 {
        const CF = 1 << 0;   // Carry
        const PF = 1 << 2;   // Parity
        const AF = 1 << 4;   // Aux carry
        const ZF = 1 << 6;   // Zero
        const SF = 1 << 7;   // Sign
        const TF = 1 << 8;   // Trap
        const IF = 1 << 9;   // Interrupt enable
        const DF = 1 << 10;  // Direction
        const OF = 1 << 11;  // Overflow
    }
}

// Bit 1 of the packed flags image always reads as 1, as on real hardware.
const RESERVED_BIT1: u32 = 1 << 1;

impl Flags {
    // Packed image for PUSHF.
    pub fn to_word(self) -> u32 {
        self.bits() | RESERVED_BIT1
    }

    // POPF counterpart; unknown bits are dropped.
    pub fn from_word(word: u32) -> Self {
        Flags::from_bits_truncate(word)
    }
}

#[inline]
pub fn parity8(x: u8) -> bool {
    (x.count_ones() & 1) == 0
}

// Arithmetic flag outputs of one ALU operation.
#[derive(Debug, Clone, Copy)]
pub struct FlagsOut {
    pub cf: bool,
    pub pf: bool,
    pub af: bool,
    pub zf: bool,
    pub sf: bool,
    pub of: bool,
}

// 32-bit addition (ADD/ADC/INC). CF reflects the true sum exceeding the
// ring; OF is same-sign operands with an opposite-sign result.
#[inline]
pub fn alu_add(a: u32, b: u32, carry_in: bool) -> (u32, FlagsOut) {
    let full = a as u64 + b as u64 + carry_in as u64;
    let res = full as u32;
    let sign_a = (a >> 31) & 1 != 0;
    let sign_b = (b >> 31) & 1 != 0;
    let sign_r = (res >> 31) & 1 != 0;

    let out = FlagsOut {
        cf: full > 0xFFFF_FFFF,
        pf: parity8(res as u8),
        af: (a & 0xF) + (b & 0xF) > 0xF,
        zf: res == 0,
        sf: sign_r,
        of: (sign_a == sign_b) && (sign_r != sign_a),
    };
    (res, out)
}

// 32-bit subtraction (SUB/SBB/CMP/DEC/NEG). CF is the unsigned borrow.
#[inline]
pub fn alu_sub(a: u32, b: u32, borrow_in: bool) -> (u32, FlagsOut) {
    let res = a.wrapping_sub(b).wrapping_sub(borrow_in as u32);
    let sign_a = (a >> 31) & 1 != 0;
    let sign_b = (b >> 31) & 1 != 0;
    let sign_r = (res >> 31) & 1 != 0;

    let out = FlagsOut {
        cf: (a as u64) < (b as u64 + borrow_in as u64),
        pf: parity8(res as u8),
        af: (a & 0xF) < (b & 0xF),
        zf: res == 0,
        sf: sign_r,
        of: (sign_a != sign_b) && (sign_r != sign_a),
    };
    (res, out)
}

// Flag outputs for AND/OR/XOR/TEST: CF, OF, and AF are always clear.
#[inline]
pub fn logic_flags(res: u32) -> FlagsOut {
    FlagsOut {
        cf: false,
        pf: parity8(res as u8),
        af: false,
        zf: res == 0,
        sf: (res >> 31) & 1 != 0,
        of: false,
    }
}
