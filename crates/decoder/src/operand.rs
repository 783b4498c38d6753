use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Operand access width. This core is a 32-bit machine; only byte and
// dword operands are encodable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Width {
    W8,
    W32,
}

impl Width {
    #[inline]
    pub fn bytes(self) -> u32 {
        match self {
            Width::W8 => 1,
            Width::W32 => 4,
        }
    }

    #[inline]
    pub fn mask(self) -> u32 {
        match self {
            Width::W8 => 0xFF,
            Width::W32 => 0xFFFF_FFFF,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown register {0:?}")]
pub struct UnknownRegister(pub String);

// The sixteen architectural register names this core recognizes: the
// eight dword registers in IA-32 encoding order, then the eight byte
// sub-registers in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Reg {
    EAX, ECX, EDX, EBX, ESP, EBP, ESI, EDI,
    AL, CL, DL, BL, AH, CH, DH, BH,
}

const R32: [Reg; 8] = [Reg::EAX, Reg::ECX, Reg::EDX, Reg::EBX, Reg::ESP, Reg::EBP, Reg::ESI, Reg::EDI];
const R8: [Reg; 8] = [Reg::AL, Reg::CL, Reg::DL, Reg::BL, Reg::AH, Reg::CH, Reg::DH, Reg::BH];

impl Reg {
    #[inline]
    pub fn r32(enc: u8) -> Reg {
        R32[(enc & 7) as usize]
    }

    #[inline]
    pub fn r8(enc: u8) -> Reg {
        R8[(enc & 7) as usize]
    }

    pub fn from_encoding(enc: u8, width: Width) -> Reg {
        match width {
            Width::W8 => Reg::r8(enc),
            Width::W32 => Reg::r32(enc),
        }
    }

    pub fn width(self) -> Width {
        if (self as u8) < 8 {
            Width::W32
        } else {
            Width::W8
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Reg::EAX => "EAX", Reg::ECX => "ECX", Reg::EDX => "EDX", Reg::EBX => "EBX",
            Reg::ESP => "ESP", Reg::EBP => "EBP", Reg::ESI => "ESI", Reg::EDI => "EDI",
            Reg::AL => "AL", Reg::CL => "CL", Reg::DL => "DL", Reg::BL => "BL",
            Reg::AH => "AH", Reg::CH => "CH", Reg::DH => "DH", Reg::BH => "BH",
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Reg {
    type Err = UnknownRegister;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        R32.iter()
            .chain(R8.iter())
            .copied()
            .find(|r| r.name() == s.to_ascii_uppercase())
            .ok_or_else(|| UnknownRegister(s.to_string()))
    }
}

// Decoded operand. Displacements are stored as read from the byte
// stream; an 8-bit displacement is sign-extended by the executor when
// the effective address is formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Register(Reg),
    Immediate { value: u32, width: Width },
    Memory { addr: u32 },
    RegisterIndirect(Reg),
    RegisterIndirectDisp { base: Reg, disp: u32, width: Width },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Operand::Register(r) => write!(f, "{r}"),
            Operand::Immediate { value, .. } => write!(f, "{value:#X}"),
            Operand::Memory { addr } => write!(f, "[{addr:#X}]"),
            Operand::RegisterIndirect(r) => write!(f, "[{r}]"),
            Operand::RegisterIndirectDisp { base, disp, width } => {
                let disp = match width {
                    Width::W8 => disp as u8 as i8 as i32,
                    Width::W32 => disp as i32,
                };
                if disp < 0 {
                    write!(f, "[{base}-{:#X}]", disp.unsigned_abs())
                } else {
                    write!(f, "[{base}+{disp:#X}]")
                }
            }
        }
    }
}
