use mmu_cache::{MemError, Mmu};

use crate::inst::{Instruction, Mnemonic};
use crate::operand::{Operand, Reg, Width};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown opcode {opcode:#04x} at {addr:#x}")]
    UnknownOpcode { opcode: u8, addr: u32 },
    #[error("unknown two-byte opcode 0f {opcode:02x} at {addr:#x}")]
    UnknownExtended { opcode: u8, addr: u32 },
    #[error("opcode {opcode:#04x} has no operation for modrm reg field {reg}")]
    InvalidGroup { opcode: u8, reg: u8 },
    #[error(transparent)]
    Mem(#[from] MemError),
}

// 0x81/0x83 sub-operation table, indexed by ModR/M.reg.
const GROUP1: [Mnemonic; 8] = [
    Mnemonic::ADD, Mnemonic::OR, Mnemonic::ADC, Mnemonic::SBB,
    Mnemonic::AND, Mnemonic::SUB, Mnemonic::XOR, Mnemonic::CMP,
];

// Condition mnemonics for 0x70..=0x7F, in opcode order.
const JCC: [Mnemonic; 16] = [
    Mnemonic::JO, Mnemonic::JNO, Mnemonic::JC, Mnemonic::JNC,
    Mnemonic::JZ, Mnemonic::JNZ, Mnemonic::JBE, Mnemonic::JA,
    Mnemonic::JS, Mnemonic::JNS, Mnemonic::JP, Mnemonic::JNP,
    Mnemonic::JL, Mnemonic::JGE, Mnemonic::JLE, Mnemonic::JG,
];

struct ModRm {
    rm: Operand,
    reg_op: Operand,
    reg: u8,
    // Bytes consumed: the ModR/M byte itself plus any displacement.
    len: u32,
}

// Stateless instruction decoder over an Mmu. Decode fetches go through
// the normal read path, so they warm the TLB/caches and show up in the
// access statistics.
#[derive(Debug, Default)]
pub struct Decoder;

impl Decoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, mmu: &mut Mmu, addr: u32) -> Result<Instruction, DecodeError> {
        let opcode = mmu.read_byte(addr)?;
        match opcode {
            // ALU/MOV r/m, r with the width in bit 0
            0x00 | 0x01 | 0x08 | 0x09 | 0x20 | 0x21 | 0x28 | 0x29 | 0x30 | 0x31 | 0x38 | 0x39
            | 0x88 | 0x89 => {
                let m = self.modrm(mmu, addr + 1, width_of(opcode))?;
                Ok(inst(opcode, family_mnemonic(opcode), vec![m.rm, m.reg_op], 1 + m.len))
            }
            // ADD r, r/m (direction reversed)
            0x02 | 0x03 => {
                let m = self.modrm(mmu, addr + 1, width_of(opcode))?;
                Ok(inst(opcode, Mnemonic::ADD, vec![m.reg_op, m.rm], 1 + m.len))
            }
            // AND/XOR/CMP EAX, imm32
            0x25 | 0x35 | 0x3D => {
                let mnemonic = match opcode {
                    0x25 => Mnemonic::AND,
                    0x35 => Mnemonic::XOR,
                    _ => Mnemonic::CMP,
                };
                let value = mmu.read_dword(addr + 1)?;
                let ops = vec![Operand::Register(Reg::EAX), imm32(value)];
                Ok(inst(opcode, mnemonic, ops, 5))
            }
            0x40..=0x47 => Ok(inst(opcode, Mnemonic::INC, vec![reg32(opcode)], 1)),
            0x48..=0x4F => Ok(inst(opcode, Mnemonic::DEC, vec![reg32(opcode)], 1)),
            0x50..=0x57 => Ok(inst(opcode, Mnemonic::PUSH, vec![reg32(opcode)], 1)),
            0x58..=0x5F => Ok(inst(opcode, Mnemonic::POP, vec![reg32(opcode)], 1)),
            // MOVSXD r32, r/m32: a plain dword copy on this machine
            0x63 => {
                let m = self.modrm(mmu, addr + 1, Width::W32)?;
                Ok(inst(opcode, Mnemonic::MOVSXD, vec![m.reg_op, m.rm], 1 + m.len))
            }
            // Short conditional jumps, rel8
            0x70..=0x7F => {
                let value = mmu.read_byte(addr + 1)? as u32;
                let mnemonic = JCC[(opcode - 0x70) as usize];
                Ok(inst(opcode, mnemonic, vec![imm8(value)], 2))
            }
            // Group 1: ALU r/m32, imm32
            0x81 => {
                let m = self.modrm(mmu, addr + 1, Width::W32)?;
                let value = mmu.read_dword(addr + 1 + m.len)?;
                Ok(inst(opcode, GROUP1[m.reg as usize], vec![m.rm, imm32(value)], 1 + m.len + 4))
            }
            // Group 1: ALU r/m32, imm8 (kept raw, never sign-extended)
            0x83 => {
                let m = self.modrm(mmu, addr + 1, Width::W32)?;
                let value = mmu.read_byte(addr + 1 + m.len)? as u32;
                Ok(inst(opcode, GROUP1[m.reg as usize], vec![m.rm, imm8(value)], 1 + m.len + 1))
            }
            0x85 => {
                let m = self.modrm(mmu, addr + 1, Width::W32)?;
                Ok(inst(opcode, Mnemonic::TEST, vec![m.rm, m.reg_op], 1 + m.len))
            }
            0x87 => {
                let m = self.modrm(mmu, addr + 1, Width::W32)?;
                Ok(inst(opcode, Mnemonic::XCHG, vec![m.rm, m.reg_op], 1 + m.len))
            }
            0x90 => Ok(inst(opcode, Mnemonic::NOP, vec![], 1)),
            0x9C => Ok(inst(opcode, Mnemonic::PUSHF, vec![], 1)),
            0x9D => Ok(inst(opcode, Mnemonic::POPF, vec![], 1)),
            // MOV [imm32], EAX
            0xA3 => {
                let target = mmu.read_dword(addr + 1)?;
                let ops = vec![Operand::Memory { addr: target }, Operand::Register(Reg::EAX)];
                Ok(inst(opcode, Mnemonic::MOV, ops, 5))
            }
            // MOV r8, imm8
            0xB0..=0xB7 => {
                let value = mmu.read_byte(addr + 1)? as u32;
                let ops = vec![Operand::Register(Reg::r8(opcode - 0xB0)), imm8(value)];
                Ok(inst(opcode, Mnemonic::MOV, ops, 2))
            }
            // MOV r32, imm32
            0xB8..=0xBF => {
                let value = mmu.read_dword(addr + 1)?;
                let ops = vec![Operand::Register(Reg::r32(opcode - 0xB8)), imm32(value)];
                Ok(inst(opcode, Mnemonic::MOV, ops, 5))
            }
            // Shift r/m32, imm8
            0xC1 => {
                let m = self.modrm(mmu, addr + 1, Width::W32)?;
                let mnemonic = shift_mnemonic(opcode, m.reg)?;
                let value = mmu.read_byte(addr + 1 + m.len)? as u32;
                Ok(inst(opcode, mnemonic, vec![m.rm, imm8(value)], 1 + m.len + 1))
            }
            0xC3 => Ok(inst(opcode, Mnemonic::RET, vec![], 1)),
            0xCD => {
                let value = mmu.read_byte(addr + 1)? as u32;
                Ok(inst(opcode, Mnemonic::INT, vec![imm8(value)], 2))
            }
            // Shift r/m32, 1
            0xD1 => {
                let m = self.modrm(mmu, addr + 1, Width::W32)?;
                let mnemonic = shift_mnemonic(opcode, m.reg)?;
                Ok(inst(opcode, mnemonic, vec![m.rm, imm8(1)], 1 + m.len))
            }
            0xE8 => {
                let value = mmu.read_dword(addr + 1)?;
                Ok(inst(opcode, Mnemonic::CALL, vec![imm32(value)], 5))
            }
            0xE9 => {
                let value = mmu.read_dword(addr + 1)?;
                Ok(inst(opcode, Mnemonic::JMP, vec![imm32(value)], 5))
            }
            0xEB => {
                let value = mmu.read_byte(addr + 1)? as u32;
                Ok(inst(opcode, Mnemonic::JMP, vec![imm8(value)], 2))
            }
            0xF4 => Ok(inst(opcode, Mnemonic::HLT, vec![], 1)),
            // Group 3
            0xF7 => {
                let m = self.modrm(mmu, addr + 1, Width::W32)?;
                match m.reg {
                    0 | 1 => {
                        let value = mmu.read_dword(addr + 1 + m.len)?;
                        Ok(inst(opcode, Mnemonic::TEST, vec![m.rm, imm32(value)], 1 + m.len + 4))
                    }
                    2 => Ok(inst(opcode, Mnemonic::NOT, vec![m.rm], 1 + m.len)),
                    3 => Ok(inst(opcode, Mnemonic::NEG, vec![m.rm], 1 + m.len)),
                    4 => Ok(inst(opcode, Mnemonic::MUL, vec![m.rm], 1 + m.len)),
                    5 => Ok(inst(opcode, Mnemonic::IMUL, vec![m.rm], 1 + m.len)),
                    6 => Ok(inst(opcode, Mnemonic::DIV, vec![m.rm], 1 + m.len)),
                    _ => Ok(inst(opcode, Mnemonic::IDIV, vec![m.rm], 1 + m.len)),
                }
            }
            0xFA => Ok(inst(opcode, Mnemonic::CLI, vec![], 1)),
            0xFB => Ok(inst(opcode, Mnemonic::STI, vec![], 1)),
            0xFC => Ok(inst(opcode, Mnemonic::CLD, vec![], 1)),
            0xFD => Ok(inst(opcode, Mnemonic::STD, vec![], 1)),
            0x0F => self.decode_extended(mmu, addr),
            _ => Err(DecodeError::UnknownOpcode { opcode, addr }),
        }
    }

    // Two-byte 0x0F map.
    fn decode_extended(&self, mmu: &mut Mmu, addr: u32) -> Result<Instruction, DecodeError> {
        let second = mmu.read_byte(addr + 1)?;
        let opcode = 0x0F00 | second as u16;
        match second {
            0x31 => Ok(Instruction { opcode, mnemonic: Mnemonic::RDTSC, operands: vec![], size: 2 }),
            0x8C => {
                let value = mmu.read_dword(addr + 2)?;
                Ok(Instruction { opcode, mnemonic: Mnemonic::JL, operands: vec![imm32(value)], size: 6 })
            }
            0xAF => {
                let m = self.modrm(mmu, addr + 2, Width::W32)?;
                Ok(Instruction {
                    opcode,
                    mnemonic: Mnemonic::IMUL2,
                    operands: vec![m.reg_op, m.rm],
                    size: 2 + m.len,
                })
            }
            0xC7 => {
                let m = self.modrm(mmu, addr + 2, Width::W32)?;
                let mnemonic = match m.reg {
                    6 => Mnemonic::RDRAND,
                    7 => Mnemonic::RDSEED,
                    reg => return Err(DecodeError::InvalidGroup { opcode: 0xC7, reg }),
                };
                Ok(Instruction { opcode, mnemonic, operands: vec![m.rm], size: 2 + m.len })
            }
            _ => Err(DecodeError::UnknownExtended { opcode: second, addr }),
        }
    }

    // Standard IA-32 ModR/M layout: mod in bits 7-6, reg in 5-3, r/m in
    // 2-0. Addressing registers are always the dword set; width only
    // selects the register file for mod=0b11 and the reg field.
    fn modrm(&self, mmu: &mut Mmu, addr: u32, width: Width) -> Result<ModRm, DecodeError> {
        let byte = mmu.read_byte(addr)?;
        let mode = byte >> 6;
        let reg = (byte >> 3) & 0x7;
        let rm = byte & 0x7;
        let reg_op = Operand::Register(Reg::from_encoding(reg, width));
        let (rm_op, len) = match mode {
            0b00 if rm == 5 => {
                let direct = mmu.read_dword(addr + 1)?;
                (Operand::Memory { addr: direct }, 5)
            }
            0b00 => (Operand::RegisterIndirect(Reg::r32(rm)), 1),
            0b01 => {
                let disp = mmu.read_byte(addr + 1)? as u32;
                (Operand::RegisterIndirectDisp { base: Reg::r32(rm), disp, width: Width::W8 }, 2)
            }
            0b10 => {
                let disp = mmu.read_dword(addr + 1)?;
                (Operand::RegisterIndirectDisp { base: Reg::r32(rm), disp, width: Width::W32 }, 5)
            }
            _ => (Operand::Register(Reg::from_encoding(rm, width)), 1),
        };
        Ok(ModRm { rm: rm_op, reg_op, reg, len })
    }
}

fn inst(opcode: u8, mnemonic: Mnemonic, operands: Vec<Operand>, size: u32) -> Instruction {
    Instruction { opcode: opcode as u16, mnemonic, operands, size }
}

#[inline]
fn width_of(opcode: u8) -> Width {
    if opcode & 1 == 0 {
        Width::W8
    } else {
        Width::W32
    }
}

fn family_mnemonic(opcode: u8) -> Mnemonic {
    match opcode & !1 {
        0x00 => Mnemonic::ADD,
        0x08 => Mnemonic::OR,
        0x20 => Mnemonic::AND,
        0x28 => Mnemonic::SUB,
        0x30 => Mnemonic::XOR,
        0x38 => Mnemonic::CMP,
        _ => Mnemonic::MOV,
    }
}

fn shift_mnemonic(opcode: u8, reg: u8) -> Result<Mnemonic, DecodeError> {
    match reg {
        4 => Ok(Mnemonic::SHL),
        5 => Ok(Mnemonic::SHR),
        _ => Err(DecodeError::InvalidGroup { opcode, reg }),
    }
}

#[inline]
fn imm8(value: u32) -> Operand {
    Operand::Immediate { value, width: Width::W8 }
}

#[inline]
fn imm32(value: u32) -> Operand {
    Operand::Immediate { value, width: Width::W32 }
}

#[inline]
fn reg32(opcode: u8) -> Operand {
    Operand::Register(Reg::r32(opcode & 0x7))
}
