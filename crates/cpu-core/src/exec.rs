use rand::Rng;

use decoder::{Instruction, Mnemonic, Operand, Reg, Width};

use crate::cpu::Cpu;
use crate::error::CpuError;
use crate::flags::{alu_add, alu_sub, logic_flags, parity8, Flags, FlagsOut};

// A byte register anywhere in the operand list makes the whole operation
// byte-wide; everything else runs at dword width.
fn operand_width(operands: &[Operand]) -> Width {
    let byte = operands
        .iter()
        .any(|op| matches!(op, Operand::Register(r) if r.width() == Width::W8));
    if byte {
        Width::W8
    } else {
        Width::W32
    }
}

// 8-bit displacements sign-extend when the effective address is formed;
// 32-bit displacements wrap as-is.
fn displacement(disp: u32, width: Width) -> u32 {
    match width {
        Width::W8 => disp as u8 as i8 as i32 as u32,
        Width::W32 => disp,
    }
}

impl Cpu {
    pub(crate) fn execute(&mut self, instr: &Instruction) -> Result<(), CpuError> {
        use Mnemonic::*;
        let width = operand_width(&instr.operands);
        match instr.mnemonic {
            MOV | MOVSXD => {
                let value = self.read_operand(&instr.operands[1], width)?;
                self.write_operand(&instr.operands[0], width, value)?;
            }
            ADD | ADC | SUB | SBB | CMP => {
                let a = self.read_operand(&instr.operands[0], width)?;
                let b = self.read_operand(&instr.operands[1], width)?;
                let carry = self.flags.contains(Flags::CF);
                let (res, out) = match instr.mnemonic {
                    ADD => alu_add(a, b, false),
                    ADC => alu_add(a, b, carry),
                    SBB => alu_sub(a, b, carry),
                    _ => alu_sub(a, b, false),
                };
                if instr.mnemonic != CMP {
                    self.write_operand(&instr.operands[0], width, res)?;
                }
                self.apply(out);
            }
            AND | OR | XOR | TEST => {
                let a = self.read_operand(&instr.operands[0], width)?;
                let b = self.read_operand(&instr.operands[1], width)?;
                let res = match instr.mnemonic {
                    OR => a | b,
                    XOR => a ^ b,
                    _ => a & b,
                };
                if instr.mnemonic != TEST {
                    self.write_operand(&instr.operands[0], width, res)?;
                }
                self.apply(logic_flags(res));
            }
            // CF is recomputed here, unlike hardware INC/DEC; the whole
            // ALU shares one flag updater in this model.
            INC | DEC => {
                let a = self.read_operand(&instr.operands[0], width)?;
                let (res, out) = if instr.mnemonic == INC {
                    alu_add(a, 1, false)
                } else {
                    alu_sub(a, 1, false)
                };
                self.write_operand(&instr.operands[0], width, res)?;
                self.apply(out);
            }
            PUSH => {
                let value = self.read_operand(&instr.operands[0], Width::W32)?;
                self.push(value)?;
            }
            POP => {
                let value = self.pop()?;
                self.write_operand(&instr.operands[0], Width::W32, value)?;
            }
            XCHG => {
                let a = self.read_operand(&instr.operands[0], width)?;
                let b = self.read_operand(&instr.operands[1], width)?;
                self.write_operand(&instr.operands[0], width, b)?;
                self.write_operand(&instr.operands[1], width, a)?;
            }
            NOT => {
                let value = self.read_operand(&instr.operands[0], width)?;
                self.write_operand(&instr.operands[0], width, !value)?;
            }
            NEG => {
                let value = self.read_operand(&instr.operands[0], width)?;
                let (res, out) = alu_sub(0, value, false);
                self.write_operand(&instr.operands[0], width, res)?;
                self.apply(out);
            }
            MUL => {
                let src = self.read_operand(&instr.operands[0], Width::W32)?;
                let product = self.regs.get(Reg::EAX) as u64 * src as u64;
                self.regs.set(Reg::EAX, product as u32);
                self.regs.set(Reg::EDX, 0);
                let wide = product > u32::MAX as u64;
                self.flags.set(Flags::CF, wide);
                self.flags.set(Flags::OF, wide);
            }
            IMUL => {
                let src = self.read_operand(&instr.operands[0], Width::W32)? as i32 as i64;
                let product = (self.regs.get(Reg::EAX) as i32 as i64) * src;
                self.regs.set(Reg::EAX, product as u32);
                self.regs.set(Reg::EDX, 0);
                let wide = product != product as i32 as i64;
                self.flags.set(Flags::CF, wide);
                self.flags.set(Flags::OF, wide);
            }
            IMUL2 => {
                let a = self.read_operand(&instr.operands[0], Width::W32)? as i32 as i64;
                let b = self.read_operand(&instr.operands[1], Width::W32)? as i32 as i64;
                let product = a * b;
                let res = product as u32;
                self.write_operand(&instr.operands[0], Width::W32, res)?;
                let wide = product != product as i32 as i64;
                self.flags.set(Flags::CF, wide);
                self.flags.set(Flags::OF, wide);
                self.flags.set(Flags::ZF, res == 0);
                self.flags.set(Flags::SF, res >> 31 != 0);
                self.flags.set(Flags::PF, parity8(res as u8));
            }
            DIV => {
                let divisor = self.read_operand(&instr.operands[0], Width::W32)?;
                if divisor == 0 {
                    return Err(CpuError::DivideByZero);
                }
                let dividend = self.regs.get(Reg::EAX);
                self.regs.set(Reg::EAX, dividend / divisor);
                self.regs.set(Reg::EDX, dividend % divisor);
            }
            IDIV => {
                let divisor = self.read_operand(&instr.operands[0], Width::W32)? as i32;
                if divisor == 0 {
                    return Err(CpuError::DivideByZero);
                }
                let dividend = self.regs.get(Reg::EAX) as i32 as i64;
                let quotient = dividend / divisor as i64;
                let remainder = dividend % divisor as i64;
                if quotient < i32::MIN as i64 || quotient > i32::MAX as i64 {
                    return Err(CpuError::DivideOverflow);
                }
                self.regs.set(Reg::EAX, quotient as i32 as u32);
                self.regs.set(Reg::EDX, remainder as i32 as u32);
            }
            SHL | SHR => self.shift(instr, width)?,
            CALL => {
                let ret = self.regs.eip.wrapping_add(instr.size);
                self.push(ret)?;
                self.jump(&instr.operands[0])?;
            }
            RET => {
                let target = self.pop()?;
                self.regs.eip = target;
            }
            JMP => self.jump(&instr.operands[0])?,
            JO | JNO | JC | JNC | JZ | JNZ | JBE | JA | JS | JNS | JP | JNP | JL | JGE | JLE
            | JG => {
                if self.condition(instr.mnemonic) {
                    self.jump(&instr.operands[0])?;
                }
            }
            INT => {
                self.counters.interrupts += 1;
            }
            HLT => {
                self.halted = true;
            }
            NOP => {}
            CLI => self.set_interrupt_flag(false),
            STI => self.set_interrupt_flag(true),
            CLD => self.flags.remove(Flags::DF),
            STD => self.flags.insert(Flags::DF),
            PUSHF => {
                let word = self.flags.to_word();
                self.push(word)?;
            }
            POPF => {
                let word = self.pop()?;
                self.flags = Flags::from_word(word);
                self.interrupt_enabled = self.flags.contains(Flags::IF);
            }
            RDRAND | RDSEED => {
                let value: u32 = self.rng.gen();
                self.write_operand(&instr.operands[0], Width::W32, value)?;
                self.flags.insert(Flags::CF);
                self.flags
                    .remove(Flags::OF | Flags::SF | Flags::ZF | Flags::AF | Flags::PF);
            }
            RDTSC => {
                let micros = self.epoch.elapsed().as_micros() as u64;
                self.regs.set(Reg::EAX, micros as u32);
                self.regs.set(Reg::EDX, (micros >> 32) as u32);
            }
        }
        Ok(())
    }

    // Shift counts take effect modulo 32, matching the original host's
    // native shift; an effective count of zero changes nothing.
    fn shift(&mut self, instr: &Instruction, width: Width) -> Result<(), CpuError> {
        let value = self.read_operand(&instr.operands[0], width)?;
        let count = self.read_operand(&instr.operands[1], Width::W8)? & 0x1F;
        if count == 0 {
            return Ok(());
        }
        let left = instr.mnemonic == Mnemonic::SHL;
        let res = if left { value << count } else { value >> count };
        self.write_operand(&instr.operands[0], width, res)?;

        let cf = if left {
            (value >> (32 - count)) & 1 != 0
        } else {
            (value >> (count - 1)) & 1 != 0
        };
        self.flags.set(Flags::CF, cf);
        if count == 1 {
            let of = if left {
                ((value >> 31) & 1) != ((value >> 30) & 1)
            } else {
                value >> 31 != 0
            };
            self.flags.set(Flags::OF, of);
        }
        self.flags.set(Flags::ZF, res == 0);
        self.flags.set(Flags::SF, res >> 31 != 0);
        self.flags.set(Flags::PF, parity8(res as u8));
        Ok(())
    }

    // Control transfer: a byte operand is a signed offset from the opcode
    // address; a dword operand is an absolute EIP (this machine's JMP32
    // convention).
    fn jump(&mut self, target: &Operand) -> Result<(), CpuError> {
        match *target {
            Operand::Immediate { value, width: Width::W8 } => {
                let disp = value as u8 as i8 as i32;
                self.regs.eip = self.regs.eip.wrapping_add(disp as u32);
            }
            Operand::Immediate { value, width: Width::W32 } => {
                self.regs.eip = value;
            }
            _ => {
                let value = self.read_operand(target, Width::W32)?;
                self.regs.eip = value;
            }
        }
        Ok(())
    }

    fn condition(&self, mnemonic: Mnemonic) -> bool {
        use Mnemonic::*;
        let cf = self.flags.contains(Flags::CF);
        let zf = self.flags.contains(Flags::ZF);
        let sf = self.flags.contains(Flags::SF);
        let of = self.flags.contains(Flags::OF);
        let pf = self.flags.contains(Flags::PF);
        match mnemonic {
            JO => of,
            JNO => !of,
            JC => cf,
            JNC => !cf,
            JZ => zf,
            JNZ => !zf,
            JBE => cf || zf,
            JA => !cf && !zf,
            JS => sf,
            JNS => !sf,
            JP => pf,
            JNP => !pf,
            JL => sf != of,
            JGE => sf == of,
            JLE => zf || sf != of,
            JG => !zf && sf == of,
            _ => false,
        }
    }

    pub(crate) fn push(&mut self, value: u32) -> Result<(), CpuError> {
        let esp = self.regs.get(Reg::ESP).wrapping_sub(4);
        self.mmu.write_dword(esp, value)?;
        self.regs.set(Reg::ESP, esp);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Result<u32, CpuError> {
        let esp = self.regs.get(Reg::ESP);
        let value = self.mmu.read_dword(esp)?;
        self.regs.set(Reg::ESP, esp.wrapping_add(4));
        Ok(value)
    }

    pub(crate) fn set_interrupt_flag(&mut self, enabled: bool) {
        self.flags.set(Flags::IF, enabled);
        self.interrupt_enabled = enabled;
    }

    fn apply(&mut self, out: FlagsOut) {
        self.flags.set(Flags::CF, out.cf);
        self.flags.set(Flags::PF, out.pf);
        self.flags.set(Flags::AF, out.af);
        self.flags.set(Flags::ZF, out.zf);
        self.flags.set(Flags::SF, out.sf);
        self.flags.set(Flags::OF, out.of);
    }

    fn read_operand(&mut self, op: &Operand, width: Width) -> Result<u32, CpuError> {
        match *op {
            Operand::Register(r) => Ok(self.regs.get(r)),
            Operand::Immediate { value, .. } => Ok(value),
            Operand::Memory { addr } => self.read_mem(addr, width),
            Operand::RegisterIndirect(base) => {
                let addr = self.regs.get(base);
                self.read_mem(addr, width)
            }
            Operand::RegisterIndirectDisp { base, disp, width: dw } => {
                let addr = self.regs.get(base).wrapping_add(displacement(disp, dw));
                self.read_mem(addr, width)
            }
        }
    }

    fn write_operand(&mut self, op: &Operand, width: Width, value: u32) -> Result<(), CpuError> {
        match *op {
            Operand::Register(r) => {
                self.regs.set(r, value);
                Ok(())
            }
            Operand::Immediate { .. } => unreachable!("immediate operand as destination"),
            Operand::Memory { addr } => self.write_mem(addr, width, value),
            Operand::RegisterIndirect(base) => {
                let addr = self.regs.get(base);
                self.write_mem(addr, width, value)
            }
            Operand::RegisterIndirectDisp { base, disp, width: dw } => {
                let addr = self.regs.get(base).wrapping_add(displacement(disp, dw));
                self.write_mem(addr, width, value)
            }
        }
    }

    fn read_mem(&mut self, addr: u32, width: Width) -> Result<u32, CpuError> {
        Ok(match width {
            Width::W8 => self.mmu.read_byte(addr)? as u32,
            Width::W32 => self.mmu.read_dword(addr)?,
        })
    }

    fn write_mem(&mut self, addr: u32, width: Width, value: u32) -> Result<(), CpuError> {
        match width {
            Width::W8 => self.mmu.write_byte(addr, value as u8)?,
            Width::W32 => self.mmu.write_dword(addr, value)?,
        }
        Ok(())
    }
}
