use std::collections::BTreeSet;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use decoder::{Decoder, Instruction, Reg};
use mmu_cache::Mmu;

use crate::error::CpuError;
use crate::flags::Flags;
use crate::regs::RegFile;
use crate::state::{ControlRegisters, CpuState, Registers, SegmentRegisters};
use crate::stats::{cycle_cost, CpuCounters, CpuStatistics};

pub const DEFAULT_MEMORY_SIZE: u32 = 65536;
pub const RESET_STACK_POINTER: u32 = 0xFFFF;

// The simulated processor: architectural state plus the owned MMU and
// decoder. One step is atomic with respect to the outside world.
pub struct Cpu {
    pub(crate) regs: RegFile,
    pub(crate) flags: Flags,
    pub(crate) halted: bool,
    pub(crate) interrupt_enabled: bool,
    pub(crate) mmu: Mmu,
    decoder: Decoder,
    pub(crate) counters: CpuCounters,
    breakpoints: BTreeSet<u32>,
    pub(crate) epoch: Instant,
    pub(crate) rng: StdRng,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_SIZE)
    }
}

impl Cpu {
    pub fn new(memory_size: u32) -> Self {
        let mut regs = RegFile::default();
        regs.set(Reg::ESP, RESET_STACK_POINTER);
        Self {
            regs,
            flags: Flags::empty(),
            halted: false,
            interrupt_enabled: false,
            mmu: Mmu::new(memory_size),
            decoder: Decoder::new(),
            counters: CpuCounters::default(),
            breakpoints: BTreeSet::new(),
            epoch: Instant::now(),
            rng: StdRng::from_entropy(),
        }
    }

    // Architectural reset: registers, flags, EIP, halt state, statistics,
    // and the whole memory-side cache/mapping state. Breakpoints survive;
    // page pinning is re-established by the next load_program.
    pub fn reset(&mut self) {
        self.regs = RegFile::default();
        self.regs.set(Reg::ESP, RESET_STACK_POINTER);
        self.flags = Flags::empty();
        self.halted = false;
        self.interrupt_enabled = false;
        self.counters = CpuCounters::default();
        self.mmu.reset();
    }

    // Loads a flat image through the MMU, pinning its pages, and points
    // EIP at the first byte.
    pub fn load_program(&mut self, bytes: &[u8], addr: u32) -> Result<(), CpuError> {
        self.mmu.load_program(bytes, addr)?;
        self.regs.eip = addr;
        Ok(())
    }

    // One fetch-decode-execute round. EIP advances past the instruction
    // unless the instruction itself wrote EIP.
    pub fn step(&mut self) -> Result<(), CpuError> {
        if self.halted {
            return Ok(());
        }
        let eip0 = self.regs.eip;
        let instr = self.decoder.decode(&mut self.mmu, eip0)?;
        self.execute(&instr)?;
        self.counters.instructions += 1;
        self.counters.cycles += cycle_cost(instr.mnemonic);
        if self.regs.eip == eip0 {
            self.regs.eip = eip0.wrapping_add(instr.size);
        }
        Ok(())
    }

    pub fn run_until_breakpoint(&mut self) -> Result<(), CpuError> {
        while !self.halted && !self.breakpoints.contains(&self.regs.eip) {
            self.step()?;
        }
        Ok(())
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_at_breakpoint(&self) -> bool {
        self.breakpoints.contains(&self.regs.eip)
    }

    pub fn set_breakpoint(&mut self, addr: u32) {
        self.breakpoints.insert(addr);
    }

    pub fn remove_breakpoint(&mut self, addr: u32) {
        self.breakpoints.remove(&addr);
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    pub fn eip(&self) -> u32 {
        self.regs.eip
    }

    pub fn set_eip(&mut self, addr: u32) {
        self.regs.eip = addr;
    }

    pub fn register(&self, r: Reg) -> u32 {
        self.regs.get(r)
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn state(&self) -> CpuState {
        CpuState {
            registers: Registers {
                eax: self.regs.get(Reg::EAX),
                ebx: self.regs.get(Reg::EBX),
                ecx: self.regs.get(Reg::ECX),
                edx: self.regs.get(Reg::EDX),
                esi: self.regs.get(Reg::ESI),
                edi: self.regs.get(Reg::EDI),
                ebp: self.regs.get(Reg::EBP),
                esp: self.regs.get(Reg::ESP),
            },
            eip: self.regs.eip,
            flags: self.flags,
            halted: self.halted,
            interrupt_enabled: self.interrupt_enabled,
            segment_registers: SegmentRegisters::default(),
            control_registers: ControlRegisters::default(),
        }
    }

    pub fn statistics(&self) -> CpuStatistics {
        self.counters.snapshot(self.mmu.statistics())
    }

    pub fn instruction_at(&mut self, addr: u32) -> Result<Instruction, CpuError> {
        Ok(self.decoder.decode(&mut self.mmu, addr)?)
    }

    // Decodes up to count consecutive instructions from addr, stopping
    // quietly at the first undecodable byte.
    pub fn instructions_at(&mut self, addr: u32, count: usize) -> Vec<Instruction> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = addr;
        for _ in 0..count {
            match self.instruction_at(cursor) {
                Ok(instr) => {
                    cursor = cursor.wrapping_add(instr.size);
                    out.push(instr);
                }
                Err(_) => break,
            }
        }
        out
    }

    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    pub fn mmu_mut(&mut self) -> &mut Mmu {
        &mut self.mmu
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }
}
