//! Universal properties of the core, exercised end-to-end.

use cpu_core::{Cpu, Flags, Registers, RESET_STACK_POINTER};
use mmu_cache::{Mmu, PAGE_SIZE};

#[test]
fn typed_write_read_round_trip() {
    let mut mmu = Mmu::new(65536);
    for (i, addr) in (0x3000u32..0x3F00).step_by(0x3F7).enumerate() {
        let v = (i as u32).wrapping_mul(0x9E37_79B9);
        mmu.write_byte(addr, v as u8).unwrap();
        assert_eq!(mmu.read_byte(addr).unwrap(), v as u8);
        mmu.write_word(addr, v as u16).unwrap();
        assert_eq!(mmu.read_word(addr).unwrap(), v as u16);
        mmu.write_dword(addr, v).unwrap();
        assert_eq!(mmu.read_dword(addr).unwrap(), v);
    }
}

#[test]
fn little_endian_byte_layout() {
    let mut mmu = Mmu::new(65536);
    let v = 0x0102_03FFu32;
    mmu.write_dword(0x2000, v).unwrap();
    for i in 0..4 {
        assert_eq!(mmu.read_byte(0x2000 + i).unwrap() as u32, (v >> (8 * i)) & 0xFF);
    }
}

#[test]
fn reset_baseline() {
    let mut cpu = Cpu::default();
    cpu.load_program(&[0xB8, 9, 9, 9, 9, 0x50, 0xCD, 0x10, 0xF4], 0x1000).unwrap();
    while !cpu.is_halted() {
        cpu.step().unwrap();
    }
    cpu.reset();

    let state = cpu.state();
    let expected = Registers { esp: RESET_STACK_POINTER, ..Default::default() };
    assert_eq!(state.registers, expected);
    assert_eq!(state.eip, 0);
    assert_eq!(state.flags, Flags::empty());
    assert!(!state.halted);
    assert!(!state.interrupt_enabled);

    let stats = cpu.statistics();
    assert_eq!(stats.instructions, 0);
    assert_eq!(stats.cycles, 0);
    assert_eq!(stats.interrupts, 0);
    assert_eq!(stats.mem.tlb_hits, 0);
    assert_eq!(stats.mem.tlb_misses, 0);
    assert_eq!(stats.mem.page_faults, 0);
    assert_eq!(stats.mem.cache_hits, 0);
    assert_eq!(stats.mem.cache_misses, 0);
}

#[test]
fn push_pop_preserves_esp() {
    // MOV EAX,0xDEADBEEF; PUSH EAX; POP EBX; HLT
    let mut cpu = Cpu::default();
    cpu.load_program(&[0xB8, 0xEF, 0xBE, 0xAD, 0xDE, 0x50, 0x5B, 0xF4], 0x1000).unwrap();
    while !cpu.is_halted() {
        cpu.step().unwrap();
    }
    let state = cpu.state();
    assert_eq!(state.registers.ebx, 0xDEAD_BEEF);
    assert_eq!(state.registers.esp, RESET_STACK_POINTER);
}

#[test]
fn call_ret_resumes_after_call() {
    // 0x1000: CALL 0x1008; 0x1005: MOV AL,1; 0x1007: HLT
    // 0x1008: MOV BL,2; 0x100A: RET
    let mut cpu = Cpu::default();
    cpu.load_program(
        &[
            0xE8, 0x08, 0x10, 0x00, 0x00, // CALL 0x1008 (absolute target)
            0xB0, 0x01, // MOV AL, 1
            0xF4, // HLT
            0xB3, 0x02, // MOV BL, 2
            0xC3, // RET
        ],
        0x1000,
    )
    .unwrap();
    while !cpu.is_halted() {
        cpu.step().unwrap();
    }
    let state = cpu.state();
    assert_eq!(state.registers.eax, 1, "fell back to the instruction after CALL");
    assert_eq!(state.registers.ebx, 2, "callee ran");
    assert_eq!(state.registers.esp, RESET_STACK_POINTER);
}

#[test]
fn loaded_pages_survive_paging_pressure() {
    // Two frames of physical memory: the program page is pinned, so every
    // other page fights over the one remaining frame.
    let mut cpu = Cpu::new(2 * PAGE_SIZE);
    let program = [0x90, 0xF4];
    cpu.load_program(&program, 0).unwrap();
    assert!(cpu.mmu().is_page_protected(0));

    for page in 1..=8u32 {
        cpu.mmu_mut().write_byte(page * PAGE_SIZE, page as u8).unwrap();
    }
    assert!(cpu.mmu().page_entry(0).is_some());
    assert_eq!(cpu.mmu_mut().read_byte(0).unwrap(), 0x90);
    assert_eq!(cpu.mmu_mut().read_byte(1).unwrap(), 0xF4);

    // And the pinned program still runs
    while !cpu.is_halted() {
        cpu.step().unwrap();
    }
}

#[test]
fn flag_laws() {
    // AND EAX, imm32 -> CF=0, OF=0
    let mut cpu = Cpu::default();
    cpu.load_program(&[0x25, 0x0F, 0x00, 0x00, 0x00, 0xF4], 0x1000).unwrap();
    while !cpu.is_halted() {
        cpu.step().unwrap();
    }
    assert!(!cpu.state().flags.intersects(Flags::CF | Flags::OF));

    // CMP a,b: ZF iff a=b, CF iff a<b unsigned
    let cases: [(u32, u32); 4] = [(5, 5), (3, 9), (9, 3), (0, 0xFFFF_FFFF)];
    for (a, b) in cases {
        let mut program = vec![0xB8];
        program.extend_from_slice(&a.to_le_bytes()); // MOV EAX, a
        program.push(0xBB);
        program.extend_from_slice(&b.to_le_bytes()); // MOV EBX, b
        program.extend_from_slice(&[0x39, 0xD8]); // CMP EAX, EBX
        program.push(0xF4);
        let mut cpu = Cpu::default();
        cpu.load_program(&program, 0x1000).unwrap();
        while !cpu.is_halted() {
            cpu.step().unwrap();
        }
        let flags = cpu.state().flags;
        assert_eq!(flags.contains(Flags::ZF), a == b, "ZF for {a:#x} cmp {b:#x}");
        assert_eq!(flags.contains(Flags::CF), a < b, "CF for {a:#x} cmp {b:#x}");
    }

    // XOR r,r: ZF=1, SF=0, CF=0, OF=0
    let mut cpu = Cpu::default();
    cpu.load_program(&[0xB9, 7, 7, 7, 7, 0x31, 0xC9, 0xF4], 0x1000).unwrap();
    while !cpu.is_halted() {
        cpu.step().unwrap();
    }
    let flags = cpu.state().flags;
    assert!(flags.contains(Flags::ZF));
    assert!(!flags.intersects(Flags::SF | Flags::CF | Flags::OF));
}

#[test]
fn tlb_hits_grow_by_one_per_access() {
    let mut mmu = Mmu::new(65536);
    mmu.read_byte(0x4000).unwrap();
    let baseline = mmu.statistics().tlb_hits;
    for i in 1..=10u64 {
        mmu.read_byte(0x4000 + (i as u32 % PAGE_SIZE)).unwrap();
        assert_eq!(mmu.statistics().tlb_hits, baseline + i);
    }
}

#[test]
fn write_through_visibility() {
    let mut mmu = Mmu::new(65536);
    // Cold cache
    mmu.write_byte(0x5000, 0x11).unwrap();
    assert_eq!(mmu.read_byte(0x5000).unwrap(), 0x11);
    // Warm cache: the line is resident, a write must still be visible
    mmu.write_byte(0x5000, 0x22).unwrap();
    assert_eq!(mmu.read_byte(0x5000).unwrap(), 0x22);
    // And through the dword path
    mmu.write_dword(0x5000, 0x3344_5566).unwrap();
    assert_eq!(mmu.read_byte(0x5000).unwrap(), 0x66);
}
