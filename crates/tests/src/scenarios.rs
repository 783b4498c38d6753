//! The six literal-byte scenario programs, loaded at 0x1000 in a 64 KiB
//! machine.

use cpu_core::{Cpu, CpuError, Flags, RESET_STACK_POINTER};

const BASE: u32 = 0x1000;

fn run(bytes: &[u8]) -> Cpu {
    let mut cpu = Cpu::default();
    cpu.load_program(bytes, BASE).unwrap();
    while !cpu.is_halted() {
        cpu.step().unwrap();
    }
    cpu
}

#[test]
fn immediate_load_and_alu() {
    // MOV EAX,42; MOV EBX,3; ADD EAX,EBX; HLT
    let cpu = run(&[
        0xB8, 0x2A, 0x00, 0x00, 0x00,
        0xBB, 0x03, 0x00, 0x00, 0x00,
        0x01, 0xD8,
        0xF4,
    ]);
    let state = cpu.state();
    assert_eq!(state.registers.eax, 45);
    assert_eq!(state.registers.ebx, 3);
    assert!(!state.flags.contains(Flags::ZF));
    assert!(!state.flags.contains(Flags::SF));
    assert!(!state.flags.contains(Flags::CF));
    assert!(state.halted);
}

#[test]
fn zero_flag_from_self_xor() {
    // XOR EAX,EAX; HLT
    let cpu = run(&[0x31, 0xC0, 0xF4]);
    let state = cpu.state();
    assert_eq!(state.registers.eax, 0);
    assert!(state.flags.contains(Flags::ZF));
    assert!(!state.flags.contains(Flags::SF));
    assert!(state.flags.contains(Flags::PF));
    assert!(!state.flags.contains(Flags::CF));
    assert!(!state.flags.contains(Flags::OF));
}

#[test]
fn unsigned_overflow_wraps_and_carries() {
    // MOV EAX,0xFFFFFFFF; ADD EAX,1; HLT
    let cpu = run(&[0xB8, 0xFF, 0xFF, 0xFF, 0xFF, 0x83, 0xC0, 0x01, 0xF4]);
    let state = cpu.state();
    assert_eq!(state.registers.eax, 0);
    assert!(state.flags.contains(Flags::ZF));
    assert!(state.flags.contains(Flags::CF));
    assert!(!state.flags.contains(Flags::OF));
}

#[test]
fn signed_overflow_from_inc() {
    // MOV EAX,0x7FFFFFFF; INC EAX; HLT
    let cpu = run(&[0xB8, 0xFF, 0xFF, 0xFF, 0x7F, 0x40, 0xF4]);
    let state = cpu.state();
    assert_eq!(state.registers.eax, 0x8000_0000);
    assert!(state.flags.contains(Flags::SF));
    assert!(state.flags.contains(Flags::OF));
}

#[test]
fn stack_round_trip() {
    // MOV EAX,0x12EFCDAB; PUSH EAX; POP ECX; HLT
    let cpu = run(&[0xB8, 0xAB, 0xCD, 0xEF, 0x12, 0x50, 0x59, 0xF4]);
    let state = cpu.state();
    assert_eq!(state.registers.ecx, 0x12EF_CDAB);
    assert_eq!(state.registers.esp, RESET_STACK_POINTER);
}

#[test]
fn division_by_zero_faults() {
    // MOV ECX,0; DIV ECX
    let mut cpu = Cpu::default();
    cpu.load_program(&[0xB9, 0x00, 0x00, 0x00, 0x00, 0xF7, 0xF1], BASE).unwrap();
    cpu.step().unwrap();
    let err = cpu.step().unwrap_err();
    assert!(matches!(err, CpuError::DivideByZero));
    assert_eq!(cpu.state().registers.eax, 0);
    assert!(!cpu.is_halted());
}
