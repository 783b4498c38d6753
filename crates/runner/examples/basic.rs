use cpu_core::Cpu;

fn main() {
    // MOV EAX, 42; MOV EBX, 3; ADD EAX, EBX; HLT
    let program = [
        0xB8, 0x2A, 0x00, 0x00, 0x00,
        0xBB, 0x03, 0x00, 0x00, 0x00,
        0x01, 0xD8,
        0xF4,
    ];
    let mut cpu = Cpu::default();
    cpu.load_program(&program, 0x1000).expect("program fits in memory");
    while !cpu.is_halted() {
        cpu.step().expect("program is well-formed");
    }
    let state = cpu.state();
    println!("EAX = {} (flags {:?})", state.registers.eax, state.flags);
}
