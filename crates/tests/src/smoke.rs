use cpu_core::Cpu;

#[test]
fn workspace_smoke() {
    let mut cpu = Cpu::default();
    cpu.load_program(&[0x90, 0xF4], 0).unwrap();
    cpu.run_until_breakpoint().unwrap();
    assert!(cpu.is_halted());
    assert_eq!(cpu.statistics().instructions, 2);
}
