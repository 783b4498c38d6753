use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};

use cpu_core::Cpu;

#[derive(Parser, Debug)]
#[command(name = "ia32-sim", version, about = "IA-32 logical core simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    // Load a flat binary and run it to HLT, a breakpoint, or the step budget
    Run {
        // Path to the flat binary image
        bin: String,
        // Load address (and entry point unless --entry is given)
        #[arg(long, default_value = "0x1000", value_parser = parse_addr)]
        base: u32,
        #[arg(long, value_parser = parse_addr)]
        entry: Option<u32>,
        // Breakpoint addresses, repeatable
        #[arg(long = "break", value_parser = parse_addr)]
        breakpoints: Vec<u32>,
        #[arg(long, default_value_t = 1_000_000)]
        max_steps: u64,
        // Physical memory size in bytes
        #[arg(long, default_value_t = 65536)]
        memory: u32,
    },
    // Decode and print instructions from a flat binary
    Disasm {
        bin: String,
        #[arg(long, default_value = "0x1000", value_parser = parse_addr)]
        base: u32,
        #[arg(long, default_value_t = 32)]
        count: usize,
        #[arg(long, default_value_t = 65536)]
        memory: u32,
    },
}

fn parse_addr(s: &str) -> Result<u32, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("invalid address {s:?}: {e}"))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Run { bin, base, entry, breakpoints, max_steps, memory } => {
            run(&bin, base, entry, &breakpoints, max_steps, memory)
        }
        Cmd::Disasm { bin, base, count, memory } => disasm(&bin, base, count, memory),
    }
}

fn run(
    bin: &str,
    base: u32,
    entry: Option<u32>,
    breakpoints: &[u32],
    max_steps: u64,
    memory: u32,
) -> Result<()> {
    let image = std::fs::read(bin).with_context(|| format!("reading {bin}"))?;
    let mut cpu = Cpu::new(memory);
    cpu.load_program(&image, base)
        .with_context(|| format!("loading {} bytes at {base:#x}", image.len()))?;
    if let Some(entry) = entry {
        cpu.set_eip(entry);
    }
    for &addr in breakpoints {
        cpu.set_breakpoint(addr);
    }
    info!("loaded {} bytes at {base:#x}, entry {:#x}", image.len(), cpu.eip());

    let mut steps = 0u64;
    while !cpu.is_halted() && steps < max_steps {
        if steps > 0 && cpu.is_at_breakpoint() {
            info!("breakpoint at {:#x}", cpu.eip());
            break;
        }
        cpu.step().with_context(|| format!("step {steps} at eip {:#x}", cpu.eip()))?;
        steps += 1;
    }
    debug!("stopped after {steps} steps");
    if !cpu.is_halted() && steps == max_steps {
        bail!("step budget of {max_steps} exhausted at eip {:#x}", cpu.eip());
    }

    print_state(&cpu);
    print_statistics(&cpu);
    Ok(())
}

fn disasm(bin: &str, base: u32, count: usize, memory: u32) -> Result<()> {
    let image = std::fs::read(bin).with_context(|| format!("reading {bin}"))?;
    let mut cpu = Cpu::new(memory);
    cpu.load_program(&image, base)?;
    let mut addr = base;
    for instr in cpu.instructions_at(base, count) {
        println!("{addr:08X}  {instr}");
        addr = addr.wrapping_add(instr.size);
    }
    Ok(())
}

fn print_state(cpu: &Cpu) {
    let state = cpu.state();
    let r = state.registers;
    println!("EAX={:08X} EBX={:08X} ECX={:08X} EDX={:08X}", r.eax, r.ebx, r.ecx, r.edx);
    println!("ESI={:08X} EDI={:08X} EBP={:08X} ESP={:08X}", r.esi, r.edi, r.ebp, r.esp);
    println!(
        "EIP={:08X} FLAGS={:08X} halted={} if={}",
        state.eip,
        state.flags.to_word(),
        state.halted,
        state.interrupt_enabled
    );
}

fn print_statistics(cpu: &Cpu) {
    let stats = cpu.statistics();
    println!("\n[Statistics]");
    println!("  Instructions: {}", stats.instructions);
    println!("  Cycles:       {}", stats.cycles);
    println!("  Interrupts:   {}", stats.interrupts);
    println!("  Utilization:  {:.2}%", stats.utilization);
    println!(
        "  TLB:          {:.2}% hit rate ({} / {})",
        stats.mem.tlb_hit_rate * 100.0,
        stats.mem.tlb_hits,
        stats.mem.tlb_hits + stats.mem.tlb_misses
    );
    println!(
        "  Cache:        {:.2}% hit rate ({} / {})",
        stats.mem.cache_hit_rate * 100.0,
        stats.mem.cache_hits,
        stats.mem.cache_hits + stats.mem.cache_misses
    );
    println!("  Page faults:  {}", stats.mem.page_faults);
}
