use decoder::Mnemonic;
use mmu_cache::MemStatistics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuCounters {
    pub instructions: u64,
    pub cycles: u64,
    pub interrupts: u64,
}

// CPU counters merged with a fresh snapshot of the memory-side counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuStatistics {
    pub instructions: u64,
    pub cycles: u64,
    pub interrupts: u64,
    // Instructions per hundred cycles; 0 before the first step.
    pub utilization: f64,
    pub mem: MemStatistics,
}

impl CpuCounters {
    pub fn snapshot(&self, mem: MemStatistics) -> CpuStatistics {
        let utilization = if self.cycles > 0 {
            self.instructions as f64 / self.cycles as f64 * 100.0
        } else {
            0.0
        };
        CpuStatistics {
            instructions: self.instructions,
            cycles: self.cycles,
            interrupts: self.interrupts,
            utilization,
            mem,
        }
    }
}

// Static cycle cost per mnemonic. An approximation, not a contract, but
// stable across runs of a given build.
pub fn cycle_cost(mnemonic: Mnemonic) -> u64 {
    use Mnemonic::*;
    match mnemonic {
        SHL | SHR | PUSH | POP => 2,
        CALL | RET => 3,
        INT => 10,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_is_percent_ipc() {
        let counters = CpuCounters { instructions: 3, cycles: 6, interrupts: 0 };
        let stats = counters.snapshot(MemStatistics::default());
        assert_eq!(stats.utilization, 50.0);
        let empty = CpuCounters::default().snapshot(MemStatistics::default());
        assert_eq!(empty.utilization, 0.0);
    }

    #[test]
    fn cycle_table() {
        assert_eq!(cycle_cost(Mnemonic::NOP), 1);
        assert_eq!(cycle_cost(Mnemonic::MOV), 1);
        assert_eq!(cycle_cost(Mnemonic::JNZ), 1);
        assert_eq!(cycle_cost(Mnemonic::PUSH), 2);
        assert_eq!(cycle_cost(Mnemonic::SHR), 2);
        assert_eq!(cycle_cost(Mnemonic::CALL), 3);
        assert_eq!(cycle_cost(Mnemonic::RET), 3);
        assert_eq!(cycle_cost(Mnemonic::INT), 10);
        assert_eq!(cycle_cost(Mnemonic::HLT), 1);
    }
}
