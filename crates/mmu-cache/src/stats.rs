use serde::{Deserialize, Serialize};

// Raw access counters maintained by the MMU.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemCounters {
    pub tlb_hits: u64,
    pub tlb_misses: u64,
    pub page_faults: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

// Counter snapshot with derived hit rates. A rate with a zero denominator
// reads as 0.0 rather than NaN.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemStatistics {
    pub tlb_hits: u64,
    pub tlb_misses: u64,
    pub page_faults: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub tlb_hit_rate: f64,
    pub cache_hit_rate: f64,
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

impl MemCounters {
    pub fn snapshot(&self) -> MemStatistics {
        MemStatistics {
            tlb_hits: self.tlb_hits,
            tlb_misses: self.tlb_misses,
            page_faults: self.page_faults,
            cache_hits: self.cache_hits,
            cache_misses: self.cache_misses,
            tlb_hit_rate: hit_rate(self.tlb_hits, self.tlb_misses),
            cache_hit_rate: hit_rate(self.cache_hits, self.cache_misses),
        }
    }
}
