//! mmu-cache: paged memory subsystem for the simulator core (physical
//! store, demand-paged directory with pinned pages, TLB, and a two-level
//! LRU data cache with access statistics).

pub mod cache;
pub mod mem;
pub mod mmu;
pub mod paging;
pub mod stats;
pub mod tlb;

pub use cache::{Cache, CacheEntry, L1_LINES, L2_LINES, LINE_SIZE};
pub use mem::{MemError, PhysMem};
pub use mmu::Mmu;
pub use paging::{PageDirectory, PageTableEntry, PAGE_SIZE};
pub use stats::{MemCounters, MemStatistics};
pub use tlb::{Tlb, TLB_CAPACITY};
