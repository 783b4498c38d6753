use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const TLB_CAPACITY: usize = 64;

// Translation lookaside buffer: pageNumber -> frameNumber with FIFO
// eviction (oldest insertion leaves first).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Tlb {
    map: IndexMap<u32, u32>,
}

impl Tlb {
    pub fn new() -> Self { Self { map: IndexMap::new() } }

    pub fn lookup(&self, page: u32) -> Option<u32> { self.map.get(&page).copied() }

    pub fn insert(&mut self, page: u32, frame: u32) {
        self.map.insert(page, frame);
        if self.map.len() > TLB_CAPACITY {
            self.map.shift_remove_index(0);
        }
    }

    pub fn invalidate(&mut self, page: u32) { self.map.shift_remove(&page); }

    pub fn flush_all(&mut self) { self.map.clear(); }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }
}
