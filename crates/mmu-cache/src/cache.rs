use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const LINE_SIZE: u32 = 64;
pub const L1_LINES: usize = 256;
pub const L2_LINES: usize = 2048;

#[inline]
pub fn line_of(paddr: u32) -> u32 {
    paddr & !(LINE_SIZE - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub valid: bool,
    pub dirty: bool,
    pub last_access: u64,
}

// One cache level: 64-byte-aligned physical line address -> entry, with
// LRU eviction driven by a monotonic access counter supplied by the caller.
#[derive(Debug, Serialize, Deserialize)]
pub struct Cache {
    lines: HashMap<u32, CacheEntry>,
    capacity: usize,
}

impl Cache {
    pub fn new(capacity: usize) -> Self {
        Self { lines: HashMap::new(), capacity }
    }

    // Hit test: refreshes last_access when the line is resident and valid.
    pub fn touch(&mut self, line: u32, now: u64) -> bool {
        match self.lines.get_mut(&line) {
            Some(entry) if entry.valid => {
                entry.last_access = now;
                true
            }
            _ => false,
        }
    }

    // Inserts entry, evicting the least-recently-used line when the level
    // is full. Returns the evicted line, if any.
    pub fn insert(&mut self, line: u32, entry: CacheEntry) -> Option<(u32, CacheEntry)> {
        let evicted = if !self.lines.contains_key(&line) && self.lines.len() >= self.capacity {
            self.evict_lru()
        } else {
            None
        };
        self.lines.insert(line, entry);
        evicted
    }

    pub fn remove(&mut self, line: u32) -> Option<CacheEntry> {
        self.lines.remove(&line)
    }

    pub fn invalidate(&mut self, line: u32) {
        self.lines.remove(&line);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn evict_lru(&mut self) -> Option<(u32, CacheEntry)> {
        // Access stamps are unique, so the minimum is unambiguous.
        let line = self
            .lines
            .iter()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(line, _)| *line)?;
        let entry = self.lines.remove(&line)?;
        Some((line, entry))
    }
}
