use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const PAGE_SIZE: u32 = 4096;

#[inline]
pub fn page_split(vaddr: u32) -> (u32, u32) {
    (vaddr / PAGE_SIZE, vaddr % PAGE_SIZE)
}

// One page-directory entry. Only present and frame carry semantics;
// the remaining bits are recorded for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTableEntry {
    pub present: bool,
    pub writable: bool,
    pub user_mode: bool,
    pub write_through: bool,
    pub cache_disabled: bool,
    pub accessed: bool,
    pub dirty: bool,
    pub frame: u32,
}

impl PageTableEntry {
    pub fn new(frame: u32) -> Self {
        Self {
            present: true,
            writable: true,
            user_mode: false,
            write_through: false,
            cache_disabled: false,
            accessed: false,
            dirty: false,
            frame,
        }
    }
}

// Insertion-ordered page directory. Ordering matters: the replacement
// victim is the oldest resident page that is not protected.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PageDirectory {
    map: IndexMap<u32, PageTableEntry>,
}

impl PageDirectory {
    pub fn new() -> Self { Self { map: IndexMap::new() } }

    pub fn get(&self, page: u32) -> Option<&PageTableEntry> { self.map.get(&page) }

    pub fn get_mut(&mut self, page: u32) -> Option<&mut PageTableEntry> { self.map.get_mut(&page) }

    pub fn insert(&mut self, page: u32, entry: PageTableEntry) { self.map.insert(page, entry); }

    pub fn remove(&mut self, page: u32) -> Option<PageTableEntry> { self.map.shift_remove(&page) }

    // Removes and returns the first (insertion-order) entry whose page is
    // not in protected.
    pub fn take_victim(&mut self, protected: &BTreeSet<u32>) -> Option<(u32, PageTableEntry)> {
        let page = self
            .map
            .keys()
            .copied()
            .find(|page| !protected.contains(page))?;
        let entry = self.map.shift_remove(&page)?;
        Some((page, entry))
    }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    pub fn clear(&mut self) { self.map.clear(); }

    pub fn pages(&self) -> impl Iterator<Item = u32> + '_ { self.map.keys().copied() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn victim_is_oldest_unprotected() {
        let mut dir = PageDirectory::new();
        dir.insert(7, PageTableEntry::new(0));
        dir.insert(3, PageTableEntry::new(1));
        dir.insert(9, PageTableEntry::new(2));

        let mut protected = BTreeSet::new();
        protected.insert(7);
        let (page, entry) = dir.take_victim(&protected).unwrap();
        assert_eq!(page, 3);
        assert_eq!(entry.frame, 1);
        // Insertion order of the survivors is preserved
        let (page, _) = dir.take_victim(&protected).unwrap();
        assert_eq!(page, 9);
        assert!(dir.take_victim(&protected).is_none());
    }

    #[test]
    fn page_split_math() {
        assert_eq!(page_split(0), (0, 0));
        assert_eq!(page_split(0x1234), (1, 0x234));
        assert_eq!(page_split(0xFFFF), (15, 0xFFF));
    }
}
