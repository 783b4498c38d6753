use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum MemError {
    #[error("physical address {0:#x} out of range")] AccessViolation(u32),
    #[error("out of physical memory: every resident page is protected")] OutOfMemory,
}

// Flat physical byte store. All multi-byte access is little-endian and
// bounds-checked against the configured size.
#[derive(Clone, Serialize, Deserialize)]
pub struct PhysMem {
    data: Vec<u8>,
}

impl PhysMem {
    pub fn new(size: u32) -> Self { Self { data: vec![0u8; size as usize] } }

    #[inline]
    pub fn size(&self) -> u32 { self.data.len() as u32 }

    pub fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), MemError> {
        let a = addr as usize;
        let end = a.checked_add(buf.len()).ok_or(MemError::AccessViolation(addr))?;
        buf.copy_from_slice(self.data.get(a..end).ok_or(MemError::AccessViolation(addr))?);
        Ok(())
    }

    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), MemError> {
        let a = addr as usize;
        let end = a.checked_add(data.len()).ok_or(MemError::AccessViolation(addr))?;
        let slice = self.data.get_mut(a..end).ok_or(MemError::AccessViolation(addr))?;
        slice.copy_from_slice(data);
        Ok(())
    }
}
