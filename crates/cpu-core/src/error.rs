use decoder::DecodeError;
use mmu_cache::MemError;

#[derive(Debug, thiserror::Error)]
pub enum CpuError {
    #[error("division by zero")]
    DivideByZero,
    #[error("division overflow")]
    DivideOverflow,
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Mem(#[from] MemError),
}
