//! decoder: ISA-level types and the byte-stream instruction decoder for
//! the simulator core. The opcode map is closed; any byte outside it is a
//! decode error.

pub mod decode;
pub mod inst;
pub mod operand;

pub use decode::{DecodeError, Decoder};
pub use inst::{Instruction, Mnemonic};
pub use operand::{Operand, Reg, UnknownRegister, Width};
