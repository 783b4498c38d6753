use serde::{Deserialize, Serialize};
use std::fmt;

use crate::operand::Operand;

// The closed mnemonic set of this core. Display renders the canonical
// upper-case text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mnemonic {
    ADD, OR, ADC, SBB, AND, SUB, XOR, CMP,
    INC, DEC, PUSH, POP, MOV, MOVSXD, TEST, XCHG,
    NOT, NEG, MUL, IMUL, IMUL2, DIV, IDIV,
    SHL, SHR, NOP, PUSHF, POPF,
    CALL, RET, JMP, INT, HLT,
    CLI, STI, CLD, STD,
    RDTSC, RDRAND, RDSEED,
    JO, JNO, JC, JNC, JZ, JNZ, JBE, JA,
    JS, JNS, JP, JNP, JL, JGE, JLE, JG,
}

impl Mnemonic {
    pub fn as_str(self) -> &'static str {
        use Mnemonic::*;
        match self {
            ADD => "ADD", OR => "OR", ADC => "ADC", SBB => "SBB",
            AND => "AND", SUB => "SUB", XOR => "XOR", CMP => "CMP",
            INC => "INC", DEC => "DEC", PUSH => "PUSH", POP => "POP",
            MOV => "MOV", MOVSXD => "MOVSXD", TEST => "TEST", XCHG => "XCHG",
            NOT => "NOT", NEG => "NEG", MUL => "MUL", IMUL => "IMUL",
            IMUL2 => "IMUL2", DIV => "DIV", IDIV => "IDIV",
            SHL => "SHL", SHR => "SHR", NOP => "NOP",
            PUSHF => "PUSHF", POPF => "POPF",
            CALL => "CALL", RET => "RET", JMP => "JMP", INT => "INT", HLT => "HLT",
            CLI => "CLI", STI => "STI", CLD => "CLD", STD => "STD",
            RDTSC => "RDTSC", RDRAND => "RDRAND", RDSEED => "RDSEED",
            JO => "JO", JNO => "JNO", JC => "JC", JNC => "JNC",
            JZ => "JZ", JNZ => "JNZ", JBE => "JBE", JA => "JA",
            JS => "JS", JNS => "JNS", JP => "JP", JNP => "JNP",
            JL => "JL", JGE => "JGE", JLE => "JLE", JG => "JG",
        }
    }

    // True for the sixteen conditional-jump mnemonics.
    pub fn is_jcc(self) -> bool {
        use Mnemonic::*;
        matches!(
            self,
            JO | JNO | JC | JNC | JZ | JNZ | JBE | JA | JS | JNS | JP | JNP | JL | JGE | JLE | JG
        )
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// One decoded instruction. opcode keeps the primary byte, or
// 0x0F00 | second for the two-byte map; size is the exact encoded
// length in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: u16,
    pub mnemonic: Mnemonic,
    pub operands: Vec<Operand>,
    pub size: u32,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        for (i, op) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {op}")?;
            } else {
                write!(f, ", {op}")?;
            }
        }
        Ok(())
    }
}
