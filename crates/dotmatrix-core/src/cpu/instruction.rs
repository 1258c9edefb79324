use std::fmt;

use super::Cpu;
use crate::mmu::Mmu;

/// Result of executing one opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Took the full cycle count.
    Done,
    /// Conditional branch not taken; use the alternate count.
    NotTaken,
}

pub type Exec = fn(&mut Cpu, &mut Mmu, &Instruction) -> Outcome;

/// Static descriptor for one table entry.
pub struct Opcode {
    /// Assembly template. Operand placeholders (`d8`, `d16`, `a8`, `a16`,
    /// `r8`) are filled in by [`Instruction::disassemble`].
    pub mnemonic: &'static str,
    /// Operand bytes following the opcode (and its prefix).
    pub operand_len: u8,
    pub cycles: u8,
    /// Cycles when a conditional branch is not taken.
    pub cycles_untaken: u8,
    pub exec: Exec,
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opcode")
            .field("mnemonic", &self.mnemonic)
            .field("operand_len", &self.operand_len)
            .field("cycles", &self.cycles)
            .field("cycles_untaken", &self.cycles_untaken)
            .finish()
    }
}

/// One decoded instruction: where it came from, what it is and its operands.
#[derive(Clone, Copy, Debug)]
pub struct Instruction {
    pub addr: u16,
    pub opcode: &'static Opcode,
    /// Opcode byte (after the CB prefix, if any).
    pub code: u8,
    pub prefixed: bool,
    pub operands: [u8; 2],
}

impl Instruction {
    /// Decode the instruction at `addr` without side effects.
    pub fn decode(mmu: &Mmu, addr: u16) -> Self {
        Self::decode_with(addr, |a| mmu.peek(a))
    }

    /// Fetch the instruction at `addr` through the bus, as the CPU does.
    pub(super) fn fetch(mmu: &mut Mmu, addr: u16) -> Self {
        Self::decode_with(addr, |a| mmu.read(a))
    }

    fn decode_with(addr: u16, mut read: impl FnMut(u16) -> u8) -> Self {
        let mut code = read(addr);
        let mut next = addr.wrapping_add(1);
        let prefixed = code == 0xCB;
        let opcode = if prefixed {
            code = read(next);
            next = next.wrapping_add(1);
            super::ops::cb(code)
        } else {
            super::ops::base(code)
        };
        let mut operands = [0; 2];
        for (i, byte) in operands
            .iter_mut()
            .enumerate()
            .take(opcode.operand_len as usize)
        {
            *byte = read(next.wrapping_add(i as u16));
        }
        Self {
            addr,
            opcode,
            code,
            prefixed,
            operands,
        }
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> u16 {
        1 + u16::from(self.prefixed) + u16::from(self.opcode.operand_len)
    }

    #[inline]
    pub fn d8(&self) -> u8 {
        self.operands[0]
    }

    #[inline]
    pub fn d16(&self) -> u16 {
        u16::from_le_bytes(self.operands)
    }

    #[inline]
    pub fn e8(&self) -> i8 {
        self.operands[0] as i8
    }

    /// Cycles for the given outcome.
    pub fn cycles(&self, outcome: Outcome) -> u32 {
        match outcome {
            Outcome::Done => u32::from(self.opcode.cycles),
            Outcome::NotTaken => u32::from(self.opcode.cycles_untaken),
        }
    }

    /// Render as assembly, e.g. `JR NZ,$0150` or `LD A,($FF44)`.
    pub fn disassemble(&self) -> String {
        let m = self.opcode.mnemonic;
        let next = self.addr.wrapping_add(self.len());
        if m.contains("d16") {
            m.replacen("d16", &format!("${:04X}", self.d16()), 1)
        } else if m.contains("a16") {
            m.replacen("a16", &format!("${:04X}", self.d16()), 1)
        } else if m.contains("a8") {
            m.replacen("a8", &format!("$FF{:02X}", self.d8()), 1)
        } else if m.contains("r8") {
            let target = next.wrapping_add_signed(i16::from(self.e8()));
            m.replacen("r8", &format!("${target:04X}"), 1)
        } else if m.contains("e8") {
            m.replacen("e8", &format!("{:+}", self.e8()), 1)
        } else if m.contains("d8") {
            m.replacen("d8", &format!("${:02X}", self.d8()), 1)
        } else {
            m.to_string()
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}: {}", self.addr, self.disassemble())
    }
}
