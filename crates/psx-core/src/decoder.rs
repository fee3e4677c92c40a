//! Instruction word codec and decode pipeline for the R3000A.
//!
//! [`Instruction`] wraps the raw 32-bit word and exposes the R/I/J field views.
//! [`Decoder`] maps a word onto an [`Operation`] or the reserved-instruction
//! exception.

#![allow(missing_docs)]

use crate::encoding::{
    classify_bcond, classify_primary, classify_special, Operation, PRIMARY_BCOND, PRIMARY_SPECIAL,
};
use crate::fault::Exception;

/// Raw 32-bit instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Instruction(pub u32);

impl Instruction {
    /// The canonical `SLL $zero, $zero, 0` no-op.
    pub const NOP: Self = Self(0);

    #[must_use]
    pub const fn word(self) -> u32 {
        self.0
    }

    /// Primary opcode, bits 31..26.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub const fn opcode(self) -> u8 {
        (self.0 >> 26) as u8
    }

    #[must_use]
    pub const fn rs(self) -> usize {
        ((self.0 >> 21) & 0x1F) as usize
    }

    #[must_use]
    pub const fn rt(self) -> usize {
        ((self.0 >> 16) & 0x1F) as usize
    }

    #[must_use]
    pub const fn rd(self) -> usize {
        ((self.0 >> 11) & 0x1F) as usize
    }

    #[must_use]
    pub const fn shamt(self) -> u32 {
        (self.0 >> 6) & 0x1F
    }

    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub const fn funct(self) -> u8 {
        (self.0 & 0x3F) as u8
    }

    /// Zero-extended 16-bit immediate.
    #[must_use]
    pub const fn imm(self) -> u32 {
        self.0 & 0xFFFF
    }

    /// Sign-extended 16-bit immediate.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss
    )]
    #[must_use]
    pub const fn imm_se(self) -> u32 {
        (self.0 as u16) as i16 as i32 as u32
    }

    /// 26-bit jump target field.
    #[must_use]
    pub const fn target(self) -> u32 {
        self.0 & 0x03FF_FFFF
    }

    /// Coprocessor sub-operation selector (the `rs` field of a `COPz` word).
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub const fn cop_op(self) -> u8 {
        ((self.0 >> 21) & 0x1F) as u8
    }

    /// Bit 25 marks a coprocessor command rather than a move.
    #[must_use]
    pub const fn is_cop_command(self) -> bool {
        self.0 & (1 << 25) != 0
    }

    #[must_use]
    pub const fn r_type(self) -> RType {
        RType {
            opcode: self.opcode(),
            rs: self.rs(),
            rt: self.rt(),
            rd: self.rd(),
            shamt: self.shamt(),
            funct: self.funct(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub const fn i_type(self) -> IType {
        IType {
            opcode: self.opcode(),
            rs: self.rs(),
            rt: self.rt(),
            imm: self.imm() as u16,
        }
    }

    #[must_use]
    pub const fn j_type(self) -> JType {
        JType {
            opcode: self.opcode(),
            target: self.target(),
        }
    }

    /// Re-encodes an R-type view.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub const fn from_r_type(fields: RType) -> Self {
        Self(
            ((fields.opcode as u32 & 0x3F) << 26)
                | ((fields.rs as u32 & 0x1F) << 21)
                | ((fields.rt as u32 & 0x1F) << 16)
                | ((fields.rd as u32 & 0x1F) << 11)
                | ((fields.shamt & 0x1F) << 6)
                | (fields.funct as u32 & 0x3F),
        )
    }

    /// Re-encodes an I-type view.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub const fn from_i_type(fields: IType) -> Self {
        Self(
            ((fields.opcode as u32 & 0x3F) << 26)
                | ((fields.rs as u32 & 0x1F) << 21)
                | ((fields.rt as u32 & 0x1F) << 16)
                | fields.imm as u32,
        )
    }

    /// Re-encodes a J-type view.
    #[must_use]
    pub const fn from_j_type(fields: JType) -> Self {
        Self(((fields.opcode as u32 & 0x3F) << 26) | (fields.target & 0x03FF_FFFF))
    }
}

impl From<u32> for Instruction {
    fn from(word: u32) -> Self {
        Self(word)
    }
}

/// Register-format field view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RType {
    pub opcode: u8,
    pub rs: usize,
    pub rt: usize,
    pub rd: usize,
    pub shamt: u32,
    pub funct: u8,
}

/// Immediate-format field view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IType {
    pub opcode: u8,
    pub rs: usize,
    pub rt: usize,
    pub imm: u16,
}

/// Jump-format field view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JType {
    pub opcode: u8,
    pub target: u32,
}

/// Decoded instruction: the operation plus the word its operands come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodedInstruction {
    pub operation: Operation,
    pub word: Instruction,
}

/// Result of decoding an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedOrFault {
    /// Successfully decoded instruction.
    Instruction(DecodedInstruction),
    /// The word has no defined operation.
    Fault(Exception),
}

impl DecodedOrFault {
    /// Returns the decoded instruction if present.
    #[must_use]
    pub const fn instruction(self) -> Option<DecodedInstruction> {
        match self {
            Self::Instruction(i) => Some(i),
            Self::Fault(_) => None,
        }
    }

    /// Returns the fault if decoding failed.
    #[must_use]
    pub const fn fault(self) -> Option<Exception> {
        match self {
            Self::Instruction(_) => None,
            Self::Fault(f) => Some(f),
        }
    }
}

/// Stateless instruction decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder;

impl Decoder {
    /// Decodes a 32-bit instruction word.
    ///
    /// Unused fields are not validated; the R3000A ignores them.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn decode(word: Instruction) -> DecodedOrFault {
        let operation = match word.opcode() {
            PRIMARY_SPECIAL => classify_special(word.funct()),
            PRIMARY_BCOND => Some(classify_bcond(word.rt() as u8)),
            opcode => classify_primary(opcode),
        };

        operation.map_or(
            DecodedOrFault::Fault(Exception::ReservedInstruction),
            |operation| DecodedOrFault::Instruction(DecodedInstruction { operation, word }),
        )
    }
}
