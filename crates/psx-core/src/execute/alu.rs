//! Integer ALU, shifter and the multiply/divide unit.

use super::helpers::{checked_add, checked_sub, divide_signed, divide_unsigned};
use crate::cpu::Cpu;
use crate::decoder::Instruction;
use crate::fault::{Exception, Fault};

/// Non-trapping two-operand operations shared by register and immediate forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AluOp {
    Addu,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
}

impl AluOp {
    #[allow(clippy::cast_possible_wrap)]
    const fn apply(self, a: u32, b: u32) -> u32 {
        match self {
            Self::Addu => a.wrapping_add(b),
            Self::Subu => a.wrapping_sub(b),
            Self::And => a & b,
            Self::Or => a | b,
            Self::Xor => a ^ b,
            Self::Nor => !(a | b),
            Self::Slt => ((a as i32) < (b as i32)) as u32,
            Self::Sltu => (a < b) as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Shift {
    Left,
    RightLogical,
    RightArithmetic,
}

impl Shift {
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    const fn apply(self, value: u32, amount: u32) -> u32 {
        let amount = amount & 0x1F;
        match self {
            Self::Left => value << amount,
            Self::RightLogical => value >> amount,
            Self::RightArithmetic => ((value as i32) >> amount) as u32,
        }
    }
}

/// Immediate operand of an I-type ALU instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Immediate {
    SignExtended,
    ZeroExtended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum MulDiv {
    Mult,
    Multu,
    Div,
    Divu,
}

pub(super) fn register(cpu: &mut Cpu, i: Instruction, op: AluOp) {
    let value = op.apply(cpu.registers.get(i.rs()), cpu.registers.get(i.rt()));
    cpu.registers.set(i.rd(), value);
}

pub(super) fn immediate(cpu: &mut Cpu, i: Instruction, op: AluOp, operand: Immediate) {
    let imm = match operand {
        Immediate::SignExtended => i.imm_se(),
        Immediate::ZeroExtended => i.imm(),
    };
    let value = op.apply(cpu.registers.get(i.rs()), imm);
    cpu.registers.set(i.rt(), value);
}

pub(super) fn lui(cpu: &mut Cpu, i: Instruction) {
    cpu.registers.set(i.rt(), i.imm() << 16);
}

pub(super) fn shift(cpu: &mut Cpu, i: Instruction, shift: Shift, variable: bool) {
    let amount = if variable {
        cpu.registers.get(i.rs())
    } else {
        i.shamt()
    };
    let value = shift.apply(cpu.registers.get(i.rt()), amount);
    cpu.registers.set(i.rd(), value);
}

/// `ADD`/`SUB`. The destination is left untouched on overflow.
pub(super) fn trapping(cpu: &mut Cpu, i: Instruction, subtract: bool) -> Result<(), Fault> {
    let a = cpu.registers.get(i.rs());
    let b = cpu.registers.get(i.rt());
    let result = if subtract {
        checked_sub(a, b)
    } else {
        checked_add(a, b)
    };
    let value = result.ok_or(Fault::new(Exception::Overflow))?;
    cpu.registers.set(i.rd(), value);
    Ok(())
}

/// `ADDI`. The destination is left untouched on overflow.
pub(super) fn addi(cpu: &mut Cpu, i: Instruction) -> Result<(), Fault> {
    let value = checked_add(cpu.registers.get(i.rs()), i.imm_se())
        .ok_or(Fault::new(Exception::Overflow))?;
    cpu.registers.set(i.rt(), value);
    Ok(())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
pub(super) fn multiply_divide(cpu: &mut Cpu, i: Instruction, op: MulDiv) {
    let a = cpu.registers.get(i.rs());
    let b = cpu.registers.get(i.rt());
    let (hi, lo) = match op {
        MulDiv::Mult => {
            let product = i64::from(a as i32) * i64::from(b as i32);
            ((product >> 32) as u32, product as u32)
        }
        MulDiv::Multu => {
            let product = u64::from(a) * u64::from(b);
            ((product >> 32) as u32, product as u32)
        }
        MulDiv::Div => divide_signed(a, b),
        MulDiv::Divu => divide_unsigned(a, b),
    };
    cpu.hi = hi;
    cpu.lo = lo;
}

pub(super) fn move_from_hi_lo(cpu: &mut Cpu, i: Instruction, hi: bool) {
    let value = if hi { cpu.hi } else { cpu.lo };
    cpu.registers.set(i.rd(), value);
}

pub(super) fn move_to_hi_lo(cpu: &mut Cpu, i: Instruction, hi: bool) {
    let value = cpu.registers.get(i.rs());
    if hi {
        cpu.hi = value;
    } else {
        cpu.lo = value;
    }
}
