//! Branches and jumps. Every form, taken or not, turns the following
//! instruction into a delay slot.

use crate::cpu::Cpu;
use crate::decoder::Instruction;
use crate::state::REG_RA;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Condition {
    Equal,
    NotEqual,
    LessOrEqualZero,
    GreaterThanZero,
    LessThanZero,
    GreaterOrEqualZero,
}

impl Condition {
    #[allow(clippy::cast_possible_wrap)]
    const fn holds(self, rs: u32, rt: u32) -> bool {
        let signed = rs as i32;
        match self {
            Self::Equal => rs == rt,
            Self::NotEqual => rs != rt,
            Self::LessOrEqualZero => signed <= 0,
            Self::GreaterThanZero => signed > 0,
            Self::LessThanZero => signed < 0,
            Self::GreaterOrEqualZero => signed >= 0,
        }
    }
}

/// Conditional branch. `link` writes the return address even when the
/// branch is not taken.
pub(super) fn conditional(cpu: &mut Cpu, i: Instruction, condition: Condition, link: bool) {
    let taken = condition.holds(cpu.registers.get(i.rs()), cpu.registers.get(i.rt()));
    let return_address = cpu.next_pc;
    if link {
        cpu.registers.set(REG_RA, return_address);
    }
    if taken {
        let target = return_address
            .wrapping_add(i.imm_se() << 2)
            .wrapping_sub(4);
        cpu.branch_to(target);
    } else {
        cpu.branch_pending = true;
    }
}

/// `J`/`JAL`.
pub(super) fn jump(cpu: &mut Cpu, i: Instruction, link: bool) {
    let return_address = cpu.next_pc;
    if link {
        cpu.registers.set(REG_RA, return_address);
    }
    cpu.branch_to((return_address & 0xF000_0000) | (i.target() << 2));
}

/// `JR`/`JALR`. `JALR` links into `rd`.
pub(super) fn jump_register(cpu: &mut Cpu, i: Instruction, link: bool) {
    let target = cpu.registers.get(i.rs());
    if link {
        cpu.registers.set(i.rd(), cpu.next_pc);
    }
    cpu.branch_to(target);
}
