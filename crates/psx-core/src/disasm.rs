//! Instruction disassembly.
//!
//! Renders instruction words in conventional MIPS assembler syntax for trace
//! logs and the runner's `disasm` command. Branch and jump targets are shown
//! as absolute addresses, which needs the instruction's own address.

use std::fmt::Write as _;

use crate::decoder::{DecodedOrFault, Decoder, Instruction};
use crate::encoding::Operation;
use crate::state::REGISTER_NAMES;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const RFE_FUNCT: u8 = 0x10;

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Address of the instruction.
    pub addr: u32,
    /// Raw instruction word.
    pub raw_word: u32,
    /// The instruction mnemonic (e.g. `addiu`, `lw`, `nop`).
    pub mnemonic: String,
    /// The formatted operands (e.g. `$sp, $sp, -24`).
    pub operands: String,
    /// Whether the word has no defined operation.
    pub is_illegal: bool,
}

impl std::fmt::Display for DisassemblyRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}: {:08x}  {}", self.addr, self.raw_word, self.mnemonic)?;
        if !self.operands.is_empty() {
            write!(f, " {}", self.operands)?;
        }
        Ok(())
    }
}

/// Renders one instruction as `mnemonic operands`.
#[must_use]
pub fn disassemble(pc: u32, instruction: Instruction) -> String {
    let row = disassemble_one(pc, instruction);
    if row.operands.is_empty() {
        row.mnemonic
    } else {
        format!("{} {}", row.mnemonic, row.operands)
    }
}

/// Disassembles one instruction located at `pc`.
#[must_use]
pub fn disassemble_one(pc: u32, instruction: Instruction) -> DisassemblyRow {
    let (mnemonic, operands, is_illegal) = match Decoder::decode(instruction) {
        DecodedOrFault::Instruction(_) if instruction == Instruction::NOP => {
            ("nop".to_string(), String::new(), false)
        }
        DecodedOrFault::Instruction(decoded) => {
            let (mnemonic, operands) = format_operation(pc, decoded.operation, instruction);
            (mnemonic, operands, false)
        }
        DecodedOrFault::Fault(_) => (
            ".word".to_string(),
            format!("{:#010x}", instruction.word()),
            true,
        ),
    };
    DisassemblyRow {
        addr: pc,
        raw_word: instruction.word(),
        mnemonic,
        operands,
        is_illegal,
    }
}

/// Disassembles up to `count` little-endian words from `bytes`, the first
/// located at `base`. A trailing partial word is ignored.
#[must_use]
pub fn disassemble_bytes(base: u32, bytes: &[u8], count: usize) -> Vec<DisassemblyRow> {
    bytes
        .chunks_exact(4)
        .take(count)
        .zip((0u32..).map(|index| base.wrapping_add(index * 4)))
        .map(|(chunk, addr)| {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            disassemble_one(addr, Instruction(word))
        })
        .collect()
}

/// Disassembles `before` instructions ahead of `center_pc`, the centre, and
/// `after` instructions behind it. Rows whose word `read_word` cannot supply
/// are omitted.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn disassemble_window(
    center_pc: u32,
    before: usize,
    after: usize,
    mut read_word: impl FnMut(u32) -> Option<u32>,
) -> Vec<DisassemblyRow> {
    let start = center_pc.wrapping_sub((before as u32).wrapping_mul(4));
    (0..=before + after)
        .filter_map(|index| {
            let addr = start.wrapping_add((index as u32).wrapping_mul(4));
            read_word(addr).map(|word| disassemble_one(addr, Instruction(word)))
        })
        .collect()
}

fn reg(index: usize) -> String {
    format!("${}", REGISTER_NAMES[index & 0x1F])
}

const fn branch_target(pc: u32, i: Instruction) -> u32 {
    pc.wrapping_add(4).wrapping_add(i.imm_se() << 2)
}

#[allow(clippy::cast_possible_wrap)]
const fn signed_imm(i: Instruction) -> i32 {
    i.imm_se() as i32
}

fn memory_operand(i: Instruction) -> String {
    format!("{}, {}({})", reg(i.rt()), signed_imm(i), reg(i.rs()))
}

#[allow(clippy::too_many_lines)]
fn format_operation(pc: u32, operation: Operation, i: Instruction) -> (String, String) {
    let (rs, rt, rd) = (reg(i.rs()), reg(i.rt()), reg(i.rd()));
    #[allow(clippy::match_same_arms)]
    let (mnemonic, operands) = match operation {
        Operation::Sll => ("sll", format!("{rd}, {rt}, {}", i.shamt())),
        Operation::Srl => ("srl", format!("{rd}, {rt}, {}", i.shamt())),
        Operation::Sra => ("sra", format!("{rd}, {rt}, {}", i.shamt())),
        Operation::Sllv => ("sllv", format!("{rd}, {rt}, {rs}")),
        Operation::Srlv => ("srlv", format!("{rd}, {rt}, {rs}")),
        Operation::Srav => ("srav", format!("{rd}, {rt}, {rs}")),
        Operation::Jr => ("jr", rs),
        Operation::Jalr => ("jalr", format!("{rd}, {rs}")),
        Operation::Syscall => ("syscall", String::new()),
        Operation::Break => ("break", String::new()),
        Operation::Mfhi => ("mfhi", rd),
        Operation::Mthi => ("mthi", rs),
        Operation::Mflo => ("mflo", rd),
        Operation::Mtlo => ("mtlo", rs),
        Operation::Mult => ("mult", format!("{rs}, {rt}")),
        Operation::Multu => ("multu", format!("{rs}, {rt}")),
        Operation::Div => ("div", format!("{rs}, {rt}")),
        Operation::Divu => ("divu", format!("{rs}, {rt}")),
        Operation::Add => ("add", format!("{rd}, {rs}, {rt}")),
        Operation::Addu => ("addu", format!("{rd}, {rs}, {rt}")),
        Operation::Sub => ("sub", format!("{rd}, {rs}, {rt}")),
        Operation::Subu => ("subu", format!("{rd}, {rs}, {rt}")),
        Operation::And => ("and", format!("{rd}, {rs}, {rt}")),
        Operation::Or => ("or", format!("{rd}, {rs}, {rt}")),
        Operation::Xor => ("xor", format!("{rd}, {rs}, {rt}")),
        Operation::Nor => ("nor", format!("{rd}, {rs}, {rt}")),
        Operation::Slt => ("slt", format!("{rd}, {rs}, {rt}")),
        Operation::Sltu => ("sltu", format!("{rd}, {rs}, {rt}")),
        Operation::Bltz => ("bltz", format!("{rs}, {:#010x}", branch_target(pc, i))),
        Operation::Bgez => ("bgez", format!("{rs}, {:#010x}", branch_target(pc, i))),
        Operation::Bltzal => ("bltzal", format!("{rs}, {:#010x}", branch_target(pc, i))),
        Operation::Bgezal => ("bgezal", format!("{rs}, {:#010x}", branch_target(pc, i))),
        Operation::J | Operation::Jal => {
            let target = (pc.wrapping_add(4) & 0xF000_0000) | (i.target() << 2);
            let name = if operation == Operation::J { "j" } else { "jal" };
            (name, format!("{target:#010x}"))
        }
        Operation::Beq => ("beq", format!("{rs}, {rt}, {:#010x}", branch_target(pc, i))),
        Operation::Bne => ("bne", format!("{rs}, {rt}, {:#010x}", branch_target(pc, i))),
        Operation::Blez => ("blez", format!("{rs}, {:#010x}", branch_target(pc, i))),
        Operation::Bgtz => ("bgtz", format!("{rs}, {:#010x}", branch_target(pc, i))),
        Operation::Addi => ("addi", format!("{rt}, {rs}, {}", signed_imm(i))),
        Operation::Addiu => ("addiu", format!("{rt}, {rs}, {}", signed_imm(i))),
        Operation::Slti => ("slti", format!("{rt}, {rs}, {}", signed_imm(i))),
        Operation::Sltiu => ("sltiu", format!("{rt}, {rs}, {}", signed_imm(i))),
        Operation::Andi => ("andi", format!("{rt}, {rs}, {:#06x}", i.imm())),
        Operation::Ori => ("ori", format!("{rt}, {rs}, {:#06x}", i.imm())),
        Operation::Xori => ("xori", format!("{rt}, {rs}, {:#06x}", i.imm())),
        Operation::Lui => ("lui", format!("{rt}, {:#06x}", i.imm())),
        Operation::Cop(cop) => return format_coprocessor(cop, i),
        Operation::Lb => ("lb", memory_operand(i)),
        Operation::Lh => ("lh", memory_operand(i)),
        Operation::Lwl => ("lwl", memory_operand(i)),
        Operation::Lw => ("lw", memory_operand(i)),
        Operation::Lbu => ("lbu", memory_operand(i)),
        Operation::Lhu => ("lhu", memory_operand(i)),
        Operation::Lwr => ("lwr", memory_operand(i)),
        Operation::Sb => ("sb", memory_operand(i)),
        Operation::Sh => ("sh", memory_operand(i)),
        Operation::Swl => ("swl", memory_operand(i)),
        Operation::Sw => ("sw", memory_operand(i)),
        Operation::Swr => ("swr", memory_operand(i)),
        Operation::Lwc(cop) => {
            return (
                format!("lwc{cop}"),
                format!("${}, {}({rs})", i.rt(), signed_imm(i)),
            )
        }
        Operation::Swc(cop) => {
            return (
                format!("swc{cop}"),
                format!("${}, {}({rs})", i.rt(), signed_imm(i)),
            )
        }
    };
    (mnemonic.to_string(), operands)
}

fn format_coprocessor(cop: u8, i: Instruction) -> (String, String) {
    if i.is_cop_command() {
        if cop == 0 && i.funct() == RFE_FUNCT {
            return ("rfe".to_string(), String::new());
        }
        return (format!("cop{cop}"), format!("{:#09x}", i.word() & 0x01FF_FFFF));
    }
    let rt = reg(i.rt());
    let mut operands = String::new();
    let name = match i.cop_op() {
        0x00 => "mfc",
        0x02 => "cfc",
        0x04 => "mtc",
        0x06 => "ctc",
        _ => {
            let _ = write!(operands, "{:#010x}", i.word());
            return (format!("cop{cop}"), operands);
        }
    };
    let _ = write!(operands, "{rt}, ${}", i.rd());
    (format!("{name}{cop}"), operands)
}
