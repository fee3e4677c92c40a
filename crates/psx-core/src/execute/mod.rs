//! Instruction execution pipeline.
//!
//! One call to [`step_one`] is one CPU tick:
//! 1. Mirror the interrupt line into CP0
//! 2. Promote the prefetched instruction
//! 3. Fetch the next instruction
//! 4. Take a pending interrupt, or a fetch fault attached to the promoted slot
//! 5. Otherwise decode and execute
//! 6. Convert any fault into exception entry
//! 7. Advance the register pipeline
//!
//! Faults are precise: a faulting instruction writes no register.

mod alu;
mod branch;
mod coprocessor;
mod helpers;
mod load_store;

pub use helpers::{
    checked_add, checked_sub, divide_signed, divide_unsigned, merge_load_left, merge_load_right,
    merge_store_left, merge_store_right,
};

use alu::{AluOp, Immediate, MulDiv, Shift};
use branch::Condition;
use load_store::Load;

use crate::api::{TickOutcome, TraceEvent, TraceSink};
use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::decoder::{DecodedOrFault, Decoder, Instruction};
use crate::disasm::disassemble;
use crate::encoding::Operation;
use crate::fault::{Exception, Fault};
use crate::memory::{validate_alignment, AccessKind, AccessWidth};

/// Reads the instruction word at `pc`.
///
/// # Errors
///
/// Returns an address error for a misaligned `pc` and an instruction bus
/// error when nothing answers there.
pub fn fetch(bus: &mut Bus, pc: u32) -> Result<u32, Fault> {
    validate_alignment(pc, AccessWidth::Word, AccessKind::Fetch)?;
    bus.read_word(pc).map_err(load_store::bus_fault(AccessKind::Fetch))
}

/// Runs one CPU tick.
pub fn step_one(cpu: &mut Cpu, bus: &mut Bus, mut trace: Option<&mut dyn TraceSink>) -> TickOutcome {
    cpu.cop0.set_interrupt_line(bus.interrupt_line());

    let fetch_fault = cpu.promote();
    let fetched = fetch(bus, cpu.next_pc);
    cpu.prefetched(fetched);

    let pc = cpu.current_pc;
    let instruction = cpu.current_instruction;
    if let Some(sink) = trace.as_mut() {
        sink.on_event(TraceEvent::InstructionStart {
            pc,
            word: instruction.word(),
            in_delay_slot: cpu.in_delay_slot,
        });
    }

    let result = if cpu.cop0.interrupt_pending() {
        Err(Fault::new(Exception::Interrupt))
    } else if let Some(fault) = fetch_fault {
        Err(fault)
    } else {
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("{pc:08x}: {}", disassemble(pc, instruction));
        }
        execute_instruction(cpu, bus, instruction)
    };

    let outcome = match result {
        Ok(()) => TickOutcome::Retired,
        Err(fault) => {
            let (epc, vector) = cpu.enter_exception(fault);
            log::debug!(
                "exception {} at {pc:#010x}, epc={epc:#010x} vector={vector:#010x}",
                fault.exception
            );
            if let Some(sink) = trace.as_mut() {
                sink.on_event(TraceEvent::ExceptionRaised {
                    exception: fault.exception,
                    epc,
                    vector,
                });
            }
            TickOutcome::Exception {
                exception: fault.exception,
                epc,
                vector,
            }
        }
    };

    cpu.registers.advance();
    outcome
}

/// Decodes and executes `instruction` against the CPU and bus.
///
/// # Errors
///
/// Returns the fault the instruction raised. No register has been written
/// when this happens.
pub fn execute_instruction(cpu: &mut Cpu, bus: &mut Bus, instruction: Instruction) -> Result<(), Fault> {
    let decoded = match Decoder::decode(instruction) {
        DecodedOrFault::Instruction(decoded) => decoded,
        DecodedOrFault::Fault(exception) => return Err(Fault::new(exception)),
    };
    let i = decoded.word;

    match decoded.operation {
        Operation::Sll => alu::shift(cpu, i, Shift::Left, false),
        Operation::Srl => alu::shift(cpu, i, Shift::RightLogical, false),
        Operation::Sra => alu::shift(cpu, i, Shift::RightArithmetic, false),
        Operation::Sllv => alu::shift(cpu, i, Shift::Left, true),
        Operation::Srlv => alu::shift(cpu, i, Shift::RightLogical, true),
        Operation::Srav => alu::shift(cpu, i, Shift::RightArithmetic, true),
        Operation::Jr => branch::jump_register(cpu, i, false),
        Operation::Jalr => branch::jump_register(cpu, i, true),
        Operation::Syscall => return Err(Fault::new(Exception::Syscall)),
        Operation::Break => return Err(Fault::new(Exception::Breakpoint)),
        Operation::Mfhi => alu::move_from_hi_lo(cpu, i, true),
        Operation::Mthi => alu::move_to_hi_lo(cpu, i, true),
        Operation::Mflo => alu::move_from_hi_lo(cpu, i, false),
        Operation::Mtlo => alu::move_to_hi_lo(cpu, i, false),
        Operation::Mult => alu::multiply_divide(cpu, i, MulDiv::Mult),
        Operation::Multu => alu::multiply_divide(cpu, i, MulDiv::Multu),
        Operation::Div => alu::multiply_divide(cpu, i, MulDiv::Div),
        Operation::Divu => alu::multiply_divide(cpu, i, MulDiv::Divu),
        Operation::Add => return alu::trapping(cpu, i, false),
        Operation::Sub => return alu::trapping(cpu, i, true),
        Operation::Addu => alu::register(cpu, i, AluOp::Addu),
        Operation::Subu => alu::register(cpu, i, AluOp::Subu),
        Operation::And => alu::register(cpu, i, AluOp::And),
        Operation::Or => alu::register(cpu, i, AluOp::Or),
        Operation::Xor => alu::register(cpu, i, AluOp::Xor),
        Operation::Nor => alu::register(cpu, i, AluOp::Nor),
        Operation::Slt => alu::register(cpu, i, AluOp::Slt),
        Operation::Sltu => alu::register(cpu, i, AluOp::Sltu),
        Operation::Bltz => branch::conditional(cpu, i, Condition::LessThanZero, false),
        Operation::Bgez => branch::conditional(cpu, i, Condition::GreaterOrEqualZero, false),
        Operation::Bltzal => branch::conditional(cpu, i, Condition::LessThanZero, true),
        Operation::Bgezal => branch::conditional(cpu, i, Condition::GreaterOrEqualZero, true),
        Operation::J => branch::jump(cpu, i, false),
        Operation::Jal => branch::jump(cpu, i, true),
        Operation::Beq => branch::conditional(cpu, i, Condition::Equal, false),
        Operation::Bne => branch::conditional(cpu, i, Condition::NotEqual, false),
        Operation::Blez => branch::conditional(cpu, i, Condition::LessOrEqualZero, false),
        Operation::Bgtz => branch::conditional(cpu, i, Condition::GreaterThanZero, false),
        Operation::Addi => return alu::addi(cpu, i),
        Operation::Addiu => alu::immediate(cpu, i, AluOp::Addu, Immediate::SignExtended),
        Operation::Slti => alu::immediate(cpu, i, AluOp::Slt, Immediate::SignExtended),
        Operation::Sltiu => alu::immediate(cpu, i, AluOp::Sltu, Immediate::SignExtended),
        Operation::Andi => alu::immediate(cpu, i, AluOp::And, Immediate::ZeroExtended),
        Operation::Ori => alu::immediate(cpu, i, AluOp::Or, Immediate::ZeroExtended),
        Operation::Xori => alu::immediate(cpu, i, AluOp::Xor, Immediate::ZeroExtended),
        Operation::Lui => alu::lui(cpu, i),
        Operation::Cop(cop) => return coprocessor::execute(cpu, cop, i),
        Operation::Lb => return load_store::load(cpu, bus, i, Load::Byte),
        Operation::Lh => return load_store::load(cpu, bus, i, Load::Halfword),
        Operation::Lwl => return load_store::load_unaligned(cpu, bus, i, true),
        Operation::Lw => return load_store::load(cpu, bus, i, Load::Word),
        Operation::Lbu => return load_store::load(cpu, bus, i, Load::ByteUnsigned),
        Operation::Lhu => return load_store::load(cpu, bus, i, Load::HalfwordUnsigned),
        Operation::Lwr => return load_store::load_unaligned(cpu, bus, i, false),
        Operation::Sb => return load_store::store(cpu, bus, i, AccessWidth::Byte),
        Operation::Sh => return load_store::store(cpu, bus, i, AccessWidth::Halfword),
        Operation::Swl => return load_store::store_unaligned(cpu, bus, i, true),
        Operation::Sw => return load_store::store(cpu, bus, i, AccessWidth::Word),
        Operation::Swr => return load_store::store_unaligned(cpu, bus, i, false),
        Operation::Lwc(cop) => return coprocessor::load_word(cpu, bus, cop, i),
        Operation::Swc(cop) => return coprocessor::store_word(cpu, bus, cop, i),
    }
    Ok(())
}
