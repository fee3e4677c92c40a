//! `COPz`, `LWCz` and `SWCz` dispatch.

use super::load_store::{bus_fault, effective_address};
use crate::api::Coprocessor;
use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::decoder::Instruction;
use crate::fault::{Exception, Fault};
use crate::memory::{validate_alignment, AccessKind, AccessWidth};

const MOVE_FROM: u8 = 0x00;
const CONTROL_FROM: u8 = 0x02;
const MOVE_TO: u8 = 0x04;
const CONTROL_TO: u8 = 0x06;

/// Returns coprocessor `cop` if Status allows it in the current mode.
fn unit(cpu: &mut Cpu, cop: u8) -> Result<&mut dyn Coprocessor, Fault> {
    if !cpu.cop0.coprocessor_usable(cop) {
        return Err(Fault::coprocessor_unusable(cop));
    }
    match cop {
        0 => Ok(&mut cpu.cop0),
        2 => Ok(&mut cpu.gte),
        _ => Err(Fault::coprocessor_unusable(cop)),
    }
}

pub(super) fn execute(cpu: &mut Cpu, cop: u8, i: Instruction) -> Result<(), Fault> {
    if i.is_cop_command() {
        return unit(cpu, cop)?.execute_command(i);
    }
    match i.cop_op() {
        MOVE_FROM => {
            let value = unit(cpu, cop)?.read_data(i.rd());
            cpu.registers.write(i.rt(), value, true);
        }
        CONTROL_FROM => {
            let value = unit(cpu, cop)?.read_control(i.rd());
            cpu.registers.write(i.rt(), value, true);
        }
        MOVE_TO => {
            let value = cpu.registers.get(i.rt());
            unit(cpu, cop)?.write_data(i.rd(), value);
        }
        CONTROL_TO => {
            let value = cpu.registers.get(i.rt());
            unit(cpu, cop)?.write_control(i.rd(), value);
        }
        op => {
            unit(cpu, cop)?;
            log::debug!("cop{cop}: sub-op {op:#04x} is reserved");
            return Err(Fault::new(Exception::ReservedInstruction));
        }
    }
    Ok(())
}

/// `LWCz`.
pub(super) fn load_word(cpu: &mut Cpu, bus: &mut Bus, cop: u8, i: Instruction) -> Result<(), Fault> {
    unit(cpu, cop)?;
    let addr = effective_address(cpu, i);
    validate_alignment(addr, AccessWidth::Word, AccessKind::Load)?;
    if cpu.cop0.cache_isolated() {
        return Ok(());
    }
    let value = bus.read_word(addr).map_err(bus_fault(AccessKind::Load))?;
    unit(cpu, cop)?.write_data(i.rt(), value);
    Ok(())
}

/// `SWCz`.
pub(super) fn store_word(cpu: &mut Cpu, bus: &mut Bus, cop: u8, i: Instruction) -> Result<(), Fault> {
    let value = unit(cpu, cop)?.read_data(i.rt());
    let addr = effective_address(cpu, i);
    validate_alignment(addr, AccessWidth::Word, AccessKind::Store)?;
    if cpu.cop0.cache_isolated() {
        return Ok(());
    }
    bus.write_word(addr, value).map_err(bus_fault(AccessKind::Store))
}
