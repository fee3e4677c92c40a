//! Loads and stores. Loads land through the load-delay stage of the register
//! file; an isolated cache swallows both directions.

use super::helpers::{merge_load_left, merge_load_right, merge_store_left, merge_store_right};
use crate::bus::{Bus, BusError};
use crate::cpu::Cpu;
use crate::decoder::Instruction;
use crate::fault::Fault;
use crate::memory::{validate_alignment, AccessKind, AccessWidth};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Load {
    Byte,
    ByteUnsigned,
    Halfword,
    HalfwordUnsigned,
    Word,
}

impl Load {
    const fn width(self) -> AccessWidth {
        match self {
            Self::Byte | Self::ByteUnsigned => AccessWidth::Byte,
            Self::Halfword | Self::HalfwordUnsigned => AccessWidth::Halfword,
            Self::Word => AccessWidth::Word,
        }
    }
}

pub(super) fn effective_address(cpu: &Cpu, i: Instruction) -> u32 {
    cpu.registers.get(i.rs()).wrapping_add(i.imm_se())
}

/// Maps a failed bus access onto the bus-error exception for `kind`.
pub(super) fn bus_fault(kind: AccessKind) -> impl Fn(BusError) -> Fault {
    move |err| {
        log::debug!("{kind:?} access failed: {err}");
        Fault::new(kind.bus_error())
    }
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub(super) fn load(cpu: &mut Cpu, bus: &mut Bus, i: Instruction, kind: Load) -> Result<(), Fault> {
    let addr = effective_address(cpu, i);
    validate_alignment(addr, kind.width(), AccessKind::Load)?;
    if cpu.cop0.cache_isolated() {
        log::trace!("load from {addr:#010x} with cache isolated");
        return Ok(());
    }
    let value = match kind {
        Load::Byte => bus.read_byte(addr).map(|v| v as i8 as u32),
        Load::ByteUnsigned => bus.read_byte(addr).map(u32::from),
        Load::Halfword => bus.read_halfword(addr).map(|v| v as i16 as u32),
        Load::HalfwordUnsigned => bus.read_halfword(addr).map(u32::from),
        Load::Word => bus.read_word(addr),
    }
    .map_err(bus_fault(AccessKind::Load))?;
    cpu.registers.write(i.rt(), value, true);
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
pub(super) fn store(
    cpu: &mut Cpu,
    bus: &mut Bus,
    i: Instruction,
    width: AccessWidth,
) -> Result<(), Fault> {
    let addr = effective_address(cpu, i);
    validate_alignment(addr, width, AccessKind::Store)?;
    let value = cpu.registers.get(i.rt());
    if cpu.cop0.cache_isolated() {
        log::trace!("store {value:#010x} to {addr:#010x} dropped, cache isolated");
        return Ok(());
    }
    match width {
        AccessWidth::Byte => bus.write_byte(addr, value as u8),
        AccessWidth::Halfword => bus.write_halfword(addr, value as u16),
        AccessWidth::Word => bus.write_word(addr, value),
    }
    .map_err(bus_fault(AccessKind::Store))
}

/// `LWL`/`LWR`: merges into the in-flight value of `rt`.
pub(super) fn load_unaligned(
    cpu: &mut Cpu,
    bus: &mut Bus,
    i: Instruction,
    left: bool,
) -> Result<(), Fault> {
    let addr = effective_address(cpu, i);
    if cpu.cop0.cache_isolated() {
        return Ok(());
    }
    let word = bus.read_word(addr & !3).map_err(bus_fault(AccessKind::Load))?;
    let current = cpu.registers.read(i.rt(), true);
    let value = if left {
        merge_load_left(current, word, addr)
    } else {
        merge_load_right(current, word, addr)
    };
    cpu.registers.write(i.rt(), value, true);
    Ok(())
}

/// `SWL`/`SWR`: read-modify-write of the aligned word.
pub(super) fn store_unaligned(
    cpu: &mut Cpu,
    bus: &mut Bus,
    i: Instruction,
    left: bool,
) -> Result<(), Fault> {
    let addr = effective_address(cpu, i);
    if cpu.cop0.cache_isolated() {
        return Ok(());
    }
    let aligned = addr & !3;
    let memory = bus.read_word(aligned).map_err(bus_fault(AccessKind::Store))?;
    let value = cpu.registers.get(i.rt());
    let merged = if left {
        merge_store_left(memory, value, addr)
    } else {
        merge_store_right(memory, value, addr)
    };
    bus.write_word(aligned, merged).map_err(bus_fault(AccessKind::Store))
}
