//! Host-facing contracts: configuration, the device and coprocessor seams,
//! tick outcomes and trace hooks.

use crate::decoder::Instruction;
use crate::fault::{Exception, Fault};
use crate::peripherals::interrupt::InterruptController;

/// Default VBLANK period, in CPU ticks (one NTSC frame at roughly two cycles
/// per instruction).
pub const DEFAULT_VBLANK_INTERVAL_TICKS: u32 = 282_240;
/// Default delay between a CD-ROM command and its first response.
pub const DEFAULT_CDROM_ACK_DELAY_TICKS: u32 = 25_000;
/// Default delay between sectors while the CD-ROM drive is reading at 1x.
pub const DEFAULT_CDROM_SECTOR_DELAY_TICKS: u32 = 225_792;

/// Top-level configuration for a machine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// Ticks between VBLANK interrupts.
    pub vblank_interval_ticks: u32,
    /// Ticks between a CD-ROM command and its first response interrupt.
    pub cdrom_ack_delay_ticks: u32,
    /// Ticks between sector-ready interrupts while reading at single speed.
    pub cdrom_sector_delay_ticks: u32,
    /// Turns unmapped accesses into zero reads and dropped writes instead of
    /// bus errors. Intended for tooling that probes memory.
    pub suppress_bus_faults: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            vblank_interval_ticks: DEFAULT_VBLANK_INTERVAL_TICKS,
            cdrom_ack_delay_ticks: DEFAULT_CDROM_ACK_DELAY_TICKS,
            cdrom_sector_delay_ticks: DEFAULT_CDROM_SECTOR_DELAY_TICKS,
            suppress_bus_faults: false,
        }
    }
}

/// A device mapped onto the physical bus.
///
/// Devices receive absolute physical addresses. Only the byte accessors are
/// required; halfword and word accesses compose little-endian bytes unless a
/// device overrides them.
pub trait BusDevice {
    /// Returns true if `addr` falls inside this device's window.
    fn is_address_for_device(&self, addr: u32) -> bool;

    /// Reads one byte.
    fn get_byte(&mut self, addr: u32) -> u8;

    /// Writes one byte.
    fn set_byte(&mut self, addr: u32, value: u8);

    /// Reads a little-endian halfword.
    fn get_halfword(&mut self, addr: u32) -> u16 {
        let lo = self.get_byte(addr);
        let hi = self.get_byte(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    /// Writes a little-endian halfword.
    fn set_halfword(&mut self, addr: u32, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.set_byte(addr, lo);
        self.set_byte(addr.wrapping_add(1), hi);
    }

    /// Reads a little-endian word.
    fn get_word(&mut self, addr: u32) -> u32 {
        let lo = self.get_halfword(addr);
        let hi = self.get_halfword(addr.wrapping_add(2));
        u32::from(lo) | (u32::from(hi) << 16)
    }

    /// Writes a little-endian word.
    #[allow(clippy::cast_possible_truncation)]
    fn set_word(&mut self, addr: u32, value: u32) {
        self.set_halfword(addr, value as u16);
        self.set_halfword(addr.wrapping_add(2), (value >> 16) as u16);
    }

    /// Advances the device by one CPU tick.
    fn tick(&mut self, _irq: &mut InterruptController) {}
}

/// A coprocessor reachable through `MFCz`/`MTCz`/`CFCz`/`CTCz`/`COPz` and
/// `LWCz`/`SWCz`.
pub trait Coprocessor {
    /// Reads data register `index` (`MFCz`, `SWCz`).
    fn read_data(&self, index: usize) -> u32;

    /// Writes data register `index` (`MTCz`, `LWCz`).
    fn write_data(&mut self, index: usize, value: u32);

    /// Reads control register `index` (`CFCz`).
    fn read_control(&self, index: usize) -> u32;

    /// Writes control register `index` (`CTCz`).
    fn write_control(&mut self, index: usize, value: u32);

    /// Executes a coprocessor command word (bit 25 set).
    ///
    /// # Errors
    ///
    /// Returns the fault to raise when the command is not defined for this
    /// coprocessor.
    fn execute_command(&mut self, instruction: Instruction) -> Result<(), Fault>;
}

/// Result of one CPU tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickOutcome {
    /// The current instruction retired.
    Retired,
    /// An exception was taken instead.
    Exception {
        /// Exception kind.
        exception: Exception,
        /// Value latched into EPC.
        epc: u32,
        /// Vector execution continues at.
        vector: u32,
    },
}

impl TickOutcome {
    /// Returns the exception taken by this tick, if any.
    #[must_use]
    pub const fn exception(self) -> Option<Exception> {
        match self {
            Self::Retired => None,
            Self::Exception { exception, .. } => Some(exception),
        }
    }
}

/// Summary of a multi-tick run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RunOutcome {
    /// Ticks executed.
    pub ticks: u64,
    /// Ticks that ended in an exception, interrupts included.
    pub exceptions: u64,
    /// Most recent exception taken during the run.
    pub last_exception: Option<Exception>,
}

/// Trace events emitted in execution order when a sink is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// The instruction about to execute.
    InstructionStart {
        /// Address of the instruction.
        pc: u32,
        /// Raw instruction word.
        word: u32,
        /// True when the instruction sits in a branch delay slot.
        in_delay_slot: bool,
    },
    /// An exception was entered.
    ExceptionRaised {
        /// Exception kind.
        exception: Exception,
        /// Value latched into EPC.
        epc: u32,
        /// Handler vector.
        vector: u32,
    },
}

/// Sink trait for trace hooks.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}
