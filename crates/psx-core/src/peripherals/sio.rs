//! Controller/memory-card and serial ports with nothing plugged in.

use crate::api::BusDevice;

/// `JOY_DATA`.
pub const JOY_DATA: u32 = 0x1F80_1040;
/// `JOY_STAT`.
pub const JOY_STAT: u32 = 0x1F80_1044;
const SIO_START: u32 = 0x1F80_1040;
const SIO_END: u32 = SIO_START + 0x20;
const SIO_LEN: usize = (SIO_END - SIO_START) as usize;
/// TX ready and TX finished: the port never holds anything back.
const JOY_STAT_IDLE: u8 = 0x05;

/// Serial ports backed by plain storage, except that the receive FIFO
/// always reads as an empty line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPorts {
    registers: [u8; SIO_LEN],
}

impl Default for SerialPorts {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialPorts {
    /// Creates idle ports.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registers: [0; SIO_LEN],
        }
    }
}

impl BusDevice for SerialPorts {
    fn is_address_for_device(&self, addr: u32) -> bool {
        (SIO_START..SIO_END).contains(&addr)
    }

    fn get_byte(&mut self, addr: u32) -> u8 {
        match addr {
            JOY_DATA..=0x1F80_1043 => 0xFF,
            JOY_STAT => JOY_STAT_IDLE,
            _ => self.registers[(addr - SIO_START) as usize],
        }
    }

    fn set_byte(&mut self, addr: u32, value: u8) {
        if addr == JOY_DATA {
            log::trace!("sio: transmit {value:#04x}, no device attached");
        }
        self.registers[(addr - SIO_START) as usize] = value;
    }
}
