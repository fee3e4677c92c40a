//! SPU register file. No audio is produced; `SPUSTAT` mirrors the mode bits
//! of `SPUCNT` so the BIOS sees its writes acknowledged.

use crate::api::BusDevice;

/// First SPU register.
pub const SPU_START: u32 = 0x1F80_1C00;
/// `SPUCNT`.
pub const SPUCNT: u32 = 0x1F80_1DAA;
/// `SPUSTAT`.
pub const SPUSTAT: u32 = 0x1F80_1DAE;
const SPU_END: u32 = SPU_START + 0x400;
const SPU_LEN: usize = (SPU_END - SPU_START) as usize;
const SPUSTAT_MODE_MASK: u8 = 0x3F;

/// SPU register storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spu {
    registers: Vec<u8>,
}

impl Default for Spu {
    fn default() -> Self {
        Self::new()
    }
}

impl Spu {
    /// Creates a silent SPU with every register cleared.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registers: vec![0; SPU_LEN],
        }
    }

    fn offset(addr: u32) -> usize {
        (addr - SPU_START) as usize
    }
}

impl BusDevice for Spu {
    fn is_address_for_device(&self, addr: u32) -> bool {
        (SPU_START..SPU_END).contains(&addr)
    }

    fn get_byte(&mut self, addr: u32) -> u8 {
        match addr {
            SPUSTAT => self.registers[Self::offset(SPUCNT)] & SPUSTAT_MODE_MASK,
            a if a == SPUSTAT + 1 => 0,
            _ => self.registers[Self::offset(addr)],
        }
    }

    fn set_byte(&mut self, addr: u32, value: u8) {
        if addr == SPUSTAT || addr == SPUSTAT + 1 {
            return;
        }
        self.registers[Self::offset(addr)] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::{Spu, SPUCNT, SPUSTAT, SPU_START};
    use crate::api::BusDevice;

    #[test]
    fn status_mirrors_low_control_bits() {
        let mut spu = Spu::new();
        spu.set_halfword(SPUCNT, 0xC0FF);
        assert_eq!(spu.get_halfword(SPUSTAT), 0x003F);
        spu.set_halfword(SPUCNT, 0x8001);
        assert_eq!(spu.get_halfword(SPUSTAT), 0x0001);
    }

    #[test]
    fn voice_registers_are_plain_storage() {
        let mut spu = Spu::new();
        spu.set_halfword(SPU_START + 0x10, 0x3FFF);
        assert_eq!(spu.get_halfword(SPU_START + 0x10), 0x3FFF);
        spu.set_halfword(SPUSTAT, 0xFFFF);
        assert_eq!(spu.get_halfword(SPUSTAT), 0);
    }
}
