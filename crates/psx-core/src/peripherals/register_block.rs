//! Plain read/write register storage for hardware the core does not model:
//! memory control, RAM size, MDEC, expansion 2 and cache control. Reads
//! return the last value written.

use crate::api::BusDevice;

/// Memory control registers.
pub const MEMORY_CONTROL_START: u32 = 0x1F80_1000;
/// `RAM_SIZE` register.
pub const RAM_SIZE_REGISTER: u32 = 0x1F80_1060;
/// MDEC command/status pair.
pub const MDEC_START: u32 = 0x1F80_1820;
/// Expansion region 2 (POST display, debug UART).
pub const EXPANSION2_START: u32 = 0x1F80_2000;
/// BIOS POST status port inside expansion 2.
pub const POST_PORT: u32 = 0x1F80_2041;

/// A named window of byte registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterBlock {
    name: &'static str,
    start: u32,
    bytes: Vec<u8>,
    log_writes: bool,
}

impl RegisterBlock {
    /// Creates a zeroed block of `len` bytes at `start`.
    #[must_use]
    pub fn new(name: &'static str, start: u32, len: usize) -> Self {
        Self {
            name,
            start,
            bytes: vec![0; len],
            log_writes: false,
        }
    }

    /// Memory control 1 (`0x1F80_1000..0x1F80_1024`).
    #[must_use]
    pub fn memory_control() -> Self {
        Self::new("memctrl", MEMORY_CONTROL_START, 0x24)
    }

    /// Memory control 2 (`RAM_SIZE`).
    #[must_use]
    pub fn ram_size() -> Self {
        Self::new("ram_size", RAM_SIZE_REGISTER, 4)
    }

    /// MDEC data/command and status registers.
    #[must_use]
    pub fn mdec() -> Self {
        Self::new("mdec", MDEC_START, 8)
    }

    /// Expansion region 2. Writes are logged so BIOS POST codes show up.
    #[must_use]
    pub fn expansion2() -> Self {
        Self {
            log_writes: true,
            ..Self::new("expansion2", EXPANSION2_START, 0x1000)
        }
    }

    /// KSEG2 cache-control registers (`0xFFFE_0000..0xFFFE_0200`).
    #[must_use]
    pub fn cache_control() -> Self {
        Self::new(
            "cache_control",
            crate::memory::CACHE_CONTROL_START,
            0x200,
        )
    }

    /// Name used in log lines.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    fn offset(&self, addr: u32) -> usize {
        addr.wrapping_sub(self.start) as usize
    }
}

impl BusDevice for RegisterBlock {
    fn is_address_for_device(&self, addr: u32) -> bool {
        addr >= self.start && self.offset(addr) < self.bytes.len()
    }

    fn get_byte(&mut self, addr: u32) -> u8 {
        let offset = self.offset(addr);
        self.bytes.get(offset).copied().unwrap_or(0)
    }

    fn set_byte(&mut self, addr: u32, value: u8) {
        if self.log_writes {
            if addr == POST_PORT {
                log::debug!("{}: POST {value:#04x}", self.name);
            } else {
                log::trace!("{}: write {value:#04x} at {addr:#010x}", self.name);
            }
        }
        let offset = self.offset(addr);
        if let Some(slot) = self.bytes.get_mut(offset) {
            *slot = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RegisterBlock, EXPANSION2_START, MEMORY_CONTROL_START, RAM_SIZE_REGISTER};
    use crate::api::BusDevice;

    #[test]
    fn stores_and_returns_last_written_value() {
        let mut block = RegisterBlock::memory_control();
        block.set_word(MEMORY_CONTROL_START + 0x08, 0x0013_243F);
        assert_eq!(block.get_word(MEMORY_CONTROL_START + 0x08), 0x0013_243F);
    }

    #[test]
    fn window_bounds_are_exact() {
        let block = RegisterBlock::ram_size();
        assert!(block.is_address_for_device(RAM_SIZE_REGISTER + 3));
        assert!(!block.is_address_for_device(RAM_SIZE_REGISTER + 4));
        assert!(!block.is_address_for_device(RAM_SIZE_REGISTER - 1));
    }

    #[test]
    fn expansion2_accepts_post_writes() {
        let mut block = RegisterBlock::expansion2();
        block.set_byte(EXPANSION2_START + 0x41, 0x0F);
        assert_eq!(block.get_byte(EXPANSION2_START + 0x41), 0x0F);
        assert_eq!(block.name(), "expansion2");
    }
}
