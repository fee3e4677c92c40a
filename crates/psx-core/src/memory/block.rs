//! Byte-addressed backing stores for RAM, BIOS and the scratchpad.

use crate::api::BusDevice;
use crate::memory::map::{
    BIOS_SIZE, BIOS_START, PARALLEL_PORT_END, PARALLEL_PORT_START, RAM_END, RAM_SIZE, RAM_START,
    SCRATCHPAD_END, SCRATCHPAD_START,
};
use crate::savestate::{SaveStateError, Snapshot, StateReader, StateWriter};

const SCRATCHPAD_SIZE: u32 = SCRATCHPAD_END - SCRATCHPAD_START + 1;

/// A contiguous byte store mapped at `start..=end`.
///
/// Windows larger than the store mirror it; the store length is a power of
/// two so the offset is masked. Read-only blocks drop writes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub struct MemoryBlock {
    name: &'static str,
    start: u32,
    end: u32,
    mask: u32,
    writable: bool,
    data: Vec<u8>,
}

impl MemoryBlock {
    fn new(name: &'static str, start: u32, end: u32, size: u32, writable: bool) -> Self {
        debug_assert!(size.is_power_of_two());
        Self {
            name,
            start,
            end,
            mask: size - 1,
            writable,
            data: vec![0; size as usize],
        }
    }

    /// 2 MiB of main RAM, mirrored across the 8 MiB window.
    #[must_use]
    pub fn ram() -> Self {
        Self::new("ram", RAM_START, RAM_END, RAM_SIZE, true)
    }

    /// 1 KiB data-cache scratchpad.
    #[must_use]
    pub fn scratchpad() -> Self {
        Self::new(
            "scratchpad",
            SCRATCHPAD_START,
            SCRATCHPAD_END,
            SCRATCHPAD_SIZE,
            true,
        )
    }

    /// 512 KiB BIOS ROM. `image` must already be validated to the exact size.
    #[must_use]
    pub fn bios(image: &[u8]) -> Self {
        let mut block = Self::new("bios", BIOS_START, BIOS_START + BIOS_SIZE - 1, BIOS_SIZE, false);
        let len = image.len().min(block.data.len());
        block.data[..len].copy_from_slice(&image[..len]);
        block
    }

    /// Short name used in log lines.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Raw contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw contents, bypassing the read-only flag.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Reads a word directly by offset into the store, wrapping at its size.
    #[must_use]
    pub fn load_word(&self, offset: u32) -> u32 {
        let index = (offset & self.mask & !3) as usize;
        let mut word = [0; 4];
        word.copy_from_slice(&self.data[index..index + 4]);
        u32::from_le_bytes(word)
    }

    /// Writes a word directly by offset into the store, wrapping at its size.
    pub fn store_word(&mut self, offset: u32, value: u32) {
        let index = (offset & self.mask & !3) as usize;
        self.data[index..index + 4].copy_from_slice(&value.to_le_bytes());
    }

    const fn index(&self, addr: u32) -> usize {
        (addr.wrapping_sub(self.start) & self.mask) as usize
    }
}

impl BusDevice for MemoryBlock {
    fn is_address_for_device(&self, addr: u32) -> bool {
        addr >= self.start && addr <= self.end
    }

    fn get_byte(&mut self, addr: u32) -> u8 {
        self.data[self.index(addr)]
    }

    fn set_byte(&mut self, addr: u32, value: u8) {
        if self.writable {
            let index = self.index(addr);
            self.data[index] = value;
        } else {
            log::trace!("{}: dropped write {value:#04x} at {addr:#010x}", self.name);
        }
    }

    fn get_word(&mut self, addr: u32) -> u32 {
        if addr & 3 == 0 {
            self.load_word(addr.wrapping_sub(self.start))
        } else {
            let lo = self.get_halfword(addr);
            let hi = self.get_halfword(addr.wrapping_add(2));
            u32::from(lo) | (u32::from(hi) << 16)
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn set_word(&mut self, addr: u32, value: u32) {
        if !self.writable {
            log::trace!("{}: dropped write {value:#010x} at {addr:#010x}", self.name);
        } else if addr & 3 == 0 {
            self.store_word(addr.wrapping_sub(self.start), value);
        } else {
            self.set_halfword(addr, value as u16);
            self.set_halfword(addr.wrapping_add(2), (value >> 16) as u16);
        }
    }
}

impl Snapshot for MemoryBlock {
    fn save(&self, w: &mut StateWriter) {
        w.write_bytes(&self.data);
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), SaveStateError> {
        r.enter(self.name);
        r.read_into(&mut self.data)
    }
}

/// Parallel port with nothing attached: reads float high, writes vanish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenBus;

impl BusDevice for OpenBus {
    fn is_address_for_device(&self, addr: u32) -> bool {
        (PARALLEL_PORT_START..=PARALLEL_PORT_END).contains(&addr)
    }

    fn get_byte(&mut self, _addr: u32) -> u8 {
        0xFF
    }

    fn set_byte(&mut self, addr: u32, value: u8) {
        log::trace!("parallel port: dropped write {value:#04x} at {addr:#010x}");
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryBlock, OpenBus};
    use crate::api::BusDevice;

    #[test]
    fn ram_mirrors_every_two_megabytes() {
        let mut ram = MemoryBlock::ram();
        ram.set_word(0x0000_1000, 0xCAFE_F00D);
        assert_eq!(ram.get_word(0x0020_1000), 0xCAFE_F00D);
        assert_eq!(ram.get_word(0x0060_1000), 0xCAFE_F00D);
        assert_eq!(ram.get_byte(0x0040_1003), 0xCA);
    }

    #[test]
    fn bios_is_read_only() {
        let mut image = vec![0u8; 512 * 1024];
        image[0..4].copy_from_slice(&0x3C08_0013u32.to_le_bytes());
        let mut bios = MemoryBlock::bios(&image);
        bios.set_word(0x1FC0_0000, 0);
        bios.set_byte(0x1FC0_0001, 0xAA);
        assert_eq!(bios.get_word(0x1FC0_0000), 0x3C08_0013);
        assert!(bios.is_address_for_device(0x1FC7_FFFF));
        assert!(!bios.is_address_for_device(0x1FC8_0000));
    }

    #[test]
    fn scratchpad_stores_halfwords() {
        let mut scratch = MemoryBlock::scratchpad();
        scratch.set_halfword(0x1F80_03FE, 0xBEEF);
        assert_eq!(scratch.get_halfword(0x1F80_03FE), 0xBEEF);
        assert_eq!(scratch.name(), "scratchpad");
    }

    #[test]
    fn open_bus_reads_all_ones() {
        let mut port = OpenBus;
        port.set_byte(0x1F00_0084, 0);
        assert_eq!(port.get_word(0x1F00_0084), 0xFFFF_FFFF);
    }
}
