//! Interrupt controller: `I_STAT` and `I_MASK` at `0x1F80_1070`.
//!
//! Devices raise sources into `I_STAT`; software acknowledges by writing zero
//! bits. The CPU sees a single line, asserted while `I_STAT & I_MASK != 0`,
//! mirrored into `Cause.IP2`.

use crate::api::BusDevice;
use crate::savestate::{SaveStateError, Snapshot, StateReader, StateWriter};

/// Physical address of `I_STAT`.
pub const I_STAT: u32 = 0x1F80_1070;
/// Physical address of `I_MASK`.
pub const I_MASK: u32 = 0x1F80_1074;
const WINDOW_END: u32 = 0x1F80_1077;
const SOURCE_MASK: u16 = 0x07FF;

/// Interrupt sources, numbered by their `I_STAT` bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Irq {
    /// Vertical blank from the GPU.
    Vblank = 0,
    /// GPU `GP0(1Fh)` request.
    Gpu = 1,
    /// CD-ROM controller.
    Cdrom = 2,
    /// DMA completion.
    Dma = 3,
    /// Root counter 0.
    Timer0 = 4,
    /// Root counter 1.
    Timer1 = 5,
    /// Root counter 2.
    Timer2 = 6,
    /// Controller and memory card port.
    Controller = 7,
    /// Serial port.
    Sio = 8,
    /// SPU.
    Spu = 9,
    /// Lightpen and PIO.
    Lightpen = 10,
}

impl Irq {
    /// `I_STAT` bit for this source.
    #[must_use]
    pub const fn bit(self) -> u16 {
        1 << self as u8
    }
}

/// `I_STAT`/`I_MASK` register pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct InterruptController {
    status: u16,
    mask: u16,
}

impl InterruptController {
    /// Creates a controller with nothing pending and everything masked.
    #[must_use]
    pub const fn new() -> Self {
        Self { status: 0, mask: 0 }
    }

    /// Latches `irq` into `I_STAT`.
    pub fn request(&mut self, irq: Irq) {
        if self.status & irq.bit() == 0 {
            log::trace!("irq: {irq:?} raised");
        }
        self.status |= irq.bit();
    }

    /// True while any unmasked source is pending.
    #[must_use]
    pub const fn line(&self) -> bool {
        self.status & self.mask != 0
    }

    /// Current `I_STAT`.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Current `I_MASK`.
    #[must_use]
    pub const fn mask(&self) -> u16 {
        self.mask
    }

    /// Acknowledges sources: bits written as zero are cleared.
    pub fn acknowledge(&mut self, value: u16) {
        self.status &= value;
    }

    /// Replaces `I_MASK`.
    pub fn set_mask(&mut self, value: u16) {
        self.mask = value & SOURCE_MASK;
    }
}

impl BusDevice for InterruptController {
    fn is_address_for_device(&self, addr: u32) -> bool {
        (I_STAT..=WINDOW_END).contains(&addr)
    }

    fn get_byte(&mut self, addr: u32) -> u8 {
        let register = if addr < I_MASK { self.status } else { self.mask };
        let [low, high] = register.to_le_bytes();
        match addr & 3 {
            0 => low,
            1 => high,
            _ => 0,
        }
    }

    fn set_byte(&mut self, addr: u32, value: u8) {
        let shift = match addr & 3 {
            0 => 0,
            1 => 8,
            _ => return,
        };
        let lane = 0xFFu16 << shift;
        let value = u16::from(value) << shift;
        if addr < I_MASK {
            self.acknowledge(value | !lane);
        } else {
            self.set_mask((self.mask & !lane) | value);
        }
    }
}

impl Snapshot for InterruptController {
    fn save(&self, w: &mut StateWriter) {
        w.write_u16(self.status);
        w.write_u16(self.mask);
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), SaveStateError> {
        r.enter("interrupts");
        self.status = r.read_u16()? & SOURCE_MASK;
        self.mask = r.read_u16()? & SOURCE_MASK;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{InterruptController, Irq, I_MASK, I_STAT};
    use crate::api::BusDevice;

    #[test]
    fn line_requires_matching_mask_bit() {
        let mut irq = InterruptController::new();
        irq.request(Irq::Vblank);
        assert!(!irq.line());
        irq.set_word(I_MASK, 0x0001);
        assert!(irq.line());
    }

    #[test]
    fn word_write_of_zero_bits_acknowledges() {
        let mut irq = InterruptController::new();
        irq.request(Irq::Vblank);
        irq.request(Irq::Cdrom);
        irq.set_word(I_STAT, u32::from(!Irq::Cdrom.bit()));
        assert_eq!(irq.status(), Irq::Vblank.bit());
    }

    #[test]
    fn byte_write_only_touches_its_lane() {
        let mut irq = InterruptController::new();
        irq.request(Irq::Sio);
        irq.request(Irq::Gpu);
        irq.set_byte(I_STAT, 0x00);
        assert_eq!(irq.status(), Irq::Sio.bit());
    }

    #[test]
    fn mask_keeps_only_defined_sources() {
        let mut irq = InterruptController::new();
        irq.set_word(I_MASK, 0xFFFF_FFFF);
        assert_eq!(irq.mask(), 0x07FF);
        assert_eq!(irq.get_word(I_MASK), 0x07FF);
    }
}
