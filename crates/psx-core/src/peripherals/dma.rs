//! DMA controller at `0x1F80_1080`.
//!
//! Seven channels of `{MADR, BCR, CHCR}` plus `DPCR` and `DICR`. A channel
//! that becomes active completes in full before the CPU runs again: the bus
//! notices the activation after the register write and calls
//! [`Dma::run`] with the memories and devices the transfer touches.

use crate::api::BusDevice;
use crate::memory::map::RAM_SIZE;
use crate::memory::MemoryBlock;
use crate::peripherals::cdrom::Cdrom;
use crate::peripherals::gpu::Gpu;
use crate::peripherals::interrupt::{InterruptController, Irq};
use crate::savestate::{SaveStateError, Snapshot, StateReader, StateWriter};

/// First DMA register (`MADR` of channel 0).
pub const DMA_START: u32 = 0x1F80_1080;
/// `DPCR`.
pub const DPCR: u32 = 0x1F80_10F0;
/// `DICR`.
pub const DICR: u32 = 0x1F80_10F4;
const DMA_END: u32 = 0x1F80_10FF;
const CHANNEL_COUNT: usize = 7;
const DPCR_RESET: u32 = 0x0765_4321;

const CHCR_FROM_RAM: u32 = 1 << 0;
const CHCR_BACKWARD: u32 = 1 << 1;
const CHCR_START: u32 = 1 << 24;
const CHCR_TRIGGER: u32 = 1 << 28;

const DICR_FORCE: u32 = 1 << 15;
const DICR_MASTER_ENABLE: u32 = 1 << 23;
const DICR_MASTER_FLAG: u32 = 1 << 31;
const DICR_WRITABLE: u32 = 0x00FF_803F;
const DICR_FLAGS: u32 = 0x7F00_0000;

const ADDRESS_MASK: u32 = 0x001F_FFFC;
const END_OF_LIST: u32 = 0x0080_0000;
/// Upper bound on linked-list nodes walked by one transfer.
const MAX_LIST_NODES: usize = 0x10_0000;
/// Upper bound on words moved by one block transfer: all of RAM.
pub const MAX_TRANSFER_WORDS: u32 = RAM_SIZE / 4;

/// DMA channels in port order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Port {
    /// MDEC input.
    MdecIn = 0,
    /// MDEC output.
    MdecOut = 1,
    /// GPU command/data.
    Gpu = 2,
    /// CD-ROM data FIFO.
    Cdrom = 3,
    /// SPU RAM.
    Spu = 4,
    /// Expansion port.
    Pio = 5,
    /// Ordering-table clear.
    Otc = 6,
}

impl Port {
    /// Every port in index order.
    pub const ALL: [Self; CHANNEL_COUNT] = [
        Self::MdecIn,
        Self::MdecOut,
        Self::Gpu,
        Self::Cdrom,
        Self::Spu,
        Self::Pio,
        Self::Otc,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

/// Register set of a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Channel {
    /// `MADR`: base address in RAM.
    pub base: u32,
    /// `BCR`: block size and count.
    pub block: u32,
    /// `CHCR`: channel control.
    pub control: u32,
}

impl Channel {
    /// Synchronisation mode: 0 manual, 1 request blocks, 2 linked list.
    #[must_use]
    pub const fn sync_mode(&self) -> u32 {
        (self.control >> 9) & 0x3
    }

    /// Words `BCR` asks a manual or block-request transfer to move.
    #[must_use]
    pub const fn requested_words(&self) -> u32 {
        let size = self.block & 0xFFFF;
        if self.sync_mode() == 0 {
            if size == 0 {
                0x1_0000
            } else {
                size
            }
        } else {
            size * (self.block >> 16)
        }
    }

    /// Words actually moved: the request, capped at [`MAX_TRANSFER_WORDS`].
    #[must_use]
    pub const fn word_count(&self) -> u32 {
        let requested = self.requested_words();
        if requested > MAX_TRANSFER_WORDS {
            MAX_TRANSFER_WORDS
        } else {
            requested
        }
    }

    const fn is_active(&self) -> bool {
        self.control & CHCR_START != 0
            && (self.sync_mode() != 0 || self.control & CHCR_TRIGGER != 0)
    }

    const fn step(&self) -> u32 {
        if self.control & CHCR_BACKWARD != 0 {
            4u32.wrapping_neg()
        } else {
            4
        }
    }
}

/// DMA controller registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dma {
    channels: [Channel; CHANNEL_COUNT],
    control: u32,
    interrupt: u32,
    irq_pending: bool,
}

impl Default for Dma {
    fn default() -> Self {
        Self::new()
    }
}

impl Dma {
    /// Creates a controller with the reset priority table and nothing running.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channels: [Channel {
                base: 0,
                block: 0,
                control: 0,
            }; CHANNEL_COUNT],
            control: DPCR_RESET,
            interrupt: 0,
            irq_pending: false,
        }
    }

    /// Register set of `port`.
    #[must_use]
    pub const fn channel(&self, port: Port) -> &Channel {
        &self.channels[port.index()]
    }

    /// Current `DICR`.
    #[must_use]
    pub const fn interrupt_register(&self) -> u32 {
        self.interrupt
    }

    /// First channel that is started, triggered and enabled in `DPCR`.
    #[must_use]
    pub fn active_port(&self) -> Option<Port> {
        Port::ALL.into_iter().find(|port| {
            let enabled = self.control & (1 << (3 + 4 * port.index())) != 0;
            enabled && self.channels[port.index()].is_active()
        })
    }

    /// Runs the whole transfer for `port` and signals completion.
    pub fn run(&mut self, port: Port, ram: &mut MemoryBlock, gpu: &mut Gpu, cdrom: &mut Cdrom) {
        let channel = self.channels[port.index()];
        log::debug!(
            "dma: {port:?} madr={:#010x} bcr={:#010x} chcr={:#010x}",
            channel.base,
            channel.block,
            channel.control
        );
        if channel.requested_words() > MAX_TRANSFER_WORDS {
            log::warn!(
                "dma: {port:?} requested {} words, capped at {MAX_TRANSFER_WORDS}",
                channel.requested_words()
            );
        }
        match (port, channel.sync_mode()) {
            (Port::Otc, _) => Self::clear_ordering_table(&channel, ram),
            (Port::Gpu, 2) => Self::walk_linked_list(&channel, ram, gpu),
            (Port::Gpu, _) => {
                let mut addr = channel.base & ADDRESS_MASK;
                for _ in 0..channel.word_count() {
                    if channel.control & CHCR_FROM_RAM != 0 {
                        gpu.gp0(ram.load_word(addr));
                    } else {
                        ram.store_word(addr, gpu.read_data());
                    }
                    addr = addr.wrapping_add(channel.step()) & ADDRESS_MASK;
                }
            }
            (Port::Cdrom, _) => {
                let mut addr = channel.base & ADDRESS_MASK;
                for _ in 0..channel.word_count() {
                    ram.store_word(addr, cdrom.read_data_word());
                    addr = addr.wrapping_add(channel.step()) & ADDRESS_MASK;
                }
            }
            _ => log::debug!("dma: {port:?} transfer has no data path, completing"),
        }
        self.finish(port);
    }

    fn clear_ordering_table(channel: &Channel, ram: &mut MemoryBlock) {
        let count = channel.word_count();
        let mut addr = channel.base & ADDRESS_MASK;
        for remaining in (0..count).rev() {
            let value = if remaining == 0 {
                0x00FF_FFFF
            } else {
                addr.wrapping_sub(4) & ADDRESS_MASK
            };
            ram.store_word(addr, value);
            addr = addr.wrapping_sub(4) & ADDRESS_MASK;
        }
    }

    fn walk_linked_list(channel: &Channel, ram: &mut MemoryBlock, gpu: &mut Gpu) {
        let mut addr = channel.base & ADDRESS_MASK;
        for _ in 0..MAX_LIST_NODES {
            let header = ram.load_word(addr);
            for word in 1..=header >> 24 {
                gpu.gp0(ram.load_word(addr.wrapping_add(word * 4) & ADDRESS_MASK));
            }
            if header & END_OF_LIST != 0 {
                return;
            }
            addr = header & ADDRESS_MASK;
        }
        log::warn!("dma: GPU linked list did not terminate");
    }

    fn finish(&mut self, port: Port) {
        let index = port.index();
        self.channels[index].control &= !(CHCR_START | CHCR_TRIGGER);
        if self.interrupt & (1 << (16 + index)) != 0 {
            self.interrupt |= 1 << (24 + index);
        }
        self.update_master_flag();
    }

    fn update_master_flag(&mut self) {
        let enables = (self.interrupt >> 16) & 0x7F;
        let flags = (self.interrupt >> 24) & 0x7F;
        let master = self.interrupt & DICR_FORCE != 0
            || (self.interrupt & DICR_MASTER_ENABLE != 0 && enables & flags != 0);
        let was_set = self.interrupt & DICR_MASTER_FLAG != 0;
        if master {
            self.interrupt |= DICR_MASTER_FLAG;
            if !was_set {
                self.irq_pending = true;
            }
        } else {
            self.interrupt &= !DICR_MASTER_FLAG;
        }
    }

    fn write_interrupt(&mut self, value: u32, lanes: u32) {
        let writable = DICR_WRITABLE & lanes;
        self.interrupt = (self.interrupt & !writable) | (value & writable);
        self.interrupt &= !(value & DICR_FLAGS & lanes);
        self.update_master_flag();
    }

    fn register(&mut self, addr: u32) -> Option<&mut u32> {
        let offset = (addr & !3) - DMA_START;
        let index = (offset / 0x10) as usize;
        match (index, offset % 0x10) {
            (0..=6, 0x0) => Some(&mut self.channels[index].base),
            (0..=6, 0x4) => Some(&mut self.channels[index].block),
            (0..=6, 0x8) => Some(&mut self.channels[index].control),
            (7, 0x0) => Some(&mut self.control),
            _ => None,
        }
    }
}

impl BusDevice for Dma {
    fn is_address_for_device(&self, addr: u32) -> bool {
        (DMA_START..=DMA_END).contains(&addr)
    }

    fn get_byte(&mut self, addr: u32) -> u8 {
        let value = if addr & !3 == DICR {
            self.interrupt
        } else {
            self.register(addr).map_or(0, |register| *register)
        };
        value.to_le_bytes()[(addr & 3) as usize]
    }

    fn set_byte(&mut self, addr: u32, value: u8) {
        let shift = (addr & 3) * 8;
        let lanes = 0xFF << shift;
        let value = u32::from(value) << shift;
        if addr & !3 == DICR {
            self.write_interrupt(value, lanes);
        } else if let Some(register) = self.register(addr) {
            *register = (*register & !lanes) | value;
        }
    }

    fn tick(&mut self, irq: &mut InterruptController) {
        if self.irq_pending {
            self.irq_pending = false;
            irq.request(Irq::Dma);
        }
    }
}

impl Snapshot for Dma {
    fn save(&self, w: &mut StateWriter) {
        for channel in &self.channels {
            w.write_u32(channel.base);
            w.write_u32(channel.block);
            w.write_u32(channel.control);
        }
        w.write_u32(self.control);
        w.write_u32(self.interrupt);
        w.write_bool(self.irq_pending);
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), SaveStateError> {
        r.enter("dma");
        for channel in &mut self.channels {
            channel.base = r.read_u32()?;
            channel.block = r.read_u32()?;
            channel.control = r.read_u32()?;
        }
        self.control = r.read_u32()?;
        self.interrupt = r.read_u32()?;
        self.irq_pending = r.read_bool()?;
        Ok(())
    }
}
