//! GPU command front end.
//!
//! Nothing is rasterised. GP0 packets are assembled to their full length and
//! then dropped, except for the environment commands that are reflected in
//! `GPUSTAT` and the VRAM transfers whose payload must be consumed or
//! produced. GP1 display-control commands update status. VBLANK fires every
//! configured number of ticks.

use std::collections::VecDeque;

use crate::api::BusDevice;
use crate::peripherals::interrupt::{InterruptController, Irq};
use crate::savestate::{SaveStateError, Snapshot, StateReader, StateWriter};

/// `GP0` write / `GPUREAD` read.
pub const GP0: u32 = 0x1F80_1810;
/// `GP1` write / `GPUSTAT` read.
pub const GP1: u32 = 0x1F80_1814;
const GPU_END: u32 = 0x1F80_1817;

/// Depth of the GP0 command FIFO in words.
pub const FIFO_DEPTH: usize = 16;

const STATUS_RESET: u32 = 0x1480_2000;
const STATUS_TEXPAGE_MASK: u32 = 0x07FF;
const STATUS_TEXTURE_DISABLE: u32 = 1 << 15;
const STATUS_MASK_BITS: u32 = 0x3 << 11;
const STATUS_DISPLAY_MODE: u32 = 0x3F << 17;
const STATUS_HRES2: u32 = 1 << 16;
const STATUS_REVERSE: u32 = 1 << 14;
const STATUS_DISPLAY_DISABLE: u32 = 1 << 23;
const STATUS_IRQ: u32 = 1 << 24;
const STATUS_DMA_REQUEST: u32 = 1 << 25;
const STATUS_READY_CMD: u32 = 1 << 26;
const STATUS_READY_VRAM_TO_CPU: u32 = 1 << 27;
const STATUS_READY_DMA: u32 = 1 << 28;
const STATUS_DMA_DIRECTION: u32 = 0x3 << 29;
const STATUS_ODD_LINE: u32 = 1 << 31;
const GPU_VERSION: u32 = 2;

/// Where the next GP0 word goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gp0State {
    /// Waiting for or assembling a fixed-length packet.
    Command,
    /// Consuming a poly-line until its terminator.
    Polyline { words: u32 },
    /// Consuming the payload of a CPU-to-VRAM copy.
    ImageLoad { remaining: u32 },
}

impl Gp0State {
    const fn tag(self) -> (u8, u32) {
        match self {
            Self::Command => (0, 0),
            Self::Polyline { words } => (1, words),
            Self::ImageLoad { remaining } => (2, remaining),
        }
    }

    const fn from_tag(tag: u8, value: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Command),
            1 => Some(Self::Polyline { words: value }),
            2 => Some(Self::ImageLoad { remaining: value }),
            _ => None,
        }
    }
}

/// Words in a fixed-length GP0 packet, header included. Poly-lines report 0.
#[must_use]
pub const fn packet_len(command: u8) -> usize {
    let textured = (command & 0x04 != 0) as usize;
    let shaded = command & 0x10 != 0;
    match command {
        0x02 => 3,
        0x20..=0x3F => {
            let vertices = if command & 0x08 != 0 { 4 } else { 3 };
            1 + vertices * (1 + textured) + if shaded { vertices - 1 } else { 0 }
        }
        0x40..=0x5F if command & 0x08 != 0 => 0,
        0x40..=0x5F => {
            if shaded {
                4
            } else {
                3
            }
        }
        0x60..=0x7F => {
            let variable_size = ((command >> 3) & 0x3 == 0) as usize;
            2 + textured + variable_size
        }
        0x80..=0x9F => 4,
        0xA0..=0xDF => 3,
        _ => 1,
    }
}

/// Number of 32-bit words a VRAM rectangle transfer moves.
const fn transfer_words(size: u32) -> u32 {
    let width = ((size & 0xFFFF).wrapping_sub(1) & 0x3FF) + 1;
    let height = ((size >> 16).wrapping_sub(1) & 0x1FF) + 1;
    (width * height).div_ceil(2)
}

/// GPU register front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gpu {
    status: u32,
    state: Gp0State,
    fifo: VecDeque<u32>,
    expected: usize,
    read_latch: u32,
    read_remaining: u32,
    environment: [u32; 6],
    display: [u32; 4],
    vblank_interval: u32,
    vblank_counter: u32,
    write_latch: u32,
    irq_pending: bool,
}

impl Gpu {
    /// Creates a GPU in its post-reset state.
    #[must_use]
    pub fn new(vblank_interval_ticks: u32) -> Self {
        Self {
            status: STATUS_RESET,
            state: Gp0State::Command,
            fifo: VecDeque::with_capacity(FIFO_DEPTH),
            expected: 0,
            read_latch: 0,
            read_remaining: 0,
            environment: [0; 6],
            display: [0; 4],
            vblank_interval: vblank_interval_ticks.max(1),
            vblank_counter: 0,
            write_latch: 0,
            irq_pending: false,
        }
    }

    /// Composes `GPUSTAT`.
    #[must_use]
    pub const fn status(&self) -> u32 {
        let mut status = self.status
            & !(STATUS_DMA_REQUEST | STATUS_READY_CMD | STATUS_READY_VRAM_TO_CPU | STATUS_READY_DMA);
        status |= STATUS_READY_CMD | STATUS_READY_DMA;
        if self.read_remaining > 0 {
            status |= STATUS_READY_VRAM_TO_CPU;
        }
        let request = match (status & STATUS_DMA_DIRECTION) >> 29 {
            0 => false,
            1 | 2 => true,
            _ => self.read_remaining > 0,
        };
        if request {
            status |= STATUS_DMA_REQUEST;
        }
        status
    }

    /// Number of GP0 words held for the packet being assembled.
    #[must_use]
    pub fn fifo_len(&self) -> usize {
        self.fifo.len()
    }

    /// Accepts one GP0 word.
    pub fn gp0(&mut self, word: u32) {
        match self.state {
            Gp0State::ImageLoad { remaining } => {
                self.state = if remaining > 1 {
                    Gp0State::ImageLoad {
                        remaining: remaining - 1,
                    }
                } else {
                    Gp0State::Command
                };
            }
            Gp0State::Polyline { words } => {
                let terminator = word & 0xF000_F000 == 0x5000_5000;
                self.state = if terminator && words >= 2 {
                    Gp0State::Command
                } else {
                    Gp0State::Polyline { words: words + 1 }
                };
            }
            Gp0State::Command => {
                if self.fifo.is_empty() {
                    let [.., command] = word.to_le_bytes();
                    self.expected = packet_len(command);
                    if self.expected == 0 {
                        log::trace!("gpu: GP0({command:#04x}) poly-line");
                        self.state = Gp0State::Polyline { words: 0 };
                        return;
                    }
                }
                self.fifo.push_back(word);
                if self.fifo.len() >= self.expected {
                    let packet: Vec<u32> = self.fifo.drain(..).collect();
                    self.execute_gp0(&packet);
                }
            }
        }
    }

    fn execute_gp0(&mut self, packet: &[u32]) {
        let header = packet[0];
        let [.., command] = header.to_le_bytes();
        let param = header & 0x00FF_FFFF;
        match command {
            0x00 | 0x01 => {}
            0x1F => {
                self.status |= STATUS_IRQ;
                self.irq_pending = true;
            }
            0xA0..=0xBF => {
                let words = transfer_words(packet[2]);
                log::trace!("gpu: CPU to VRAM transfer of {words} words");
                self.state = Gp0State::ImageLoad { remaining: words };
            }
            0xC0..=0xDF => {
                self.read_remaining = transfer_words(packet[2]);
                log::trace!("gpu: VRAM to CPU transfer of {} words", self.read_remaining);
            }
            0xE1 => {
                self.environment[0] = param;
                self.status = (self.status & !(STATUS_TEXPAGE_MASK | STATUS_TEXTURE_DISABLE))
                    | (param & STATUS_TEXPAGE_MASK)
                    | ((param >> 11) & 1) * STATUS_TEXTURE_DISABLE;
            }
            0xE2..=0xE5 => self.environment[usize::from(command - 0xE1)] = param,
            0xE6 => {
                self.environment[5] = param;
                self.status = (self.status & !STATUS_MASK_BITS) | ((param & 0x3) << 11);
            }
            _ => log::trace!("gpu: GP0({command:#04x}) dropped, {} words", packet.len()),
        }
    }

    /// Accepts one GP1 display-control word.
    pub fn gp1(&mut self, word: u32) {
        let [.., command] = word.to_le_bytes();
        let param = word & 0x00FF_FFFF;
        match command {
            0x00 => {
                let vblank_interval = self.vblank_interval;
                let vblank_counter = self.vblank_counter;
                *self = Self::new(vblank_interval);
                self.vblank_counter = vblank_counter;
            }
            0x01 => self.reset_fifo(),
            0x02 => self.status &= !STATUS_IRQ,
            0x03 => {
                self.status =
                    (self.status & !STATUS_DISPLAY_DISABLE) | ((param & 1) * STATUS_DISPLAY_DISABLE);
            }
            0x04 => self.status = (self.status & !STATUS_DMA_DIRECTION) | ((param & 0x3) << 29),
            0x05..=0x07 => self.display[usize::from(command - 0x05)] = param,
            0x08 => {
                self.display[3] = param;
                self.status = (self.status & !(STATUS_DISPLAY_MODE | STATUS_HRES2 | STATUS_REVERSE))
                    | ((param & 0x3F) << 17)
                    | ((param >> 6) & 1) * STATUS_HRES2
                    | ((param >> 7) & 1) * STATUS_REVERSE;
            }
            0x10..=0x1F => {
                self.read_latch = match param & 0x7 {
                    2 => self.environment[1] & 0x000F_FFFF,
                    3 => self.environment[2] & 0x0007_FFFF,
                    4 => self.environment[3] & 0x0007_FFFF,
                    5 => self.environment[4] & 0x003F_FFFF,
                    7 => GPU_VERSION,
                    _ => self.read_latch,
                };
            }
            _ => log::trace!("gpu: GP1({command:#04x}) ignored"),
        }
    }

    fn reset_fifo(&mut self) {
        self.fifo.clear();
        self.expected = 0;
        self.state = Gp0State::Command;
    }

    /// Reads `GPUREAD`, consuming one word of a pending VRAM-to-CPU transfer.
    pub fn read_data(&mut self) -> u32 {
        if self.read_remaining > 0 {
            self.read_remaining -= 1;
            0
        } else {
            self.read_latch
        }
    }

    fn commit(&mut self, addr: u32, word: u32) {
        if addr == GP0 {
            self.gp0(word);
        } else {
            self.gp1(word);
        }
    }
}

impl BusDevice for Gpu {
    fn is_address_for_device(&self, addr: u32) -> bool {
        (GP0..=GPU_END).contains(&addr)
    }

    fn get_byte(&mut self, addr: u32) -> u8 {
        let register = if addr & !3 == GP0 {
            if self.read_remaining > 0 {
                0
            } else {
                self.read_latch
            }
        } else {
            self.status()
        };
        register.to_le_bytes()[(addr & 3) as usize]
    }

    fn set_byte(&mut self, addr: u32, value: u8) {
        let shift = (addr & 3) * 8;
        self.write_latch = (self.write_latch & !(0xFF << shift)) | (u32::from(value) << shift);
        if addr & 3 == 3 {
            self.commit(addr & !3, self.write_latch);
        }
    }

    fn get_word(&mut self, addr: u32) -> u32 {
        if addr == GP0 {
            self.read_data()
        } else {
            self.status()
        }
    }

    fn set_word(&mut self, addr: u32, value: u32) {
        self.commit(addr & !3, value);
    }

    fn tick(&mut self, irq: &mut InterruptController) {
        if self.irq_pending {
            self.irq_pending = false;
            irq.request(Irq::Gpu);
        }
        self.vblank_counter += 1;
        if self.vblank_counter >= self.vblank_interval {
            self.vblank_counter = 0;
            self.status ^= STATUS_ODD_LINE;
            irq.request(Irq::Vblank);
        }
    }
}

impl Snapshot for Gpu {
    #[allow(clippy::cast_possible_truncation)]
    fn save(&self, w: &mut StateWriter) {
        w.write_u32(self.status);
        let (tag, value) = self.state.tag();
        w.write_u8(tag);
        w.write_u32(value);
        w.write_u32(self.fifo.len() as u32);
        for word in &self.fifo {
            w.write_u32(*word);
        }
        w.write_u32(self.expected as u32);
        w.write_u32(self.read_latch);
        w.write_u32(self.read_remaining);
        w.write_words(&self.environment);
        w.write_words(&self.display);
        w.write_u32(self.vblank_counter);
        w.write_u32(self.write_latch);
        w.write_bool(self.irq_pending);
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), SaveStateError> {
        r.enter("gpu");
        self.status = r.read_u32()?;
        let tag = r.read_u8()?;
        let value = r.read_u32()?;
        self.state = Gp0State::from_tag(tag, value).ok_or(SaveStateError::InvalidValue {
            field: "gpu.gp0_state",
            value: u32::from(tag),
        })?;
        let len = r.read_u32()?;
        if len as usize > FIFO_DEPTH {
            return Err(SaveStateError::InvalidValue {
                field: "gpu.fifo",
                value: len,
            });
        }
        self.fifo.clear();
        for _ in 0..len {
            self.fifo.push_back(r.read_u32()?);
        }
        self.expected = r.read_u32()? as usize;
        self.read_latch = r.read_u32()?;
        self.read_remaining = r.read_u32()?;
        r.read_words(&mut self.environment)?;
        r.read_words(&mut self.display)?;
        self.vblank_counter = r.read_u32()?;
        self.write_latch = r.read_u32()?;
        self.irq_pending = r.read_bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{packet_len, Gpu, GP0, GP1};
    use crate::api::BusDevice;
    use crate::peripherals::interrupt::{InterruptController, Irq};
    use rstest::rstest;

    #[rstest]
    #[case(0x20, 4)]
    #[case(0x28, 5)]
    #[case(0x2C, 9)]
    #[case(0x30, 6)]
    #[case(0x3C, 12)]
    #[case(0x40, 3)]
    #[case(0x50, 4)]
    #[case(0x48, 0)]
    #[case(0x60, 3)]
    #[case(0x64, 4)]
    #[case(0x68, 2)]
    #[case(0x80, 4)]
    #[case(0xA0, 3)]
    #[case(0xE1, 1)]
    fn packet_lengths_follow_the_command_encoding(#[case] command: u8, #[case] words: usize) {
        assert_eq!(packet_len(command), words);
    }

    #[test]
    fn status_after_reset_reports_ready() {
        let gpu = Gpu::new(100);
        let status = gpu.status();
        assert_ne!(status & (1 << 26), 0);
        assert_ne!(status & (1 << 28), 0);
        assert_ne!(status & (1 << 23), 0, "display starts disabled");
    }

    #[test]
    fn draw_mode_updates_texture_page_bits() {
        let mut gpu = Gpu::new(100);
        gpu.set_word(GP0, 0xE100_0A0F);
        assert_eq!(gpu.status() & 0x7FF, 0x20F);
        assert_ne!(gpu.status() & (1 << 15), 0);
        gpu.set_word(GP0, 0xE600_0003);
        assert_eq!((gpu.status() >> 11) & 3, 3);
    }

    #[test]
    fn image_load_consumes_its_payload() {
        let mut gpu = Gpu::new(100);
        gpu.set_word(GP0, 0xA000_0000);
        gpu.set_word(GP0, 0x0000_0000);
        gpu.set_word(GP0, 0x0002_0002);
        gpu.set_word(GP0, 0x1111_1111);
        gpu.set_word(GP0, 0x2222_2222);
        assert_eq!(gpu.fifo_len(), 0);
        gpu.set_word(GP0, 0xE100_0001);
        assert_eq!(gpu.status() & 0x7FF, 1, "command after payload is decoded");
    }

    #[test]
    fn partial_packet_waits_in_fifo() {
        let mut gpu = Gpu::new(100);
        gpu.set_word(GP0, 0x2800_00FF);
        gpu.set_word(GP0, 0);
        assert_eq!(gpu.fifo_len(), 2);
        gpu.set_word(GP1, 0x0100_0000);
        assert_eq!(gpu.fifo_len(), 0);
    }

    #[test]
    fn gp1_controls_display_and_dma_direction() {
        let mut gpu = Gpu::new(100);
        gpu.set_word(GP1, 0x0300_0000);
        assert_eq!(gpu.status() & (1 << 23), 0);
        gpu.set_word(GP1, 0x0400_0002);
        assert_eq!((gpu.status() >> 29) & 3, 2);
        assert_ne!(gpu.status() & (1 << 25), 0);
        gpu.set_word(GP1, 0x0800_0001);
        assert_eq!((gpu.status() >> 17) & 0x3F, 1);
        gpu.set_word(GP1, 0x1000_0007);
        assert_eq!(gpu.get_word(GP0), 2);
    }

    #[test]
    fn byte_writes_commit_on_the_last_lane() {
        let mut gpu = Gpu::new(100);
        for (addr, byte) in (GP1..).zip(0x0300_0000u32.to_le_bytes()) {
            gpu.set_byte(addr, byte);
        }
        assert_eq!(gpu.status() & (1 << 23), 0);
    }

    #[test]
    fn vblank_fires_on_interval_and_toggles_field() {
        let mut gpu = Gpu::new(4);
        let mut irq = InterruptController::new();
        let before = gpu.status() >> 31;
        for _ in 0..4 {
            gpu.tick(&mut irq);
        }
        assert_ne!(irq.status() & Irq::Vblank.bit(), 0);
        assert_ne!(gpu.status() >> 31, before);
    }

    #[test]
    fn gp0_irq_command_raises_gpu_interrupt() {
        let mut gpu = Gpu::new(1000);
        let mut irq = InterruptController::new();
        gpu.set_word(GP0, 0x1F00_0000);
        gpu.tick(&mut irq);
        assert_ne!(irq.status() & Irq::Gpu.bit(), 0);
        gpu.set_word(GP1, 0x0200_0000);
        assert_eq!(gpu.status() & (1 << 24), 0);
    }

    #[test]
    fn polyline_runs_until_terminator() {
        let mut gpu = Gpu::new(100);
        gpu.set_word(GP0, 0x4800_0000);
        gpu.set_word(GP0, 0x0000_0000);
        gpu.set_word(GP0, 0x0010_0010);
        gpu.set_word(GP0, 0x5555_5555);
        gpu.set_word(GP0, 0xE100_0002);
        assert_eq!(gpu.status() & 0x7FF, 2);
    }
}
