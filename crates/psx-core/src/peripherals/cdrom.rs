//! CD-ROM controller at `0x1F80_1800`.
//!
//! Four byte registers whose meaning depends on a 2-bit index. Commands are
//! answered through the response FIFO and an interrupt code in `IF`; each
//! response is delivered after a configured delay and only once software has
//! acknowledged the previous one. An optional raw disc image backs `ReadN`
//! and `ReadS`.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::api::BusDevice;
use crate::peripherals::interrupt::{InterruptController, Irq};
use crate::savestate::{SaveStateError, Snapshot, StateReader, StateWriter};

/// Index/status register.
pub const CDROM_INDEX: u32 = 0x1F80_1800;
const CDROM_END: u32 = 0x1F80_1803;

/// Bytes in a raw Mode 2 sector.
pub const RAW_SECTOR_SIZE: usize = 2352;
const SECTOR_HEADER: usize = 12;
const DATA_SIZE_2048: usize = 2048;
const DATA_SIZE_2340: usize = 2340;
const FIFO_DEPTH: usize = 16;
const LEAD_IN_SECTORS: u32 = 150;
const MAX_PENDING: usize = 8;

const STAT_ERROR: u8 = 1 << 0;
const STAT_MOTOR_ON: u8 = 1 << 1;
const STAT_SHELL_OPEN: u8 = 1 << 4;
const STAT_READING: u8 = 1 << 5;

const MODE_DOUBLE_SPEED: u8 = 1 << 7;
const MODE_WHOLE_SECTOR: u8 = 1 << 5;

const INT1_DATA_READY: u8 = 1;
const INT2_COMPLETE: u8 = 2;
const INT3_ACKNOWLEDGE: u8 = 3;
const INT5_ERROR: u8 = 5;

const ERROR_WRONG_PARAMETERS: u8 = 0x20;
const ERROR_INVALID_COMMAND: u8 = 0x40;
const ERROR_NO_DISC: u8 = 0x80;

/// Controller firmware date and version reported by `Test(20h)`.
const VERSION_RESPONSE: [u8; 4] = [0x94, 0x09, 0x19, 0xC0];

/// A raw disc image of 2352-byte sectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disc {
    image: Arc<[u8]>,
}

impl Disc {
    /// Wraps a raw image. Returns `None` unless the length is a non-zero
    /// multiple of [`RAW_SECTOR_SIZE`].
    #[must_use]
    pub fn from_raw(image: Vec<u8>) -> Option<Self> {
        if image.is_empty() || image.len() % RAW_SECTOR_SIZE != 0 {
            return None;
        }
        Some(Self {
            image: image.into(),
        })
    }

    /// Number of sectors in the image.
    #[must_use]
    pub fn sector_count(&self) -> u32 {
        u32::try_from(self.image.len() / RAW_SECTOR_SIZE).unwrap_or(u32::MAX)
    }

    /// Raw bytes of sector `lba`, counted from the first sector of the image.
    #[must_use]
    pub fn sector(&self, lba: u32) -> Option<&[u8]> {
        let start = lba as usize * RAW_SECTOR_SIZE;
        self.image.get(start..start + RAW_SECTOR_SIZE)
    }
}

/// Converts a BCD byte to binary.
#[must_use]
pub const fn from_bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

/// A response waiting for its delay and for `IF` to clear.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingResponse {
    delay: u32,
    code: u8,
    bytes: Vec<u8>,
}

/// CD-ROM controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cdrom {
    index: u8,
    params: VecDeque<u8>,
    response: VecDeque<u8>,
    data: VecDeque<u8>,
    interrupt_enable: u8,
    interrupt_flags: u8,
    stat: u8,
    mode: u8,
    setloc: u32,
    read_lba: u32,
    reading: bool,
    sector_timer: u32,
    sector: Vec<u8>,
    has_sector: bool,
    pending: VecDeque<PendingResponse>,
    ack_delay: u32,
    sector_delay: u32,
    disc: Option<Disc>,
}

impl Cdrom {
    /// Creates an idle controller with an empty tray.
    #[must_use]
    pub fn new(ack_delay_ticks: u32, sector_delay_ticks: u32) -> Self {
        Self {
            index: 0,
            params: VecDeque::with_capacity(FIFO_DEPTH),
            response: VecDeque::with_capacity(FIFO_DEPTH),
            data: VecDeque::new(),
            interrupt_enable: 0,
            interrupt_flags: 0,
            stat: STAT_SHELL_OPEN,
            mode: 0,
            setloc: 0,
            read_lba: 0,
            reading: false,
            sector_timer: 0,
            sector: vec![0; RAW_SECTOR_SIZE],
            has_sector: false,
            pending: VecDeque::new(),
            ack_delay: ack_delay_ticks.max(1),
            sector_delay: sector_delay_ticks.max(1),
            disc: None,
        }
    }

    /// Inserts a disc, closing the shell and spinning up the motor.
    pub fn insert_disc(&mut self, disc: Disc) {
        log::debug!("cdrom: disc inserted, {} sectors", disc.sector_count());
        self.disc = Some(disc);
        self.stat = STAT_MOTOR_ON;
    }

    /// Removes the disc, opening the shell.
    pub fn eject_disc(&mut self) -> Option<Disc> {
        self.stat = STAT_SHELL_OPEN;
        self.reading = false;
        self.disc.take()
    }

    /// True when a disc is loaded.
    #[must_use]
    pub const fn has_disc(&self) -> bool {
        self.disc.is_some()
    }

    /// Current drive status byte.
    #[must_use]
    pub const fn stat(&self) -> u8 {
        self.stat
    }

    /// Pending interrupt code in `IF`.
    #[must_use]
    pub const fn interrupt_flags(&self) -> u8 {
        self.interrupt_flags
    }

    /// Pops a little-endian word from the data FIFO, for DMA channel 3.
    pub fn read_data_word(&mut self) -> u32 {
        let mut bytes = [0; 4];
        for byte in &mut bytes {
            *byte = self.data.pop_front().unwrap_or(0);
        }
        u32::from_le_bytes(bytes)
    }

    fn status_register(&self) -> u8 {
        let mut status = self.index;
        if self.params.is_empty() {
            status |= 1 << 3;
        }
        if self.params.len() < FIFO_DEPTH {
            status |= 1 << 4;
        }
        if !self.response.is_empty() {
            status |= 1 << 5;
        }
        if !self.data.is_empty() {
            status |= 1 << 6;
        }
        status
    }

    fn queue(&mut self, delay: u32, code: u8, bytes: Vec<u8>) {
        if self.pending.len() >= MAX_PENDING {
            log::debug!("cdrom: response queue full, dropping INT{code}");
            return;
        }
        self.pending.push_back(PendingResponse { delay, code, bytes });
    }

    fn acknowledge_now(&mut self) {
        let stat = self.stat;
        self.queue(self.ack_delay, INT3_ACKNOWLEDGE, vec![stat]);
    }

    fn error(&mut self, reason: u8) {
        let stat = self.stat | STAT_ERROR;
        self.queue(self.ack_delay, INT5_ERROR, vec![stat, reason]);
    }

    fn sector_period(&self) -> u32 {
        if self.mode & MODE_DOUBLE_SPEED != 0 {
            (self.sector_delay / 2).max(1)
        } else {
            self.sector_delay
        }
    }

    fn execute_command(&mut self, command: u8) {
        let params: Vec<u8> = self.params.drain(..).collect();
        log::debug!("cdrom: command {command:#04x} params {params:02x?}");
        match command {
            0x01 => {
                self.acknowledge_now();
                if self.disc.is_some() {
                    self.stat &= !STAT_SHELL_OPEN;
                }
            }
            0x02 => {
                let [mm, ss, ff] = match params.as_slice() {
                    [mm, ss, ff, ..] => [*mm, *ss, *ff],
                    _ => return self.error(ERROR_WRONG_PARAMETERS),
                };
                let frames = (u32::from(from_bcd(mm)) * 60 + u32::from(from_bcd(ss))) * 75
                    + u32::from(from_bcd(ff));
                self.setloc = frames.saturating_sub(LEAD_IN_SECTORS);
                self.acknowledge_now();
            }
            0x06 | 0x1B => {
                if self.disc.is_none() {
                    return self.error(ERROR_NO_DISC);
                }
                self.acknowledge_now();
                self.read_lba = self.setloc;
                self.reading = true;
                self.stat |= STAT_READING;
                self.sector_timer = self.sector_period();
            }
            0x09 => {
                self.acknowledge_now();
                self.reading = false;
                self.stat &= !STAT_READING;
                let stat = self.stat;
                self.queue(self.ack_delay, INT2_COMPLETE, vec![stat]);
            }
            0x0A => {
                self.acknowledge_now();
                self.mode = 0;
                self.reading = false;
                self.stat = if self.disc.is_some() {
                    STAT_MOTOR_ON
                } else {
                    STAT_SHELL_OPEN
                };
                let stat = self.stat;
                self.queue(self.ack_delay, INT2_COMPLETE, vec![stat]);
            }
            0x0B | 0x0C => self.acknowledge_now(),
            0x0E => {
                let Some(mode) = params.first() else {
                    return self.error(ERROR_WRONG_PARAMETERS);
                };
                self.mode = *mode;
                self.acknowledge_now();
            }
            0x15 | 0x16 => {
                self.acknowledge_now();
                self.read_lba = self.setloc;
                self.reading = false;
                self.stat &= !STAT_READING;
                let stat = self.stat;
                self.queue(self.ack_delay, INT2_COMPLETE, vec![stat]);
            }
            0x19 => match params.first() {
                Some(0x20) => self.queue(self.ack_delay, INT3_ACKNOWLEDGE, VERSION_RESPONSE.to_vec()),
                Some(_) => self.error(ERROR_INVALID_COMMAND),
                None => self.error(ERROR_WRONG_PARAMETERS),
            },
            0x1A => {
                self.acknowledge_now();
                if self.disc.is_some() {
                    self.queue(
                        self.ack_delay,
                        INT2_COMPLETE,
                        vec![STAT_MOTOR_ON, 0x00, 0x20, 0x00, b'S', b'C', b'E', b'A'],
                    );
                } else {
                    self.queue(self.ack_delay, INT5_ERROR, vec![0x08, 0x40, 0, 0, 0, 0, 0, 0]);
                }
            }
            _ => {
                log::debug!("cdrom: unsupported command {command:#04x}");
                self.error(ERROR_INVALID_COMMAND);
            }
        }
    }

    fn write_request(&mut self, value: u8) {
        if value & 0x80 == 0 {
            self.data.clear();
            return;
        }
        if !self.has_sector || !self.data.is_empty() {
            return;
        }
        let len = if self.mode & MODE_WHOLE_SECTOR != 0 {
            DATA_SIZE_2340
        } else {
            DATA_SIZE_2048
        };
        self.data
            .extend(&self.sector[SECTOR_HEADER..SECTOR_HEADER + len]);
    }

    fn read_next_sector(&mut self) {
        let Some(disc) = &self.disc else {
            return;
        };
        match disc.sector(self.read_lba) {
            Some(sector) => {
                self.sector.copy_from_slice(sector);
                self.has_sector = true;
                self.read_lba += 1;
                let stat = self.stat;
                self.queue(0, INT1_DATA_READY, vec![stat]);
            }
            None => {
                log::debug!("cdrom: read past end of disc at lba {}", self.read_lba);
                self.reading = false;
                self.stat &= !STAT_READING;
                self.error(ERROR_INVALID_COMMAND);
            }
        }
    }
}

impl BusDevice for Cdrom {
    fn is_address_for_device(&self, addr: u32) -> bool {
        (CDROM_INDEX..=CDROM_END).contains(&addr)
    }

    fn get_byte(&mut self, addr: u32) -> u8 {
        match (addr - CDROM_INDEX, self.index) {
            (0, _) => self.status_register(),
            (1, _) => self.response.pop_front().unwrap_or(0),
            (2, _) => self.data.pop_front().unwrap_or(0),
            (3, 0 | 2) => self.interrupt_enable | 0xE0,
            (3, _) => self.interrupt_flags | 0xE0,
            _ => 0,
        }
    }

    fn set_byte(&mut self, addr: u32, value: u8) {
        match (addr - CDROM_INDEX, self.index) {
            (0, _) => self.index = value & 0x3,
            (1, 0) => self.execute_command(value),
            (2, 0) => {
                if self.params.len() < FIFO_DEPTH {
                    self.params.push_back(value);
                }
            }
            (2, 1) => self.interrupt_enable = value & 0x1F,
            (3, 0) => self.write_request(value),
            (3, 1) => {
                self.interrupt_flags &= !(value & 0x1F);
                if self.interrupt_flags == 0 {
                    self.response.clear();
                }
                if value & 0x40 != 0 {
                    self.params.clear();
                }
            }
            _ => log::trace!("cdrom: ignored write {value:#04x} at {addr:#010x}"),
        }
    }

    fn tick(&mut self, irq: &mut InterruptController) {
        if self.reading {
            self.sector_timer = self.sector_timer.saturating_sub(1);
            if self.sector_timer == 0 {
                self.sector_timer = self.sector_period();
                self.read_next_sector();
            }
        }

        let Some(front) = self.pending.front_mut() else {
            return;
        };
        front.delay = front.delay.saturating_sub(1);
        if front.delay > 0 || self.interrupt_flags != 0 {
            return;
        }
        if let Some(response) = self.pending.pop_front() {
            self.response = response.bytes.into_iter().take(FIFO_DEPTH).collect();
            self.interrupt_flags = response.code;
            if self.interrupt_enable & response.code != 0 {
                irq.request(Irq::Cdrom);
            }
        }
    }
}

impl Snapshot for Cdrom {
    #[allow(clippy::cast_possible_truncation)]
    fn save(&self, w: &mut StateWriter) {
        w.write_u8(self.index);
        w.write_fifo(self.params.iter().copied());
        w.write_fifo(self.response.iter().copied());
        w.write_fifo(self.data.iter().copied());
        w.write_u8(self.interrupt_enable);
        w.write_u8(self.interrupt_flags);
        w.write_u8(self.stat);
        w.write_u8(self.mode);
        w.write_u32(self.setloc);
        w.write_u32(self.read_lba);
        w.write_bool(self.reading);
        w.write_u32(self.sector_timer);
        w.write_bool(self.has_sector);
        w.write_bytes(&self.sector);
        w.write_u32(self.pending.len() as u32);
        for response in &self.pending {
            w.write_u32(response.delay);
            w.write_u8(response.code);
            w.write_fifo(response.bytes.iter().copied());
        }
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), SaveStateError> {
        r.enter("cdrom");
        self.index = r.read_u8()? & 0x3;
        self.params = r.read_fifo(FIFO_DEPTH)?.iter().copied().collect();
        self.response = r.read_fifo(FIFO_DEPTH)?.iter().copied().collect();
        self.data = r.read_fifo(RAW_SECTOR_SIZE)?.iter().copied().collect();
        self.interrupt_enable = r.read_u8()?;
        self.interrupt_flags = r.read_u8()?;
        self.stat = r.read_u8()?;
        self.mode = r.read_u8()?;
        self.setloc = r.read_u32()?;
        self.read_lba = r.read_u32()?;
        self.reading = r.read_bool()?;
        self.sector_timer = r.read_u32()?;
        self.has_sector = r.read_bool()?;
        r.read_into(&mut self.sector)?;
        let count = r.read_u32()?;
        if count as usize > MAX_PENDING {
            return Err(SaveStateError::InvalidValue {
                field: "cdrom.pending",
                value: count,
            });
        }
        self.pending.clear();
        for _ in 0..count {
            let delay = r.read_u32()?;
            let code = r.read_u8()?;
            let bytes = r.read_fifo(FIFO_DEPTH)?.to_vec();
            self.pending.push_back(PendingResponse { delay, code, bytes });
        }
        Ok(())
    }
}
