//! System bus: virtual-to-physical translation and routing to devices.
//!
//! Every CPU access goes through [`Bus`]. The segment base is stripped by
//! [`decode_region`], then the access is handed to the device that owns the
//! physical address. Alignment is checked by the CPU before the bus sees the
//! access.

use thiserror::Error;

use crate::api::{BusDevice, CoreConfig};
use crate::memory::map::{decode_region, PhysicalRegion};
use crate::memory::{MemoryBlock, OpenBus};
use crate::peripherals::register_block::RegisterBlock;
use crate::peripherals::IoPorts;

/// Bus-level access failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum BusError {
    /// No device answers at this virtual address.
    #[error("no device mapped at {0:#010x}")]
    Unmapped(u32),
}

/// Owns every addressable device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bus {
    ram: MemoryBlock,
    bios: MemoryBlock,
    scratchpad: MemoryBlock,
    parallel_port: OpenBus,
    cache_control: RegisterBlock,
    io: IoPorts,
    suppress_faults: bool,
}

impl Bus {
    /// Builds the bus around a BIOS image. The caller validates the size.
    #[must_use]
    pub fn new(bios: &[u8], config: &CoreConfig) -> Self {
        Self {
            ram: MemoryBlock::ram(),
            bios: MemoryBlock::bios(bios),
            scratchpad: MemoryBlock::scratchpad(),
            parallel_port: OpenBus,
            cache_control: RegisterBlock::cache_control(),
            io: IoPorts::new(config),
            suppress_faults: config.suppress_bus_faults,
        }
    }

    /// Returns every device except the BIOS to its power-on state. A loaded
    /// disc stays in the drive.
    pub fn reset(&mut self, config: &CoreConfig) {
        let disc = self.io.cdrom.eject_disc();
        self.ram = MemoryBlock::ram();
        self.scratchpad = MemoryBlock::scratchpad();
        self.cache_control = RegisterBlock::cache_control();
        self.io = IoPorts::new(config);
        self.suppress_faults = config.suppress_bus_faults;
        if let Some(disc) = disc {
            self.io.cdrom.insert_disc(disc);
        }
    }

    /// Main RAM.
    #[must_use]
    pub const fn ram(&self) -> &MemoryBlock {
        &self.ram
    }

    /// Mutable main RAM, for loaders and save states.
    pub fn ram_mut(&mut self) -> &mut MemoryBlock {
        &mut self.ram
    }

    /// Scratchpad.
    #[must_use]
    pub const fn scratchpad(&self) -> &MemoryBlock {
        &self.scratchpad
    }

    /// Mutable scratchpad.
    pub fn scratchpad_mut(&mut self) -> &mut MemoryBlock {
        &mut self.scratchpad
    }

    /// I/O devices.
    #[must_use]
    pub const fn io(&self) -> &IoPorts {
        &self.io
    }

    /// Mutable I/O devices.
    pub fn io_mut(&mut self) -> &mut IoPorts {
        &mut self.io
    }

    /// Level of the interrupt line into CP0.
    #[must_use]
    pub const fn interrupt_line(&self) -> bool {
        self.io.interrupts.line()
    }

    /// Advances every ticking peripheral once.
    pub fn tick_devices(&mut self) {
        self.io.tick();
    }

    fn device(&mut self, vaddr: u32) -> Result<(&mut dyn BusDevice, u32), BusError> {
        let (region, phys) = decode_region(vaddr).ok_or(BusError::Unmapped(vaddr))?;
        let device: &mut dyn BusDevice = match region {
            PhysicalRegion::Ram => &mut self.ram,
            PhysicalRegion::ParallelPort => &mut self.parallel_port,
            PhysicalRegion::Scratchpad => &mut self.scratchpad,
            PhysicalRegion::Bios => &mut self.bios,
            PhysicalRegion::CacheControl => &mut self.cache_control,
            PhysicalRegion::Io => self
                .io
                .device_mut(phys)
                .ok_or(BusError::Unmapped(vaddr))?,
        };
        Ok((device, phys))
    }

    fn read<T: Default>(
        &mut self,
        vaddr: u32,
        access: impl FnOnce(&mut dyn BusDevice, u32) -> T,
    ) -> Result<T, BusError> {
        let suppress = self.suppress_faults;
        match self.device(vaddr) {
            Ok((device, phys)) => Ok(access(device, phys)),
            Err(err) if suppress => {
                log::warn!("bus: {err}, read as zero");
                Ok(T::default())
            }
            Err(err) => Err(err),
        }
    }

    fn write(
        &mut self,
        vaddr: u32,
        access: impl FnOnce(&mut dyn BusDevice, u32),
    ) -> Result<(), BusError> {
        let suppress = self.suppress_faults;
        let is_io = matches!(decode_region(vaddr), Some((PhysicalRegion::Io, _)));
        match self.device(vaddr) {
            Ok((device, phys)) => {
                access(device, phys);
                if is_io {
                    self.run_dma();
                }
                Ok(())
            }
            Err(err) if suppress => {
                log::warn!("bus: {err}, write dropped");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Runs every channel a register write has just started.
    fn run_dma(&mut self) {
        let io = &mut self.io;
        while let Some(port) = io.dma.active_port() {
            io.dma.run(port, &mut self.ram, &mut io.gpu, &mut io.cdrom);
        }
    }

    /// Reads a byte.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Unmapped`] when nothing answers at `vaddr`.
    pub fn read_byte(&mut self, vaddr: u32) -> Result<u8, BusError> {
        self.read(vaddr, |device, phys| device.get_byte(phys))
    }

    /// Reads a little-endian halfword.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Unmapped`] when nothing answers at `vaddr`.
    pub fn read_halfword(&mut self, vaddr: u32) -> Result<u16, BusError> {
        self.read(vaddr, |device, phys| device.get_halfword(phys))
    }

    /// Reads a little-endian word.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Unmapped`] when nothing answers at `vaddr`.
    pub fn read_word(&mut self, vaddr: u32) -> Result<u32, BusError> {
        self.read(vaddr, |device, phys| device.get_word(phys))
    }

    /// Writes a byte.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Unmapped`] when nothing answers at `vaddr`.
    pub fn write_byte(&mut self, vaddr: u32, value: u8) -> Result<(), BusError> {
        self.write(vaddr, |device, phys| device.set_byte(phys, value))
    }

    /// Writes a little-endian halfword.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Unmapped`] when nothing answers at `vaddr`.
    pub fn write_halfword(&mut self, vaddr: u32, value: u16) -> Result<(), BusError> {
        self.write(vaddr, |device, phys| device.set_halfword(phys, value))
    }

    /// Writes a little-endian word.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Unmapped`] when nothing answers at `vaddr`.
    pub fn write_word(&mut self, vaddr: u32, value: u32) -> Result<(), BusError> {
        self.write(vaddr, |device, phys| device.set_word(phys, value))
    }
}
