//! The whole console: CPU, bus and peripherals driven one tick at a time.

use thiserror::Error;

use crate::api::{CoreConfig, RunOutcome, TickOutcome, TraceSink};
use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::execute::step_one;
use crate::memory::{BIOS_SIZE, RAM_SIZE};
use crate::peripherals::cdrom::{Disc, RAW_SECTOR_SIZE};
use crate::savestate::{SaveStateError, Snapshot, StateReader, StateWriter};
use crate::state::{REG_FP, REG_GP, REG_SP};

/// Address where the BIOS hands control to the shell. Executables are
/// sideloaded once execution reaches it.
pub const SHELL_ENTRY: u32 = 0x8003_0000;

const EXE_MAGIC: &[u8; 8] = b"PS-X EXE";
const EXE_HEADER_SIZE: usize = 0x800;

/// Host-side failures building or feeding a machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum MachineError {
    /// The BIOS image is not exactly 512 KiB.
    #[error("BIOS image must be {expected} bytes, got {actual}")]
    BiosSize {
        /// Required size.
        expected: usize,
        /// Size supplied.
        actual: usize,
    },
    /// The disc image is empty or not made of whole raw sectors.
    #[error("disc image of {0} bytes is not a whole number of raw sectors")]
    DiscSize(usize),
    /// The executable header is malformed.
    #[error("invalid PS-X EXE: {0}")]
    InvalidExecutable(&'static str),
}

/// A PlayStation.
#[derive(Debug, Clone)]
pub struct Psx {
    cpu: Cpu,
    bus: Bus,
    config: CoreConfig,
    ticks: u64,
}

impl Psx {
    /// Builds a machine around a BIOS image.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::BiosSize`] unless `bios` is exactly 512 KiB.
    pub fn new(bios: &[u8], config: CoreConfig) -> Result<Self, MachineError> {
        if bios.len() != BIOS_SIZE as usize {
            return Err(MachineError::BiosSize {
                expected: BIOS_SIZE as usize,
                actual: bios.len(),
            });
        }
        Ok(Self {
            cpu: Cpu::new(),
            bus: Bus::new(bios, &config),
            config,
            ticks: 0,
        })
    }

    /// Loads a raw 2352-byte/sector disc image into the drive.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::DiscSize`] for an empty or truncated image.
    pub fn insert_disc(&mut self, image: Vec<u8>) -> Result<(), MachineError> {
        let len = image.len();
        let disc = Disc::from_raw(image).ok_or(MachineError::DiscSize(len))?;
        self.bus.io_mut().cdrom.insert_disc(disc);
        Ok(())
    }

    /// Power-cycles the console. The BIOS and any disc stay loaded.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset(&self.config);
        self.ticks = 0;
    }

    /// Runs one CPU tick, then one tick of every peripheral.
    pub fn tick(&mut self) -> TickOutcome {
        let outcome = step_one(&mut self.cpu, &mut self.bus, None);
        self.finish_tick();
        outcome
    }

    /// Like [`Psx::tick`], reporting trace events to `sink`.
    pub fn tick_with_trace(&mut self, sink: &mut dyn TraceSink) -> TickOutcome {
        let outcome = step_one(&mut self.cpu, &mut self.bus, Some(sink));
        self.finish_tick();
        outcome
    }

    fn finish_tick(&mut self) {
        self.bus.tick_devices();
        self.ticks += 1;
    }

    /// Runs `ticks` ticks.
    pub fn run(&mut self, ticks: u64) -> RunOutcome {
        self.run_inner(ticks, None)
    }

    /// Runs `ticks` ticks, reporting trace events to `sink`.
    pub fn run_with_trace(&mut self, ticks: u64, sink: &mut dyn TraceSink) -> RunOutcome {
        self.run_inner(ticks, Some(sink))
    }

    fn run_inner(&mut self, ticks: u64, mut sink: Option<&mut dyn TraceSink>) -> RunOutcome {
        let mut outcome = RunOutcome::default();
        for _ in 0..ticks {
            let tick = match sink.as_mut() {
                Some(sink) => self.tick_with_trace(&mut **sink),
                None => self.tick(),
            };
            outcome.ticks += 1;
            if let Some(exception) = tick.exception() {
                outcome.exceptions += 1;
                outcome.last_exception = Some(exception);
            }
        }
        outcome
    }

    /// Runs until the BIOS reaches [`SHELL_ENTRY`] or `max_ticks` elapse.
    /// Returns true if the shell entry was reached.
    pub fn boot_to_shell(&mut self, max_ticks: u64) -> bool {
        for _ in 0..max_ticks {
            self.tick();
            if self.cpu.current_pc() == SHELL_ENTRY {
                return true;
            }
        }
        false
    }

    /// Copies a PS-X EXE into RAM and jumps to its entry point.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::InvalidExecutable`] when the header is missing
    /// or the image is shorter than the size it declares.
    #[allow(clippy::cast_possible_truncation)]
    pub fn sideload_exe(&mut self, exe: &[u8]) -> Result<(), MachineError> {
        if exe.len() < EXE_HEADER_SIZE || &exe[..EXE_MAGIC.len()] != EXE_MAGIC {
            return Err(MachineError::InvalidExecutable("missing PS-X EXE header"));
        }
        let field = |offset: usize| {
            u32::from_le_bytes([exe[offset], exe[offset + 1], exe[offset + 2], exe[offset + 3]])
        };
        let (pc, gp, dest, size) = (field(0x10), field(0x14), field(0x18), field(0x1C));
        let (sp_base, sp_offset) = (field(0x30), field(0x34));

        let body = exe
            .get(EXE_HEADER_SIZE..EXE_HEADER_SIZE + size as usize)
            .ok_or(MachineError::InvalidExecutable("truncated text section"))?;
        let ram = self.bus.ram_mut().bytes_mut();
        for (index, byte) in body.iter().enumerate() {
            let addr = dest.wrapping_add(index as u32) & (RAM_SIZE - 1);
            ram[addr as usize] = *byte;
        }

        let registers = self.cpu.registers_mut();
        registers.set(REG_GP, gp);
        if sp_base != 0 {
            let sp = sp_base.wrapping_add(sp_offset);
            registers.set(REG_SP, sp);
            registers.set(REG_FP, sp);
        }
        self.cpu.jump_to(pc);
        log::info!("sideloaded {size} bytes at {dest:#010x}, entry {pc:#010x}");
        Ok(())
    }

    /// Captures the machine state.
    ///
    /// The format is a positional little-endian concatenation of the CPU,
    /// register file, CP0, GTE, GPU, DMA, CD-ROM, interrupt controller,
    /// timers, RAM and scratchpad. It carries no header.
    #[must_use]
    pub fn save_state(&self) -> Vec<u8> {
        let mut w = StateWriter::with_capacity(RAM_SIZE as usize + RAW_SECTOR_SIZE * 4);
        self.cpu.save(&mut w);
        let io = self.bus.io();
        io.gpu.save(&mut w);
        io.dma.save(&mut w);
        io.cdrom.save(&mut w);
        io.interrupts.save(&mut w);
        io.timers.save(&mut w);
        self.bus.ram().save(&mut w);
        self.bus.scratchpad().save(&mut w);
        w.into_bytes()
    }

    /// Restores a state captured by [`Psx::save_state`]. The machine is left
    /// untouched on error.
    ///
    /// # Errors
    ///
    /// Returns [`SaveStateError`] when the buffer is truncated, too long or
    /// holds an impossible value.
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), SaveStateError> {
        let mut restored = self.clone();
        let mut r = StateReader::new(data);
        restored.cpu.load(&mut r)?;
        let io = restored.bus.io_mut();
        io.gpu.load(&mut r)?;
        io.dma.load(&mut r)?;
        io.cdrom.load(&mut r)?;
        io.interrupts.load(&mut r)?;
        io.timers.load(&mut r)?;
        restored.bus.ram_mut().load(&mut r)?;
        restored.bus.scratchpad_mut().load(&mut r)?;
        r.finish()?;
        *self = restored;
        Ok(())
    }

    /// CPU state.
    #[must_use]
    pub const fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Mutable CPU state.
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// The bus and every device on it.
    #[must_use]
    pub const fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Mutable bus.
    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// Configuration the machine was built with.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Ticks executed since construction or the last reset.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }
}
