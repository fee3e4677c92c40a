use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use psx_core::{
    disassemble_window, CoreConfig, DisassemblyRow, Exception, MachineError, Psx, SaveStateError,
};
use thiserror::Error;

use crate::listing::TracePrinter;

/// Tick budget for reaching the shell before an executable is sideloaded.
pub const DEFAULT_BOOT_TICKS: u64 = 60_000_000;

const CONTEXT_BEFORE: usize = 4;
const CONTEXT_AFTER: usize = 4;

/// Failures while preparing or finishing a session.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// An input file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// An output file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The core rejected an image.
    #[error("{}: {source}", path.display())]
    Machine {
        /// Offending image.
        path: PathBuf,
        /// Core error.
        source: MachineError,
    },
    /// A save-state file could not be restored.
    #[error("{}: {source}", path.display())]
    SaveState {
        /// Offending save-state file.
        path: PathBuf,
        /// Codec error.
        source: SaveStateError,
    },
    /// The trace output failed.
    #[error("failed to write trace: {0}")]
    Trace(#[source] io::Error),
}

/// Everything `psx-run run` needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// BIOS image.
    pub bios: PathBuf,
    /// Raw disc image.
    pub disc: Option<PathBuf>,
    /// PS-X EXE to sideload once the BIOS reaches the shell.
    pub exe: Option<PathBuf>,
    /// Ticks to run after setup.
    pub ticks: u64,
    /// Tick budget for reaching the shell when sideloading.
    pub boot_ticks: u64,
    /// Save state restored before running.
    pub load_state: Option<PathBuf>,
    /// Where to write the save state after running.
    pub save_state: Option<PathBuf>,
    /// Print every executed instruction.
    pub trace: bool,
    /// Core configuration.
    pub config: CoreConfig,
}

impl SessionOptions {
    /// Options that boot `bios` and run it for `ticks`.
    #[must_use]
    pub fn new(bios: PathBuf, ticks: u64) -> Self {
        Self {
            bios,
            disc: None,
            exe: None,
            ticks,
            boot_ticks: DEFAULT_BOOT_TICKS,
            load_state: None,
            save_state: None,
            trace: false,
            config: CoreConfig::default(),
        }
    }
}

/// What a finished session observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Ticks executed by this session, boot included.
    pub ticks: u64,
    /// Exceptions taken during the timed run.
    pub exceptions: u64,
    /// Most recent exception taken during the timed run.
    pub last_exception: Option<Exception>,
    /// Address of the last executed instruction.
    pub pc: u32,
    /// Whether the shell was reached before sideloading, if an EXE was given.
    pub shell_reached: Option<bool>,
    /// Disassembly around `pc`.
    pub context: Vec<DisassemblyRow>,
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticks={} exceptions={} pc={:08x}",
            self.ticks, self.exceptions, self.pc
        )?;
        if let Some(exception) = self.last_exception {
            write!(f, " last={exception}")?;
        }
        Ok(())
    }
}

fn read(path: &Path) -> Result<Vec<u8>, RunnerError> {
    fs::read(path).map_err(|source| RunnerError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Builds a machine from `options`, runs it and writes the requested save
/// state. Trace lines go to `trace_out`.
///
/// # Errors
///
/// Returns [`RunnerError`] when a file cannot be read or written, or the core
/// rejects an image or save state.
pub fn run_session(options: &SessionOptions, trace_out: &mut dyn Write) -> Result<SessionReport, RunnerError> {
    let bios = read(&options.bios)?;
    let mut psx = Psx::new(&bios, options.config.clone()).map_err(|source| RunnerError::Machine {
        path: options.bios.clone(),
        source,
    })?;
    log::info!("bios: {}", options.bios.display());

    if let Some(path) = &options.disc {
        let image = read(path)?;
        psx.insert_disc(image).map_err(|source| RunnerError::Machine {
            path: path.clone(),
            source,
        })?;
        log::info!("disc: {}", path.display());
    }

    if let Some(path) = &options.load_state {
        let data = read(path)?;
        psx.load_state(&data).map_err(|source| RunnerError::SaveState {
            path: path.clone(),
            source,
        })?;
        log::info!("restored state from {}", path.display());
    }

    let mut shell_reached = None;
    if let Some(path) = &options.exe {
        let exe = read(path)?;
        let reached = psx.boot_to_shell(options.boot_ticks);
        if !reached {
            log::warn!(
                "shell entry not reached within {} ticks, sideloading anyway",
                options.boot_ticks
            );
        }
        psx.sideload_exe(&exe).map_err(|source| RunnerError::Machine {
            path: path.clone(),
            source,
        })?;
        shell_reached = Some(reached);
    }

    let outcome = if options.trace {
        let mut printer = TracePrinter::new(trace_out);
        let outcome = psx.run_with_trace(options.ticks, &mut printer);
        printer.finish().map_err(RunnerError::Trace)?;
        outcome
    } else {
        psx.run(options.ticks)
    };
    log::debug!("run finished: {outcome:?}");

    if let Some(path) = &options.save_state {
        fs::write(path, psx.save_state()).map_err(|source| RunnerError::Write {
            path: path.clone(),
            source,
        })?;
        log::info!("saved state to {}", path.display());
    }

    let pc = psx.cpu().current_pc();
    let bus = psx.bus_mut();
    let context = disassemble_window(pc, CONTEXT_BEFORE, CONTEXT_AFTER, |addr| {
        bus.read_word(addr).ok()
    });

    Ok(SessionReport {
        ticks: psx.ticks(),
        exceptions: outcome.exceptions,
        last_exception: outcome.last_exception,
        pc,
        shell_reached,
        context,
    })
}
