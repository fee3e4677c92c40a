//! Command-line driver library for the PlayStation core: session setup,
//! save-state files and disassembly listings.

use env_logger as _;

/// Disassembly listings and the instruction trace printer.
pub mod listing;
/// Running a machine from files on disk.
pub mod session;

pub use listing::{disassemble_file, TracePrinter};
pub use session::{run_session, RunnerError, SessionOptions, SessionReport, DEFAULT_BOOT_TICKS};
