use std::fs;
use std::io::{self, Write};
use std::path::Path;

use psx_core::{disassemble_bytes, disassemble_one, DisassemblyRow, Instruction, TraceEvent, TraceSink};

use crate::session::RunnerError;

/// Disassembles up to `count` words of a raw binary file loaded at `base`.
///
/// # Errors
///
/// Returns [`RunnerError::Read`] when the file cannot be read.
pub fn disassemble_file(path: &Path, base: u32, count: usize) -> Result<Vec<DisassemblyRow>, RunnerError> {
    let bytes = fs::read(path).map_err(|source| RunnerError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(disassemble_bytes(base, &bytes, count))
}

/// Writes one line per executed instruction and per exception.
///
/// The first write error stops output and is returned from
/// [`TracePrinter::finish`].
pub struct TracePrinter<'a> {
    out: &'a mut dyn Write,
    error: Option<io::Error>,
}

impl<'a> TracePrinter<'a> {
    /// Creates a printer writing to `out`.
    pub fn new(out: &'a mut dyn Write) -> Self {
        Self { out, error: None }
    }

    /// Flushes the output and reports the first write error, if any.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error seen while tracing.
    pub fn finish(self) -> io::Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => self.out.flush(),
        }
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) {
        if self.error.is_none() {
            if let Err(err) = self.out.write_fmt(args).and_then(|()| self.out.write_all(b"\n")) {
                self.error = Some(err);
            }
        }
    }
}

impl TraceSink for TracePrinter<'_> {
    fn on_event(&mut self, event: TraceEvent) {
        match event {
            TraceEvent::InstructionStart {
                pc,
                word,
                in_delay_slot,
            } => {
                let row = disassemble_one(pc, Instruction(word));
                let marker = if in_delay_slot { " ;delay" } else { "" };
                self.line(format_args!("{row}{marker}"));
            }
            TraceEvent::ExceptionRaised {
                exception,
                epc,
                vector,
            } => {
                self.line(format_args!("-- {exception}: epc={epc:08x} vector={vector:08x}"));
            }
        }
    }
}
