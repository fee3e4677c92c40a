//! PlayStation core: an instruction-stepped R3000A with its coprocessors,
//! the system bus and coarse register-level peripherals.
//!
//! [`Psx`] owns everything. Each [`Psx::tick`] executes one instruction and
//! then ticks every peripheral once.

/// Host-facing contracts: configuration, device and coprocessor seams, tick
/// outcomes and tracing.
pub mod api;
pub use api::{
    BusDevice, Coprocessor, CoreConfig, RunOutcome, TickOutcome, TraceEvent, TraceSink,
    DEFAULT_CDROM_ACK_DELAY_TICKS, DEFAULT_CDROM_SECTOR_DELAY_TICKS,
    DEFAULT_VBLANK_INTERVAL_TICKS,
};

/// Memory map, segment translation and backing stores.
pub mod memory;
pub use memory::{
    decode_region, translate, validate_alignment, AccessKind, AccessWidth, PhysicalRegion, Segment,
    RESET_VECTOR,
};

/// System bus routing.
pub mod bus;
pub use bus::{Bus, BusError};

/// Opcode tables.
pub mod encoding;
pub use encoding::{classify_bcond, classify_primary, classify_special, Operation};

/// Instruction word views and decoding.
pub mod decoder;
pub use decoder::{DecodedInstruction, DecodedOrFault, Decoder, Instruction};

/// Guest exception taxonomy.
pub mod fault;
pub use fault::{Exception, Fault};

/// General-purpose register pipeline.
pub mod state;
pub use state::{RegisterFile, GENERAL_REGISTER_COUNT, REGISTER_NAMES};

/// System control coprocessor.
pub mod cop0;
pub use cop0::Cop0;

/// Geometry transform engine registers.
pub mod cop2;
pub use cop2::Gte;

/// CPU state.
pub mod cpu;
pub use cpu::Cpu;

/// Instruction execution pipeline.
pub mod execute;
pub use execute::{execute_instruction, fetch, step_one};

/// Instruction disassembly.
pub mod disasm;
pub use disasm::{
    disassemble, disassemble_bytes, disassemble_one, disassemble_window, DisassemblyRow,
};

/// Hardware registers behind the I/O window.
pub mod peripherals;
pub use peripherals::IoPorts;

/// Save-state codec.
pub mod savestate;
pub use savestate::{SaveStateError, Snapshot, StateReader, StateWriter};

/// Machine context.
pub mod machine;
pub use machine::{MachineError, Psx, SHELL_ENTRY};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
