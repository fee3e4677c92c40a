//! Memory model primitives: segment translation, the physical map, access
//! alignment and backing stores.

/// Alignment policy and access classification.
pub mod access;
/// RAM, BIOS and scratchpad stores.
pub mod block;
/// Segment translation and fixed physical region map.
pub mod map;

pub use access::{validate_alignment, AccessKind, AccessWidth};
pub use block::{MemoryBlock, OpenBus};
pub use map::{
    decode_region, translate, PhysicalRegion, Segment, BIOS_END, BIOS_SIZE, BIOS_START,
    CACHE_CONTROL_END, CACHE_CONTROL_START, IO_END, IO_START, PARALLEL_PORT_END,
    PARALLEL_PORT_START, PHYSICAL_REGIONS, RAM_END, RAM_SIZE, RAM_START, SCRATCHPAD_END,
    SCRATCHPAD_START,
};

/// Reset vector in uncached BIOS.
pub const RESET_VECTOR: u32 = 0xBFC0_0000;
