//! Virtual segment translation and the fixed physical memory map.

/// Size of main RAM.
pub const RAM_SIZE: u32 = 2 * 1024 * 1024;
/// Inclusive start of the RAM window (RAM mirrors four times inside it).
pub const RAM_START: u32 = 0x0000_0000;
/// Inclusive end of the RAM window.
pub const RAM_END: u32 = 0x007F_FFFF;
/// Inclusive start of the parallel/expansion 1 port.
pub const PARALLEL_PORT_START: u32 = 0x1F00_0000;
/// Inclusive end of the parallel/expansion 1 port.
pub const PARALLEL_PORT_END: u32 = 0x1F7F_FFFF;
/// Inclusive start of the data-cache scratchpad.
pub const SCRATCHPAD_START: u32 = 0x1F80_0000;
/// Inclusive end of the data-cache scratchpad.
pub const SCRATCHPAD_END: u32 = 0x1F80_03FF;
/// Inclusive start of the hardware I/O window.
pub const IO_START: u32 = 0x1F80_1000;
/// Inclusive end of the hardware I/O window (expansion 2 included).
pub const IO_END: u32 = 0x1F80_2FFF;
/// Size of the BIOS ROM.
pub const BIOS_SIZE: u32 = 512 * 1024;
/// Inclusive start of the BIOS ROM.
pub const BIOS_START: u32 = 0x1FC0_0000;
/// Inclusive end of the BIOS ROM.
pub const BIOS_END: u32 = 0x1FC7_FFFF;
/// Inclusive start of the KSEG2 cache-control window.
pub const CACHE_CONTROL_START: u32 = 0xFFFE_0000;
/// Inclusive end of the KSEG2 cache-control window.
pub const CACHE_CONTROL_END: u32 = 0xFFFE_01FF;

/// One of the four fixed virtual address segments of the R3000A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    /// User segment (`0x0000_0000..0x8000_0000`), cached, identity mapped.
    Kuseg,
    /// Kernel cached window (`0x8000_0000..0xA000_0000`).
    Kseg0,
    /// Kernel uncached window (`0xA000_0000..0xC000_0000`).
    Kseg1,
    /// Kernel segment 2 (`0xC000_0000..`), only the cache-control registers.
    Kseg2,
}

impl Segment {
    /// Classifies a virtual address by its top three bits.
    #[must_use]
    pub const fn of(vaddr: u32) -> Self {
        match vaddr >> 29 {
            0..=3 => Self::Kuseg,
            4 => Self::Kseg0,
            5 => Self::Kseg1,
            _ => Self::Kseg2,
        }
    }

    /// Value subtracted from a virtual address to reach the physical one.
    #[must_use]
    pub const fn base(self) -> u32 {
        match self {
            Self::Kuseg | Self::Kseg2 => 0,
            Self::Kseg0 => 0x8000_0000,
            Self::Kseg1 => 0xA000_0000,
        }
    }

    /// True for segments that go through the caches.
    #[must_use]
    pub const fn is_cached(self) -> bool {
        matches!(self, Self::Kuseg | Self::Kseg0)
    }
}

/// Splits a virtual address into its segment and physical address.
#[must_use]
pub const fn translate(vaddr: u32) -> (Segment, u32) {
    let segment = Segment::of(vaddr);
    (segment, vaddr - segment.base())
}

/// Physical region classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalRegion {
    /// Main RAM and its mirrors.
    Ram,
    /// Parallel port; open bus.
    ParallelPort,
    /// 1 KiB scratchpad, reachable only through cached segments.
    Scratchpad,
    /// Hardware registers.
    Io,
    /// BIOS ROM.
    Bios,
    /// Cache-control registers in KSEG2.
    CacheControl,
}

impl PhysicalRegion {
    /// Returns the inclusive bounds of this region.
    #[must_use]
    pub const fn bounds(self) -> (u32, u32) {
        match self {
            Self::Ram => (RAM_START, RAM_END),
            Self::ParallelPort => (PARALLEL_PORT_START, PARALLEL_PORT_END),
            Self::Scratchpad => (SCRATCHPAD_START, SCRATCHPAD_END),
            Self::Io => (IO_START, IO_END),
            Self::Bios => (BIOS_START, BIOS_END),
            Self::CacheControl => (CACHE_CONTROL_START, CACHE_CONTROL_END),
        }
    }

    /// Returns `true` when `addr` belongs to this region.
    #[must_use]
    pub const fn contains(self, addr: u32) -> bool {
        let (start, end) = self.bounds();
        addr >= start && addr <= end
    }
}

/// Physical regions in ascending address order.
pub const PHYSICAL_REGIONS: [PhysicalRegion; 6] = [
    PhysicalRegion::Ram,
    PhysicalRegion::ParallelPort,
    PhysicalRegion::Scratchpad,
    PhysicalRegion::Io,
    PhysicalRegion::Bios,
    PhysicalRegion::CacheControl,
];

const _: () = assert_region_layout();

const fn assert_region_layout() {
    let mut index = 0;
    while index < PHYSICAL_REGIONS.len() {
        let (start, end) = PHYSICAL_REGIONS[index].bounds();
        assert!(start <= end, "region start cannot be greater than end");
        if index > 0 {
            let (_, previous_end) = PHYSICAL_REGIONS[index - 1].bounds();
            assert!(previous_end < start, "regions must not overlap");
        }
        index += 1;
    }
    assert!(RAM_END + 1 == 4 * RAM_SIZE, "ram window must hold four mirrors");
    assert!(BIOS_END + 1 - BIOS_START == BIOS_SIZE, "bios window size");
}

/// Decodes a virtual address into its physical region and physical address.
///
/// Returns `None` for unmapped addresses, including the scratchpad when it is
/// reached through uncached KSEG1 and any KSEG2 address outside the
/// cache-control window.
#[must_use]
pub const fn decode_region(vaddr: u32) -> Option<(PhysicalRegion, u32)> {
    let (segment, phys) = translate(vaddr);
    let region = match segment {
        Segment::Kseg2 => {
            if PhysicalRegion::CacheControl.contains(phys) {
                PhysicalRegion::CacheControl
            } else {
                return None;
            }
        }
        Segment::Kuseg | Segment::Kseg0 | Segment::Kseg1 => match phys {
            RAM_START..=RAM_END => PhysicalRegion::Ram,
            PARALLEL_PORT_START..=PARALLEL_PORT_END => PhysicalRegion::ParallelPort,
            SCRATCHPAD_START..=SCRATCHPAD_END if segment.is_cached() => PhysicalRegion::Scratchpad,
            IO_START..=IO_END => PhysicalRegion::Io,
            BIOS_START..=BIOS_END => PhysicalRegion::Bios,
            _ => return None,
        },
    };
    Some((region, phys))
}
