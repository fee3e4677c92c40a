//! Access widths and natural-alignment checks.

use crate::fault::{Exception, Fault};

/// Width of a bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(clippy::module_name_repetitions)]
pub enum AccessWidth {
    /// 8-bit access.
    Byte = 1,
    /// 16-bit access.
    Halfword = 2,
    /// 32-bit access.
    Word = 4,
}

impl AccessWidth {
    /// Size of the access in bytes.
    #[must_use]
    pub const fn bytes(self) -> u32 {
        self as u32
    }

    /// True when `addr` is naturally aligned for this width.
    #[must_use]
    pub const fn is_aligned(self, addr: u32) -> bool {
        addr & (self.bytes() - 1) == 0
    }
}

/// Direction of a data access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::module_name_repetitions)]
pub enum AccessKind {
    /// Instruction fetch.
    Fetch,
    /// Data load.
    Load,
    /// Data store.
    Store,
}

impl AccessKind {
    /// Exception raised for a misaligned access of this kind.
    #[must_use]
    pub const fn address_error(self) -> Exception {
        match self {
            Self::Fetch | Self::Load => Exception::AddressErrorLoad,
            Self::Store => Exception::AddressErrorStore,
        }
    }

    /// Exception raised when no device answers an access of this kind.
    #[must_use]
    pub const fn bus_error(self) -> Exception {
        match self {
            Self::Fetch => Exception::BusErrorInstruction,
            Self::Load | Self::Store => Exception::BusErrorData,
        }
    }
}

/// Validates natural alignment.
///
/// # Errors
///
/// Returns an address-error fault carrying `addr` for `BadVAddr` when the
/// address is not a multiple of the access width.
pub const fn validate_alignment(addr: u32, width: AccessWidth, kind: AccessKind) -> Result<(), Fault> {
    if width.is_aligned(addr) {
        Ok(())
    } else {
        Err(Fault::address_error(kind.address_error(), addr))
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_alignment, AccessKind, AccessWidth};
    use crate::fault::Exception;
    use proptest::prelude::*;

    #[test]
    fn bytes_are_always_aligned() {
        for addr in 0u32..8 {
            assert!(validate_alignment(addr, AccessWidth::Byte, AccessKind::Load).is_ok());
        }
    }

    #[test]
    fn misaligned_store_raises_ades_with_address() {
        let fault = validate_alignment(0x8000_0002, AccessWidth::Word, AccessKind::Store)
            .expect_err("misaligned word store");
        assert_eq!(fault.exception, Exception::AddressErrorStore);
        assert_eq!(fault.bad_vaddr, Some(0x8000_0002));
    }

    #[test]
    fn misaligned_fetch_raises_adel() {
        let fault = validate_alignment(0xBFC0_0001, AccessWidth::Word, AccessKind::Fetch)
            .expect_err("misaligned fetch");
        assert_eq!(fault.exception, Exception::AddressErrorLoad);
        assert_eq!(AccessKind::Fetch.bus_error(), Exception::BusErrorInstruction);
    }

    proptest! {
        #[test]
        fn halfword_alignment_tracks_bit_zero(addr in any::<u32>()) {
            let result = validate_alignment(addr, AccessWidth::Halfword, AccessKind::Load);
            prop_assert_eq!(result.is_ok(), addr & 1 == 0);
        }
    }
}
