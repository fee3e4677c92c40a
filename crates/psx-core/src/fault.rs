use thiserror::Error;

/// Guest-visible exception taxonomy with the stable `Cause.ExcCode` values of
/// the R3000A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Exception {
    /// External interrupt line asserted while interrupts are enabled.
    #[error("interrupt")]
    Interrupt = 0x00,
    /// Misaligned load or instruction fetch.
    #[error("address error on load or fetch")]
    AddressErrorLoad = 0x04,
    /// Misaligned store.
    #[error("address error on store")]
    AddressErrorStore = 0x05,
    /// No device answered an instruction fetch.
    #[error("bus error on instruction fetch")]
    BusErrorInstruction = 0x06,
    /// No device answered a data access.
    #[error("bus error on data access")]
    BusErrorData = 0x07,
    /// `SYSCALL` executed.
    #[error("system call")]
    Syscall = 0x08,
    /// `BREAK` executed.
    #[error("breakpoint")]
    Breakpoint = 0x09,
    /// Opcode/funct combination with no defined operation.
    #[error("reserved instruction")]
    ReservedInstruction = 0x0A,
    /// Coprocessor instruction issued while the unit is disabled or absent.
    #[error("coprocessor unusable")]
    CoprocessorUnusable = 0x0B,
    /// Signed arithmetic overflow in `ADD`, `ADDI` or `SUB`.
    #[error("arithmetic overflow")]
    Overflow = 0x0C,
}

impl Exception {
    /// Converts the exception to the `ExcCode` value stored in `Cause[6:2]`.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a raw `ExcCode` back into an exception.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Interrupt),
            0x04 => Some(Self::AddressErrorLoad),
            0x05 => Some(Self::AddressErrorStore),
            0x06 => Some(Self::BusErrorInstruction),
            0x07 => Some(Self::BusErrorData),
            0x08 => Some(Self::Syscall),
            0x09 => Some(Self::Breakpoint),
            0x0A => Some(Self::ReservedInstruction),
            0x0B => Some(Self::CoprocessorUnusable),
            0x0C => Some(Self::Overflow),
            _ => None,
        }
    }
}

/// A raised exception plus the side information CP0 needs to latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("{exception}")]
pub struct Fault {
    /// Exception kind.
    pub exception: Exception,
    /// Faulting virtual address for address errors.
    pub bad_vaddr: Option<u32>,
    /// Coprocessor number reported in `Cause.CE`.
    pub coprocessor: u8,
}

impl Fault {
    /// Creates a fault without address or coprocessor payload.
    #[must_use]
    pub const fn new(exception: Exception) -> Self {
        Self {
            exception,
            bad_vaddr: None,
            coprocessor: 0,
        }
    }

    /// Creates an address-error fault that latches `addr` into `BadVAddr`.
    #[must_use]
    pub const fn address_error(exception: Exception, addr: u32) -> Self {
        Self {
            exception,
            bad_vaddr: Some(addr),
            coprocessor: 0,
        }
    }

    /// Creates a coprocessor-unusable fault naming coprocessor `cop`.
    #[must_use]
    pub const fn coprocessor_unusable(cop: u8) -> Self {
        Self {
            exception: Exception::CoprocessorUnusable,
            bad_vaddr: None,
            coprocessor: cop & 3,
        }
    }
}

impl From<Exception> for Fault {
    fn from(exception: Exception) -> Self {
        Self::new(exception)
    }
}
