//! System control coprocessor (CP0).
//!
//! Holds the exception and status registers. There is no TLB on the PSX, so
//! only the breakpoint, exception and identification registers do anything.

use crate::api::Coprocessor;
use crate::decoder::Instruction;
use crate::fault::{Exception, Fault};
use crate::savestate::{SaveStateError, Snapshot, StateReader, StateWriter};

/// Breakpoint on execute address.
pub const BPC: usize = 3;
/// Breakpoint on data access address.
pub const BDA: usize = 5;
/// Randomly memorised jump address.
pub const JUMPDEST: usize = 6;
/// Breakpoint control.
pub const DCIC: usize = 7;
/// Faulting address of the last address error.
pub const BAD_VADDR: usize = 8;
/// Data access breakpoint mask.
pub const BDAM: usize = 9;
/// Execute breakpoint mask.
pub const BPCM: usize = 11;
/// Status register.
pub const STATUS: usize = 12;
/// Cause register.
pub const CAUSE: usize = 13;
/// Exception return address.
pub const EPC: usize = 14;
/// Processor identification.
pub const PRID: usize = 15;

/// `IEc`: current interrupt enable.
pub const STATUS_IEC: u32 = 1 << 0;
/// `KUc`: current mode is user when set.
pub const STATUS_KUC: u32 = 1 << 1;
/// `IsC`: isolate cache. Stores go to the cache and not to memory.
pub const STATUS_ISC: u32 = 1 << 16;
/// `BEV`: exception vectors in BIOS.
pub const STATUS_BEV: u32 = 1 << 22;
/// `CU0`: CP0 usable in user mode.
pub const STATUS_CU0: u32 = 1 << 28;
/// `CU2`: GTE usable.
pub const STATUS_CU2: u32 = 1 << 30;
const STATUS_MODE_STACK: u32 = 0x3F;
const STATUS_IM: u32 = 0xFF00;

/// Branch delay flag in `Cause`.
pub const CAUSE_BD: u32 = 1 << 31;
/// Hardware interrupt line 2, wired to the interrupt controller.
pub const CAUSE_IP2: u32 = 1 << 10;
const CAUSE_SOFTWARE_IP: u32 = 0x0300;
const CAUSE_IP: u32 = 0xFF00;

/// General exception vector with `BEV` clear.
pub const GENERAL_VECTOR_RAM: u32 = 0x8000_0080;
/// General exception vector with `BEV` set.
pub const GENERAL_VECTOR_BIOS: u32 = 0xBFC0_0180;
/// `PRId` of the PSX CPU.
pub const PRID_VALUE: u32 = 0x0000_0002;

const RFE_FUNCT: u8 = 0x10;

/// CP0 register file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Cop0 {
    registers: [u32; 32],
}

impl Default for Cop0 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cop0 {
    /// Creates CP0 in its reset state: kernel mode, interrupts off.
    #[must_use]
    pub const fn new() -> Self {
        let mut registers = [0; 32];
        registers[PRID] = PRID_VALUE;
        Self { registers }
    }

    /// Resets to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// `Status`.
    #[must_use]
    pub const fn status(&self) -> u32 {
        self.registers[STATUS]
    }

    /// `Cause`.
    #[must_use]
    pub const fn cause(&self) -> u32 {
        self.registers[CAUSE]
    }

    /// `EPC`.
    #[must_use]
    pub const fn epc(&self) -> u32 {
        self.registers[EPC]
    }

    /// `BadVAddr`.
    #[must_use]
    pub const fn bad_vaddr(&self) -> u32 {
        self.registers[BAD_VADDR]
    }

    /// True while `Status.IsC` diverts data accesses to the cache.
    #[must_use]
    pub const fn cache_isolated(&self) -> bool {
        self.status() & STATUS_ISC != 0
    }

    /// True in kernel mode (`KUc` clear).
    #[must_use]
    pub const fn kernel_mode(&self) -> bool {
        self.status() & STATUS_KUC == 0
    }

    /// Whether coprocessor `cop` may execute. CP0 is always usable in kernel
    /// mode; CP1 and CP3 do not exist.
    #[must_use]
    pub const fn coprocessor_usable(&self, cop: u8) -> bool {
        match cop {
            0 => self.kernel_mode() || self.status() & STATUS_CU0 != 0,
            2 => self.status() & STATUS_CU2 != 0,
            _ => false,
        }
    }

    /// Mirrors the interrupt controller output into `Cause.IP2`.
    pub fn set_interrupt_line(&mut self, asserted: bool) {
        if asserted {
            self.registers[CAUSE] |= CAUSE_IP2;
        } else {
            self.registers[CAUSE] &= !CAUSE_IP2;
        }
    }

    /// True when an enabled interrupt source is pending and `IEc` is set.
    #[must_use]
    pub const fn interrupt_pending(&self) -> bool {
        let status = self.status();
        status & STATUS_IEC != 0 && self.cause() & status & STATUS_IM & CAUSE_IP != 0
    }

    /// Vector the next exception will jump to.
    #[must_use]
    pub const fn exception_vector(&self) -> u32 {
        if self.status() & STATUS_BEV != 0 {
            GENERAL_VECTOR_BIOS
        } else {
            GENERAL_VECTOR_RAM
        }
    }

    /// Enters an exception: pushes the mode stack, fills `Cause`, `EPC` and
    /// `BadVAddr`. Returns `(epc, vector)`.
    pub fn enter_exception(&mut self, fault: Fault, pc: u32, in_delay_slot: bool) -> (u32, u32) {
        let status = self.status();
        self.registers[STATUS] =
            (status & !STATUS_MODE_STACK) | ((status << 2) & STATUS_MODE_STACK);

        let mut cause = self.cause() & CAUSE_IP;
        cause |= u32::from(fault.exception.as_u8()) << 2;
        cause |= u32::from(fault.coprocessor & 3) << 28;
        let epc = if in_delay_slot {
            cause |= CAUSE_BD;
            pc.wrapping_sub(4)
        } else {
            pc
        };
        self.registers[CAUSE] = cause;
        self.registers[EPC] = epc;
        if let Some(addr) = fault.bad_vaddr {
            self.registers[BAD_VADDR] = addr;
        }
        (epc, self.exception_vector())
    }

    /// `RFE`: pops the mode stack. Bits 4 and 5 keep their value.
    pub fn rfe(&mut self) {
        let status = self.status();
        self.registers[STATUS] = (status & !0xF) | ((status >> 2) & 0xF);
    }

    /// All 32 registers, for save states and debuggers.
    #[must_use]
    pub const fn registers(&self) -> &[u32; 32] {
        &self.registers
    }
}

impl Coprocessor for Cop0 {
    fn read_data(&self, index: usize) -> u32 {
        self.registers[index & 0x1F]
    }

    fn write_data(&mut self, index: usize, value: u32) {
        match index & 0x1F {
            CAUSE => {
                self.registers[CAUSE] =
                    (self.registers[CAUSE] & !CAUSE_SOFTWARE_IP) | (value & CAUSE_SOFTWARE_IP);
            }
            BAD_VADDR | PRID => log::trace!("cop0: write to read-only r{index} ignored"),
            index => {
                if index == STATUS && value & STATUS_ISC != self.status() & STATUS_ISC {
                    log::trace!("cop0: cache isolation {}", value & STATUS_ISC != 0);
                }
                self.registers[index] = value;
            }
        }
    }

    // CP0 has a single register file; CFC0/CTC0 alias it.
    fn read_control(&self, index: usize) -> u32 {
        self.read_data(index)
    }

    fn write_control(&mut self, index: usize, value: u32) {
        self.write_data(index, value);
    }

    fn execute_command(&mut self, instruction: Instruction) -> Result<(), Fault> {
        if instruction.funct() == RFE_FUNCT {
            self.rfe();
            Ok(())
        } else {
            Err(Fault::new(Exception::ReservedInstruction))
        }
    }
}

impl Snapshot for Cop0 {
    fn save(&self, w: &mut StateWriter) {
        w.write_words(&self.registers);
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), SaveStateError> {
        r.enter("cop0");
        r.read_words(&mut self.registers)
    }
}
