//! Architectural CPU state: program-counter pipeline, HI/LO, the staged
//! register file and both coprocessors.

use crate::cop0::Cop0;
use crate::cop2::Gte;
use crate::decoder::Instruction;
use crate::fault::{Exception, Fault};
use crate::memory::RESET_VECTOR;
use crate::savestate::{SaveStateError, Snapshot, StateReader, StateWriter};
use crate::state::RegisterFile;

/// R3000A core state.
///
/// Each tick promotes the prefetched instruction to `current`, fetches the
/// next one and executes `current`. `fetched_pc` remembers where the
/// prefetched word came from, so `current_pc` stays correct after a branch
/// rewrites `next_pc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu {
    pub(crate) current_pc: u32,
    pub(crate) current_instruction: Instruction,
    pub(crate) fetched_pc: u32,
    pub(crate) next_pc: u32,
    pub(crate) next_instruction: Instruction,
    pub(crate) fetch_fault: Option<Fault>,
    pub(crate) in_delay_slot: bool,
    pub(crate) branch_pending: bool,
    pub(crate) hi: u32,
    pub(crate) lo: u32,
    pub(crate) registers: RegisterFile,
    pub(crate) cop0: Cop0,
    pub(crate) gte: Gte,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Creates a CPU about to fetch from the reset vector.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current_pc: RESET_VECTOR.wrapping_sub(8),
            current_instruction: Instruction::NOP,
            fetched_pc: RESET_VECTOR.wrapping_sub(4),
            next_pc: RESET_VECTOR,
            next_instruction: Instruction::NOP,
            fetch_fault: None,
            in_delay_slot: false,
            branch_pending: false,
            hi: 0,
            lo: 0,
            registers: RegisterFile::new(),
            cop0: Cop0::new(),
            gte: Gte::new(),
        }
    }

    /// Returns to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Address of the instruction executed by the last tick.
    #[must_use]
    pub const fn current_pc(&self) -> u32 {
        self.current_pc
    }

    /// Instruction executed by the last tick.
    #[must_use]
    pub const fn current_instruction(&self) -> Instruction {
        self.current_instruction
    }

    /// Address the next fetch reads from.
    #[must_use]
    pub const fn next_pc(&self) -> u32 {
        self.next_pc
    }

    /// Prefetched instruction that executes next tick.
    #[must_use]
    pub const fn next_instruction(&self) -> Instruction {
        self.next_instruction
    }

    /// Whether the last executed instruction sat in a delay slot.
    #[must_use]
    pub const fn in_delay_slot(&self) -> bool {
        self.in_delay_slot
    }

    /// `HI`.
    #[must_use]
    pub const fn hi(&self) -> u32 {
        self.hi
    }

    /// `LO`.
    #[must_use]
    pub const fn lo(&self) -> u32 {
        self.lo
    }

    /// General-purpose registers.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Mutable general-purpose registers, for loaders and tests.
    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    /// System control coprocessor.
    #[must_use]
    pub const fn cop0(&self) -> &Cop0 {
        &self.cop0
    }

    /// Mutable system control coprocessor.
    pub fn cop0_mut(&mut self) -> &mut Cop0 {
        &mut self.cop0
    }

    /// Geometry transform engine registers.
    #[must_use]
    pub const fn gte(&self) -> &Gte {
        &self.gte
    }

    /// Redirects execution to `pc`, discarding the prefetched instruction.
    pub fn jump_to(&mut self, pc: u32) {
        self.next_pc = pc;
        self.fetched_pc = pc.wrapping_sub(4);
        self.next_instruction = Instruction::NOP;
        self.fetch_fault = None;
        self.branch_pending = false;
    }

    /// Moves the prefetched instruction into the execute slot and returns the
    /// fetch fault attached to it, if any.
    pub(crate) fn promote(&mut self) -> Option<Fault> {
        self.current_pc = self.fetched_pc;
        self.current_instruction = self.next_instruction;
        self.in_delay_slot = self.branch_pending;
        self.branch_pending = false;
        self.fetch_fault.take()
    }

    /// Latches the outcome of a fetch from `next_pc` and steps `next_pc`.
    pub(crate) fn prefetched(&mut self, fetched: Result<u32, Fault>) {
        self.fetched_pc = self.next_pc;
        self.next_pc = self.next_pc.wrapping_add(4);
        match fetched {
            Ok(word) => self.next_instruction = Instruction(word),
            Err(fault) => {
                self.next_instruction = Instruction::NOP;
                self.fetch_fault = Some(fault);
            }
        }
    }

    /// Marks the instruction after the current one as a delay slot.
    pub(crate) fn branch_to(&mut self, target: u32) {
        self.next_pc = target;
        self.branch_pending = true;
    }

    /// Enters the exception handler for `fault`. Returns `(epc, vector)`.
    pub(crate) fn enter_exception(&mut self, fault: Fault) -> (u32, u32) {
        let (epc, vector) = self
            .cop0
            .enter_exception(fault, self.current_pc, self.in_delay_slot);
        self.jump_to(vector);
        (epc, vector)
    }
}

impl Snapshot for Cpu {
    fn save(&self, w: &mut StateWriter) {
        w.write_u32(self.hi);
        w.write_u32(self.lo);
        w.write_u32(self.current_pc);
        w.write_u32(self.next_pc);
        w.write_u32(self.current_instruction.word());
        w.write_u32(self.next_instruction.word());
        w.write_bool(self.in_delay_slot);
        w.write_bool(self.branch_pending);
        w.write_u32(self.fetched_pc);
        match self.fetch_fault {
            None => w.write_u8(0xFF),
            Some(fault) => {
                w.write_u8(fault.exception.as_u8());
                w.write_u8(fault.coprocessor);
                w.write_bool(fault.bad_vaddr.is_some());
                w.write_u32(fault.bad_vaddr.unwrap_or(0));
            }
        }
        for stage in 0..3 {
            w.write_words(self.registers.stage(stage));
        }
        self.cop0.save(w);
        self.gte.save(w);
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), SaveStateError> {
        r.enter("cpu");
        self.hi = r.read_u32()?;
        self.lo = r.read_u32()?;
        self.current_pc = r.read_u32()?;
        self.next_pc = r.read_u32()?;
        self.current_instruction = Instruction(r.read_u32()?);
        self.next_instruction = Instruction(r.read_u32()?);
        self.in_delay_slot = r.read_bool()?;
        self.branch_pending = r.read_bool()?;
        self.fetched_pc = r.read_u32()?;
        self.fetch_fault = match r.read_u8()? {
            0xFF => None,
            code => {
                let exception = Exception::from_u8(code).ok_or(SaveStateError::InvalidValue {
                    field: "cpu.fetch_fault",
                    value: u32::from(code),
                })?;
                let coprocessor = r.read_u8()?;
                let has_addr = r.read_bool()?;
                let addr = r.read_u32()?;
                Some(Fault {
                    exception,
                    bad_vaddr: has_addr.then_some(addr),
                    coprocessor,
                })
            }
        };
        r.enter("registers");
        for stage in 0..3 {
            let mut values = [0; 32];
            r.read_words(&mut values)?;
            self.registers.load_stage(stage, values);
        }
        self.cop0.load(r)?;
        self.gte.load(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_fetches_from_bios_entry() {
        let mut cpu = Cpu::new();
        assert_eq!(cpu.next_pc(), 0xBFC0_0000);
        cpu.promote();
        cpu.prefetched(Ok(0x3C08_0013));
        assert_eq!(cpu.current_pc(), 0xBFBF_FFFC);
        assert_eq!(cpu.next_pc(), 0xBFC0_0004);
        assert_eq!(cpu.promote(), None);
        assert_eq!(cpu.current_pc(), 0xBFC0_0000);
        assert_eq!(cpu.current_instruction(), Instruction(0x3C08_0013));
    }

    #[test]
    fn fetch_fault_travels_with_its_slot() {
        let mut cpu = Cpu::new();
        let fault = Fault::address_error(Exception::AddressErrorLoad, 0x8000_0002);
        cpu.prefetched(Err(fault));
        assert_eq!(cpu.next_instruction(), Instruction::NOP);
        assert_eq!(cpu.promote(), Some(fault));
        assert_eq!(cpu.promote(), None);
    }

    #[test]
    fn exception_discards_prefetch_and_jumps_to_vector() {
        let mut cpu = Cpu::new();
        cpu.current_pc = 0x8001_0000;
        cpu.next_instruction = Instruction(0x2408_0001);
        let (epc, vector) = cpu.enter_exception(Fault::new(Exception::Syscall));
        assert_eq!(epc, 0x8001_0000);
        assert_eq!(cpu.next_pc(), vector);
        assert_eq!(cpu.next_instruction(), Instruction::NOP);
    }

    #[test]
    fn state_round_trips_through_snapshot() {
        let mut cpu = Cpu::new();
        cpu.hi = 7;
        cpu.registers.write(9, 0x55, true);
        cpu.fetch_fault = Some(Fault::address_error(Exception::AddressErrorLoad, 0x11));
        let mut w = StateWriter::default();
        cpu.save(&mut w);
        let bytes = w.into_bytes();

        let mut restored = Cpu::new();
        let mut r = StateReader::new(&bytes);
        restored.load(&mut r).unwrap();
        r.finish().unwrap();
        assert_eq!(restored, cpu);
    }
}
