/// Number of general-purpose registers (`$zero..$ra`).
pub const GENERAL_REGISTER_COUNT: usize = 32;
/// Number of pipeline stages kept per register.
pub const REGISTER_STAGES: usize = 3;
/// Index of the stack pointer.
pub const REG_SP: usize = 29;
/// Index of the global pointer.
pub const REG_GP: usize = 28;
/// Index of the frame pointer.
pub const REG_FP: usize = 30;
/// Index of the return-address register written by `JAL` and link branches.
pub const REG_RA: usize = 31;

/// Conventional assembler names, indexed by register number.
pub const REGISTER_NAMES: [&str; GENERAL_REGISTER_COUNT] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp",
    "fp", "ra",
];

/// General-purpose register file with a three-stage write pipeline.
///
/// Stage 1 receives every write, stage 3 is what ordinary reads observe.
/// Immediate writes land in all three stages at once; delayed loads enter
/// stage 1 only and become visible after two [`RegisterFile::advance`] calls,
/// which models the R3000A load delay slot. Register 0 reads as zero in every
/// stage and ignores writes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    stages: [[u32; GENERAL_REGISTER_COUNT]; REGISTER_STAGES],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// Creates a register file with every stage cleared.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stages: [[0; GENERAL_REGISTER_COUNT]; REGISTER_STAGES],
        }
    }

    /// Reads a register.
    ///
    /// With `ignore_load_delay` the newest value is returned, including a load
    /// still in flight; `LWL`/`LWR` merge against that value.
    #[must_use]
    pub const fn read(&self, index: usize, ignore_load_delay: bool) -> u32 {
        let index = index & 0x1F;
        if ignore_load_delay {
            self.stages[0][index]
        } else {
            self.stages[REGISTER_STAGES - 1][index]
        }
    }

    /// Reads the value ordinary instructions observe.
    #[must_use]
    pub const fn get(&self, index: usize) -> u32 {
        self.read(index, false)
    }

    /// Writes a register, either immediately or as a delayed load.
    pub fn write(&mut self, index: usize, value: u32, is_delayed_load: bool) {
        let index = index & 0x1F;
        if index == 0 {
            return;
        }
        if is_delayed_load {
            self.stages[0][index] = value;
        } else {
            for stage in &mut self.stages {
                stage[index] = value;
            }
        }
    }

    /// Immediate write.
    pub fn set(&mut self, index: usize, value: u32) {
        self.write(index, value, false);
    }

    /// Shifts the pipeline by one tick: stage 2 moves to stage 3 and stage 1
    /// to stage 2.
    pub fn advance(&mut self) {
        self.stages[2] = self.stages[1];
        self.stages[1] = self.stages[0];
    }

    /// Clears all stages.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Returns one pipeline stage (`0` is the newest).
    #[must_use]
    pub const fn stage(&self, stage: usize) -> &[u32; GENERAL_REGISTER_COUNT] {
        &self.stages[stage % REGISTER_STAGES]
    }

    /// Replaces one pipeline stage. Register 0 is forced to zero.
    pub fn load_stage(&mut self, stage: usize, values: [u32; GENERAL_REGISTER_COUNT]) {
        let slot = &mut self.stages[stage % REGISTER_STAGES];
        *slot = values;
        slot[0] = 0;
    }
}
