//! Geometry transform engine (CP2) register file.
//!
//! Data and control registers behave like hardware, including the screen XY
//! FIFO, the IRGB/ORGB colour conversion and the leading-zero counter.
//! Command words are accepted and counted; their arithmetic is not modelled.

use crate::api::Coprocessor;
use crate::decoder::Instruction;
use crate::fault::Fault;
use crate::savestate::{SaveStateError, Snapshot, StateReader, StateWriter};

const SXY0: usize = 12;
const SXY1: usize = 13;
const SXY2: usize = 14;
const SXYP: usize = 15;
const IR1: usize = 9;
const IRGB: usize = 28;
const ORGB: usize = 29;
const LZCS: usize = 30;
const LZCR: usize = 31;

/// Data registers read back sign-extended from 16 bits.
const SIGNED_DATA: [usize; 7] = [1, 3, 5, 8, 9, 10, 11];
/// Data registers read back zero-extended from 16 bits.
const UNSIGNED_DATA: [usize; 5] = [7, 16, 17, 18, 19];
/// Control registers read back sign-extended from 16 bits.
const SIGNED_CONTROL: [usize; 7] = [4, 12, 20, 26, 27, 29, 30];

/// GTE register state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Gte {
    data: [u32; 32],
    control: [u32; 32],
    commands_executed: u64,
}

impl Default for Gte {
    fn default() -> Self {
        Self::new()
    }
}

impl Gte {
    /// Creates a zeroed register file.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: [0; 32],
            control: [0; 32],
            commands_executed: 0,
        }
    }

    /// Command words seen since reset.
    #[must_use]
    pub const fn commands_executed(&self) -> u64 {
        self.commands_executed
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn orgb(&self) -> u32 {
        let channel = |index: usize| -> u32 {
            let ir = i32::from(self.data[index] as i16);
            (ir >> 7).clamp(0, 0x1F) as u32
        };
        channel(IR1) | (channel(IR1 + 1) << 5) | (channel(IR1 + 2) << 10)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn sign_extend_16(value: u32) -> u32 {
    value as i16 as i32 as u32
}

impl Coprocessor for Gte {
    fn read_data(&self, index: usize) -> u32 {
        let index = index & 0x1F;
        match index {
            SXYP => self.data[SXY2],
            IRGB | ORGB => self.orgb(),
            _ if SIGNED_DATA.contains(&index) => sign_extend_16(self.data[index]),
            _ if UNSIGNED_DATA.contains(&index) => self.data[index] & 0xFFFF,
            _ => self.data[index],
        }
    }

    fn write_data(&mut self, index: usize, value: u32) {
        match index & 0x1F {
            SXYP => {
                self.data[SXY0] = self.data[SXY1];
                self.data[SXY1] = self.data[SXY2];
                self.data[SXY2] = value;
            }
            IRGB => {
                self.data[IRGB] = value & 0x7FFF;
                for channel in 0..3 {
                    self.data[IR1 + channel] = ((value >> (5 * channel)) & 0x1F) << 7;
                }
            }
            ORGB | LZCR => {}
            LZCS => {
                self.data[LZCS] = value;
                let bits = if value & 0x8000_0000 != 0 {
                    value.leading_ones()
                } else {
                    value.leading_zeros()
                };
                self.data[LZCR] = bits;
            }
            index => self.data[index] = value,
        }
    }

    fn read_control(&self, index: usize) -> u32 {
        let index = index & 0x1F;
        if SIGNED_CONTROL.contains(&index) {
            sign_extend_16(self.control[index])
        } else {
            self.control[index]
        }
    }

    fn write_control(&mut self, index: usize, value: u32) {
        self.control[index & 0x1F] = value;
    }

    fn execute_command(&mut self, instruction: Instruction) -> Result<(), Fault> {
        self.commands_executed += 1;
        log::debug!(
            "gte: command {:#04x} ({:#010x}) not evaluated",
            instruction.funct(),
            instruction.word()
        );
        Ok(())
    }
}

impl Snapshot for Gte {
    fn save(&self, w: &mut StateWriter) {
        w.write_words(&self.data);
        w.write_words(&self.control);
        w.write_u64(self.commands_executed);
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), SaveStateError> {
        r.enter("gte");
        r.read_words(&mut self.data)?;
        r.read_words(&mut self.control)?;
        self.commands_executed = r.read_u64()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn sxyp_write_shifts_the_screen_fifo() {
        let mut gte = Gte::new();
        for value in [1, 2, 3, 4] {
            gte.write_data(SXYP, value);
        }
        assert_eq!(gte.read_data(SXY0), 2);
        assert_eq!(gte.read_data(SXY1), 3);
        assert_eq!(gte.read_data(SXY2), 4);
        assert_eq!(gte.read_data(SXYP), 4);
    }

    #[rstest]
    #[case(1, 0x0000_8001, 0xFFFF_8001)]
    #[case(9, 0x1234_7FFF, 0x0000_7FFF)]
    #[case(7, 0xFFFF_8001, 0x0000_8001)]
    #[case(16, 0x0001_FFFF, 0x0000_FFFF)]
    #[case(24, 0x8000_0000, 0x8000_0000)]
    fn data_reads_apply_register_width(#[case] index: usize, #[case] write: u32, #[case] read: u32) {
        let mut gte = Gte::new();
        gte.write_data(index, write);
        assert_eq!(gte.read_data(index), read);
    }

    #[test]
    fn irgb_expands_into_ir_and_reads_back_as_orgb() {
        let mut gte = Gte::new();
        gte.write_data(IRGB, 0x7FFF);
        assert_eq!(gte.read_data(IR1), 0x1F << 7);
        assert_eq!(gte.read_data(ORGB), 0x7FFF);

        gte.write_data(IR1, 0xFFFF_F000);
        assert_eq!(gte.read_data(ORGB) & 0x1F, 0, "negative IR clamps to zero");
    }

    #[rstest]
    #[case(0x0000_0000, 32)]
    #[case(0x0000_FFFF, 16)]
    #[case(0xFFFF_FFFF, 32)]
    #[case(0xF000_0000, 4)]
    fn lzcs_counts_leading_sign_bits(#[case] value: u32, #[case] count: u32) {
        let mut gte = Gte::new();
        gte.write_data(LZCS, value);
        assert_eq!(gte.read_data(LZCR), count);
    }

    #[test]
    fn control_reads_sign_extend_the_short_registers() {
        let mut gte = Gte::new();
        gte.write_control(4, 0x0000_FFFE);
        gte.write_control(5, 0x0000_FFFE);
        assert_eq!(gte.read_control(4), 0xFFFF_FFFE);
        assert_eq!(gte.read_control(5), 0x0000_FFFE);
    }

    #[test]
    fn commands_are_counted() {
        let mut gte = Gte::new();
        assert!(gte.execute_command(Instruction(0x4A18_0001)).is_ok());
        assert_eq!(gte.commands_executed(), 1);
    }
}
