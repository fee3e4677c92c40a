//! Architectural CPU register state.

/// Pipelined general-purpose register file.
pub mod registers;

pub use registers::{
    RegisterFile, GENERAL_REGISTER_COUNT, REGISTER_NAMES, REGISTER_STAGES, REG_FP, REG_GP, REG_RA,
    REG_SP,
};
