//! Instruction semantics driven through a whole machine: delay slots, the
//! multiply/divide unit, unaligned accesses and cache isolation.

#![allow(clippy::pedantic, clippy::nursery, clippy::unreadable_literal)]

use proptest::prelude::*;
use log as _;
use psx_core::{CoreConfig, Psx};
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const BIOS_PROGRAM_BASE: u32 = 0xBFC0_0000;
const T0: u32 = 8;
const T1: u32 = 9;
const T2: u32 = 10;
const T3: u32 = 11;
const RA: u32 = 31;

const fn special(rs: u32, rt: u32, rd: u32, shamt: u32, funct: u32) -> u32 {
    (rs << 21) | (rt << 16) | (rd << 11) | (shamt << 6) | funct
}

const fn imm(op: u32, rs: u32, rt: u32, value: u16) -> u32 {
    (op << 26) | (rs << 21) | (rt << 16) | value as u32
}

const fn lui(rt: u32, value: u16) -> u32 {
    imm(0x0F, 0, rt, value)
}

const fn ori(rt: u32, rs: u32, value: u16) -> u32 {
    imm(0x0D, rs, rt, value)
}

const fn addiu(rt: u32, rs: u32, value: u16) -> u32 {
    imm(0x09, rs, rt, value)
}

const fn addu(rd: u32, rs: u32, rt: u32) -> u32 {
    special(rs, rt, rd, 0, 0x21)
}

const fn mtc0(rt: u32, rd: u32) -> u32 {
    (0x10 << 26) | (0x04 << 21) | (rt << 16) | (rd << 11)
}

fn boot(program: &[u32]) -> Psx {
    let mut bios = vec![0u8; 512 * 1024];
    for (index, word) in program.iter().enumerate() {
        bios[index * 4..index * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    Psx::new(&bios, CoreConfig::default()).unwrap()
}

/// Runs the whole program plus two ticks so trailing loads become visible.
fn run(program: &[u32]) -> Psx {
    let mut psx = boot(program);
    psx.run(program.len() as u64 + 2);
    psx
}

fn reg(psx: &Psx, index: u32) -> u32 {
    psx.cpu().registers().get(index as usize)
}

#[test]
fn load_result_is_invisible_in_the_delay_slot() {
    let mut psx = boot(&[
        lui(T0, 0x8000),
        imm(0x23, T0, T1, 0x0100), // lw $t1, 0x100($t0)
        addu(T2, T1, 0),
        addu(T3, T1, 0),
    ]);
    psx.bus_mut().write_word(0x8000_0100, 0xDEAD_BEEF).unwrap();
    psx.run(6);
    assert_eq!(reg(&psx, T2), 0);
    assert_eq!(reg(&psx, T3), 0xDEAD_BEEF);
}

#[test]
fn write_in_load_delay_slot_wins_over_the_load() {
    let mut psx = boot(&[
        lui(T0, 0x8000),
        imm(0x23, T0, T1, 0x0100),
        addiu(T1, 0, 7),
    ]);
    psx.bus_mut().write_word(0x8000_0100, 0xDEAD_BEEF).unwrap();
    psx.run(6);
    assert_eq!(reg(&psx, T1), 7);
}

#[test]
fn branch_delay_slot_always_executes() {
    let psx = run(&[
        imm(0x04, 0, 0, 2), // beq $zero, $zero, +2
        addiu(T0, 0, 1),
        addiu(T1, 0, 1),
        addiu(T2, 0, 1),
    ]);
    assert_eq!(reg(&psx, T0), 1);
    assert_eq!(reg(&psx, T1), 0);
    assert_eq!(reg(&psx, T2), 1);
}

#[test]
fn untaken_branch_still_runs_following_instruction() {
    let psx = run(&[
        imm(0x05, 0, 0, 2), // bne $zero, $zero, +2
        addiu(T0, 0, 1),
        addiu(T1, 0, 1),
    ]);
    assert_eq!(reg(&psx, T0), 1);
    assert_eq!(reg(&psx, T1), 1);
}

#[test]
fn jal_links_past_the_delay_slot() {
    let target = (BIOS_PROGRAM_BASE + 0x10) >> 2 & 0x03FF_FFFF;
    let psx = run(&[(0x03 << 26) | target, 0, 0, 0, addiu(T0, 0, 5)]);
    assert_eq!(reg(&psx, RA), BIOS_PROGRAM_BASE + 8);
    assert_eq!(reg(&psx, T0), 5);
}

#[test]
fn jalr_links_into_rd() {
    let psx = run(&[
        lui(T0, 0xBFC0),
        ori(T0, T0, 0x0014),
        special(T0, 0, T3, 0, 0x09), // jalr $t3, $t0
        0,
        addiu(T1, 0, 1),
        addiu(T2, 0, 1),
    ]);
    assert_eq!(reg(&psx, T3), BIOS_PROGRAM_BASE + 0x10);
    assert_eq!(reg(&psx, T1), 0);
    assert_eq!(reg(&psx, T2), 1);
}

#[rstest]
#[case::bltzal_not_taken(0x10, 0)]
#[case::bgezal_taken(0x11, 0)]
fn bcond_link_forms_always_write_ra(#[case] rt: u32, #[case] rs: u32) {
    let psx = run(&[imm(0x01, rs, rt, 4), 0]);
    assert_eq!(reg(&psx, RA), BIOS_PROGRAM_BASE + 8);
}

#[test]
fn multu_keeps_full_low_word() {
    let psx = run(&[
        lui(T0, 0x1234),
        ori(T0, T0, 0x5678),
        addiu(T1, 0, 0x10),
        special(T0, T1, 0, 0, 0x19), // multu
        special(0, 0, T2, 0, 0x10),  // mfhi
        special(0, 0, T3, 0, 0x12),  // mflo
    ]);
    assert_eq!(reg(&psx, T2), 0x1);
    assert_eq!(reg(&psx, T3), 0x2345_6780);
}

#[test]
fn mult_is_signed() {
    let psx = run(&[
        addiu(T0, 0, 0xFFFF),
        addiu(T1, 0, 3),
        special(T0, T1, 0, 0, 0x18),
        special(0, 0, T2, 0, 0x10),
        special(0, 0, T3, 0, 0x12),
    ]);
    assert_eq!(reg(&psx, T2), 0xFFFF_FFFF);
    assert_eq!(reg(&psx, T3), (-3i32) as u32);
}

#[rstest]
#[case::positive_by_zero(7, 0, 7, 0xFFFF_FFFF)]
#[case::negative_by_zero(0xFFFF_FFF9, 0, 0xFFFF_FFF9, 1)]
#[case::min_by_minus_one(0x8000_0000, 0xFFFF_FFFF, 0, 0x8000_0000)]
#[case::ordinary(0xFFFF_FFF9, 2, 0xFFFF_FFFF, 0xFFFF_FFFD)]
fn div_edge_cases(#[case] dividend: u32, #[case] divisor: u32, #[case] hi: u32, #[case] lo: u32) {
    let mut psx = boot(&[
        lui(T0, 0x8000),
        imm(0x23, T0, T1, 0x0100),
        imm(0x23, T0, T2, 0x0104),
        0,
        special(T1, T2, 0, 0, 0x1A), // div
    ]);
    psx.bus_mut().write_word(0x8000_0100, dividend).unwrap();
    psx.bus_mut().write_word(0x8000_0104, divisor).unwrap();
    psx.run(7);
    assert_eq!(psx.cpu().hi(), hi);
    assert_eq!(psx.cpu().lo(), lo);
}

#[test]
fn lwl_lwr_pair_reads_unaligned_word() {
    let mut psx = boot(&[
        lui(T0, 0x8000),
        imm(0x26, T0, T1, 0x0101), // lwr $t1, 0x101($t0)
        imm(0x22, T0, T1, 0x0104), // lwl $t1, 0x104($t0)
    ]);
    psx.bus_mut().write_word(0x8000_0100, 0x4433_2211).unwrap();
    psx.bus_mut().write_word(0x8000_0104, 0x8877_6655).unwrap();
    psx.run(5);
    assert_eq!(reg(&psx, T1), 0x5544_3322);
}

#[test]
fn swl_swr_pair_writes_unaligned_word() {
    let mut psx = boot(&[
        lui(T0, 0x8000),
        lui(T1, 0xAABB),
        ori(T1, T1, 0xCCDD),
        imm(0x2E, T0, T1, 0x0102), // swr $t1, 0x102($t0)
        imm(0x2A, T0, T1, 0x0105), // swl $t1, 0x105($t0)
    ]);
    psx.bus_mut().write_word(0x8000_0100, 0x4433_2211).unwrap();
    psx.bus_mut().write_word(0x8000_0104, 0x8877_6655).unwrap();
    psx.run(7);
    assert_eq!(psx.bus_mut().read_word(0x8000_0100).unwrap(), 0xCCDD_2211);
    assert_eq!(psx.bus_mut().read_word(0x8000_0104).unwrap(), 0x8877_AABB);
}

#[test]
fn isolated_cache_swallows_stores_and_loads() {
    let mut psx = boot(&[
        lui(T0, 0x0001),
        mtc0(T0, 12),
        lui(T1, 0x8000),
        addiu(T2, 0, 0x55),
        imm(0x2B, T1, T2, 0x0100), // sw $t2, 0x100($t1)
        imm(0x23, T1, T3, 0x0104), // lw $t3, 0x104($t1)
        mtc0(0, 12),
    ]);
    psx.bus_mut().write_word(0x8000_0104, 0x1234_5678).unwrap();
    psx.run(10);
    assert_eq!(psx.bus_mut().read_word(0x8000_0100).unwrap(), 0);
    assert_eq!(reg(&psx, T3), 0);
    assert!(!psx.cpu().cop0().cache_isolated());
}

#[test]
fn mfc0_result_is_delayed_like_a_load() {
    let psx = run(&[
        lui(T0, 0x0040),
        mtc0(T0, 12),
        (0x10 << 26) | (T1 << 16) | (12 << 11), // mfc0 $t1, $12
        addu(T2, T1, 0),
        addu(T3, T1, 0),
    ]);
    assert_eq!(reg(&psx, T2), 0);
    assert_eq!(reg(&psx, T3), 0x0040_0000);
}

#[test]
fn gte_registers_reachable_when_enabled() {
    let psx = run(&[
        lui(T0, 0x4000),
        mtc0(T0, 12),
        addiu(T1, 0, 0x1234),
        (0x12 << 26) | (0x04 << 21) | (T1 << 16) | (24 << 11), // mtc2 $t1, $24
        (0x12 << 26) | (T2 << 16) | (24 << 11),                // mfc2 $t2, $24
        0,
    ]);
    assert_eq!(reg(&psx, T2), 0x1234);
}

#[test]
fn unsigned_adds_wrap_without_trapping() {
    let program = [
        lui(T0, 0x7FFF),
        ori(T0, T0, 0xFFFF),
        addiu(T1, T0, 0x7FFF),
        addu(T2, T0, T0),
    ];
    let mut psx = boot(&program);
    let outcome = psx.run(program.len() as u64 + 2);
    assert_eq!(outcome.exceptions, 0);
    assert_eq!(reg(&psx, T1), 0x8000_7FFE);
    assert_eq!(reg(&psx, T2), 0xFFFF_FFFE);
}

#[test]
fn addi_round_trip_returns_to_zero() {
    let psx = run(&[
        imm(0x08, T0, T0, 10),     // addi $t0, $t0, 10
        imm(0x08, T0, T0, 0xFFF6), // addi $t0, $t0, -10
    ]);
    assert_eq!(reg(&psx, T0), 0);
}

#[test]
fn lui_replaces_the_whole_register() {
    let psx = run(&[addiu(T0, 0, 0x1234), lui(T0, 0xFFFF)]);
    assert_eq!(reg(&psx, T0), 0xFFFF_0000);
}

#[rstest]
#[case::sllv(0x04)]
#[case::srlv(0x06)]
#[case::srav(0x07)]
fn variable_shifts_use_only_low_five_bits(#[case] funct: u32) {
    let psx = run(&[
        addiu(T0, 0, 0xFFE0),
        lui(T1, 0x8000),
        ori(T1, T1, 0x0F0F),
        special(T0, T1, T2, 0, funct),
    ]);
    assert_eq!(reg(&psx, T0), 0xFFFF_FFE0);
    assert_eq!(reg(&psx, T2), 0x8000_0F0F);
}

proptest! {
    #[test]
    fn addu_and_subu_wrap(a: u16, b: u16) {
        let psx = run(&[
            lui(T0, a),
            lui(T1, b),
            addu(T2, T0, T1),
            special(T0, T1, T3, 0, 0x23), // subu
        ]);
        let (a, b) = (u32::from(a) << 16, u32::from(b) << 16);
        prop_assert_eq!(reg(&psx, T2), a.wrapping_add(b));
        prop_assert_eq!(reg(&psx, T3), a.wrapping_sub(b));
    }

    #[test]
    fn sra_preserves_sign(value: u16, shamt in 0u32..32) {
        let psx = run(&[lui(T0, value), special(0, T0, T1, shamt, 0x03)]);
        let expected = (((u32::from(value) << 16) as i32) >> shamt) as u32;
        prop_assert_eq!(reg(&psx, T1), expected);
    }

    #[test]
    fn register_zero_is_never_written(value: u16) {
        let psx = run(&[lui(0, value), addiu(0, 0, value)]);
        prop_assert_eq!(reg(&psx, 0), 0);
    }
}
