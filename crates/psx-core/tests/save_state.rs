//! Save-state capture and restore: bit-identical round trips, deterministic
//! resumption and rejection of malformed buffers.

#![allow(clippy::pedantic, clippy::nursery, clippy::unreadable_literal)]

use log as _;
use proptest::prelude::*;
use psx_core::peripherals::interrupt::{Irq, I_MASK};
use psx_core::{CoreConfig, Psx, SaveStateError};
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const T0: u32 = 8;
const T1: u32 = 9;

const fn imm(op: u32, rs: u32, rt: u32, value: u16) -> u32 {
    (op << 26) | (rs << 21) | (rt << 16) | value as u32
}

/// Counts `$t1` upward and stores it to RAM forever.
fn counter_program() -> Vec<u32> {
    vec![
        imm(0x0F, 0, T0, 0x8000),     // lui $t0, 0x8000
        imm(0x09, T1, T1, 1),         // addiu $t1, $t1, 1
        imm(0x2B, T0, T1, 0x0200),    // sw $t1, 0x200($t0)
        imm(0x05, T1, 0, 0xFFFD),     // bne $t1, $zero, -3
        imm(0x09, T0, T0, 4),         // addiu $t0, $t0, 4
    ]
}

fn boot(program: &[u32]) -> Psx {
    let mut bios = vec![0u8; 512 * 1024];
    for (index, word) in program.iter().enumerate() {
        bios[index * 4..index * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    Psx::new(&bios, CoreConfig::default()).unwrap()
}

#[test]
fn round_trip_is_bit_identical() {
    let mut psx = boot(&counter_program());
    psx.run(123);
    let snapshot = psx.save_state();

    let mut restored = boot(&counter_program());
    restored.load_state(&snapshot).unwrap();
    assert_eq!(restored.save_state(), snapshot);
    assert_eq!(restored.cpu(), psx.cpu());
}

#[test]
fn restored_machine_continues_identically() {
    let mut psx = boot(&counter_program());
    psx.bus_mut().write_word(I_MASK, u32::from(Irq::Vblank.bit())).unwrap();
    psx.run(500);
    let snapshot = psx.save_state();
    psx.run(1000);
    let expected = psx.save_state();

    psx.load_state(&snapshot).unwrap();
    psx.run(1000);
    assert_eq!(psx.save_state(), expected);
}

#[test]
fn load_restores_memory_written_after_capture() {
    let mut psx = boot(&counter_program());
    psx.run(40);
    let snapshot = psx.save_state();
    let before = psx.bus_mut().read_word(0x8000_0200).unwrap();

    psx.bus_mut().write_word(0x8000_0200, 0xFFFF_FFFF).unwrap();
    psx.bus_mut().write_word(0x1F80_0000, 0xFFFF_FFFF).unwrap();
    psx.load_state(&snapshot).unwrap();
    assert_eq!(psx.bus_mut().read_word(0x8000_0200).unwrap(), before);
    assert_eq!(psx.bus_mut().read_word(0x1F80_0000).unwrap(), 0);
}

#[test]
fn trailing_bytes_are_rejected() {
    let mut psx = boot(&counter_program());
    let mut snapshot = psx.save_state();
    snapshot.push(0);
    assert_eq!(
        psx.load_state(&snapshot),
        Err(SaveStateError::TrailingBytes { remaining: 1 })
    );
}

#[test]
fn empty_buffer_is_rejected() {
    let mut psx = boot(&counter_program());
    assert!(matches!(
        psx.load_state(&[]),
        Err(SaveStateError::Truncated { offset: 0, .. })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn truncated_state_leaves_machine_untouched(cut in 0usize..4096, ticks in 1u64..64) {
        let mut psx = boot(&counter_program());
        psx.run(ticks);
        let snapshot = psx.save_state();
        let before = psx.clone();

        let keep = snapshot.len() - 1 - cut.min(snapshot.len() - 1);
        let result = psx.load_state(&snapshot[..keep]);
        let is_truncated = matches!(result, Err(SaveStateError::Truncated { .. }));
        prop_assert!(is_truncated);
        prop_assert_eq!(psx.cpu(), before.cpu());
        prop_assert_eq!(psx.save_state(), snapshot);
    }

    #[test]
    fn any_tick_count_round_trips(ticks in 0u64..300) {
        let mut psx = boot(&counter_program());
        psx.run(ticks);
        let snapshot = psx.save_state();
        let mut other = boot(&[]);
        other.load_state(&snapshot).unwrap();
        prop_assert_eq!(other.save_state(), snapshot);
    }
}
