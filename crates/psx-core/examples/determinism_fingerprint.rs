//! Deterministic replay fingerprint used for cross-host comparison.
//!
//! Runs a small BIOS program that loops over RAM and takes a syscall into a
//! RAM handler, then hashes the save state at the end.

use log as _;
use proptest as _;
use psx_core::{CoreConfig, Psx, TickOutcome};
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const RUN_TICKS: u64 = 20_000;

const fn imm(op: u32, rs: u32, rt: u32, value: u16) -> u32 {
    (op << 26) | (rs << 21) | (rt << 16) | value as u32
}

const fn special(rs: u32, rt: u32, rd: u32, shamt: u32, funct: u32) -> u32 {
    (rs << 21) | (rt << 16) | (rd << 11) | (shamt << 6) | funct
}

/// Fills RAM with a multiplicative sequence, raising a syscall every
/// iteration.
fn program() -> Vec<u32> {
    vec![
        imm(0x0F, 0, 8, 0x8000),        // lui $t0, 0x8000
        imm(0x09, 0, 9, 0x0001),        // addiu $t1, $zero, 1
        imm(0x09, 0, 10, 0x0005),       // addiu $t2, $zero, 5
        special(9, 10, 0, 0, 0x19),     // multu $t1, $t2
        special(0, 0, 9, 0, 0x12),      // mflo $t1
        imm(0x2B, 8, 9, 0x1000),        // sw $t1, 0x1000($t0)
        0x0000_000C,                    // syscall
        imm(0x04, 0, 0, 0xFFFB),        // beq $zero, $zero, -5
        imm(0x09, 8, 8, 0x0004),        // addiu $t0, $t0, 4
    ]
}

/// Skips the faulting syscall and returns with `RFE`.
fn handler() -> Vec<u32> {
    vec![
        0x401A_7000,               // mfc0 $k0, $14
        0,
        imm(0x09, 26, 26, 0x0004), // addiu $k0, $k0, 4
        special(26, 0, 0, 0, 0x08), // jr $k0
        0x4200_0010,               // rfe
    ]
}

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn fingerprint() -> String {
    let mut bios = vec![0u8; 512 * 1024];
    for (index, word) in program().into_iter().enumerate() {
        bios[index * 4..index * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    let mut psx = Psx::new(&bios, CoreConfig::default()).expect("BIOS image is 512 KiB");
    for (index, word) in handler().into_iter().enumerate() {
        psx.bus_mut()
            .write_word(0x8000_0080 + 4 * index as u32, word)
            .expect("exception vector is in RAM");
    }

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for _ in 0..RUN_TICKS {
        match psx.tick() {
            TickOutcome::Retired => {}
            TickOutcome::Exception {
                exception,
                epc,
                vector,
            } => {
                hash_bytes(&mut hash, &[exception.as_u8()]);
                hash_bytes(&mut hash, &epc.to_le_bytes());
                hash_bytes(&mut hash, &vector.to_le_bytes());
            }
        }
    }

    hash_bytes(&mut hash, &psx.ticks().to_le_bytes());
    hash_bytes(&mut hash, &psx.cpu().current_pc().to_le_bytes());
    hash_bytes(&mut hash, &psx.save_state());

    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
