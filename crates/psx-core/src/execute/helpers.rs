//! Pure arithmetic helpers for the execute units.

#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

/// Signed 32-bit addition, `None` on overflow.
#[must_use]
pub const fn checked_add(a: u32, b: u32) -> Option<u32> {
    match (a as i32).checked_add(b as i32) {
        Some(sum) => Some(sum as u32),
        None => None,
    }
}

/// Signed 32-bit subtraction, `None` on overflow.
#[must_use]
pub const fn checked_sub(a: u32, b: u32) -> Option<u32> {
    match (a as i32).checked_sub(b as i32) {
        Some(diff) => Some(diff as u32),
        None => None,
    }
}

/// `DIV`: returns `(hi, lo)`. Never traps.
#[must_use]
pub const fn divide_signed(dividend: u32, divisor: u32) -> (u32, u32) {
    let n = dividend as i32;
    let d = divisor as i32;
    if d == 0 {
        let lo = if n >= 0 { 0xFFFF_FFFF } else { 1 };
        (dividend, lo)
    } else if n == i32::MIN && d == -1 {
        (0, i32::MIN as u32)
    } else {
        ((n % d) as u32, (n / d) as u32)
    }
}

/// `DIVU`: returns `(hi, lo)`. Never traps.
#[must_use]
pub const fn divide_unsigned(dividend: u32, divisor: u32) -> (u32, u32) {
    if divisor == 0 {
        (dividend, 0xFFFF_FFFF)
    } else {
        (dividend % divisor, dividend / divisor)
    }
}

/// `LWL`: merges the aligned `word` into `current` by the low address bits.
#[must_use]
pub const fn merge_load_left(current: u32, word: u32, addr: u32) -> u32 {
    match addr & 3 {
        0 => (current & 0x00FF_FFFF) | (word << 24),
        1 => (current & 0x0000_FFFF) | (word << 16),
        2 => (current & 0x0000_00FF) | (word << 8),
        _ => word,
    }
}

/// `LWR`: merges the aligned `word` into `current` by the low address bits.
#[must_use]
pub const fn merge_load_right(current: u32, word: u32, addr: u32) -> u32 {
    match addr & 3 {
        0 => word,
        1 => (current & 0xFF00_0000) | (word >> 8),
        2 => (current & 0xFFFF_0000) | (word >> 16),
        _ => (current & 0xFFFF_FF00) | (word >> 24),
    }
}

/// `SWL`: merges register `value` into the aligned `memory` word.
#[must_use]
pub const fn merge_store_left(memory: u32, value: u32, addr: u32) -> u32 {
    match addr & 3 {
        0 => (memory & 0xFFFF_FF00) | (value >> 24),
        1 => (memory & 0xFFFF_0000) | (value >> 16),
        2 => (memory & 0xFF00_0000) | (value >> 8),
        _ => value,
    }
}

/// `SWR`: merges register `value` into the aligned `memory` word.
#[must_use]
pub const fn merge_store_right(memory: u32, value: u32, addr: u32) -> u32 {
    match addr & 3 {
        0 => value,
        1 => (memory & 0x0000_00FF) | (value << 8),
        2 => (memory & 0x0000_FFFF) | (value << 16),
        _ => (memory & 0x00FF_FFFF) | (value << 24),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn division_edge_cases_match_hardware() {
        assert_eq!(divide_signed(5, 0), (5, 0xFFFF_FFFF));
        assert_eq!(divide_signed(0, 0), (0, 0xFFFF_FFFF));
        assert_eq!(divide_signed(-5i32 as u32, 0), (-5i32 as u32, 1));
        assert_eq!(divide_signed(0x8000_0000, 0xFFFF_FFFF), (0, 0x8000_0000));
        assert_eq!(divide_signed(-7i32 as u32, 2), (-1i32 as u32, -3i32 as u32));
        assert_eq!(divide_unsigned(9, 0), (9, 0xFFFF_FFFF));
        assert_eq!(divide_unsigned(9, 4), (1, 2));
    }

    #[test]
    fn overflow_detection_uses_signed_range() {
        assert_eq!(checked_add(0x7FFF_FFFF, 1), None);
        assert_eq!(checked_add(0xFFFF_FFFF, 1), Some(0));
        assert_eq!(checked_sub(0x8000_0000, 1), None);
        assert_eq!(checked_sub(0, 1), Some(0xFFFF_FFFF));
    }

    proptest! {
        #[test]
        fn lwl_then_lwr_rebuilds_unaligned_word(
            base in 0u32..0x100,
            offset in 0u32..4,
            lo_word: u32,
            hi_word: u32,
            garbage: u32,
        ) {
            // Little-endian memory: word at `addr` spans lo_word[offset..] and hi_word[..offset].
            let addr = base * 4 + offset;
            let expected = if offset == 0 {
                lo_word
            } else {
                (lo_word >> (8 * offset)) | (hi_word << (32 - 8 * offset))
            };
            let left_addr = addr + 3;
            let left_word = if left_addr & !3 == addr & !3 { lo_word } else { hi_word };
            let merged = merge_load_left(garbage, left_word, left_addr);
            let merged = merge_load_right(merged, lo_word, addr);
            prop_assert_eq!(merged, expected);
        }

        #[test]
        fn swl_then_swr_store_every_byte(offset in 0u32..4, value: u32, lo: u32, hi: u32) {
            let addr = 0x100 + offset;
            let left_addr = addr + 3;
            let (mut lo_mem, mut hi_mem) = (lo, hi);
            if left_addr & !3 == addr & !3 {
                lo_mem = merge_store_left(lo_mem, value, left_addr);
            } else {
                hi_mem = merge_store_left(hi_mem, value, left_addr);
            }
            lo_mem = merge_store_right(lo_mem, value, addr);

            let mut bytes = [0u8; 8];
            bytes[..4].copy_from_slice(&lo_mem.to_le_bytes());
            bytes[4..].copy_from_slice(&hi_mem.to_le_bytes());
            let start = offset as usize;
            let stored = u32::from_le_bytes([
                bytes[start],
                bytes[start + 1],
                bytes[start + 2],
                bytes[start + 3],
            ]);
            prop_assert_eq!(stored, value);
        }
    }
}
