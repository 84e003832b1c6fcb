// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the promonitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register codec for the Modbus register map
//!
//! Every physical quantity served by the emulator is transmitted as an
//! IEEE-754 32-bit float spread over two consecutive 16-bit holding
//! registers in big-endian byte order: the high word carries the first two
//! bytes of the float, the low word the last two.
//!
//! ## Register Map
//!
//! | Base Address | Quantity | Unit |
//! |--------------|-------------|------|
//! | 1000, 1002, 1004, 1006 | Zone temperature | °C |
//! | 2000, 2002, 2004 | Zone humidity | %RH |
//! | 3000, 3002 | Duct pressure | hPa |
//! | 4000, 4002, 4004 | Feeder power | kW |
//! | 5000, 5002 | CO2 concentration | ppm |
//!
//! Addresses not listed above read as zero.

/// Number of consecutive 16-bit registers occupied by one sensor value.
pub const REGISTERS_PER_SENSOR: u16 = 2;

/// Encode a value as a pair of big-endian register words.
///
/// The value is truncated to `f32` precision first; values outside the
/// `f32` range saturate to ±infinity per IEEE-754 conversion rules, which
/// is acceptable for this register map.
pub fn encode_f32(value: f64) -> (u16, u16) {
    let bytes = (value as f32).to_be_bytes();
    (
        u16::from_be_bytes([bytes[0], bytes[1]]),
        u16::from_be_bytes([bytes[2], bytes[3]]),
    )
}

/// Decode a pair of register words back into a float.
///
/// Inverse of [`encode_f32`]: `decode_f32(encode_f32(v))` reproduces `v`
/// exactly for any value representable as `f32`.
pub fn decode_f32(hi: u16, lo: u16) -> f64 {
    let hi = hi.to_be_bytes();
    let lo = lo.to_be_bytes();
    f32::from_be_bytes([hi[0], hi[1], lo[0], lo[1]]) as f64
}

/// Base address of the sensor owning the given register slot.
///
/// Each sensor occupies two consecutive registers starting at an even
/// address, so the owner of any slot is found by clearing the low bit.
pub fn base_address(slot: u16) -> u16 {
    slot / REGISTERS_PER_SENSOR * REGISTERS_PER_SENSOR
}

/// Whether the given slot addresses the high word of its sensor pair.
pub fn is_high_word(slot: u16) -> bool {
    slot % REGISTERS_PER_SENSOR == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_exact_for_f32_values() {
        for v in [0.0, 21.5, -40.0, 1013.25, 999.99, f64::from(f32::MAX)] {
            let (hi, lo) = encode_f32(v);
            assert_eq!(decode_f32(hi, lo), v, "round trip failed for {v}");
        }
    }

    #[test]
    fn round_trip_truncates_to_f32_precision() {
        let v = 21.123456789012345_f64;
        let (hi, lo) = encode_f32(v);
        assert_eq!(decode_f32(hi, lo), f64::from(v as f32));
    }

    #[test]
    fn encoding_is_big_endian() {
        // 1.0f32 = 0x3F800000
        let (hi, lo) = encode_f32(1.0);
        assert_eq!(hi, 0x3F80);
        assert_eq!(lo, 0x0000);
    }

    #[test]
    fn out_of_range_saturates_to_infinity() {
        let (hi, lo) = encode_f32(1e300);
        assert_eq!(decode_f32(hi, lo), f64::INFINITY);
    }

    #[test]
    fn slot_ownership() {
        assert_eq!(base_address(1000), 1000);
        assert_eq!(base_address(1001), 1000);
        assert_eq!(base_address(1002), 1002);
        assert!(is_high_word(2000));
        assert!(!is_high_word(2001));
    }
}
