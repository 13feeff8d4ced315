//! Big-endian serialization used by the raw sample format.
//!
//! Memory blocks are copied in the target's native layout; everything the
//! agent produces itself (RPV values, timestamps) goes out big-endian.

use crate::types::AnyType;

pub fn encode_16_bits_big_endian(value: u16, dst: &mut [u8]) {
    dst[..2].copy_from_slice(&value.to_be_bytes());
}

pub fn encode_32_bits_big_endian(value: u32, dst: &mut [u8]) {
    dst[..4].copy_from_slice(&value.to_be_bytes());
}

#[cfg(feature = "support-64bits")]
pub fn encode_64_bits_big_endian(value: u64, dst: &mut [u8]) {
    dst[..8].copy_from_slice(&value.to_be_bytes());
}

/// Serializes a value big-endian into `dst` and returns the number of bytes
/// written, which is always the value's natural size.
pub fn encode_anytype_big_endian(value: &AnyType, dst: &mut [u8]) -> usize {
    match *value {
        AnyType::Bool(v) => dst[0] = v as u8,
        AnyType::Uint8(v) => dst[0] = v,
        AnyType::Sint8(v) => dst[0] = v as u8,
        AnyType::Uint16(v) => encode_16_bits_big_endian(v, dst),
        AnyType::Sint16(v) => encode_16_bits_big_endian(v as u16, dst),
        AnyType::Uint32(v) => encode_32_bits_big_endian(v, dst),
        AnyType::Sint32(v) => encode_32_bits_big_endian(v as u32, dst),
        AnyType::Float32(v) => encode_32_bits_big_endian(v.to_bits(), dst),
        #[cfg(feature = "support-64bits")]
        AnyType::Uint64(v) => encode_64_bits_big_endian(v, dst),
        #[cfg(feature = "support-64bits")]
        AnyType::Sint64(v) => encode_64_bits_big_endian(v as u64, dst),
        #[cfg(feature = "support-64bits")]
        AnyType::Float64(v) => encode_64_bits_big_endian(v.to_bits(), dst),
    }
    value.size() as usize
}
