//! Operand resolution for trigger evaluation.
//!
//! At sample time every operand collapses into a [`CompareValue`]: `f32` for
//! anything float-ish, or the biggest supported integer with its signedness
//! preserved. Two compare values are then promoted to a common category so
//! the condition evaluators only ever run over three type combinations.

use super::config::Operand;
use crate::memory::MemoryReader;
use crate::rpv::RpvRegistry;
use crate::types::{AnyType, BiggestSint, BiggestUint, VariableType};

/// A fetched operand, widened for comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareValue {
    Float(f32),
    Sint(BiggestSint),
    Uint(BiggestUint),
}

impl CompareValue {
    pub fn as_f32(self) -> f32 {
        match self {
            CompareValue::Float(v) => v,
            CompareValue::Sint(v) => v as f32,
            CompareValue::Uint(v) => v as f32,
        }
    }
}

/// A pair of operands promoted to their common comparison category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PromotedPair {
    Float(f32, f32),
    Sint(BiggestSint, BiggestSint),
    Uint(BiggestUint, BiggestUint),
}

/// Promotes two compare values: any float side pulls both to `f32`, a mixed
/// signed/unsigned pair goes signed, and only uint/uint stays unsigned.
pub fn promote(lhs: CompareValue, rhs: CompareValue) -> PromotedPair {
    use CompareValue::*;
    match (lhs, rhs) {
        (Float(_), _) | (_, Float(_)) => PromotedPair::Float(lhs.as_f32(), rhs.as_f32()),
        (Sint(a), Sint(b)) => PromotedPair::Sint(a, b),
        (Sint(a), Uint(b)) => PromotedPair::Sint(a, b as BiggestSint),
        (Uint(a), Sint(b)) => PromotedPair::Sint(a as BiggestSint, b),
        (Uint(a), Uint(b)) => PromotedPair::Uint(a, b),
    }
}

/// Resolves an operand to a compare value.
///
/// Returns `None` when the operand cannot be fetched (rejected memory read,
/// unresolvable RPV, absent callback); the caller treats that as a condition
/// that evaluates to false.
pub fn fetch_operand<M: MemoryReader>(
    operand: &Operand,
    memory: &M,
    rpvs: &RpvRegistry,
) -> Option<CompareValue> {
    match *operand {
        Operand::Literal { val } => Some(CompareValue::Float(val)),
        Operand::Var { addr, datatype } => {
            read_variable(memory, addr, datatype).map(widen)
        }
        Operand::VarBit { addr, datatype, bit_offset, bit_size } => {
            read_bitfield(memory, addr, datatype, bit_offset, bit_size)
        }
        Operand::Rpv { id } => {
            let rpv = rpvs.get(id)?;
            rpvs.read(&rpv).map(widen)
        }
    }
}

fn widen(value: AnyType) -> CompareValue {
    match value {
        AnyType::Bool(v) => CompareValue::Uint(v as BiggestUint),
        AnyType::Uint8(v) => CompareValue::Uint(v as BiggestUint),
        AnyType::Uint16(v) => CompareValue::Uint(v as BiggestUint),
        AnyType::Uint32(v) => CompareValue::Uint(v as BiggestUint),
        #[cfg(feature = "support-64bits")]
        AnyType::Uint64(v) => CompareValue::Uint(v as BiggestUint),
        AnyType::Sint8(v) => CompareValue::Sint(v as BiggestSint),
        AnyType::Sint16(v) => CompareValue::Sint(v as BiggestSint),
        AnyType::Sint32(v) => CompareValue::Sint(v as BiggestSint),
        #[cfg(feature = "support-64bits")]
        AnyType::Sint64(v) => CompareValue::Sint(v as BiggestSint),
        AnyType::Float32(v) => CompareValue::Float(v),
        #[cfg(feature = "support-64bits")]
        AnyType::Float64(v) => CompareValue::Float(v as f32),
    }
}

/// Reads a typed variable from target memory in native byte order.
pub(crate) fn read_variable<M: MemoryReader>(
    memory: &M,
    addr: usize,
    datatype: VariableType,
) -> Option<AnyType> {
    let mut raw = [0u8; 8];
    let size = datatype.size() as usize;
    if size == 0 {
        return None;
    }
    if !memory.read_memory(addr, &mut raw[..size]) {
        return None;
    }

    let value = match datatype {
        VariableType::Bool => AnyType::Bool(raw[0] != 0),
        VariableType::Uint8 => AnyType::Uint8(raw[0]),
        VariableType::Sint8 => AnyType::Sint8(raw[0] as i8),
        VariableType::Uint16 => AnyType::Uint16(u16::from_ne_bytes([raw[0], raw[1]])),
        VariableType::Sint16 => AnyType::Sint16(i16::from_ne_bytes([raw[0], raw[1]])),
        VariableType::Uint32 => AnyType::Uint32(u32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]])),
        VariableType::Sint32 => AnyType::Sint32(i32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]])),
        VariableType::Float32 => AnyType::Float32(f32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]])),
        #[cfg(feature = "support-64bits")]
        VariableType::Uint64 => AnyType::Uint64(u64::from_ne_bytes(raw)),
        #[cfg(feature = "support-64bits")]
        VariableType::Sint64 => AnyType::Sint64(i64::from_ne_bytes(raw)),
        #[cfg(feature = "support-64bits")]
        VariableType::Float64 => AnyType::Float64(f64::from_ne_bytes(raw)),
        VariableType::Unknown => return None,
    };
    Some(value)
}

/// Reads a bitfield: the underlying integer is fetched whole, then shifted
/// and masked. Signed declared types sign-extend from the field's top bit.
fn read_bitfield<M: MemoryReader>(
    memory: &M,
    addr: usize,
    datatype: VariableType,
    bit_offset: u8,
    bit_size: u8,
) -> Option<CompareValue> {
    let raw: BiggestUint = match read_variable(memory, addr, datatype)? {
        AnyType::Bool(v) => v as BiggestUint,
        AnyType::Uint8(v) => v as BiggestUint,
        AnyType::Uint16(v) => v as BiggestUint,
        AnyType::Uint32(v) => v as BiggestUint,
        #[cfg(feature = "support-64bits")]
        AnyType::Uint64(v) => v as BiggestUint,
        AnyType::Sint8(v) => v as u8 as BiggestUint,
        AnyType::Sint16(v) => v as u16 as BiggestUint,
        AnyType::Sint32(v) => v as u32 as BiggestUint,
        #[cfg(feature = "support-64bits")]
        AnyType::Sint64(v) => v as u64 as BiggestUint,
        // Bitfields only make sense over integers; configure() rejects the
        // rest, so a float here means the operand was never validated.
        _ => return None,
    };

    let mask: BiggestUint = if (bit_size as u32) >= BiggestUint::BITS {
        BiggestUint::MAX
    } else {
        ((1 as BiggestUint) << bit_size) - 1
    };
    let field = (raw >> bit_offset) & mask;

    if datatype.is_signed_int() {
        let sign_bit = (1 as BiggestUint) << (bit_size - 1);
        let extended = if (bit_size as u32) < BiggestUint::BITS && field & sign_bit != 0 {
            field | !mask
        } else {
            field
        };
        Some(CompareValue::Sint(extended as BiggestSint))
    } else {
        Some(CompareValue::Uint(field))
    }
}
