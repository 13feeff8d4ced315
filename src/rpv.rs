//! Runtime Published Values.
//!
//! An RPV is a named, typed value the firmware exposes through a callback
//! instead of a memory address. The registry is a static table owned by the
//! integrator; the agent only ever looks values up and invokes the callback.

use crate::types::{AnyType, VariableType};

/// Identity and type of one published value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimePublishedValue {
    pub id: u16,
    pub datatype: VariableType,
}

/// Callback resolving the current value of an RPV.
///
/// Returns `None` when the value cannot be produced right now; the sampling
/// path treats that the same way as a rejected memory read.
pub type RpvReadCallback = fn(&RuntimePublishedValue) -> Option<AnyType>;

pub struct RpvRegistry<'a> {
    rpvs: &'a [RuntimePublishedValue],
    read_callback: Option<RpvReadCallback>,
}

impl<'a> RpvRegistry<'a> {
    pub const fn new(rpvs: &'a [RuntimePublishedValue], read_callback: RpvReadCallback) -> Self {
        Self { rpvs, read_callback: Some(read_callback) }
    }

    /// A registry publishing nothing.
    pub const fn empty() -> Self {
        Self { rpvs: &[], read_callback: None }
    }

    pub fn get(&self, id: u16) -> Option<RuntimePublishedValue> {
        self.rpvs.iter().copied().find(|rpv| rpv.id == id)
    }

    pub fn has_read_callback(&self) -> bool {
        self.read_callback.is_some()
    }

    /// Reads the current value of `rpv` through the registered callback.
    pub fn read(&self, rpv: &RuntimePublishedValue) -> Option<AnyType> {
        self.read_callback.and_then(|callback| callback(rpv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RPVS: [RuntimePublishedValue; 2] = [
        RuntimePublishedValue { id: 0x1234, datatype: VariableType::Uint32 },
        RuntimePublishedValue { id: 0x5678, datatype: VariableType::Float32 },
    ];

    fn read_callback(rpv: &RuntimePublishedValue) -> Option<AnyType> {
        match rpv.id {
            0x1234 => Some(AnyType::Uint32(0xaabbccdd)),
            0x5678 => Some(AnyType::Float32(3.1415926)),
            _ => None,
        }
    }

    #[test]
    fn test_lookup_and_read() {
        let registry = RpvRegistry::new(&RPVS, read_callback);
        let rpv = registry.get(0x1234).unwrap();
        assert_eq!(rpv.datatype, VariableType::Uint32);
        assert_eq!(registry.read(&rpv), Some(AnyType::Uint32(0xaabbccdd)));
        assert!(registry.get(0x9999).is_none());
    }

    #[test]
    fn test_empty_registry() {
        let registry = RpvRegistry::empty();
        assert!(!registry.has_read_callback());
        assert!(registry.get(0x1234).is_none());
    }
}
