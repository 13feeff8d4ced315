//! Host-built acquisition configuration.
//!
//! A [`Configuration`] is assembled by the host (through the protocol layer,
//! out of scope here), staged to the sampling loop and copied into the
//! datalogger on `configure()`. Everything is plain data with bounded
//! storage; addresses are carried as `usize` so a configuration can cross
//! execution contexts.

use heapless::Vec;

use super::DataloggingError;
use crate::limits::{MAX_LOGGED_SIGNALS, MAX_MEMORY_BLOCKS, MAX_OPERANDS};
use crate::rpv::RpvRegistry;
use crate::types::VariableType;

/// One operand of the trigger condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    /// Fixed value known at configuration time.
    Literal { val: f32 },
    /// Typed variable in target memory.
    Var { addr: usize, datatype: VariableType },
    /// Bitfield inside an integer variable.
    VarBit { addr: usize, datatype: VariableType, bit_offset: u8, bit_size: u8 },
    /// Runtime Published Value, resolved through the registry.
    Rpv { id: u16 },
}

/// One column of a sample row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggableItem {
    /// Raw memory block, copied in the target's native layout.
    Memory { addr: usize, size: u8 },
    /// Published value, serialized big-endian.
    Rpv { id: u16 },
    /// The agent's 32-bit timestamp, serialized big-endian.
    Time,
}

/// Relational and delta conditions the trigger can evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCondition {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqualThan,
    GreaterThan,
    GreaterOrEqualThan,
    /// Fires when operand 0 has moved by more than operand 1 away from the
    /// value it had when the trigger was armed.
    ChangeMoreThan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerConfig {
    pub condition: TriggerCondition,
    pub operand_count: u8,
    pub hold_time_us: u32,
    pub operands: [Operand; MAX_OPERANDS],
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            condition: TriggerCondition::Equal,
            operand_count: 2,
            hold_time_us: 0,
            operands: [Operand::Literal { val: 0.0 }; MAX_OPERANDS],
        }
    }
}

/// Complete acquisition setup: what to sample, how often, and when to stop.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub items_to_log: Vec<LoggableItem, MAX_LOGGED_SIGNALS>,
    /// 1-in-N subsampling applied by the sampling loop. Minimum 1.
    pub decimation: u16,
    /// Fraction of the acquisition window kept before the trigger, as
    /// `probe_location / 255`. 255 keeps everything pre-trigger, 0 nothing.
    pub probe_location: u8,
    /// Acquisition deadline measured from arm. 0 disables the timeout.
    pub timeout_us: u32,
    pub trigger: TriggerConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            items_to_log: Vec::new(),
            decimation: 1,
            probe_location: 128,
            timeout_us: 0,
            trigger: TriggerConfig::default(),
        }
    }
}

impl Configuration {
    /// Checks everything that can be checked without touching target memory.
    ///
    /// The ring-buffer geometry (entry size vs. buffer size) is validated by
    /// the encoder when it is reset against this configuration.
    pub fn validate(&self, rpvs: &RpvRegistry) -> Result<(), DataloggingError> {
        if self.items_to_log.is_empty() || self.decimation == 0 {
            return Err(DataloggingError::ConfigInvalid);
        }

        let mut memory_blocks = 0usize;
        for item in &self.items_to_log {
            match *item {
                LoggableItem::Memory { size, .. } => {
                    if size == 0 {
                        return Err(DataloggingError::ConfigInvalid);
                    }
                    memory_blocks += 1;
                }
                LoggableItem::Rpv { id } => validate_rpv(id, rpvs)?,
                LoggableItem::Time => {}
            }
        }
        if memory_blocks > MAX_MEMORY_BLOCKS {
            return Err(DataloggingError::ConfigInvalid);
        }

        let operand_count = self.trigger.operand_count as usize;
        if operand_count == 0 || operand_count > MAX_OPERANDS {
            return Err(DataloggingError::ConfigInvalid);
        }
        for operand in &self.trigger.operands[..operand_count] {
            validate_operand(operand, rpvs)?;
        }

        Ok(())
    }
}

fn validate_rpv(id: u16, rpvs: &RpvRegistry) -> Result<(), DataloggingError> {
    if !rpvs.has_read_callback() {
        return Err(DataloggingError::ConfigInvalid);
    }
    match rpvs.get(id) {
        Some(rpv) if rpv.datatype.size() > 0 => Ok(()),
        _ => Err(DataloggingError::ConfigInvalid),
    }
}

fn validate_operand(operand: &Operand, rpvs: &RpvRegistry) -> Result<(), DataloggingError> {
    match *operand {
        Operand::Literal { .. } => Ok(()),
        Operand::Var { datatype, .. } => {
            if datatype.size() == 0 {
                Err(DataloggingError::ConfigInvalid)
            } else {
                Ok(())
            }
        }
        Operand::VarBit { datatype, bit_offset, bit_size, .. } => {
            let total_bits = datatype.size() as u32 * 8;
            let in_range = bit_size > 0 && bit_offset as u32 + bit_size as u32 <= total_bits;
            if in_range && (datatype.is_signed_int() || datatype.is_unsigned_int()) {
                Ok(())
            } else {
                Err(DataloggingError::ConfigInvalid)
            }
        }
        Operand::Rpv { id } => validate_rpv(id, rpvs),
    }
}
