//! Triggered signal capture into a ring buffer.
//!
//! The host describes what to sample and when to fire; the sampling loop
//! feeds rows into the ring until the trigger condition has held long
//! enough, then keeps going until the configured share of the ring is
//! post-trigger data. The finished acquisition is streamed back out in
//! chunks.

pub mod config;
pub mod datalogger;
pub mod encoder;
pub mod link;
pub mod operand;
pub mod trigger;

pub use config::{Configuration, LoggableItem, Operand, TriggerCondition, TriggerConfig};
pub use datalogger::{DataLogger, DataloggerState, ReadChunk, StatusSnapshot};
pub use encoder::{RawEncoder, RawReader};
pub use link::{ConfigSlot, LoopCommand, LoopId, LoopMessage, Ownership, SharedStatus};

use thiserror_no_std::Error;

/// Datalogging fault kinds.
///
/// Producer-side faults are latched on the datalogger and observed through
/// the published status; consumer-side faults are returned to the protocol
/// layer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DataloggingError {
    #[error("configuration rejected")]
    ConfigInvalid,

    #[error("buffer cannot hold a single entry")]
    BufferTooSmall,

    #[error("datalogger released by a loop that does not own it")]
    UnexpectedRelease,

    #[error("datalogger claimed while another loop owns it")]
    UnexpectedClaim,

    #[error("memory read rejected during sampling")]
    ReadMemoryFailed,

    #[error("no completed acquisition to read")]
    AcquisitionNotReady,
}
