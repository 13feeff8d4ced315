//! Datascope: on-target agent core for remote debugging and datalogging.
//!
//! A resource-constrained device embeds this crate to expose its memory and
//! its Runtime Published Values to an external host, and to capture signals
//! into a ring buffer gated by a programmable trigger: a software logic
//! analyzer running next to the firmware. All storage is caller-provided;
//! the crate never allocates.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod codecs;
pub mod datalogging;
pub mod limits;
pub mod memory;
pub mod rpv;
pub mod timebase;
pub mod types;
