//! Compile-time capacities of the agent.
//!
//! These are global for the crate and should be tuned once per project.
//! Every collection in the datalogging subsystem is bounded by one of these
//! constants; there is no dynamic allocation anywhere.

/// Number of operands a trigger condition can take.
pub const MAX_OPERANDS: usize = 2;

/// Maximum number of loggable items in a single configuration.
pub const MAX_LOGGED_SIGNALS: usize = 32;

/// Maximum number of raw memory blocks among the logged items.
pub const MAX_MEMORY_BLOCKS: usize = 16;

/// Depth of the bounded command/status queues between the main handler and
/// the sampling loop. Commands are rare; a small queue is enough.
pub const LOOP_QUEUE_DEPTH: usize = 4;
