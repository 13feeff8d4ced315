//! Link between the sampling loop and the main protocol handler.
//!
//! The two contexts never share the datalogger directly. The producer
//! publishes a [`StatusSnapshot`] once per tick; the consumer stages
//! configurations and posts bounded, non-blocking commands; both sides go
//! through the ownership handshake before the datalogger moves from one
//! loop to another. Everything here is a small POD behind a critical
//! section, so a single-core target with interrupt-context producers is
//! fine.

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use log::error;

use super::config::Configuration;
use super::datalogger::StatusSnapshot;
use super::DataloggingError;
use crate::limits::LOOP_QUEUE_DEPTH;

/// Identifies one loop handler instance.
pub type LoopId = u8;

/// Commands posted by the main handler to the owning loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    /// Apply the configuration staged in the [`ConfigSlot`].
    Configure,
    ArmTrigger,
    DisarmTrigger,
    /// Hand the datalogger over; the owner releases at its next tick.
    ReleaseOwnership,
}

/// Notifications flowing back from the loop to the main handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMessage {
    StateUpdate(StatusSnapshot),
    Error(DataloggingError),
    OwnershipReleased(LoopId),
}

pub type CommandChannel = Channel<CriticalSectionRawMutex, LoopCommand, LOOP_QUEUE_DEPTH>;
pub type CommandSender<'a> = Sender<'a, CriticalSectionRawMutex, LoopCommand, LOOP_QUEUE_DEPTH>;
pub type CommandReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, LoopCommand, LOOP_QUEUE_DEPTH>;

pub type MessageChannel = Channel<CriticalSectionRawMutex, LoopMessage, LOOP_QUEUE_DEPTH>;
pub type MessageSender<'a> = Sender<'a, CriticalSectionRawMutex, LoopMessage, LOOP_QUEUE_DEPTH>;
pub type MessageReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, LoopMessage, LOOP_QUEUE_DEPTH>;

/// Latest producer status, single writer, any number of readers.
pub struct SharedStatus {
    inner: Mutex<CriticalSectionRawMutex, Cell<StatusSnapshot>>,
}

impl SharedStatus {
    pub const fn new() -> Self {
        Self { inner: Mutex::new(Cell::new(StatusSnapshot::idle())) }
    }

    pub fn publish(&self, snapshot: StatusSnapshot) {
        self.inner.lock(|cell| cell.set(snapshot));
    }

    pub fn get(&self) -> StatusSnapshot {
        self.inner.lock(|cell| cell.get())
    }
}

impl Default for SharedStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Hand-off slot for the next configuration to apply.
///
/// The consumer stages a copy, the owning loop takes it when it processes
/// [`LoopCommand::Configure`]. Staging overwrites any configuration that was
/// not applied yet.
pub struct ConfigSlot {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Option<Configuration>>>,
}

impl ConfigSlot {
    pub const fn new() -> Self {
        Self { inner: Mutex::new(RefCell::new(None)) }
    }

    pub fn stage(&self, config: &Configuration) {
        self.inner.lock(|slot| {
            *slot.borrow_mut() = Some(config.clone());
        });
    }

    pub fn take(&self) -> Option<Configuration> {
        self.inner.lock(|slot| slot.borrow_mut().take())
    }
}

impl Default for ConfigSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OwnershipSlot {
    owner: Option<LoopId>,
    release_requested: bool,
}

/// Request/acknowledge hand-off of the datalogger between loops.
///
/// The consumer calls [`request_release`](Self::request_release); the owner
/// observes the request at its next tick, finishes any in-flight sample and
/// calls [`release`](Self::release); the new owner then
/// [`claim`](Self::claim)s. A release by a non-owner or a claim while the
/// datalogger is still owned violates the handshake.
pub struct Ownership {
    inner: Mutex<CriticalSectionRawMutex, Cell<OwnershipSlot>>,
}

impl Ownership {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(OwnershipSlot { owner: None, release_requested: false })),
        }
    }

    pub fn owner(&self) -> Option<LoopId> {
        self.inner.lock(|cell| cell.get().owner)
    }

    /// Attaches a loop to the datalogger.
    pub fn claim(&self, id: LoopId) -> Result<(), DataloggingError> {
        self.inner.lock(|cell| {
            let mut slot = cell.get();
            if slot.owner.is_some() {
                error!("Loop {} claimed the datalogger while it is still owned", id);
                return Err(DataloggingError::UnexpectedClaim);
            }
            slot.owner = Some(id);
            slot.release_requested = false;
            cell.set(slot);
            Ok(())
        })
    }

    /// Asks the current owner to let go. No-op when nobody owns the
    /// datalogger.
    pub fn request_release(&self) {
        self.inner.lock(|cell| {
            let mut slot = cell.get();
            if slot.owner.is_some() {
                slot.release_requested = true;
                cell.set(slot);
            }
        });
    }

    /// Polled by the owner on every tick.
    pub fn release_requested(&self) -> bool {
        self.inner.lock(|cell| cell.get().release_requested)
    }

    /// Detaches `id` from the datalogger.
    pub fn release(&self, id: LoopId) -> Result<(), DataloggingError> {
        self.inner.lock(|cell| {
            let mut slot = cell.get();
            if slot.owner != Some(id) {
                error!("Loop {} released the datalogger without owning it", id);
                return Err(DataloggingError::UnexpectedRelease);
            }
            slot.owner = None;
            slot.release_requested = false;
            cell.set(slot);
            Ok(())
        })
    }
}

impl Default for Ownership {
    fn default() -> Self {
        Self::new()
    }
}
