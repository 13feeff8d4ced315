//! Datalogger orchestration.
//!
//! The state machine runs in the sampling context: IDLE until configured,
//! ARMED once the host starts an acquisition, TRIGGERED when the condition
//! fires, ACQUISITION_COMPLETED once enough post-trigger rows are in the
//! ring (or the timeout expires). ERROR is a dead end until the host
//! reconfigures or resets. The host pulls the finished acquisition out
//! through a chunked read session carrying a rolling counter and a CRC.

use crc32fast::Hasher;
use log::{debug, error};

use super::config::Configuration;
use super::encoder::{RawEncoder, RawReader};
use super::trigger::TriggerMonitor;
use super::DataloggingError;
use crate::memory::MemoryReader;
use crate::rpv::RpvRegistry;
use crate::timebase::{Timebase, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataloggerState {
    Idle,
    Configured,
    Armed,
    Triggered,
    AcquisitionCompleted,
    Error,
}

/// Producer-side view published to the consumer context once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: DataloggerState,
    pub bytes_to_acquire_from_trigger_to_completion: u32,
    pub write_counter_since_trigger: u32,
}

impl StatusSnapshot {
    pub const fn idle() -> Self {
        Self {
            state: DataloggerState::Idle,
            bytes_to_acquire_from_trigger_to_completion: 0,
            write_counter_since_trigger: 0,
        }
    }
}

/// One chunk of a host read session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadChunk {
    /// Bytes written into the caller's buffer.
    pub bytes: usize,
    /// Chunk sequence number, starting at 0 for each session.
    pub rolling_counter: u8,
    /// True once the whole acquisition has been delivered.
    pub finished: bool,
    /// CRC32 over every byte delivered by the session, present on the final
    /// chunk.
    pub crc: Option<u32>,
}

struct ReadSession {
    reader: RawReader,
    rolling_counter: u8,
    crc: Hasher,
    active: bool,
}

impl ReadSession {
    fn new() -> Self {
        Self {
            reader: RawReader::new(),
            rolling_counter: 0,
            crc: Hasher::new(),
            active: false,
        }
    }

    fn clear(&mut self) {
        *self = Self::new();
    }

    fn begin(&mut self, encoder: &RawEncoder) {
        self.clear();
        self.reader.reset(encoder);
        self.active = true;
    }
}

pub struct DataLogger<'buf> {
    state: DataloggerState,
    latched_error: Option<DataloggingError>,
    config: Configuration,
    encoder: RawEncoder<'buf>,
    monitor: TriggerMonitor,
    session: ReadSession,
    decimation_counter: u16,
    armed_at: Timestamp,
    write_counter_at_trigger: u32,
    bytes_after_trigger: usize,
}

impl<'buf> DataLogger<'buf> {
    /// Creates an idle datalogger over a caller-provided ring buffer.
    pub fn new(buffer: &'buf mut [u8]) -> Self {
        Self {
            state: DataloggerState::Idle,
            latched_error: None,
            config: Configuration::default(),
            encoder: RawEncoder::new(buffer),
            monitor: TriggerMonitor::new(),
            session: ReadSession::new(),
            decimation_counter: 0,
            armed_at: 0,
            write_counter_at_trigger: 0,
            bytes_after_trigger: 0,
        }
    }

    pub fn state(&self) -> DataloggerState {
        self.state
    }

    pub fn error(&self) -> Option<DataloggingError> {
        self.latched_error
    }

    pub fn data_acquired(&self) -> bool {
        self.state == DataloggerState::AcquisitionCompleted
    }

    /// Copies the host-built configuration in and validates it.
    ///
    /// An armed datalogger is disarmed first. On failure the datalogger goes
    /// to the error state until reconfigured or reset.
    pub fn configure(
        &mut self,
        config: &Configuration,
        rpvs: &RpvRegistry,
    ) -> Result<(), DataloggingError> {
        if matches!(self.state, DataloggerState::Armed | DataloggerState::Triggered) {
            self.disarm_trigger();
        }

        if let Err(e) = config.validate(rpvs) {
            return Err(self.fail(e));
        }
        self.config = config.clone();
        if let Err(e) = self.encoder.reset(&self.config, rpvs) {
            return Err(self.fail(e));
        }

        self.monitor.reset(self.config.trigger.condition);
        self.bytes_after_trigger =
            self.encoder.effective_end() * (255 - self.config.probe_location as usize) / 255;
        self.decimation_counter = 0;
        self.write_counter_at_trigger = 0;
        self.session.clear();
        self.latched_error = None;
        self.state = DataloggerState::Configured;
        debug!(
            "Datalogger configured: {} items, {}-byte entries, {} max",
            self.config.items_to_log.len(),
            self.encoder.entry_size(),
            self.encoder.max_entries()
        );
        Ok(())
    }

    fn fail(&mut self, e: DataloggingError) -> DataloggingError {
        error!("Datalogger configuration rejected: {:?}", e);
        self.latched_error = Some(e);
        self.state = DataloggerState::Error;
        e
    }

    /// Starts an acquisition: clears the ring, the trigger state and the
    /// condition baseline, then begins sampling on the next tick.
    pub fn arm_trigger(&mut self, rpvs: &RpvRegistry, timebase: &Timebase) {
        if !matches!(
            self.state,
            DataloggerState::Configured | DataloggerState::AcquisitionCompleted
        ) {
            return;
        }
        if let Err(e) = self.encoder.reset(&self.config, rpvs) {
            self.fail(e);
            return;
        }
        self.monitor.reset(self.config.trigger.condition);
        self.decimation_counter = 0;
        self.write_counter_at_trigger = 0;
        self.session.clear();
        self.armed_at = timebase.get_timestamp();
        self.state = DataloggerState::Armed;
        debug!("Datalogger armed");
    }

    /// Stops the current acquisition. The ring content is preserved; only a
    /// re-arm clears it. Takes effect immediately, no-op outside an
    /// acquisition.
    pub fn disarm_trigger(&mut self) {
        if matches!(self.state, DataloggerState::Armed | DataloggerState::Triggered) {
            self.state = DataloggerState::Configured;
            debug!("Datalogger disarmed");
        }
    }

    /// Evaluates the trigger condition with hold-time debounce applied.
    /// Only meaningful while armed; false in any other state.
    pub fn check_trigger<M: MemoryReader>(
        &mut self,
        memory: &M,
        rpvs: &RpvRegistry,
        timebase: &Timebase,
    ) -> bool {
        if self.state != DataloggerState::Armed {
            return false;
        }
        self.monitor.check(&self.config.trigger, memory, rpvs, timebase)
    }

    /// One sampling tick. Appends a row on every `decimation`-th call,
    /// watches the trigger while armed and finishes the acquisition once the
    /// post-trigger share of the ring has been filled or the timeout hits.
    pub fn process<M: MemoryReader>(
        &mut self,
        memory: &M,
        rpvs: &RpvRegistry,
        timebase: &Timebase,
    ) {
        if !matches!(self.state, DataloggerState::Armed | DataloggerState::Triggered) {
            return;
        }

        self.decimation_counter += 1;
        if self.decimation_counter >= self.config.decimation {
            self.decimation_counter = 0;
            if !self.encoder.encode_next_entry(&self.config, memory, rpvs, timebase) {
                // Latched for the host to see; sampling carries on with the
                // affected bytes zeroed.
                self.latched_error = Some(DataloggingError::ReadMemoryFailed);
            }
        }

        if self.state == DataloggerState::Armed
            && self.monitor.check(&self.config.trigger, memory, rpvs, timebase)
        {
            self.write_counter_at_trigger = self.encoder.write_counter();
            self.state = DataloggerState::Triggered;
            debug!("Datalogging trigger fired");
        }

        if self.state == DataloggerState::Triggered {
            let rows_since_trigger =
                self.encoder.write_counter().wrapping_sub(self.write_counter_at_trigger);
            if rows_since_trigger as usize * self.encoder.entry_size() >= self.bytes_after_trigger {
                self.complete("post-trigger window filled");
            }
        }

        if matches!(self.state, DataloggerState::Armed | DataloggerState::Triggered)
            && self.config.timeout_us > 0
            && timebase.has_expired(self.armed_at, self.config.timeout_us)
        {
            self.complete("timeout");
        }
    }

    fn complete(&mut self, cause: &str) {
        self.state = DataloggerState::AcquisitionCompleted;
        self.session.clear();
        debug!("Acquisition completed ({cause})");
    }

    /// Total bytes a read session will deliver; 0 until an acquisition has
    /// completed.
    pub fn acquisition_total_size(&self) -> usize {
        if self.state == DataloggerState::AcquisitionCompleted {
            self.session.reader.total_size(&self.encoder)
        } else {
            0
        }
    }

    /// Pulls the next chunk of the completed acquisition.
    ///
    /// The session starts implicitly on the first call after completion and
    /// ends when the final chunk (carrying the CRC) has been delivered.
    pub fn read_acquisition(&mut self, dst: &mut [u8]) -> Result<ReadChunk, DataloggingError> {
        if self.state != DataloggerState::AcquisitionCompleted {
            return Err(DataloggingError::AcquisitionNotReady);
        }
        if !self.session.active {
            self.session.begin(&self.encoder);
        }

        let bytes = self.session.reader.read(&self.encoder, dst);
        self.session.crc.update(&dst[..bytes]);
        let rolling_counter = self.session.rolling_counter;
        self.session.rolling_counter = self.session.rolling_counter.wrapping_add(1);
        let finished = self.session.reader.finished();
        let crc = if finished { Some(self.session.crc.clone().finalize()) } else { None };

        Ok(ReadChunk { bytes, rolling_counter, finished, crc })
    }

    /// Drops everything, configuration included, and returns to idle.
    pub fn reset(&mut self) {
        self.state = DataloggerState::Idle;
        self.latched_error = None;
        self.config = Configuration::default();
        self.session.clear();
        self.monitor = TriggerMonitor::new();
        self.decimation_counter = 0;
        self.write_counter_at_trigger = 0;
        self.bytes_after_trigger = 0;
        debug!("Datalogger reset");
    }

    /// Read access to the ring encoder, for the host-facing queries.
    pub fn encoder(&self) -> &RawEncoder<'buf> {
        &self.encoder
    }

    /// Producer-side status published to the consumer once per tick.
    pub fn status_snapshot(&self) -> StatusSnapshot {
        let write_counter_since_trigger = match self.state {
            DataloggerState::Triggered | DataloggerState::AcquisitionCompleted => {
                self.encoder.write_counter().wrapping_sub(self.write_counter_at_trigger)
            }
            _ => 0,
        };
        StatusSnapshot {
            state: self.state,
            bytes_to_acquire_from_trigger_to_completion: self.bytes_after_trigger as u32,
            write_counter_since_trigger,
        }
    }
}
