//! Raw-format ring-buffer encoder and its streaming reader.
//!
//! One entry is one sample row: every configured item encoded back to back
//! at a fixed stride. Rows live in a caller-provided byte buffer used as a
//! ring; once the ring is full the oldest row is overwritten. The reader
//! streams the valid rows back out in age order, handling at most one wrap
//! at the effective end of the ring.
//!
//! Index bookkeeping is done in entry units; byte offsets are derived on
//! use, which keeps the wrap arithmetic exact. Bytes past
//! `effective_end = max_entries * entry_size` are never touched.

use heapless::Vec;
use log::debug;

use super::config::{Configuration, LoggableItem};
use super::DataloggingError;
use crate::codecs;
use crate::limits::MAX_LOGGED_SIGNALS;
use crate::memory::MemoryReader;
use crate::rpv::RpvRegistry;
use crate::timebase::Timebase;

/// Byte size of an encoded timestamp item.
const TIMESTAMP_SIZE: u8 = 4;

pub struct RawEncoder<'buf> {
    buffer: &'buf mut [u8],
    /// Per-item byte sizes, frozen at reset so the stride can never drift
    /// mid-acquisition even if an RPV becomes unresolvable.
    item_sizes: Vec<u8, MAX_LOGGED_SIGNALS>,
    entry_size: usize,
    max_entries: usize,
    write_index: usize,
    first_valid_index: usize,
    entries_count: usize,
    write_counter: u32,
    full: bool,
    error: bool,
}

impl<'buf> RawEncoder<'buf> {
    /// Wraps `buffer` as the ring storage. The encoder stays in the error
    /// state until it is reset against a configuration.
    pub fn new(buffer: &'buf mut [u8]) -> Self {
        Self {
            buffer,
            item_sizes: Vec::new(),
            entry_size: 0,
            max_entries: 0,
            write_index: 0,
            first_valid_index: 0,
            entries_count: 0,
            write_counter: 0,
            full: false,
            error: true,
        }
    }

    /// Clears the ring and recomputes the row geometry from `config`.
    pub fn reset(&mut self, config: &Configuration, rpvs: &RpvRegistry) -> Result<(), DataloggingError> {
        self.item_sizes.clear();
        self.entry_size = 0;
        self.max_entries = 0;
        self.write_index = 0;
        self.first_valid_index = 0;
        self.entries_count = 0;
        self.write_counter = 0;
        self.full = false;
        self.error = true;

        if self.buffer.is_empty() {
            return Err(DataloggingError::ConfigInvalid);
        }

        for item in &config.items_to_log {
            let size = match *item {
                LoggableItem::Memory { size, .. } => size,
                LoggableItem::Rpv { id } => match rpvs.get(id) {
                    Some(rpv) => rpv.datatype.size(),
                    None => 0,
                },
                LoggableItem::Time => TIMESTAMP_SIZE,
            };
            if size == 0 {
                return Err(DataloggingError::ConfigInvalid);
            }
            self.item_sizes.push(size).map_err(|_| DataloggingError::ConfigInvalid)?;
            self.entry_size += size as usize;
        }

        if self.entry_size == 0 {
            return Err(DataloggingError::ConfigInvalid);
        }
        self.max_entries = self.buffer.len() / self.entry_size;
        if self.max_entries == 0 {
            debug!(
                "Datalogging buffer of {} bytes cannot hold a {}-byte entry",
                self.buffer.len(),
                self.entry_size
            );
            return Err(DataloggingError::BufferTooSmall);
        }

        self.error = false;
        Ok(())
    }

    /// Takes a snapshot of every configured item and appends it as one row.
    ///
    /// Returns false when any item could not be read; the affected bytes are
    /// zero-filled and the row still counts, so the stride and the timeline
    /// stay intact.
    pub fn encode_next_entry<M: MemoryReader>(
        &mut self,
        config: &Configuration,
        memory: &M,
        rpvs: &RpvRegistry,
        timebase: &Timebase,
    ) -> bool {
        if self.error {
            return true;
        }

        // About to overwrite the oldest row: move the valid window forward.
        if self.full && self.write_index == self.first_valid_index {
            self.first_valid_index += 1;
            if self.first_valid_index >= self.max_entries {
                self.first_valid_index = 0;
            }
        }

        let mut clean = true;
        let mut cursor = self.write_index * self.entry_size;
        for (item, &size) in config.items_to_log.iter().zip(self.item_sizes.iter()) {
            let field = &mut self.buffer[cursor..cursor + size as usize];
            match *item {
                LoggableItem::Memory { addr, .. } => {
                    if !memory.read_memory(addr, field) {
                        field.fill(0);
                        clean = false;
                    }
                }
                LoggableItem::Rpv { id } => {
                    let value = rpvs.get(id).and_then(|rpv| rpvs.read(&rpv));
                    match value {
                        Some(value) if value.size() == size => {
                            codecs::encode_anytype_big_endian(&value, field);
                        }
                        _ => {
                            field.fill(0);
                            clean = false;
                        }
                    }
                }
                LoggableItem::Time => {
                    codecs::encode_32_bits_big_endian(timebase.get_timestamp(), field);
                }
            }
            cursor += size as usize;
        }

        if !self.full {
            self.entries_count += 1;
        }
        self.write_index += 1;
        if self.write_index >= self.max_entries {
            self.full = true;
            self.write_index = 0;
        }
        self.write_counter = self.write_counter.wrapping_add(1);

        clean
    }

    pub fn error(&self) -> bool {
        self.error
    }

    pub fn entry_size(&self) -> usize {
        self.entry_size
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn entries_count(&self) -> usize {
        self.entries_count
    }

    /// Rows written since the last reset, monotonically increasing across
    /// overwrites. The state machine uses it to count post-trigger samples.
    pub fn write_counter(&self) -> u32 {
        self.write_counter
    }

    /// Byte offset where the next row will be written.
    pub fn write_cursor(&self) -> usize {
        self.write_index * self.entry_size
    }

    /// Byte offset of the oldest valid row.
    pub fn oldest_entry_cursor(&self) -> usize {
        self.first_valid_index * self.entry_size
    }

    /// One past the last byte the ring uses. The slack between this and the
    /// buffer size is too small for a row and stays untouched.
    pub fn effective_end(&self) -> usize {
        self.max_entries * self.entry_size
    }

    pub fn buffer(&self) -> &[u8] {
        self.buffer
    }
}

/// Streams the acquired rows out of the ring in age order.
///
/// The reader only runs once the producer has stopped writing; it keeps a
/// byte cursor into the ring and performs at most two copies per call, one
/// on each side of the wrap point.
#[derive(Debug, Clone, Default)]
pub struct RawReader {
    read_cursor: usize,
    started: bool,
    finished: bool,
}

impl RawReader {
    pub const fn new() -> Self {
        Self { read_cursor: 0, started: false, finished: false }
    }

    /// Re-anchors the cursor on the encoder's oldest valid row.
    pub fn reset(&mut self, encoder: &RawEncoder) {
        self.read_cursor = encoder.oldest_entry_cursor();
        self.started = false;
        self.finished = false;
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Total number of bytes this reader will produce.
    pub fn total_size(&self, encoder: &RawEncoder) -> usize {
        if encoder.error() {
            return 0;
        }
        encoder.entries_count() * encoder.entry_size()
    }

    /// Copies up to `dst.len()` acquired bytes and returns how many were
    /// written. Returns 0 forever once finished.
    pub fn read(&mut self, encoder: &RawEncoder, dst: &mut [u8]) -> usize {
        if encoder.error() || self.finished {
            return 0;
        }
        if encoder.entries_count() == 0 {
            self.finished = true;
            return 0;
        }

        let write_cursor = encoder.write_cursor();
        let end = encoder.effective_end();
        if self.read_cursor == write_cursor && self.started {
            self.finished = true;
            return 0;
        }

        let mut output = 0usize;
        while output < dst.len() {
            // Copy toward the write cursor if it is ahead of us, otherwise
            // toward the wrap point.
            let right_stop = if write_cursor > self.read_cursor { write_cursor } else { end };
            let chunk = (right_stop - self.read_cursor).min(dst.len() - output);
            dst[output..output + chunk]
                .copy_from_slice(&encoder.buffer()[self.read_cursor..self.read_cursor + chunk]);
            self.read_cursor += chunk;
            self.started = true;
            output += chunk;

            if self.read_cursor > write_cursor && self.read_cursor >= end {
                self.read_cursor -= end;
            }
            if self.read_cursor == write_cursor {
                self.finished = true;
                break;
            }
        }

        output
    }
}
