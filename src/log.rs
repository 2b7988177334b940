//! Readout of the IOP's reading log.
//!
//! The IOP records raw readings into a ring of [`LOG_CAPACITY`] words and counts how many it
//! has written in [`LOG_END_PTR`](crate::mailbox::LOG_END_PTR).

use crate::{
    decode::reg_to_float,
    mailbox::{log_entry, Mmio, LOG_CAPACITY},
    thermometer::Temperature,
};

/// The valid part of the log ring
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogWindow {
    /// Physical slot of the oldest entry
    pub start: usize,
    /// Number of valid entries
    pub count: usize,
}

impl LogWindow {
    pub const fn from_end_ptr(end_ptr: u32) -> Self {
        let end = end_ptr as usize;
        if end >= LOG_CAPACITY {
            // Ring has wrapped, only the most recent entries survive
            Self {
                start: (end - LOG_CAPACITY) % LOG_CAPACITY,
                count: LOG_CAPACITY,
            }
        } else {
            Self {
                start: 0,
                count: end,
            }
        }
    }

    /// Physical slot of the `index`th oldest entry
    #[inline]
    pub const fn slot(&self, index: usize) -> usize {
        (self.start + index) % LOG_CAPACITY
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogEntry {
    /// Position in the log, oldest first
    pub index: usize,
    pub raw: u32,
    pub temperature: Temperature,
}

/// Iterator over the logged readings, oldest first
pub struct LogDump<'a, M> {
    mmio: &'a mut M,
    window: LogWindow,
    next: usize,
}

impl<'a, M: Mmio> LogDump<'a, M> {
    pub(crate) fn new(mmio: &'a mut M, window: LogWindow) -> Self {
        Self {
            mmio,
            window,
            next: 0,
        }
    }

    pub const fn window(&self) -> LogWindow {
        self.window
    }
}

impl<M: Mmio> Iterator for LogDump<'_, M> {
    type Item = LogEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.window.count {
            return None;
        }

        let index = self.next;
        self.next += 1;

        let raw = self.mmio.read(log_entry(self.window.slot(index)));
        Some(LogEntry {
            index,
            raw,
            temperature: reg_to_float(raw),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.window.count - self.next;
        (left, Some(left))
    }
}

impl<M: Mmio> ExactSizeIterator for LogDump<'_, M> {}
