//! Fake IOP for testing code that drives a TMP2 without hardware

use embedded_hal::blocking::delay::DelayUs;
use heapless::HistoryBuffer;

use crate::{
    error::AllocationError,
    iop::{Iop, IopAllocator, Slot},
    mailbox::{Command, Mmio, COMMAND, DATA, MAILBOX_OFFSET, MAILBOX_SIZE, WORD},
};

/// Value the IOP program leaves in the command cell when idle
pub const IDLE: u32 = 0;

const WORDS: usize = MAILBOX_SIZE / WORD;
const HISTORY: usize = 32;

/// A mailbox backed by plain memory, with the IOP side of the read command simulated.
///
/// A read command completes after the command cell has been polled `latency` more times: the
/// configured reading is placed in the data cell and the command cell is cleared to [`IDLE`].
/// Logging commands are recorded but otherwise ignored, use [`FakeMailbox::poke`] to fill the log.
pub struct FakeMailbox {
    words: [u32; WORDS],
    writes: HistoryBuffer<(usize, u32), HISTORY>,
    reading: u32,
    latency: u32,
    pending: Option<u32>,
    stalled: bool,
    polls: u32,
}

impl FakeMailbox {
    pub const fn new() -> Self {
        Self {
            words: [0; WORDS],
            writes: HistoryBuffer::new(),
            reading: 0,
            latency: 0,
            pending: None,
            stalled: false,
            polls: 0,
        }
    }

    /// Raw value the IOP answers read commands with
    pub fn set_reading(&mut self, raw: u32) {
        self.reading = raw;
    }

    /// Number of extra polls before a read command completes
    pub fn set_latency(&mut self, polls: u32) {
        self.latency = polls;
    }

    /// Never complete read commands
    pub fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    /// Write a word as the IOP would, without recording it
    pub fn poke(&mut self, offset: usize, value: u32) {
        self.words[Self::index(offset)] = value;
    }

    /// Read a word without side effects
    pub fn peek(&self, offset: usize) -> u32 {
        self.words[Self::index(offset)]
    }

    /// Writes done through [`Mmio`], oldest first
    pub fn writes(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.writes.oldest_ordered().copied()
    }

    /// Opcodes written to the command cell, oldest first
    pub fn commands(&self) -> impl Iterator<Item = u32> + '_ {
        self.writes()
            .filter(|(offset, _)| *offset == COMMAND)
            .map(|(_, value)| value)
    }

    /// Reads of the command cell so far
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn clear_history(&mut self) {
        self.writes.clear();
        self.polls = 0;
    }

    fn index(offset: usize) -> usize {
        assert!(
            (MAILBOX_OFFSET..MAILBOX_OFFSET + MAILBOX_SIZE).contains(&offset),
            "access outside the mailbox: {offset:#x}"
        );
        assert_eq!(offset % WORD, 0, "unaligned access: {offset:#x}");
        (offset - MAILBOX_OFFSET) / WORD
    }

    fn step(&mut self) {
        if self.stalled {
            return;
        }
        match self.pending {
            Some(0) => {
                self.pending = None;
                self.poke(DATA, self.reading);
                self.poke(COMMAND, IDLE);
            }
            Some(n) => self.pending = Some(n - 1),
            None => {}
        }
    }
}

impl Default for FakeMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mmio for FakeMailbox {
    fn read(&mut self, offset: usize) -> u32 {
        if offset == COMMAND {
            self.polls += 1;
            self.step();
        }
        self.peek(offset)
    }

    fn write(&mut self, offset: usize, value: u32) {
        self.poke(offset, value);
        self.writes.write((offset, value));
        if offset == COMMAND && value == Command::Read.opcode() {
            self.pending = Some(self.latency);
        }
    }
}

/// An IOP that only tracks whether it was started
#[derive(Default)]
pub struct FakeIop {
    pub mailbox: FakeMailbox,
    pub started: bool,
}

impl FakeIop {
    pub const fn new() -> Self {
        Self {
            mailbox: FakeMailbox::new(),
            started: false,
        }
    }
}

impl Iop for FakeIop {
    type Mmio = FakeMailbox;

    fn mmio(&mut self) -> &mut FakeMailbox {
        &mut self.mailbox
    }

    fn start(&mut self) {
        self.started = true;
    }
}

/// Allocator handing out [`FakeIop`]s, one per slot
#[derive(Default)]
pub struct FakeAllocator {
    bound: [bool; Slot::ALL.len()],
    /// Fail every request as if the program couldn't be loaded
    pub fail_load: bool,
}

impl FakeAllocator {
    pub const fn new() -> Self {
        Self {
            bound: [false; Slot::ALL.len()],
            fail_load: false,
        }
    }

    pub fn is_bound(&self, slot: Slot) -> bool {
        self.bound[Self::index(slot)]
    }

    pub fn unbind(&mut self, slot: Slot) {
        self.bound[Self::index(slot)] = false;
    }

    fn index(slot: Slot) -> usize {
        usize::from(slot.id() - 1)
    }
}

impl IopAllocator for FakeAllocator {
    type Iop = FakeIop;

    fn request(&mut self, slot: Slot, program: &'static str) -> Result<FakeIop, AllocationError> {
        if self.fail_load || program.is_empty() {
            return Err(AllocationError::ProgramLoad);
        }
        if self.is_bound(slot) {
            return Err(AllocationError::SlotInUse);
        }
        self.bound[Self::index(slot)] = true;
        Ok(FakeIop::new())
    }
}

/// Delay that returns immediately but counts the time it was asked to wait
#[derive(Default)]
pub struct NoopDelay {
    pub waited_us: u32,
}

impl DelayUs<u32> for NoopDelay {
    fn delay_us(&mut self, us: u32) {
        self.waited_us += us;
    }
}
