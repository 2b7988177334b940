//! Mailbox shared between the driver and the IOP firmware.
//!
//! All offsets are in bytes from the base of the IOP address window.

use static_assertions::const_assert;

/// Size of the IOP address window
pub const IOP_MMIO_REGSIZE: usize = 0x1_0000;
/// Start of the mailbox inside the IOP window
pub const MAILBOX_OFFSET: usize = 0xF000;
pub const MAILBOX_SIZE: usize = 0x1000;

/// Most recent reading
pub const DATA: usize = MAILBOX_OFFSET;
/// Log interval in milliseconds
pub const LOG_INTERVAL: usize = MAILBOX_OFFSET + 4;
/// Number of entries the IOP has written to the log ring so far
pub const LOG_END_PTR: usize = MAILBOX_OFFSET + 8;
/// First entry of the log ring
pub const LOG_ENTRIES: usize = MAILBOX_OFFSET + 12;
/// Command cell, cleared by the IOP when a command completes
pub const COMMAND: usize = MAILBOX_OFFSET + 0xFFC;

pub const LOG_CAPACITY: usize = 1000;
pub const WORD: usize = core::mem::size_of::<u32>();

const_assert!(LOG_ENTRIES + LOG_CAPACITY * WORD <= COMMAND);
const_assert!(COMMAND + WORD <= MAILBOX_OFFSET + MAILBOX_SIZE);
const_assert!(MAILBOX_OFFSET + MAILBOX_SIZE <= IOP_MMIO_REGSIZE);

/// Byte offset of log ring slot `slot`
#[inline]
pub const fn log_entry(slot: usize) -> usize {
    LOG_ENTRIES + (slot % LOG_CAPACITY) * WORD
}

/// Opcodes understood by the TMP2 IOP program
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    StopLog = 1,
    Read = 3,
    StartLog = 7,
}

impl Command {
    #[inline]
    pub const fn opcode(self) -> u32 {
        self as u32
    }
}

/// Word-addressed access to the IOP window.
///
/// Every call must go straight to the hardware. The driver relies on a write being visible to
/// the IOP before any of its own later reads.
pub trait Mmio {
    fn read(&mut self, offset: usize) -> u32;
    fn write(&mut self, offset: usize, value: u32);
}

/// [`Mmio`] over an already mapped window using volatile accesses
pub struct VolatileMmio {
    base: *mut u32,
    size: usize,
}

impl VolatileMmio {
    /// # Safety
    ///
    /// `base` must point to `size` bytes of mapped device memory, aligned to 4 bytes, that stays
    /// mapped and is not accessed through any other Rust reference for the lifetime of the value.
    pub const unsafe fn new(base: *mut u32, size: usize) -> Self {
        Self { base, size }
    }

    pub const fn size(&self) -> usize {
        self.size
    }

    #[inline]
    fn word(&self, offset: usize) -> *mut u32 {
        debug_assert!(offset % WORD == 0, "unaligned mailbox access");
        debug_assert!(offset + WORD <= self.size, "mailbox access out of range");
        // SAFETY: offset is inside the window promised by `new`
        unsafe { self.base.add(offset / WORD) }
    }
}

impl Mmio for VolatileMmio {
    #[inline]
    fn read(&mut self, offset: usize) -> u32 {
        // SAFETY: see `VolatileMmio::new`
        unsafe { core::ptr::read_volatile(self.word(offset)) }
    }

    #[inline]
    fn write(&mut self, offset: usize, value: u32) {
        // SAFETY: see `VolatileMmio::new`
        unsafe { core::ptr::write_volatile(self.word(offset), value) }
    }
}
