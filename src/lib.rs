//! Driver for the TMP2 temperature sensor Pmod, read through an I/O processor (IOP).
//!
//! The IOP runs a small program that owns the sensor. The driver talks to it through a mailbox
//! in the IOP's address window: it writes an opcode into the command cell and the IOP answers
//! through the data and log cells.

#![cfg_attr(not(test), no_std)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
mod fmt;

pub mod decode;
mod error;
#[cfg(any(test, feature = "fake"))]
pub mod fake;
pub mod iop;
pub mod log;
pub mod mailbox;
pub mod thermometer;
mod tmp2;

pub use self::{
    error::{AllocationError, Error, Result},
    iop::{Iop, IopAllocator, MappedIop, Slot},
    mailbox::{Mmio, VolatileMmio},
    thermometer::{Temperature, Thermometer},
    tmp2::Tmp2,
};
