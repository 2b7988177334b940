//! I/O processor lifecycle.
//!
//! Allocating an IOP and loading its program belong to the platform. The driver only needs the
//! traits below.

use crate::{
    error::AllocationError,
    mailbox::{Mmio, VolatileMmio},
};

/// IOP program answering TMP2 mailbox commands
pub const PROGRAM: &str = "tmp2.bin";

/// Pmod connector hosting the sensor.
///
/// Id 0 (JA) is wired to the XADC and has no variant.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Slot {
    Jb = 1,
    Jc = 2,
    Jd = 3,
    Je = 4,
}

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::Jb, Slot::Jc, Slot::Jd, Slot::Je];

    #[inline]
    pub const fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Slot {
    type Error = AllocationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Err(AllocationError::ReservedSlot),
            1 => Ok(Slot::Jb),
            2 => Ok(Slot::Jc),
            3 => Ok(Slot::Jd),
            4 => Ok(Slot::Je),
            _ => Err(AllocationError::NoSuchSlot),
        }
    }
}

/// An IOP with its program loaded
pub trait Iop {
    type Mmio: Mmio;

    /// The IOP's address window
    fn mmio(&mut self) -> &mut Self::Mmio;

    /// Release the IOP from reset so it starts running its program
    fn start(&mut self);
}

/// Hands out IOPs bound to a slot
pub trait IopAllocator {
    type Iop: Iop;

    /// Bind `slot` and load `program` onto its IOP
    fn request(&mut self, slot: Slot, program: &'static str) -> Result<Self::Iop, AllocationError>;
}

/// An IOP whose window is already mapped and whose program is already loaded.
///
/// `start` is called once when the driver takes the IOP.
pub struct MappedIop<F> {
    mmio: VolatileMmio,
    start: F,
}

impl<F: FnMut()> MappedIop<F> {
    pub const fn new(mmio: VolatileMmio, start: F) -> Self {
        Self { mmio, start }
    }
}

impl<F: FnMut()> Iop for MappedIop<F> {
    type Mmio = VolatileMmio;

    fn mmio(&mut self) -> &mut VolatileMmio {
        &mut self.mmio
    }

    fn start(&mut self) {
        (self.start)();
    }
}
