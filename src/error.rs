pub type Result<T> = core::result::Result<T, Error>;

/// Failure to bind the sensor to an I/O processor.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AllocationError {
    /// Slot 0 (JA) is wired to the XADC and can't host a TMP2
    ReservedSlot,

    /// The slot id doesn't name a Pmod connector
    NoSuchSlot,

    /// Another peripheral is already bound to the slot's IOP
    SlotInUse,

    /// The IOP program couldn't be loaded
    ProgramLoad,
}

impl AllocationError {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReservedSlot => "Reserved slot",
            Self::NoSuchSlot => "No such slot",
            Self::SlotInUse => "Slot in use",
            Self::ProgramLoad => "Program load failed",
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The IOP couldn't be allocated
    Allocation(AllocationError),

    /// A negative log interval was given
    InvalidArgument,

    /// The IOP didn't acknowledge a command in time
    Timeout,
}

impl Error {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Allocation(e) => e.as_str(),
            Self::InvalidArgument => "Invalid argument",
            Self::Timeout => "Timeout",
        }
    }
}

impl From<AllocationError> for Error {
    fn from(value: AllocationError) -> Self {
        Self::Allocation(value)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
