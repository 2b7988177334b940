//! Temperature sensor interface

/// Degrees Celsius with one decimal of precision.
///
/// Kept as a float because the IOP already hands back a float and the tenths rounding is done in
/// decimal, which no binary fixed-point type can hold exactly.
pub type Temperature = f64;

pub trait Thermometer {
    type Error;

    /// Read the temperature in degrees Celsius
    fn read(&mut self) -> Result<Temperature, Self::Error>;
}
