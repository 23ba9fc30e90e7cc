//! Analog input abstraction
//!
//! The driver composes with a generic analog-input facility instead of
//! inheriting from one. Implementations own the ADC channel, the
//! optional rolling-average smoothing, and their own configuration
//! document.

use heapless::String;

use crate::config::types::MAX_CONFIG_LEN;

/// Errors from the analog base facility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcError {
    /// ADC conversion failed
    Read,
    /// Base configuration could not be applied
    Config,
}

/// Generic analog-input facility
///
/// Sampling takes `&mut self` because ADC reads typically require
/// mutable access.
pub trait AnalogInput {
    /// Read one raw sample, optionally smoothed with the rolling average
    fn read_raw(&mut self, rolling_average: bool) -> Result<u16, AdcError>;

    /// Convert a raw sample to millivolts
    fn to_millivolts(&self, raw: u16) -> i32;

    /// Whether this input is configured to smooth measurements
    fn rolling_average(&self) -> bool;

    /// The base configuration as a JSON document
    fn get_config(&self) -> String<MAX_CONFIG_LEN>;

    /// Apply a configuration document to the base facility
    ///
    /// With `persist` false the change is applied in memory only; the
    /// caller owns persistence of the merged document.
    fn set_config(&mut self, json: &str, persist: bool) -> Result<(), AdcError>;
}
