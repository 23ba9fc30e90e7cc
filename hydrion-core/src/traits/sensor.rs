//! Sensor surface consumed by the device-management layer

use heapless::String;

use crate::config::types::{DeviceDescription, MAX_CONFIG_LEN};
use crate::state::machine::{CalibrationResponse, CalibrationSession};

/// A sensor device as seen by the surrounding management layer
///
/// One instance is single-threaded and non-reentrant; callers serialize
/// access themselves, including concurrent calibration runs.
pub trait Sensor {
    /// Driver-specific error type
    type Error;

    /// Initialize metadata and load or create the stored configuration
    fn begin(&mut self) -> Result<(), Self::Error>;

    /// Take one measurement into the output value slots
    fn take_measurement(&mut self) -> Result<(), Self::Error>;

    /// Device classification and parameter metadata
    fn description(&self) -> &DeviceDescription;

    /// Latest measurement values, one slot per parameter
    fn values(&self) -> &[f32];

    /// The merged configuration as a JSON document
    fn get_config(&mut self) -> Result<String<MAX_CONFIG_LEN>, Self::Error>;

    /// Apply a configuration document, optionally persisting it
    fn set_config(&mut self, config: &str, save: bool) -> Result<(), Self::Error>;

    /// Execute one step of a multi-step calibration procedure
    fn calibrate(&mut self, session: &mut CalibrationSession, step: i32) -> CalibrationResponse;
}
