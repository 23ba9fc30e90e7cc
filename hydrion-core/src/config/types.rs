//! Configuration type definitions
//!
//! These types represent the driver configuration and device metadata.
//! Configuration is stored as a flat JSON object through the
//! `ConfigStorage` collaborator.

use heapless::{String, Vec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::calibration::PhCalibration;

/// Maximum device name length
pub const MAX_NAME_LEN: usize = 32;

/// Maximum parameters reported by one device
pub const MAX_PARAMETERS: usize = 4;

/// Maximum length of a serialized configuration document
pub const MAX_CONFIG_LEN: usize = 256;

/// Default ADC pin for the probe
pub const DEFAULT_ANALOG_PIN: u8 = 36;

/// Device classification reported to the management layer
pub const WATER_SENSOR_TYPE: &str = "Water Sensor";

/// Device classification and parameter metadata
///
/// Populated by the driver in `begin`; the management layer reads it to
/// label the output value slots.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceDescription {
    /// Device classification
    pub device_type: &'static str,
    /// Parameter name per output slot
    pub parameters: Vec<&'static str, MAX_PARAMETERS>,
    /// Unit per output slot
    pub units: Vec<&'static str, MAX_PARAMETERS>,
}

impl DeviceDescription {
    /// Describe a single-parameter water-quality instrument
    pub fn water_sensor(parameter: &'static str, unit: &'static str) -> Self {
        let mut parameters = Vec::new();
        let mut units = Vec::new();
        // MAX_PARAMETERS >= 1, single pushes cannot fail
        let _ = parameters.push(parameter);
        let _ = units.push(unit);
        Self {
            device_type: WATER_SENSOR_TYPE,
            parameters,
            units,
        }
    }

    /// Number of parameters (and output value slots) this device reports
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }
}

/// Configuration owned by the generic analog-input base facility
///
/// Mirrors the stable shape of the base collaborator's JSON document.
/// The driver parses it back only to merge its own fields in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnalogInputConfig {
    /// Device name
    pub name: String<MAX_NAME_LEN>,
    /// ADC pin the probe is attached to
    pub pin: u8,
    /// Smooth measurements with a rolling average
    pub rolling_average: bool,
    /// Rolling average window size
    pub average_size: u16,
}

impl Default for AnalogInputConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            pin: DEFAULT_ANALOG_PIN,
            rolling_average: false,
            average_size: 10,
        }
    }
}

/// The merged configuration document for a pH sensor
///
/// Flat by contract: every base field plus the two calibration
/// coefficients, so existing stored documents keep loading. Missing keys
/// deserialize to the defaults, never to zero.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PhSensorConfig {
    /// Device name
    pub name: String<MAX_NAME_LEN>,
    /// ADC pin the probe is attached to
    pub pin: u8,
    /// Smooth measurements with a rolling average
    pub rolling_average: bool,
    /// Rolling average window size
    pub average_size: u16,
    /// Slope of the calibration curve
    pub cal_slope: f32,
    /// Y-intercept of the calibration curve
    pub cal_intercept: f32,
}

impl Default for PhSensorConfig {
    fn default() -> Self {
        Self::merge(AnalogInputConfig::default(), PhCalibration::default())
    }
}

impl PhSensorConfig {
    /// Build the merged document from base fields and coefficients
    pub fn merge(base: AnalogInputConfig, cal: PhCalibration) -> Self {
        Self {
            name: base.name,
            pin: base.pin,
            rolling_average: base.rolling_average,
            average_size: base.average_size,
            cal_slope: cal.slope,
            cal_intercept: cal.intercept,
        }
    }

    /// The base-facility fields carried by this document
    pub fn base(&self) -> AnalogInputConfig {
        AnalogInputConfig {
            name: self.name.clone(),
            pin: self.pin,
            rolling_average: self.rolling_average,
            average_size: self.average_size,
        }
    }

    /// The calibration coefficients carried by this document
    pub fn calibration(&self) -> PhCalibration {
        PhCalibration::new(self.cal_slope, self.cal_intercept)
    }
}
