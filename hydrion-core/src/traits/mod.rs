//! Hardware abstraction traits
//!
//! These traits define the seams between the driver logic and the
//! platform: analog sampling, configuration storage, and the sensor
//! surface consumed by the device-management layer.

pub mod analog;
pub mod sensor;
pub mod storage;

pub use analog::{AdcError, AnalogInput};
pub use sensor::Sensor;
pub use storage::{ConfigStorage, StorageError};
