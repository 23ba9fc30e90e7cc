//! Configuration types
//!
//! Board-agnostic configuration structures persisted as JSON text.

pub mod calibration;
pub mod types;

pub use calibration::*;
pub use types::*;
