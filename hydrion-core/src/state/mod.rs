//! Calibration procedure state machine
//!
//! Defines the step sequence of the two-point buffer calibration.
//! The machine is explicit, finite, and deterministic; the caller owns
//! the session state and feeds the step index back in.

pub mod machine;

pub use machine::{
    CalibrationResponse, CalibrationSession, CalibrationStatus, CalibrationStep, ACID_PROMPT,
    CALIBRATION_DONE, NEUTRAL_PROMPT,
};
