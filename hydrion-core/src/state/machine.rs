//! Calibration step machine
//!
//! The procedure runs AwaitAcid -> AwaitNeutral -> Done, with an error
//! sink for invalid step indices. There are no backward transitions; an
//! external controller tracks the current step index and feeds it back
//! in on every call.

use core::fmt::Write;

use heapless::String;

use crate::config::calibration::PhCalibration;

/// Maximum length of a calibration response message
pub const MAX_MESSAGE_LEN: usize = 96;

/// Caller prompt issued before the acid reference step
pub const ACID_PROMPT: &str = "Place sensor in pH 4.0 solution and wait for it to stabilize.";

/// Caller prompt issued before the neutral reference step
pub const NEUTRAL_PROMPT: &str = "Place sensor in pH 7.0 and wait for it to stabilize.";

/// Message accompanying the final, committing step
pub const CALIBRATION_DONE: &str = "Calibration complete.";

/// Steps of the two-point calibration procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationStep {
    /// Purely instructional; no measurement taken
    Instruct = 0,
    /// Sample the probe in the pH 4.0 buffer
    SampleAcid = 1,
    /// Sample the probe in the pH 7.0 buffer, then fit and commit
    SampleNeutral = 2,
}

impl CalibrationStep {
    /// Map a caller-supplied step index to a step
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(CalibrationStep::Instruct),
            1 => Some(CalibrationStep::SampleAcid),
            2 => Some(CalibrationStep::SampleNeutral),
            _ => None,
        }
    }
}

/// Outcome category of one calibration call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationStatus {
    /// Step accepted; reposition the probe and call the next step
    Next,
    /// Procedure finished; coefficients committed
    Done,
    /// Step rejected; calibration state unchanged
    Error,
}

/// Response returned by every calibration call
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationResponse {
    pub status: CalibrationStatus,
    pub message: String<MAX_MESSAGE_LEN>,
}

impl CalibrationResponse {
    fn with_message(status: CalibrationStatus, text: &str) -> Self {
        let mut message = String::new();
        // All fixed messages fit MAX_MESSAGE_LEN; anything longer is dropped
        let _ = message.push_str(text);
        Self { status, message }
    }

    /// Step accepted, more steps to come
    pub fn next(text: &str) -> Self {
        Self::with_message(CalibrationStatus::Next, text)
    }

    /// Procedure complete
    pub fn done(text: &str) -> Self {
        Self::with_message(CalibrationStatus::Done, text)
    }

    /// Step rejected
    pub fn error(text: &str) -> Self {
        Self::with_message(CalibrationStatus::Error, text)
    }

    /// Response for a step index outside the procedure
    pub fn invalid_step(index: i32) -> Self {
        let mut message = String::new();
        let _ = write!(message, "No such calibration step: {}", index);
        Self {
            status: CalibrationStatus::Error,
            message,
        }
    }
}

/// Caller-owned accumulator for one calibration run
///
/// Holds the averaged anchor voltages recorded by steps 1 and 2. The
/// driver updates the session in place; starting a fresh run means
/// passing a fresh session. Sessions are not persisted across restarts.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationSession {
    acid_mv: Option<f32>,
    neutral_mv: Option<f32>,
}

impl Default for CalibrationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationSession {
    /// Start an empty session
    pub const fn new() -> Self {
        Self {
            acid_mv: None,
            neutral_mv: None,
        }
    }

    /// Record the averaged acid-buffer voltage
    pub fn record_acid(&mut self, millivolts: f32) {
        self.acid_mv = Some(millivolts);
    }

    /// Record the averaged neutral-buffer voltage
    pub fn record_neutral(&mut self, millivolts: f32) {
        self.neutral_mv = Some(millivolts);
    }

    /// Averaged acid-buffer voltage, if step 1 has run
    pub fn acid_mv(&self) -> Option<f32> {
        self.acid_mv
    }

    /// Averaged neutral-buffer voltage, if step 2 has run
    pub fn neutral_mv(&self) -> Option<f32> {
        self.neutral_mv
    }

    /// Closed-form fit, available once both anchors are recorded
    pub fn fit(&self) -> Option<PhCalibration> {
        match (self.acid_mv, self.neutral_mv) {
            (Some(acid), Some(neutral)) => Some(PhCalibration::from_two_point(acid, neutral)),
            _ => None,
        }
    }
}
