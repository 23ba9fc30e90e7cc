//! Driver implementations for Hydrion probes
//!
//! This crate provides concrete implementations of the traits defined
//! in hydrion-core:
//!
//! - Water-quality sensors (analog pH probe with two-point calibration)

#![no_std]
#![deny(unsafe_code)]

// This must come first so the macros are visible crate-wide
mod fmt;

pub mod sensor;
