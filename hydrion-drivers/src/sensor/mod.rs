//! Water-quality sensor drivers

pub mod dfr_ph;

pub use dfr_ph::{ConfigError, DfrPhSensor, DEFAULT_CONFIG_PATH};
