//! DFRobot-style analog pH probe
//!
//! Converts the probe's electrode voltage to pH with a linear two-point
//! calibration and keeps the coefficients in a JSON configuration file.
//! Calibration is an interactive three-step procedure against pH 4.0 and
//! pH 7.0 buffer solutions, driven by an external controller that feeds
//! the step index back in.

use heapless::{String, Vec};

use hydrion_core::config::calibration::PhCalibration;
use hydrion_core::config::types::{
    AnalogInputConfig, DeviceDescription, PhSensorConfig, MAX_CONFIG_LEN, MAX_PARAMETERS,
};
use hydrion_core::state::machine::{
    CalibrationResponse, CalibrationSession, CalibrationStep, ACID_PROMPT, CALIBRATION_DONE,
    NEUTRAL_PROMPT,
};
use hydrion_core::traits::{AdcError, AnalogInput, ConfigStorage, Sensor, StorageError};

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "DFpH.json";

/// Samples averaged per calibration anchor (never rolling-averaged)
const CALIBRATION_SAMPLES: u32 = 10;

/// Errors from configuration and measurement operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// JSON document could not be parsed
    Parse,
    /// Merged document could not be serialized
    Serialize,
    /// Stored file is not valid UTF-8
    InvalidUtf8,
    /// Storage operation failed
    Storage(StorageError),
    /// Analog base facility failed
    Adc(AdcError),
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        ConfigError::Storage(e)
    }
}

impl From<AdcError> for ConfigError {
    fn from(e: AdcError) -> Self {
        ConfigError::Adc(e)
    }
}

/// Analog pH probe with two-point buffer calibration
///
/// Composes an [`AnalogInput`] for sampling and a [`ConfigStorage`] for
/// the configuration file. The calibration coefficients live on the
/// driver; interim calibration state lives in the caller's
/// [`CalibrationSession`].
pub struct DfrPhSensor<A, S> {
    analog: A,
    storage: S,
    config_path: &'static str,
    cal: PhCalibration,
    description: DeviceDescription,
    values: Vec<f32, MAX_PARAMETERS>,
}

impl<A: AnalogInput, S: ConfigStorage> DfrPhSensor<A, S> {
    /// Create a driver over its collaborators
    pub fn new(analog: A, storage: S, config_path: &'static str) -> Self {
        Self {
            analog,
            storage,
            config_path,
            cal: PhCalibration::default(),
            description: DeviceDescription::default(),
            values: Vec::new(),
        }
    }

    /// Create a driver using [`DEFAULT_CONFIG_PATH`]
    pub fn with_default_path(analog: A, storage: S) -> Self {
        Self::new(analog, storage, DEFAULT_CONFIG_PATH)
    }

    /// Current calibration coefficients
    pub fn calibration(&self) -> PhCalibration {
        self.cal
    }

    /// Mutable access to the analog base facility
    pub fn analog_mut(&mut self) -> &mut A {
        &mut self.analog
    }

    /// Mutable access to the storage backend
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Consume the driver and reclaim its collaborators
    pub fn into_parts(self) -> (A, S) {
        (self.analog, self.storage)
    }

    /// Average `count` immediate samples, in millivolts
    ///
    /// Calibration always samples raw, without the rolling average.
    fn average_millivolts(&mut self, count: u32) -> Result<f32, AdcError> {
        let mut sum: i32 = 0;
        for _ in 0..count {
            let raw = self.analog.read_raw(false)?;
            sum += self.analog.to_millivolts(raw);
        }
        Ok(sum as f32 / count as f32)
    }

    /// Merge the base configuration with the calibration coefficients
    ///
    /// Fails open: an unparseable base document is replaced by defaults
    /// so callers always get a document, if a partial one.
    fn merged_config(&self) -> PhSensorConfig {
        let base_json = self.analog.get_config();
        let base = match serde_json_core::de::from_str::<AnalogInputConfig>(&base_json) {
            Ok((config, _)) => config,
            Err(_) => {
                warn!("Base config deserialization failed, merging over defaults");
                AnalogInputConfig::default()
            }
        };
        PhSensorConfig::merge(base, self.cal)
    }

    fn persist(&mut self, json: &str) -> Result<(), ConfigError> {
        self.storage.write(self.config_path, json.as_bytes())?;
        Ok(())
    }
}

impl<A: AnalogInput, S: ConfigStorage> Sensor for DfrPhSensor<A, S> {
    type Error = ConfigError;

    fn begin(&mut self) -> Result<(), ConfigError> {
        self.description = DeviceDescription::water_sensor("pH", "pH");
        self.values.clear();
        for _ in 0..self.description.parameter_count() {
            let _ = self.values.push(0.0);
        }

        if !self.storage.exists(self.config_path) {
            debug!("No stored config, writing defaults");
            let json = self.get_config()?;
            self.persist(&json)
        } else {
            let mut buf = [0u8; MAX_CONFIG_LEN];
            let len = self.storage.read(self.config_path, &mut buf)?;
            let contents =
                core::str::from_utf8(&buf[..len]).map_err(|_| ConfigError::InvalidUtf8)?;
            self.set_config(contents, false)
        }
    }

    fn take_measurement(&mut self) -> Result<(), ConfigError> {
        let rolling = self.analog.rolling_average();
        let raw = self.analog.read_raw(rolling)?;
        let millivolts = self.analog.to_millivolts(raw);
        let ph = self.cal.ph_from_millivolts(millivolts as f32);
        if let Some(slot) = self.values.first_mut() {
            *slot = ph;
        }
        Ok(())
    }

    fn description(&self) -> &DeviceDescription {
        &self.description
    }

    fn values(&self) -> &[f32] {
        &self.values
    }

    fn get_config(&mut self) -> Result<String<MAX_CONFIG_LEN>, ConfigError> {
        let merged = self.merged_config();
        serde_json_core::ser::to_string(&merged).map_err(|_| ConfigError::Serialize)
    }

    fn set_config(&mut self, config: &str, save: bool) -> Result<(), ConfigError> {
        // Base fields first; its partial application stands on our own
        // parse failure (non-atomic by contract)
        self.analog.set_config(config, false)?;

        let parsed = match serde_json_core::de::from_str::<PhSensorConfig>(config) {
            Ok((parsed, _)) => parsed,
            Err(_) => {
                error!("Config deserialization failed");
                return Err(ConfigError::Parse);
            }
        };
        self.cal = parsed.calibration();

        if save {
            // Persist the caller's document verbatim, not a re-serialization
            self.persist(config)?;
        }
        Ok(())
    }

    fn calibrate(&mut self, session: &mut CalibrationSession, step: i32) -> CalibrationResponse {
        info!("Calibrating pH sensor, step {}", step);
        match CalibrationStep::from_index(step) {
            Some(CalibrationStep::Instruct) => CalibrationResponse::next(ACID_PROMPT),
            Some(CalibrationStep::SampleAcid) => {
                match self.average_millivolts(CALIBRATION_SAMPLES) {
                    Ok(millivolts) => {
                        session.record_acid(millivolts);
                        CalibrationResponse::next(NEUTRAL_PROMPT)
                    }
                    Err(_) => CalibrationResponse::error("Acid reference read failed."),
                }
            }
            Some(CalibrationStep::SampleNeutral) => {
                let millivolts = match self.average_millivolts(CALIBRATION_SAMPLES) {
                    Ok(millivolts) => millivolts,
                    Err(_) => return CalibrationResponse::error("Neutral reference read failed."),
                };
                session.record_neutral(millivolts);

                let Some(cal) = session.fit() else {
                    return CalibrationResponse::error(
                        "Acid reference not sampled; run step 1 first.",
                    );
                };
                if !cal.is_finite() {
                    warn!("Rejecting degenerate calibration fit");
                    return CalibrationResponse::error("Reference voltages too close to fit.");
                }

                self.cal = cal;
                // Persist-on-commit; the in-memory coefficients stand even
                // if the write fails
                match self.get_config() {
                    Ok(json) => {
                        if self.persist(&json).is_err() {
                            error!("Failed to persist calibration");
                        }
                    }
                    Err(_) => error!("Failed to serialize calibration config"),
                }
                CalibrationResponse::done(CALIBRATION_DONE)
            }
            None => CalibrationResponse::invalid_step(step),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrion_core::config::calibration::{DEFAULT_INTERCEPT, DEFAULT_SLOPE};
    use hydrion_core::config::types::WATER_SENSOR_TYPE;
    use hydrion_core::state::machine::CalibrationStatus;

    const BASE_CONFIG: &str =
        r#"{"name":"Tank probe","pin":36,"rolling_average":false,"average_size":10}"#;

    /// Analog input returning a fixed raw value, 1 mV per count
    struct DummyAnalogInput {
        raw: u16,
        rolling: bool,
        fail_reads: bool,
        base_json: &'static str,
        last_rolling_arg: Option<bool>,
    }

    impl Default for DummyAnalogInput {
        fn default() -> Self {
            Self {
                raw: 1500,
                rolling: false,
                fail_reads: false,
                base_json: BASE_CONFIG,
                last_rolling_arg: None,
            }
        }
    }

    impl AnalogInput for DummyAnalogInput {
        fn read_raw(&mut self, rolling_average: bool) -> Result<u16, AdcError> {
            self.last_rolling_arg = Some(rolling_average);
            if self.fail_reads {
                Err(AdcError::Read)
            } else {
                Ok(self.raw)
            }
        }

        fn to_millivolts(&self, raw: u16) -> i32 {
            raw as i32
        }

        fn rolling_average(&self) -> bool {
            self.rolling
        }

        fn get_config(&self) -> String<MAX_CONFIG_LEN> {
            let mut out = String::new();
            let _ = out.push_str(self.base_json);
            out
        }

        fn set_config(&mut self, _json: &str, _persist: bool) -> Result<(), AdcError> {
            Ok(())
        }
    }

    /// Single-file in-memory storage
    #[derive(Default)]
    struct MemStorage {
        path: String<64>,
        contents: String<MAX_CONFIG_LEN>,
        present: bool,
        fail_writes: bool,
        writes: usize,
    }

    impl MemStorage {
        fn with_file(path: &str, contents: &str) -> Self {
            let mut storage = Self::default();
            let _ = storage.path.push_str(path);
            let _ = storage.contents.push_str(contents);
            storage.present = true;
            storage
        }
    }

    impl ConfigStorage for MemStorage {
        fn exists(&mut self, path: &str) -> bool {
            self.present && self.path.as_str() == path
        }

        fn read(&mut self, path: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
            if !self.exists(path) {
                return Err(StorageError::NotFound);
            }
            let data = self.contents.as_bytes();
            if buf.len() < data.len() {
                return Err(StorageError::BufferTooSmall);
            }
            buf[..data.len()].copy_from_slice(data);
            Ok(data.len())
        }

        fn write(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError> {
            if self.fail_writes {
                return Err(StorageError::WriteFailed);
            }
            let text = core::str::from_utf8(data).map_err(|_| StorageError::WriteFailed)?;
            self.path.clear();
            let _ = self.path.push_str(path);
            self.contents.clear();
            self.contents
                .push_str(text)
                .map_err(|_| StorageError::WriteFailed)?;
            self.present = true;
            self.writes += 1;
            Ok(())
        }
    }

    fn driver() -> DfrPhSensor<DummyAnalogInput, MemStorage> {
        DfrPhSensor::with_default_path(DummyAnalogInput::default(), MemStorage::default())
    }

    fn stored_config(sensor: &mut DfrPhSensor<DummyAnalogInput, MemStorage>) -> PhSensorConfig {
        let contents = sensor.storage_mut().contents.clone();
        let (config, _) = serde_json_core::de::from_str(&contents).unwrap();
        config
    }

    #[test]
    fn begin_populates_description_and_output_slot() {
        let mut sensor = driver();
        sensor.begin().unwrap();

        assert_eq!(sensor.description().device_type, WATER_SENSOR_TYPE);
        assert_eq!(sensor.description().parameters[0], "pH");
        assert_eq!(sensor.description().units[0], "pH");
        assert_eq!(sensor.values().len(), 1);
    }

    #[test]
    fn begin_creates_default_config_on_first_run() {
        let mut sensor = driver();
        sensor.begin().unwrap();

        assert_eq!(sensor.storage_mut().writes, 1);
        assert_eq!(sensor.storage_mut().path.as_str(), DEFAULT_CONFIG_PATH);

        let stored = stored_config(&mut sensor);
        assert!((stored.cal_slope - DEFAULT_SLOPE).abs() < 1e-9);
        assert!((stored.cal_intercept - DEFAULT_INTERCEPT).abs() < 1e-9);
        // Base fields merged from the analog facility
        assert_eq!(stored.name.as_str(), "Tank probe");

        // A second begin loads the stored file instead of rewriting it
        let before = sensor.calibration();
        sensor.begin().unwrap();
        assert_eq!(sensor.storage_mut().writes, 1);
        assert_eq!(sensor.calibration(), before);
    }

    #[test]
    fn begin_loads_existing_config_without_rewriting() {
        let storage = MemStorage::with_file(
            DEFAULT_CONFIG_PATH,
            r#"{"name":"Tank probe","pin":36,"rolling_average":false,"average_size":10,"cal_slope":-0.5,"cal_intercept":6.5}"#,
        );
        let mut sensor = DfrPhSensor::with_default_path(DummyAnalogInput::default(), storage);
        sensor.begin().unwrap();

        assert_eq!(sensor.storage_mut().writes, 0);
        let cal = sensor.calibration();
        assert!((cal.slope + 0.5).abs() < 1e-6);
        assert!((cal.intercept - 6.5).abs() < 1e-6);
    }

    #[test]
    fn measurement_applies_affine_transform() {
        let mut sensor = driver();
        sensor.begin().unwrap();

        sensor.analog_mut().raw = 1500;
        sensor.take_measurement().unwrap();
        assert!((sensor.values()[0] - 7.0).abs() < 1e-6);

        sensor.analog_mut().raw = 2032;
        sensor.take_measurement().unwrap();
        let expected = DEFAULT_SLOPE * (2032.0 - 1500.0) / 3.0 + DEFAULT_INTERCEPT;
        assert!((sensor.values()[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn measurement_honors_rolling_average_setting() {
        let mut sensor = driver();
        sensor.begin().unwrap();

        sensor.analog_mut().rolling = true;
        sensor.take_measurement().unwrap();
        assert_eq!(sensor.analog_mut().last_rolling_arg, Some(true));

        sensor.analog_mut().rolling = false;
        sensor.take_measurement().unwrap();
        assert_eq!(sensor.analog_mut().last_rolling_arg, Some(false));
    }

    #[test]
    fn measurement_surfaces_read_errors() {
        let mut sensor = driver();
        sensor.begin().unwrap();

        sensor.analog_mut().fail_reads = true;
        assert_eq!(sensor.take_measurement(), Err(ConfigError::Adc(AdcError::Read)));
    }

    #[test]
    fn config_round_trip_preserves_coefficients() {
        let mut sensor = driver();
        sensor.begin().unwrap();

        let first = sensor.get_config().unwrap();
        sensor.set_config(&first, false).unwrap();
        let second = sensor.get_config().unwrap();

        let (a, _): (PhSensorConfig, _) = serde_json_core::de::from_str(&first).unwrap();
        let (b, _): (PhSensorConfig, _) = serde_json_core::de::from_str(&second).unwrap();
        assert!((a.cal_slope - b.cal_slope).abs() < 1e-6);
        assert!((a.cal_intercept - b.cal_intercept).abs() < 1e-6);
    }

    #[test]
    fn malformed_config_is_rejected_and_state_kept() {
        let mut sensor = driver();
        sensor.begin().unwrap();
        let before = sensor.calibration();
        let writes_before = sensor.storage_mut().writes;

        assert_eq!(sensor.set_config("not json at all", true), Err(ConfigError::Parse));
        assert_eq!(sensor.calibration(), before);
        assert_eq!(sensor.storage_mut().writes, writes_before);
    }

    #[test]
    fn missing_calibration_keys_fall_back_to_defaults() {
        let mut sensor = driver();
        sensor.begin().unwrap();

        // Move the coefficients off the defaults first
        sensor
            .set_config(r#"{"cal_slope":-0.5,"cal_intercept":6.0}"#, false)
            .unwrap();
        assert!((sensor.calibration().slope + 0.5).abs() < 1e-6);

        // A document without calibration keys falls back to the defaults
        sensor.set_config(r#"{"name":"renamed"}"#, false).unwrap();
        let cal = sensor.calibration();
        assert!((cal.slope - DEFAULT_SLOPE).abs() < 1e-9);
        assert!((cal.intercept - DEFAULT_INTERCEPT).abs() < 1e-9);
    }

    #[test]
    fn save_persists_the_original_document_verbatim() {
        let mut sensor = driver();
        sensor.begin().unwrap();

        let document =
            r#"{"name":"Tank probe","pin":36,"rolling_average":true,"average_size":10,"cal_slope":-0.02,"cal_intercept":7.1}"#;
        sensor.set_config(document, true).unwrap();
        assert_eq!(sensor.storage_mut().contents.as_str(), document);
    }

    #[test]
    fn save_failure_propagates() {
        let mut sensor = driver();
        sensor.begin().unwrap();

        sensor.storage_mut().fail_writes = true;
        let document = sensor.get_config().unwrap();
        assert_eq!(
            sensor.set_config(&document, true),
            Err(ConfigError::Storage(StorageError::WriteFailed))
        );
    }

    #[test]
    fn calibrate_step_zero_is_instructional() {
        let mut sensor = driver();
        sensor.begin().unwrap();
        let mut session = CalibrationSession::new();

        for _ in 0..3 {
            let response = sensor.calibrate(&mut session, 0);
            assert_eq!(response.status, CalibrationStatus::Next);
            assert_eq!(response.message.as_str(), ACID_PROMPT);
        }
    }

    #[test]
    fn calibrate_rejects_unknown_steps() {
        let mut sensor = driver();
        sensor.begin().unwrap();
        let before = sensor.calibration();
        let mut session = CalibrationSession::new();

        let response = sensor.calibrate(&mut session, 5);
        assert_eq!(response.status, CalibrationStatus::Error);
        assert!(response.message.as_str().contains("5"));

        let response = sensor.calibrate(&mut session, -1);
        assert_eq!(response.status, CalibrationStatus::Error);
        assert!(response.message.as_str().contains("-1"));

        assert_eq!(sensor.calibration(), before);
    }

    #[test]
    fn two_point_calibration_end_to_end() {
        let mut sensor = driver();
        sensor.begin().unwrap();
        let mut session = CalibrationSession::new();

        // pH 4.0 buffer
        sensor.analog_mut().raw = 2032;
        let response = sensor.calibrate(&mut session, 1);
        assert_eq!(response.status, CalibrationStatus::Next);
        assert_eq!(response.message.as_str(), NEUTRAL_PROMPT);

        // pH 7.0 buffer
        sensor.analog_mut().raw = 1500;
        let response = sensor.calibrate(&mut session, 2);
        assert_eq!(response.status, CalibrationStatus::Done);
        assert_eq!(response.message.as_str(), CALIBRATION_DONE);

        let cal = sensor.calibration();
        assert!((cal.ph_from_millivolts(2032.0) - 4.0).abs() < 1e-3);
        assert!((cal.ph_from_millivolts(1500.0) - 7.0).abs() < 1e-3);

        // Committed coefficients were persisted
        let stored = stored_config(&mut sensor);
        assert!((stored.cal_slope - cal.slope).abs() < 1e-6);
        assert!((stored.cal_intercept - cal.intercept).abs() < 1e-6);
    }

    #[test]
    fn step_two_without_acid_anchor_is_rejected() {
        let mut sensor = driver();
        sensor.begin().unwrap();
        let before = sensor.calibration();
        let mut session = CalibrationSession::new();

        let response = sensor.calibrate(&mut session, 2);
        assert_eq!(response.status, CalibrationStatus::Error);
        assert_eq!(sensor.calibration(), before);
    }

    #[test]
    fn degenerate_fit_is_rejected() {
        let mut sensor = driver();
        sensor.begin().unwrap();
        let before = sensor.calibration();
        let mut session = CalibrationSession::new();

        sensor.analog_mut().raw = 1500;
        sensor.calibrate(&mut session, 1);
        let response = sensor.calibrate(&mut session, 2);

        assert_eq!(response.status, CalibrationStatus::Error);
        assert_eq!(sensor.calibration(), before);
    }

    #[test]
    fn adc_failure_during_calibration_is_an_error_response() {
        let mut sensor = driver();
        sensor.begin().unwrap();
        let mut session = CalibrationSession::new();

        sensor.analog_mut().fail_reads = true;
        let response = sensor.calibrate(&mut session, 1);
        assert_eq!(response.status, CalibrationStatus::Error);
        assert!(session.acid_mv().is_none());
    }
}
