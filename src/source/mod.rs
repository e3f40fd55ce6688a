//! Data sources feeding the log.
//!
//! Sources do not know about the log. An orchestrator reads them and hands
//! each [`Reading`] to [`BufferedLog::log_reading`]; [`SensorArray`] is the
//! stock orchestrator for the simulated sensors.

mod sensors;

pub use sensors::{
    AirQualityLevel, AirQualitySensor, HumiditySensor, PressureSensor, TemperatureSensor,
    Weather,
};

use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::writer::BufferedLog;

/// One value produced by a data source.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub source_id: String,
    pub timestamp: OffsetDateTime,
    pub value: f64,
    pub unit: String,
    /// Environmental effect that shifted the value, when one applied.
    pub reason: Option<String>,
}

/// A producer of timestamped readings.
pub trait DataSource {
    fn id(&self) -> &str;

    /// Human readable description.
    fn name(&self) -> &str;

    fn unit(&self) -> &str;

    fn is_active(&self) -> bool;

    fn set_active(&mut self, active: bool);

    fn last_value(&self) -> Option<f64>;

    /// Produces the next reading. Fails with [`Error::SourceDisabled`] when
    /// the source has been switched off.
    fn read(&mut self, now: OffsetDateTime) -> Result<Reading>;
}

/// Default ids used by [`SensorArray::new`].
pub const DEFAULT_IDS: [&str; 4] = ["temp_1", "hum_2", "press_3", "air_4"];

/// The four simulated sensors, read together so that temperature can drive
/// humidity and humidity's weather can drive air quality.
pub struct SensorArray {
    pub temperature: TemperatureSensor,
    pub humidity: HumiditySensor,
    pub pressure: PressureSensor,
    pub air_quality: AirQualitySensor,
}

impl SensorArray {
    pub fn new() -> Self {
        let [t, h, p, a] = DEFAULT_IDS;
        Self {
            temperature: TemperatureSensor::new(t),
            humidity: HumiditySensor::new(h),
            pressure: PressureSensor::new(p),
            air_quality: AirQualitySensor::new(a),
        }
    }

    /// Deterministic sensors for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        let [t, h, p, a] = DEFAULT_IDS;
        Self {
            temperature: TemperatureSensor::with_seed(t, seed),
            humidity: HumiditySensor::with_seed(h, seed.wrapping_add(1)),
            pressure: PressureSensor::with_seed(p, seed.wrapping_add(2)),
            air_quality: AirQualitySensor::with_seed(a, seed.wrapping_add(3)),
        }
    }

    /// Reads every active sensor once. Disabled sensors are skipped.
    pub fn read_all(&mut self, now: OffsetDateTime) -> Result<Vec<Reading>> {
        let mut readings = Vec::with_capacity(4);

        push_active(&mut readings, self.temperature.read(now))?;

        self.humidity.set_temperature(self.temperature.last_value());
        push_active(&mut readings, self.humidity.read(now))?;

        push_active(&mut readings, self.pressure.read(now))?;

        self.air_quality.set_weather(self.humidity.weather());
        push_active(&mut readings, self.air_quality.read(now))?;

        Ok(readings)
    }

    /// Reads every active sensor once and logs each reading.
    pub fn read_into(
        &mut self,
        log: &mut BufferedLog,
        now: OffsetDateTime,
    ) -> Result<Vec<Reading>> {
        let readings = self.read_all(now)?;
        for reading in &readings {
            log.log_reading(
                &reading.source_id,
                reading.timestamp,
                reading.value,
                &reading.unit,
            )?;
        }
        Ok(readings)
    }

    pub fn sources_mut(&mut self) -> [&mut dyn DataSource; 4] {
        [
            &mut self.temperature,
            &mut self.humidity,
            &mut self.pressure,
            &mut self.air_quality,
        ]
    }
}

impl Default for SensorArray {
    fn default() -> Self {
        Self::new()
    }
}

fn push_active(readings: &mut Vec<Reading>, result: Result<Reading>) -> Result<()> {
    match result {
        Ok(reading) => readings.push(reading),
        Err(Error::SourceDisabled(id)) => log::debug!("source {id} is disabled, skipping"),
        Err(err) => return Err(err),
    }
    Ok(())
}
