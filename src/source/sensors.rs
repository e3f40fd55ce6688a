//! Simulated environmental sensors.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use time::OffsetDateTime;

use super::{DataSource, Reading};
use crate::error::{Error, Result};

/// State shared by every simulated sensor.
#[derive(Debug)]
struct SensorCore {
    id: String,
    name: &'static str,
    unit: &'static str,
    min: f64,
    max: f64,
    active: bool,
    last_value: Option<f64>,
    rng: StdRng,
}

impl SensorCore {
    fn new(
        id: impl Into<String>,
        name: &'static str,
        unit: &'static str,
        range: (f64, f64),
        rng: StdRng,
    ) -> Self {
        Self {
            id: id.into(),
            name,
            unit,
            min: range.0,
            max: range.1,
            active: true,
            last_value: None,
            rng,
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.active {
            Ok(())
        } else {
            Err(Error::SourceDisabled(self.id.clone()))
        }
    }

    /// Clamps to the sensor range, rounds to two decimals and records the
    /// value as the latest one.
    fn finish(&mut self, value: f64, now: OffsetDateTime, reason: Option<String>) -> Reading {
        let value = (value.clamp(self.min, self.max) * 100.0).round() / 100.0;
        self.last_value = Some(value);
        Reading {
            source_id: self.id.clone(),
            timestamp: now,
            value,
            unit: self.unit.to_string(),
            reason,
        }
    }
}

macro_rules! impl_data_source {
    ($sensor:ty) => {
        impl DataSource for $sensor {
            fn id(&self) -> &str {
                &self.core.id
            }

            fn name(&self) -> &str {
                self.core.name
            }

            fn unit(&self) -> &str {
                self.core.unit
            }

            fn is_active(&self) -> bool {
                self.core.active
            }

            fn set_active(&mut self, active: bool) {
                self.core.active = active;
            }

            fn last_value(&self) -> Option<f64> {
                self.core.last_value
            }

            fn read(&mut self, now: OffsetDateTime) -> Result<Reading> {
                self.core.ensure_active()?;
                Ok(self.generate(now))
            }
        }
    };
}

/// Temperature in °C, a random walk of ±5 per read.
#[derive(Debug)]
pub struct TemperatureSensor {
    core: SensorCore,
}

impl TemperatureSensor {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_rng(id, StdRng::from_entropy())
    }

    pub fn with_seed(id: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(id, StdRng::seed_from_u64(seed))
    }

    fn with_rng(id: impl Into<String>, rng: StdRng) -> Self {
        Self {
            core: SensorCore::new(id, "Temperature sensor", "°C", (-20.0, 50.0), rng),
        }
    }

    fn generate(&mut self, now: OffsetDateTime) -> Reading {
        let core = &mut self.core;
        let value = match core.last_value {
            None => core.rng.gen_range(core.min + 5.0..core.max - 5.0),
            Some(last) => last + core.rng.gen_range(-5.0..5.0),
        };
        core.finish(value, now, None)
    }
}

impl_data_source!(TemperatureSensor);

/// Weather condition drawn by the humidity sensor on each read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weather {
    Rain,
    DryAir,
    Calm,
}

/// Relative humidity in %, pulled down by heat and up by cold.
#[derive(Debug)]
pub struct HumiditySensor {
    core: SensorCore,
    base: Option<f64>,
    temperature: Option<f64>,
    weather: Option<Weather>,
}

impl HumiditySensor {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_rng(id, StdRng::from_entropy())
    }

    pub fn with_seed(id: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(id, StdRng::seed_from_u64(seed))
    }

    fn with_rng(id: impl Into<String>, rng: StdRng) -> Self {
        Self {
            core: SensorCore::new(id, "Humidity sensor", "%", (0.0, 100.0), rng),
            base: None,
            temperature: None,
            weather: None,
        }
    }

    /// Latest temperature used to adjust the next reading.
    pub fn set_temperature(&mut self, celsius: Option<f64>) {
        self.temperature = celsius;
    }

    /// Weather drawn on the last read, if any was drawn yet.
    pub fn weather(&self) -> Option<Weather> {
        self.weather
    }

    fn generate(&mut self, now: OffsetDateTime) -> Reading {
        let core = &mut self.core;
        let Some(base) = self.base else {
            let base = core.rng.gen_range(core.min + 10.0..core.max - 10.0);
            self.base = Some(base);
            return core.finish(base, now, None);
        };

        let Some(temp) = self.temperature else {
            return core.finish(base, now, None);
        };

        // One percentage point per degree away from 15 °C.
        let mut value = base * (1.0 + (15.0 - temp) / 100.0);
        let mut reason = None;
        let roll: f64 = core.rng.gen();
        let weather = if roll <= 0.2 {
            let delta = core.rng.gen_range(1.0..3.0);
            value += delta;
            reason = Some(format!("+{delta:.2}% from rainfall"));
            Weather::Rain
        } else if roll <= 0.4 {
            let delta = core.rng.gen_range(-3.0..-1.0);
            value += delta;
            reason = Some(format!("{delta:.2}% from dry air"));
            Weather::DryAir
        } else {
            value += core.rng.gen_range(-1.0..1.0);
            Weather::Calm
        };
        self.weather = Some(weather);
        core.finish(value, now, reason)
    }
}

impl_data_source!(HumiditySensor);

/// Atmospheric pressure in hPa around a fixed base.
#[derive(Debug)]
pub struct PressureSensor {
    core: SensorCore,
    base: f64,
}

impl PressureSensor {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_rng(id, StdRng::from_entropy())
    }

    pub fn with_seed(id: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(id, StdRng::seed_from_u64(seed))
    }

    fn with_rng(id: impl Into<String>, mut rng: StdRng) -> Self {
        let base = rng.gen_range(955.0..1045.0);
        Self {
            core: SensorCore::new(id, "Pressure sensor", "hPa", (950.0, 1050.0), rng),
            base,
        }
    }

    fn generate(&mut self, now: OffsetDateTime) -> Reading {
        let core = &mut self.core;
        let mut delta = core.rng.gen_range(-5.0..5.0);
        if core.rng.gen::<f64>() <= 0.2 {
            delta += core.rng.gen_range(-5.0..5.0);
        }
        core.finish(self.base + delta, now, None)
    }
}

impl_data_source!(PressureSensor);

/// Air quality classification of an AQI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirQualityLevel {
    Good,
    Moderate,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AirQualityLevel {
    pub fn from_aqi(aqi: f64) -> Self {
        match aqi {
            v if v <= 50.0 => AirQualityLevel::Good,
            v if v <= 100.0 => AirQualityLevel::Moderate,
            v if v <= 200.0 => AirQualityLevel::Unhealthy,
            v if v <= 300.0 => AirQualityLevel::VeryUnhealthy,
            _ => AirQualityLevel::Hazardous,
        }
    }
}

/// Air quality index, worse in rush hours, washed out by rain.
#[derive(Debug)]
pub struct AirQualitySensor {
    core: SensorCore,
    base: f64,
    weather: Option<Weather>,
}

impl AirQualitySensor {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_rng(id, StdRng::from_entropy())
    }

    pub fn with_seed(id: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(id, StdRng::seed_from_u64(seed))
    }

    fn with_rng(id: impl Into<String>, mut rng: StdRng) -> Self {
        let base = rng.gen_range(20.0..100.0);
        Self {
            core: SensorCore::new(id, "Air quality sensor", "AQI", (0.0, 500.0), rng),
            base,
            weather: None,
        }
    }

    /// Weather reported by the humidity sensor for the next reading.
    pub fn set_weather(&mut self, weather: Option<Weather>) {
        self.weather = weather;
    }

    /// Classification of the last reading.
    pub fn level(&self) -> Option<AirQualityLevel> {
        self.core.last_value.map(AirQualityLevel::from_aqi)
    }

    fn generate(&mut self, now: OffsetDateTime) -> Reading {
        let core = &mut self.core;
        let rush_hour = matches!(now.hour(), 7..=9 | 14..=17);
        let mut value = if rush_hour {
            self.base + core.rng.gen_range(20.0..30.0)
        } else {
            self.base + core.rng.gen_range(-10.0..-5.0)
        };

        let mut reason = None;
        match self.weather {
            Some(Weather::Rain) => {
                let improvement = core.rng.gen_range(10.0..20.0);
                value -= improvement;
                reason = Some(format!("-{improvement:.2} AQI from rainfall"));
            }
            Some(Weather::DryAir) => {
                let delta = core.rng.gen_range(1.0..3.0);
                value += delta;
                reason = Some(format!("+{delta:.2} AQI from dry air"));
            }
            Some(Weather::Calm) => value += core.rng.gen_range(-5.0..5.0),
            None => {}
        }

        let roll: f64 = core.rng.gen();
        if roll <= 0.1 {
            value -= core.rng.gen_range(20.0..45.0);
        } else if roll <= 0.2 {
            value += core.rng.gen_range(20.0..45.0);
        }
        core.finish(value, now, reason)
    }
}

impl_data_source!(AirQualitySensor);
