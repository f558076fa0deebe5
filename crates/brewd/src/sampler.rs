//! Debounced power sampling.
//!
//! A single wattage reading is not trusted on its own: the heating element
//! cycles and the smart plug occasionally reports garbage. The sampler takes
//! two readings one measure interval apart and only passes a value on when
//! the two agree.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use tracing::info;

use crate::pause::Pause;
use crate::pause::Sleeper;

/// Agreement window for two readings at normal power
pub const TOLERANCE_WATTS: f64 = 40.0;

/// Agreement window once the first reading exceeds [`HIGH_POWER_WATTS`]
pub const HIGH_POWER_TOLERANCE_WATTS: f64 = 80.0;

/// Above this the absolute noise of the plug grows, so the window widens
pub const HIGH_POWER_WATTS: f64 = 2000.0;

/// Two readings closer than this are treated as suspiciously identical
pub const MIN_DELTA_WATTS: f64 = 1.0;

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("request to power sensor failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("power sensor returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed power reading: {0}")]
    Malformed(String),
}

/// Source of raw wattage readings
///
/// This trait allows for mocking the smart plug for testing purposes
#[async_trait]
pub trait PowerSensor: Send + Sync {
    /// Read the instantaneous power draw in watts
    async fn read_power(&mut self) -> Result<f64, SensorError>;
}

/// Why a sample could not be trusted
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("power sensor unavailable: {0}")]
    SensorUnavailable(#[from] SensorError),

    #[error("readings {first} W and {second} W do not agree within {tolerance} W")]
    AmbiguousReading {
        first: f64,
        second: f64,
        tolerance: f64,
    },
}

/// Verdict of one debounce window
#[derive(Debug)]
pub enum DebounceResult {
    Trusted(f64),
    Inconclusive(SampleError),
}

/// Agreement window for a pair whose first reading is `first`
pub fn tolerance_for(first: f64) -> f64 {
    if first > HIGH_POWER_WATTS {
        HIGH_POWER_TOLERANCE_WATTS
    } else {
        TOLERANCE_WATTS
    }
}

/// Decide whether two consecutive readings agree.
///
/// Two exact zeros mean the brewer is off. Otherwise the readings must differ
/// by more than [`MIN_DELTA_WATTS`] and at most the tolerance, and the second
/// one is trusted. Identical non-zero readings are not trusted.
pub fn debounce(first: f64, second: f64) -> DebounceResult {
    if first == 0.0 && second == 0.0 {
        return DebounceResult::Trusted(0.0);
    }

    let tolerance = tolerance_for(first);
    let delta = (first - second).abs();
    if delta > MIN_DELTA_WATTS && delta <= tolerance {
        DebounceResult::Trusted(second)
    } else {
        DebounceResult::Inconclusive(SampleError::AmbiguousReading {
            first,
            second,
            tolerance,
        })
    }
}

/// Wraps a [`PowerSensor`] with the two-read agreement check
pub struct Sampler<S: PowerSensor> {
    sensor: S,
    interval: Duration,
}

impl<S: PowerSensor> Sampler<S> {
    /// Create a sampler whose two reads are `interval` apart
    pub fn new(sensor: S, interval: Duration) -> Self {
        Self { sensor, interval }
    }

    #[cfg(test)]
    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Take one debounce window worth of readings.
    ///
    /// A failed read ends the window immediately. Brewer state is never
    /// touched here; the caller decides how long to back off.
    pub async fn sample<Z: Sleeper>(&mut self, sleeper: &Z) -> DebounceResult {
        let first = match self.sensor.read_power().await {
            Ok(watts) => watts,
            Err(e) => return DebounceResult::Inconclusive(e.into()),
        };
        info!("{} Watt", first);

        sleeper.sleep(Pause::InterRead, self.interval).await;

        let second = match self.sensor.read_power().await {
            Ok(watts) => watts,
            Err(e) => return DebounceResult::Inconclusive(e.into()),
        };
        info!("{} Watt", second);

        let result = debounce(first, second);
        debug!("Debounce verdict: {:?}", result);
        result
    }
}

/// Mock sensor for testing
///
/// Hands out queued readings in order; an empty queue reads as a failure.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockSensor {
    pub readings: std::collections::VecDeque<Result<f64, String>>,
    pub reads: usize,
}

#[cfg(test)]
impl MockSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sensor that will return `watts` in order
    pub fn with_readings(watts: &[f64]) -> Self {
        let mut sensor = Self::new();
        for w in watts {
            sensor.push(*w);
        }
        sensor
    }

    pub fn push(&mut self, watts: f64) {
        self.readings.push_back(Ok(watts));
    }

    pub fn push_failure(&mut self, reason: &str) {
        self.readings.push_back(Err(reason.to_string()));
    }
}

#[cfg(test)]
#[async_trait]
impl PowerSensor for MockSensor {
    async fn read_power(&mut self) -> Result<f64, SensorError> {
        self.reads += 1;
        match self.readings.pop_front() {
            Some(Ok(watts)) => Ok(watts),
            Some(Err(reason)) => Err(SensorError::Malformed(reason)),
            None => Err(SensorError::Malformed("no reading queued".to_string())),
        }
    }
}
