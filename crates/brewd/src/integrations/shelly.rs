//! Shelly smart plug power sensor.
//!
//! Gen1 plugs report `{"power": 12.3, ...}` on `/meter/0` and
//! `{"meters": [{"power": 12.3, ...}], ...}` on `/status`. Gen2 plugs report
//! `{"apower": 12.3, ...}` on `/rpc/Switch.GetStatus?id=0`. Any of these works.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::SensorConfig;
use crate::sampler::PowerSensor;
use crate::sampler::SensorError;

#[derive(Debug, Deserialize)]
struct Meter {
    #[serde(alias = "apower")]
    power: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Meter(Meter),
    Status { meters: Vec<Meter> },
}

/// Parse a meter or status payload into watts
pub fn parse_power(body: &[u8]) -> Result<f64, SensorError> {
    let payload: Payload = serde_json::from_slice(body)
        .map_err(|_| SensorError::Malformed("no power reading in payload".to_string()))?;

    let power = match payload {
        Payload::Meter(meter) => meter.power,
        // Plugs have a single meter
        Payload::Status { meters } => match meters.first() {
            Some(meter) => meter.power,
            None => return Err(SensorError::Malformed("status lists no meters".to_string())),
        },
    };

    if !power.is_finite() || power < 0.0 {
        return Err(SensorError::Malformed(format!(
            "power must be a non-negative number, got {}",
            power
        )));
    }

    Ok(power)
}

pub struct ShellySensor {
    client: reqwest::Client,
    url: String,
}

impl ShellySensor {
    pub fn new(config: &SensorConfig) -> Result<Self, SensorError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl PowerSensor for ShellySensor {
    async fn read_power(&mut self) -> Result<f64, SensorError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SensorError::Status(status));
        }

        let body = response.bytes().await?;
        let watts = parse_power(&body)?;
        debug!("Read {} W from {}", watts, self.url);
        Ok(watts)
    }
}
