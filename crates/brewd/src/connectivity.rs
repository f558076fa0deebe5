//! Startup reachability check for the power sensor.

use std::time::Duration;

use tracing::info;
use tracing::warn;

use crate::pause::Pause;
use crate::pause::Sleeper;
use crate::sampler::PowerSensor;
use crate::sampler::SensorError;

/// Wait between reachability attempts
pub const CONNECT_RETRY: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
#[error("power sensor unreachable after {attempts} attempts: {source}")]
pub struct ConnectivityLost {
    pub attempts: u32,
    #[source]
    pub source: SensorError,
}

/// Read the sensor until it answers, at most `attempts` times.
///
/// Giving up is fatal for the process; the supervisor is expected to restart
/// it.
pub async fn wait_for_sensor<S: PowerSensor, Z: Sleeper>(
    sensor: &mut S,
    sleeper: &Z,
    attempts: u32,
) -> Result<f64, ConnectivityLost> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match sensor.read_power().await {
            Ok(watts) => {
                info!("Power sensor reachable ({} W)", watts);
                return Ok(watts);
            }
            Err(e) if attempt >= attempts => {
                return Err(ConnectivityLost {
                    attempts,
                    source: e,
                });
            }
            Err(e) => {
                warn!(
                    "Waiting for power sensor (attempt {}/{}): {}",
                    attempt, attempts, e
                );
                sleeper.sleep(Pause::ConnectRetry, CONNECT_RETRY).await;
                attempt += 1;
            }
        }
    }
}
