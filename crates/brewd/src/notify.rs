//! Lighting notifications.

use std::error::Error;

use async_trait::async_trait;
use tracing::debug;
use tracing::warn;

/// Colors used to signal the brewer phase, as Hue hue values
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Color {
    Green,
    Yellow,
    Red,
}

impl Color {
    pub fn hue(self) -> u16 {
        match self {
            Color::Green => 29000,
            Color::Yellow => 10000,
            Color::Red => 65000,
        }
    }
}

/// A set of lights that can be colored or switched off together
#[async_trait]
pub trait Lights: Send + Sync {
    /// Switch every light on with the given hue
    async fn set_all_lights(&mut self, hue: u16) -> Result<(), Box<dyn Error + Send>>;

    /// Switch every light off
    async fn turn_off_all_lights(&mut self) -> Result<(), Box<dyn Error + Send>>;
}

/// Where phase changes are rendered, chosen once at startup.
///
/// Light commands are best effort: failures are logged and swallowed so the
/// monitor never stops over a lighting problem.
pub enum NotificationSink<L: Lights> {
    NoOp,
    Hue(L),
}

impl<L: Lights> NotificationSink<L> {
    pub fn is_enabled(&self) -> bool {
        matches!(self, NotificationSink::Hue(_))
    }

    pub async fn set_color(&mut self, color: Color) {
        match self {
            NotificationSink::NoOp => debug!("Lighting disabled, not setting {}", color),
            NotificationSink::Hue(lights) => {
                if let Err(e) = lights.set_all_lights(color.hue()).await {
                    warn!("Failed to set lights to {}: {}", color, e);
                }
            }
        }
    }

    pub async fn lights_off(&mut self) {
        match self {
            NotificationSink::NoOp => debug!("Lighting disabled, not turning lights off"),
            NotificationSink::Hue(lights) => {
                if let Err(e) = lights.turn_off_all_lights().await {
                    warn!("Failed to turn lights off: {}", e);
                }
            }
        }
    }
}

/// Command received by [`MockLights`]
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightCommand {
    Set(u16),
    Off,
}

/// Mock lights for testing
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MockLights {
    commands: std::sync::Arc<std::sync::Mutex<Vec<LightCommand>>>,
    pub fail: bool,
}

#[cfg(test)]
impl MockLights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lights that reject every command
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Commands received so far, shared between clones
    pub fn commands(&self) -> Vec<LightCommand> {
        self.commands.lock().unwrap().clone()
    }

    fn record(&self, cmd: LightCommand) -> Result<(), Box<dyn Error + Send>> {
        self.commands.lock().unwrap().push(cmd);
        if self.fail {
            return Err(Box::new(std::io::Error::other("bridge unreachable")));
        }
        Ok(())
    }
}

#[cfg(test)]
#[async_trait]
impl Lights for MockLights {
    async fn set_all_lights(&mut self, hue: u16) -> Result<(), Box<dyn Error + Send>> {
        self.record(LightCommand::Set(hue))
    }

    async fn turn_off_all_lights(&mut self) -> Result<(), Box<dyn Error + Send>> {
        self.record(LightCommand::Off)
    }
}
