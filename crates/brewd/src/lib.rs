pub mod config;
pub mod connectivity;
pub mod integrations;
mod monitor;
pub mod notify;
pub mod pause;
pub mod phase;
pub mod sampler;

pub use config::Config;
pub use config::ConfigError;
pub use config::IdlePolicy;
pub use config::LogLevel;
pub use connectivity::ConnectivityLost;
pub use connectivity::wait_for_sensor;
pub use monitor::Cycle;
pub use monitor::Monitor;
pub use notify::Color;
pub use notify::Lights;
pub use notify::NotificationSink;
pub use pause::Pause;
pub use pause::Sleeper;
pub use pause::TokioSleeper;
pub use phase::BrewPhase;
pub use phase::Transition;
pub use sampler::DebounceResult;
pub use sampler::PowerSensor;
pub use sampler::SensorError;
