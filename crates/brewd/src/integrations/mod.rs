pub mod hue;
pub mod shelly;

pub use hue::HueBridge;
pub use shelly::ShellySensor;
