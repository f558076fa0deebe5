//! Brewer phase state machine.
//!
//! Power bands, calibrated for a double brewer with a hot plate:
//! - above [`BREWING_WATTS`]: the water heater is running
//! - between [`STANDBY_WATTS`] and [`HOTPLATE_WATTS`]: only the hot plate is on
//! - exactly zero: the brewer is switched off
//!
//! Anything else (the gap between the hot plate and heater bands, or a
//! sub-watt trickle) carries no information and leaves the phase alone.

use std::time::Duration;

use tracing::debug;
use tracing::info;

use crate::notify::Color;
use crate::notify::Lights;
use crate::notify::NotificationSink;
use crate::pause::Pause;
use crate::pause::Sleeper;

/// Readings at or below this are standby noise
pub const STANDBY_WATTS: f64 = 1.0;

/// Upper bound of the hot plate band
pub const HOTPLATE_WATTS: f64 = 300.0;

/// Readings above this mean water is being heated
pub const BREWING_WATTS: f64 = 1000.0;

/// Inferred operating mode of the brewer
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BrewPhase {
    #[default]
    Off,
    Brewing,
    StaleCoffeeIdle,
    FreshCoffeeIdle,
}

/// What a trusted reading means for the current phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Transition {
    /// Hot plate on without a brew before it
    ReheatingOldCoffee,
    /// Heater stopped after a brew
    FreshCoffeeReady,
    BrewingStarted,
    StillBrewing,
    TurnedOff,
    /// Zero watts while already off
    Idle,
    /// Reading outside every band, or a band with no rule for this phase
    Hold,
}

impl Transition {
    /// Phase after applying this transition to `current`
    pub fn next_phase(self, current: BrewPhase) -> BrewPhase {
        match self {
            Transition::ReheatingOldCoffee => BrewPhase::StaleCoffeeIdle,
            Transition::FreshCoffeeReady => BrewPhase::FreshCoffeeIdle,
            Transition::BrewingStarted | Transition::StillBrewing => BrewPhase::Brewing,
            Transition::TurnedOff | Transition::Idle => BrewPhase::Off,
            Transition::Hold => current,
        }
    }

    /// Status line logged when the transition happens
    pub fn announcement(self) -> Option<&'static str> {
        match self {
            Transition::ReheatingOldCoffee => Some("reheating old coffee"),
            Transition::FreshCoffeeReady => Some("fresh coffee ready"),
            Transition::BrewingStarted => Some("brewing started"),
            Transition::TurnedOff => Some("brewer turned off"),
            Transition::StillBrewing | Transition::Idle | Transition::Hold => None,
        }
    }
}

/// Map a trusted reading and the current phase to a transition.
///
/// Rules are checked in order and the first match wins.
pub fn decide(phase: BrewPhase, watts: f64) -> Transition {
    let hotplate = watts > STANDBY_WATTS && watts <= HOTPLATE_WATTS;
    let heater = watts > BREWING_WATTS;
    let off = watts == 0.0;

    match phase {
        BrewPhase::Off | BrewPhase::StaleCoffeeIdle if hotplate => Transition::ReheatingOldCoffee,
        BrewPhase::Brewing if hotplate => Transition::FreshCoffeeReady,
        BrewPhase::Brewing if heater => Transition::StillBrewing,
        _ if heater => Transition::BrewingStarted,
        BrewPhase::Off if off => Transition::Idle,
        _ if off => Transition::TurnedOff,
        _ => Transition::Hold,
    }
}

/// What the control loop should do after a trusted sample was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Wait a full cadence before sampling again
    Settle,
    /// Sample again straight away
    Resample,
}

/// Owns the brewer phase and renders its changes
#[derive(Debug)]
pub struct PhaseMachine {
    phase: BrewPhase,
    drip_down: Duration,
    blink: Duration,
}

impl PhaseMachine {
    /// Start in [`BrewPhase::Off`]
    pub fn new(drip_down: Duration, blink: Duration) -> Self {
        Self {
            phase: BrewPhase::Off,
            drip_down,
            blink,
        }
    }

    pub fn phase(&self) -> BrewPhase {
        self.phase
    }

    /// Feed one trusted reading through the machine, performing the side
    /// effects of the resulting transition.
    pub async fn observe<L: Lights, Z: Sleeper>(
        &mut self,
        watts: f64,
        sink: &mut NotificationSink<L>,
        sleeper: &Z,
    ) -> (Transition, Step) {
        let transition = decide(self.phase, watts);
        debug!("{} W in phase {} -> {}", watts, self.phase, transition);

        match transition {
            Transition::ReheatingOldCoffee => sink.set_color(Color::Green).await,
            Transition::FreshCoffeeReady => {
                sleeper.sleep(Pause::DripDown, self.drip_down).await;
                sink.set_color(Color::Green).await;
            }
            Transition::BrewingStarted => sink.set_color(Color::Yellow).await,
            Transition::StillBrewing => {
                if sink.is_enabled() {
                    sink.lights_off().await;
                    sleeper.sleep(Pause::Blink, self.blink).await;
                    sink.set_color(Color::Yellow).await;
                }
            }
            Transition::TurnedOff => sink.set_color(Color::Red).await,
            Transition::Idle => return (transition, Step::Resample),
            Transition::Hold => {}
        }

        let next = transition.next_phase(self.phase);
        if let Some(announcement) = transition.announcement() {
            info!("{} ({} -> {}, {} W)", announcement, self.phase, next, watts);
        }
        self.phase = next;

        (transition, Step::Settle)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::notify::LightCommand;
    use crate::notify::MockLights;
    use crate::pause::RecordingSleeper;

    fn machine_in(phase: BrewPhase) -> PhaseMachine {
        let mut machine = PhaseMachine::new(Duration::from_secs(30), Duration::from_secs(1));
        machine.phase = phase;
        machine
    }

    #[test]
    fn test_decision_table() {
        use BrewPhase::*;
        use Transition::*;

        let cases = [
            (Off, 150.0, ReheatingOldCoffee),
            (StaleCoffeeIdle, 150.0, ReheatingOldCoffee),
            (FreshCoffeeIdle, 150.0, Hold),
            (Brewing, 150.0, FreshCoffeeReady),
            (Off, 1500.0, BrewingStarted),
            (StaleCoffeeIdle, 1500.0, BrewingStarted),
            (FreshCoffeeIdle, 1500.0, BrewingStarted),
            (Brewing, 1500.0, StillBrewing),
            (Off, 0.0, Idle),
            (Brewing, 0.0, TurnedOff),
            (StaleCoffeeIdle, 0.0, TurnedOff),
            (FreshCoffeeIdle, 0.0, TurnedOff),
            (Off, 500.0, Hold),
            (Brewing, 500.0, Hold),
            (Off, 0.5, Hold),
            (FreshCoffeeIdle, 1.0, Hold),
        ];

        for (phase, watts, expected) in cases {
            assert_eq!(
                decide(phase, watts),
                expected,
                "{} W in phase {}",
                watts,
                phase
            );
        }
    }

    #[test]
    fn test_band_edges() {
        assert_eq!(decide(BrewPhase::Off, 300.0), Transition::ReheatingOldCoffee);
        assert_eq!(decide(BrewPhase::Off, 300.5), Transition::Hold);
        assert_eq!(decide(BrewPhase::Off, 1000.0), Transition::Hold);
        assert_eq!(decide(BrewPhase::Off, 1000.5), Transition::BrewingStarted);
        assert_eq!(decide(BrewPhase::Off, 1.5), Transition::ReheatingOldCoffee);
    }

    #[test]
    fn test_next_phase() {
        assert_eq!(
            Transition::Hold.next_phase(BrewPhase::FreshCoffeeIdle),
            BrewPhase::FreshCoffeeIdle
        );
        assert_eq!(
            Transition::TurnedOff.next_phase(BrewPhase::StaleCoffeeIdle),
            BrewPhase::Off
        );
        assert_eq!(BrewPhase::default(), BrewPhase::Off);
    }

    #[tokio::test]
    async fn test_reheating_from_off() {
        let lights = MockLights::new();
        let mut sink = NotificationSink::Hue(lights.clone());
        let sleeper = RecordingSleeper::new();
        let mut machine = machine_in(BrewPhase::Off);

        let (transition, step) = machine.observe(150.0, &mut sink, &sleeper).await;

        assert_eq!(transition, Transition::ReheatingOldCoffee);
        assert_eq!(step, Step::Settle);
        assert_eq!(machine.phase(), BrewPhase::StaleCoffeeIdle);
        assert_eq!(lights.commands(), vec![LightCommand::Set(29000)]);
        assert!(sleeper.pauses().is_empty());
    }

    #[tokio::test]
    async fn test_fresh_coffee_waits_for_drip_down() {
        let lights = MockLights::new();
        let mut sink = NotificationSink::Hue(lights.clone());
        let sleeper = RecordingSleeper::new();
        let mut machine = machine_in(BrewPhase::Brewing);

        let (transition, _) = machine.observe(150.0, &mut sink, &sleeper).await;

        assert_eq!(transition, Transition::FreshCoffeeReady);
        assert_eq!(machine.phase(), BrewPhase::FreshCoffeeIdle);
        assert_eq!(
            sleeper.pauses(),
            vec![(Pause::DripDown, Duration::from_secs(30))]
        );
        assert_eq!(lights.commands(), vec![LightCommand::Set(29000)]);
    }

    #[tokio::test]
    async fn test_still_brewing_blinks() {
        let lights = MockLights::new();
        let mut sink = NotificationSink::Hue(lights.clone());
        let sleeper = RecordingSleeper::new();
        let mut machine = machine_in(BrewPhase::Brewing);

        let (transition, step) = machine.observe(1500.0, &mut sink, &sleeper).await;

        assert_eq!(transition, Transition::StillBrewing);
        assert_eq!(step, Step::Settle);
        assert_eq!(machine.phase(), BrewPhase::Brewing);
        assert_eq!(
            lights.commands(),
            vec![LightCommand::Off, LightCommand::Set(10000)]
        );
        assert_eq!(
            sleeper.pauses(),
            vec![(Pause::Blink, Duration::from_secs(1))]
        );
    }

    #[tokio::test]
    async fn test_blink_skipped_without_lights() {
        let mut sink: NotificationSink<MockLights> = NotificationSink::NoOp;
        let sleeper = RecordingSleeper::new();
        let mut machine = machine_in(BrewPhase::Brewing);

        machine.observe(1500.0, &mut sink, &sleeper).await;

        assert!(sleeper.pauses().is_empty());
        assert_eq!(machine.phase(), BrewPhase::Brewing);
    }

    #[tokio::test]
    async fn test_turned_off_resets_phase() {
        let lights = MockLights::new();
        let mut sink = NotificationSink::Hue(lights.clone());
        let sleeper = RecordingSleeper::new();
        let mut machine = machine_in(BrewPhase::StaleCoffeeIdle);

        let (transition, step) = machine.observe(0.0, &mut sink, &sleeper).await;

        assert_eq!(transition, Transition::TurnedOff);
        assert_eq!(step, Step::Settle);
        assert_eq!(machine.phase(), BrewPhase::Off);
        assert_eq!(lights.commands(), vec![LightCommand::Set(65000)]);
    }

    #[tokio::test]
    async fn test_idle_is_silent_and_resamples() {
        let lights = MockLights::new();
        let mut sink = NotificationSink::Hue(lights.clone());
        let sleeper = RecordingSleeper::new();
        let mut machine = machine_in(BrewPhase::Off);

        for _ in 0..3 {
            let (transition, step) = machine.observe(0.0, &mut sink, &sleeper).await;
            assert_eq!(transition, Transition::Idle);
            assert_eq!(step, Step::Resample);
        }

        assert_eq!(machine.phase(), BrewPhase::Off);
        assert!(lights.commands().is_empty());
        assert!(sleeper.pauses().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_sink_still_transitions() {
        let mut sink: NotificationSink<MockLights> = NotificationSink::NoOp;
        let sleeper = RecordingSleeper::new();
        let mut machine = machine_in(BrewPhase::Off);

        machine.observe(1500.0, &mut sink, &sleeper).await;

        assert_eq!(machine.phase(), BrewPhase::Brewing);
    }

    proptest! {
        #[test]
        fn off_brewer_below_standby_stays_dark(
            readings in prop::collection::vec(prop_oneof![Just(0.0f64), 0.0f64..=1.0], 1..20),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let lights = MockLights::new();
            let mut sink = NotificationSink::Hue(lights.clone());
            let sleeper = RecordingSleeper::new();
            let mut machine = machine_in(BrewPhase::Off);

            for watts in readings {
                let (transition, step) =
                    rt.block_on(machine.observe(watts, &mut sink, &sleeper));
                if watts == 0.0 {
                    prop_assert_eq!(transition, Transition::Idle);
                    prop_assert_eq!(step, Step::Resample);
                } else {
                    prop_assert_eq!(transition, Transition::Hold);
                }
                prop_assert_eq!(machine.phase(), BrewPhase::Off);
            }

            prop_assert!(lights.commands().is_empty());
            prop_assert!(sleeper.pauses().is_empty());
        }
    }
}
