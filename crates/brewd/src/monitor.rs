use tracing::debug;
use tracing::info;

use crate::config::IdlePolicy;
use crate::config::TimingConfig;
use crate::notify::Lights;
use crate::notify::NotificationSink;
use crate::pause::Pause;
use crate::pause::Sleeper;
use crate::phase::BrewPhase;
use crate::phase::PhaseMachine;
use crate::phase::Step;
use crate::phase::Transition;
use crate::sampler::DebounceResult;
use crate::sampler::PowerSensor;
use crate::sampler::Sampler;

/// Outcome of one monitor cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cycle {
    /// The sample was not trusted; the phase was left alone
    Inconclusive,
    /// A trusted sample was fed to the state machine
    Observed { watts: f64, transition: Transition },
}

/// brewd monitor
///
/// Owns the sampler, the phase machine and the notification sink, and drives
/// them in a single loop. Nothing else reads or writes the brewer phase.
pub struct Monitor<S: PowerSensor, L: Lights, Z: Sleeper> {
    sampler: Sampler<S>,
    machine: PhaseMachine,
    sink: NotificationSink<L>,
    sleeper: Z,
    timing: TimingConfig,
}

impl<S: PowerSensor, L: Lights, Z: Sleeper> Monitor<S, L, Z> {
    pub fn new(sensor: S, sink: NotificationSink<L>, sleeper: Z, timing: TimingConfig) -> Self {
        Self {
            sampler: Sampler::new(sensor, timing.measure_interval()),
            machine: PhaseMachine::new(timing.drip_down(), timing.blink()),
            sink,
            sleeper,
            timing,
        }
    }

    pub fn phase(&self) -> BrewPhase {
        self.machine.phase()
    }

    /// Run one cycle: sample, feed the machine, and wait as the result asks.
    pub async fn cycle(&mut self) -> Cycle {
        let watts = match self.sampler.sample(&self.sleeper).await {
            DebounceResult::Trusted(watts) => watts,
            DebounceResult::Inconclusive(e) => {
                debug!("Sample inconclusive, backing off: {}", e);
                self.sleeper
                    .sleep(Pause::Backoff, self.timing.backoff())
                    .await;
                return Cycle::Inconclusive;
            }
        };

        let (transition, step) = self
            .machine
            .observe(watts, &mut self.sink, &self.sleeper)
            .await;

        let settle = match step {
            Step::Settle => true,
            Step::Resample => self.timing.idle_policy == IdlePolicy::Cadence,
        };
        if settle {
            self.sleeper
                .sleep(Pause::Cadence, self.timing.measure_interval())
                .await;
        }

        Cycle::Observed { watts, transition }
    }

    /// Run forever
    pub async fn run(&mut self) {
        info!(
            "Monitor starting in phase {} (lights {})",
            self.phase(),
            if self.sink.is_enabled() {
                "enabled"
            } else {
                "disabled"
            }
        );

        loop {
            self.cycle().await;
        }
    }
}
