//! Tick-driven probe controller state machine.
//!
//! [`ProbeEngine::step`] performs exactly one evaluation: it samples the
//! inputs and configuration, runs the transition for the current state, and
//! publishes the outputs for that tick. Values used by a firing cycle are
//! latched into a [`ConfigSnapshot`] when the trigger is accepted; the
//! ARMED timeout and the auto-rearm flag are read live every tick.
//!
//! The state is held as its raw register encoding and decoded on every
//! tick. An encoding that does not name a state sends the engine to FAULT.

mod state;

pub use state::ProbeState;

use crate::config::{ConfigError, ConfigSnapshot, ProbeConfig};
use crate::fault::{FaultLatch, FaultReason, RisingEdge};
use crate::monitor::{MonitorDetector, MonitorVerdict};
use crate::pulse::{PulseGenerator, PulseOutputs};
use crate::telemetry::{EventSink, ProbeEvent};
use crate::units::{SecondsCounter, TickRate, mv_to_code};

/// External levels sampled at the start of a tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ProbeInputs {
    /// Master gate; while low the engine cannot leave IDLE and any cycle in
    /// progress is abandoned.
    pub global_enable: bool,
    pub arm_enable: bool,
    /// Sampled level; the engine reacts to its rising edge.
    pub ext_trigger_in: bool,
    pub feedback_mv: i16,
}

impl ProbeInputs {
    /// Enabled, disarmed, trigger low and zero feedback.
    pub const IDLE: Self = Self {
        global_enable: true,
        arm_enable: false,
        ext_trigger_in: false,
        feedback_mv: 0,
    };
}

impl Default for ProbeInputs {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Outputs published at the end of a tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ProbeOutputs {
    pub trig_out_active: bool,
    pub trig_out_code: i16,
    pub intensity_out_active: bool,
    pub intensity_out_code: i16,
    pub ready: bool,
    pub busy: bool,
    pub fault: bool,
    pub current_state: ProbeState,
    pub state_code: u8,
    pub monitor: MonitorVerdict,
}

impl ProbeOutputs {
    /// Safe-state outputs reported before the first tick.
    pub const RESET: Self = Self {
        trig_out_active: false,
        trig_out_code: 0,
        intensity_out_active: false,
        intensity_out_code: 0,
        ready: true,
        busy: false,
        fault: false,
        current_state: ProbeState::Idle,
        state_code: ProbeState::IDLE_CODE,
        monitor: MonitorVerdict::Disabled,
    };

    fn compose(
        state: ProbeState,
        enabled: bool,
        pulses: PulseOutputs,
        monitor: MonitorVerdict,
    ) -> Self {
        // drive outputs exist only while FIRING
        let pulses = if state == ProbeState::Firing {
            pulses
        } else {
            PulseOutputs::default()
        };

        Self {
            trig_out_active: pulses.trigger.active,
            trig_out_code: pulses.trigger.code,
            intensity_out_active: pulses.intensity.active,
            intensity_out_code: pulses.intensity.code,
            ready: enabled && state == ProbeState::Idle,
            busy: matches!(state, ProbeState::Firing | ProbeState::Cooldown),
            fault: state == ProbeState::Fault,
            current_state: state,
            state_code: state.code(),
            monitor,
        }
    }
}

impl Default for ProbeOutputs {
    fn default() -> Self {
        Self::RESET
    }
}

/// Single-channel probe controller.
#[derive(Clone, Debug)]
pub struct ProbeEngine {
    rate: TickRate,
    state_code: u8,
    now: u64,
    latch: FaultLatch,
    trigger_edge: RisingEdge,
    pulses: PulseGenerator,
    monitor: MonitorDetector,
    snapshot: Option<ConfigSnapshot>,
    armed_timer: SecondsCounter,
    cooldown_count: u32,
    last_feedback: i16,
    outputs: ProbeOutputs,
}

impl Default for ProbeEngine {
    fn default() -> Self {
        Self::new(TickRate::DEFAULT)
    }
}

impl ProbeEngine {
    /// Creates an engine in IDLE running at `rate`.
    #[must_use]
    pub const fn new(rate: TickRate) -> Self {
        Self {
            rate,
            state_code: ProbeState::IDLE_CODE,
            now: 0,
            latch: FaultLatch::new(),
            trigger_edge: RisingEdge::new(),
            pulses: PulseGenerator::new(),
            monitor: MonitorDetector::new(),
            snapshot: None,
            armed_timer: SecondsCounter::new(),
            cooldown_count: 0,
            last_feedback: 0,
            outputs: ProbeOutputs::RESET,
        }
    }

    #[must_use]
    pub const fn rate(&self) -> TickRate {
        self.rate
    }

    /// Index of the next tick to be evaluated.
    #[must_use]
    pub const fn now(&self) -> u64 {
        self.now
    }

    /// Decoded state; `None` if the state register holds an unknown encoding.
    #[must_use]
    pub const fn state(&self) -> Option<ProbeState> {
        ProbeState::from_code(self.state_code)
    }

    #[must_use]
    pub const fn state_code(&self) -> u8 {
        self.state_code
    }

    #[must_use]
    pub const fn outputs(&self) -> ProbeOutputs {
        self.outputs
    }

    #[must_use]
    pub const fn fault_reason(&self) -> Option<FaultReason> {
        self.latch.reason()
    }

    /// Snapshot latched for the current or most recent firing cycle.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&ConfigSnapshot> {
        self.snapshot.as_ref()
    }

    /// Whole seconds spent in ARMED since it was last entered.
    #[must_use]
    pub const fn armed_seconds(&self) -> u32 {
        self.armed_timer.seconds()
    }

    /// Ticks spent in COOLDOWN since it was entered.
    #[must_use]
    pub const fn cooldown_ticks(&self) -> u32 {
        self.cooldown_count
    }

    /// Checks that `config` converts into tick-domain values at this engine's rate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CycleOverflow`] when a duration cannot be
    /// represented in the 32-bit cycle counters.
    pub fn validate(&self, config: &ProbeConfig) -> Result<ConfigSnapshot, ConfigError> {
        ConfigSnapshot::capture(config, self.rate)
    }

    /// Returns the engine to IDLE with cleared counters, latch and outputs.
    pub fn reset(&mut self) {
        *self = Self::new(self.rate);
    }

    /// Evaluates one tick without recording events.
    pub fn tick(&mut self, inputs: &ProbeInputs, config: &ProbeConfig) -> ProbeOutputs {
        self.step(inputs, config, &mut ())
    }

    /// Evaluates one tick, reporting events to `sink`.
    pub fn step<S>(
        &mut self,
        inputs: &ProbeInputs,
        config: &ProbeConfig,
        sink: &mut S,
    ) -> ProbeOutputs
    where
        S: EventSink + ?Sized,
    {
        let now = self.now;
        let feedback = mv_to_code(inputs.feedback_mv);
        let triggered = self.trigger_edge.update(inputs.ext_trigger_in);
        let cleared = self.latch.clear_on_edge(config.fault_clear());

        match ProbeState::from_code(self.state_code) {
            Some(ProbeState::Idle) => {
                if inputs.global_enable && inputs.arm_enable {
                    self.arm(config, sink);
                }
            }
            Some(ProbeState::Armed | ProbeState::Firing | ProbeState::Cooldown)
                if !inputs.global_enable =>
            {
                self.abandon_cycle(sink);
            }
            Some(ProbeState::Armed) => self.run_armed(inputs, triggered, feedback, config, sink),
            Some(ProbeState::Firing) => {
                if self.observe_monitor(feedback, sink) && self.pulses.is_complete(now) {
                    self.cooldown_count = 0;
                    sink.record(now, ProbeEvent::PulseCompleted);
                    self.transition(ProbeState::Cooldown, sink);
                }
            }
            Some(ProbeState::Cooldown) => self.run_cooldown(feedback, config, sink),
            Some(ProbeState::Fault) => {
                if cleared {
                    sink.record(now, ProbeEvent::FaultCleared);
                    self.transition(ProbeState::Idle, sink);
                }
            }
            None => self.enter_fault(FaultReason::IllegalState, sink),
        }

        self.last_feedback = feedback;
        let state = ProbeState::from_code(self.state_code).unwrap_or(ProbeState::Fault);
        self.outputs = ProbeOutputs::compose(
            state,
            inputs.global_enable,
            self.pulses.sample(now),
            self.monitor.verdict(),
        );
        self.now = now.wrapping_add(1);
        self.outputs
    }

    fn arm<S>(&mut self, config: &ProbeConfig, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        if let Err(err) = self.validate(config) {
            sink.record(self.now, ProbeEvent::ConfigRejected(err));
            self.enter_fault(FaultReason::InvalidConfiguration, sink);
            return;
        }

        self.armed_timer.reset();
        self.transition(ProbeState::Armed, sink);
    }

    fn run_armed<S>(
        &mut self,
        inputs: &ProbeInputs,
        triggered: bool,
        feedback: i16,
        config: &ProbeConfig,
        sink: &mut S,
    ) where
        S: EventSink + ?Sized,
    {
        self.armed_timer.advance(self.rate);
        let timeout = config.trigger_wait_timeout();

        if timeout != 0 && self.armed_timer.seconds() >= u32::from(timeout) {
            self.enter_fault(FaultReason::Timeout, sink);
        } else if !inputs.arm_enable {
            self.transition(ProbeState::Idle, sink);
        } else if triggered {
            self.fire(feedback, config, sink);
        }
    }

    fn fire<S>(&mut self, feedback: i16, config: &ProbeConfig, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        let snapshot = match self.validate(config) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                sink.record(self.now, ProbeEvent::ConfigRejected(err));
                self.enter_fault(FaultReason::InvalidConfiguration, sink);
                return;
            }
        };

        if self
            .pulses
            .start(self.now, snapshot.trigger, snapshot.intensity)
            .is_err()
        {
            self.enter_fault(FaultReason::IllegalState, sink);
            return;
        }

        self.snapshot = Some(snapshot);
        self.monitor.start(snapshot.monitor, self.last_feedback);
        sink.record(
            self.now,
            ProbeEvent::PulseStarted {
                trigger_cycles: snapshot.trigger.cycles,
                intensity_cycles: snapshot.intensity.cycles,
            },
        );
        self.transition(ProbeState::Firing, sink);

        // offset 0 of the monitor window is the trigger tick itself
        self.observe_monitor(feedback, sink);
    }

    fn run_cooldown<S>(&mut self, feedback: i16, config: &ProbeConfig, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        if !self.observe_monitor(feedback, sink) {
            return;
        }

        self.cooldown_count = self.cooldown_count.saturating_add(1);
        let required = self.snapshot.map_or(0, |snapshot| snapshot.cooldown_cycles);
        if self.cooldown_count < required || !self.monitor.verdict().is_resolved() {
            return;
        }

        self.cooldown_count = 0;
        if config.auto_rearm_enable() {
            self.armed_timer.reset();
            self.transition(ProbeState::Armed, sink);
        } else {
            self.transition(ProbeState::Idle, sink);
        }
    }

    /// Feeds the monitor. Returns `false` if the sample faulted the engine.
    fn observe_monitor<S>(&mut self, feedback: i16, sink: &mut S) -> bool
    where
        S: EventSink + ?Sized,
    {
        let before = self.monitor.verdict();
        let verdict = self.monitor.observe(feedback);
        if verdict != before && verdict.is_resolved() {
            sink.record(self.now, ProbeEvent::MonitorResolved(verdict));
        }

        if verdict == MonitorVerdict::NotCrossed {
            self.enter_fault(FaultReason::MonitorMismatch, sink);
            return false;
        }
        true
    }

    /// Drops any cycle in progress and returns to IDLE without a fault.
    fn abandon_cycle<S>(&mut self, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        self.pulses.abort();
        self.monitor.cancel();
        self.cooldown_count = 0;
        self.armed_timer.reset();
        self.transition(ProbeState::Idle, sink);
    }

    fn enter_fault<S>(&mut self, reason: FaultReason, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        self.pulses.abort();
        self.monitor.cancel();
        self.cooldown_count = 0;
        self.armed_timer.reset();

        if self.latch.set(reason) {
            sink.record(self.now, ProbeEvent::FaultLatched(reason));
        }
        self.transition(ProbeState::Fault, sink);
    }

    fn transition<S>(&mut self, to: ProbeState, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        let from = ProbeState::from_code(self.state_code);
        self.state_code = to.code();
        match from {
            Some(from) if from != to => {
                sink.record(self.now, ProbeEvent::StateChanged { from, to });
            }
            _ => {}
        }
    }

    #[cfg(test)]
    fn corrupt_state_code(&mut self, code: u8) {
        self.state_code = code;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{ProbeEventKind, TelemetryRecorder};

    fn fast_rate() -> TickRate {
        // 1 tick per microsecond keeps cycle counts readable
        TickRate::new(1_000_000).expect("rate")
    }

    fn armed_engine(config: &ProbeConfig) -> ProbeEngine {
        let mut engine = ProbeEngine::new(fast_rate());
        let inputs = ProbeInputs {
            arm_enable: true,
            ..ProbeInputs::default()
        };
        let outputs = engine.tick(&inputs, config);
        assert_eq!(outputs.current_state, ProbeState::Armed);
        engine
    }

    #[test]
    fn unknown_state_encoding_faults() {
        let config = ProbeConfig::default();
        let mut engine = ProbeEngine::new(fast_rate());
        engine.corrupt_state_code(0b01_0101);
        assert_eq!(engine.state(), None);

        let mut recorder = TelemetryRecorder::<8>::new();
        let outputs = engine.step(&ProbeInputs::default(), &config, &mut recorder);

        assert_eq!(outputs.current_state, ProbeState::Fault);
        assert_eq!(outputs.state_code, ProbeState::FAULT_CODE);
        assert!(outputs.fault && !outputs.ready && !outputs.busy);
        assert_eq!(engine.fault_reason(), Some(FaultReason::IllegalState));
        assert_eq!(
            recorder.latest().map(|record| record.event.kind()),
            Some(ProbeEventKind::FaultLatched(FaultReason::IllegalState))
        );
    }

    #[test]
    fn trigger_edge_must_follow_arming() {
        let mut config = ProbeConfig::default();
        config.set_monitor_enable(false);
        let mut engine = ProbeEngine::new(fast_rate());

        // trigger already high while arming is not an edge once ARMED
        let held = ProbeInputs {
            arm_enable: true,
            ext_trigger_in: true,
            ..ProbeInputs::IDLE
        };
        engine.tick(&held, &config);
        assert_eq!(engine.tick(&held, &config).current_state, ProbeState::Armed);

        let low = ProbeInputs {
            ext_trigger_in: false,
            ..held
        };
        engine.tick(&low, &config);
        assert_eq!(engine.tick(&held, &config).current_state, ProbeState::Firing);
    }

    #[test]
    fn fault_aborts_pulses_mid_flight() {
        let mut config = ProbeConfig::default();
        config.set_trig_out_duration(50_000).expect("in range");
        config.set_intensity_duration(50_000).expect("in range");
        config.set_monitor_window_duration(100).expect("in range");
        config.set_trig_out_voltage(1_000).expect("in range");

        let mut engine = armed_engine(&config);
        let fire = ProbeInputs {
            arm_enable: true,
            ext_trigger_in: true,
            ..ProbeInputs::IDLE
        };
        let outputs = engine.tick(&fire, &config);
        assert!(outputs.trig_out_active);
        assert_eq!(outputs.trig_out_code, mv_to_code(1_000));

        // 100 ns at 1 MHz is a single-tick window; it closes on the next tick
        let outputs = engine.tick(&fire, &config);
        assert_eq!(outputs.current_state, ProbeState::Fault);
        assert!(!outputs.trig_out_active && !outputs.intensity_out_active);
        assert_eq!(engine.fault_reason(), Some(FaultReason::MonitorMismatch));
    }

    #[test]
    fn ready_follows_global_enable_in_idle() {
        let config = ProbeConfig::default();
        let mut engine = ProbeEngine::new(fast_rate());
        assert!(engine.tick(&ProbeInputs::IDLE, &config).ready);

        let gated = ProbeInputs {
            global_enable: false,
            arm_enable: true,
            ..ProbeInputs::IDLE
        };
        let outputs = engine.tick(&gated, &config);
        assert_eq!(outputs.current_state, ProbeState::Idle);
        assert!(!outputs.ready);
    }

    #[test]
    fn reset_returns_to_idle_from_fault() {
        let config = ProbeConfig::default();
        let mut engine = ProbeEngine::new(fast_rate());
        engine.corrupt_state_code(0xFF);
        engine.tick(&ProbeInputs::default(), &config);
        assert!(engine.outputs().fault);

        engine.reset();
        assert_eq!(engine.state(), Some(ProbeState::Idle));
        assert_eq!(engine.fault_reason(), None);
        assert_eq!(engine.outputs(), ProbeOutputs::RESET);
        assert_eq!(engine.now(), 0);
    }

    #[test]
    fn invalid_configuration_faults_when_arming() {
        let mut config = ProbeConfig::default();
        config
            .set_monitor_window_duration(2_000_000_000)
            .expect("in range");
        let mut engine = ProbeEngine::new(TickRate::new(u32::MAX).expect("rate"));
        let mut recorder = TelemetryRecorder::<8>::new();

        let inputs = ProbeInputs {
            arm_enable: true,
            ..ProbeInputs::default()
        };
        let outputs = engine.step(&inputs, &config, &mut recorder);

        assert_eq!(outputs.current_state, ProbeState::Fault);
        assert_eq!(engine.fault_reason(), Some(FaultReason::InvalidConfiguration));
        let first = recorder.oldest_first().next().map(|record| record.event);
        assert!(matches!(
            first,
            Some(ProbeEvent::ConfigRejected(ConfigError::CycleOverflow { .. }))
        ));
    }
}
