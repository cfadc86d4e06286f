//! Simulated probe bench binding the engine to its configuration and inputs.
//!
//! The bench owns everything a front-end needs to drive the controller by
//! hand: the register configuration, the input levels that persist between
//! ticks, and a telemetry ring fed by every step.

use crate::config::{ConfigError, ConfigField, ProbeConfig};
use crate::engine::{ProbeEngine, ProbeInputs, ProbeOutputs};
use crate::fault::FaultReason;
use crate::telemetry::{TELEMETRY_RING_CAPACITY, TelemetryRecorder};
use crate::units::TickRate;

/// Engine, configuration, held inputs and telemetry for one probe channel.
pub struct ProbeBench<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    engine: ProbeEngine,
    config: ProbeConfig,
    inputs: ProbeInputs,
    telemetry: TelemetryRecorder<CAPACITY>,
}

impl<const CAPACITY: usize> Default for ProbeBench<CAPACITY> {
    fn default() -> Self {
        Self::new(TickRate::DEFAULT)
    }
}

impl<const CAPACITY: usize> ProbeBench<CAPACITY> {
    #[must_use]
    pub const fn new(rate: TickRate) -> Self {
        Self {
            engine: ProbeEngine::new(rate),
            config: ProbeConfig::new(),
            inputs: ProbeInputs::IDLE,
            telemetry: TelemetryRecorder::new(),
        }
    }

    #[must_use]
    pub const fn engine(&self) -> &ProbeEngine {
        &self.engine
    }

    #[must_use]
    pub const fn config(&self) -> &ProbeConfig {
        &self.config
    }

    #[must_use]
    pub const fn inputs(&self) -> &ProbeInputs {
        &self.inputs
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder<CAPACITY> {
        &self.telemetry
    }

    pub fn set_enable(&mut self, level: bool) {
        self.inputs.global_enable = level;
    }

    pub fn set_arm(&mut self, level: bool) {
        self.inputs.arm_enable = level;
    }

    pub fn set_trigger(&mut self, level: bool) {
        self.inputs.ext_trigger_in = level;
    }

    /// Drives the feedback input.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] outside ±5000 mV.
    pub fn set_feedback(&mut self, mv: i64) -> Result<(), ConfigError> {
        let field = ConfigField::ProbeMonitorFeedback;
        field.check(mv)?;
        let (min, max) = field.range();
        self.inputs.feedback_mv = i16::try_from(mv).map_err(|_| ConfigError::OutOfRange {
            field,
            value: mv,
            min,
            max,
        })?;
        Ok(())
    }

    /// Writes a register field.
    ///
    /// The candidate configuration is converted at the engine tick rate before
    /// it is committed, so a write that would overflow a cycle counter is
    /// rejected here rather than faulting the next firing cycle.
    ///
    /// # Errors
    ///
    /// Returns the range, read-only or overflow error; the stored configuration
    /// is unchanged on error.
    pub fn write(&mut self, field: ConfigField, value: i64) -> Result<(), ConfigError> {
        if field.is_read_only() {
            return self.set_feedback(value);
        }

        let mut candidate = self.config;
        candidate.set(field, value)?;
        self.engine.validate(&candidate)?;
        self.config = candidate;
        Ok(())
    }

    /// Reads a register field or the feedback input.
    #[must_use]
    pub fn read(&self, field: ConfigField) -> i64 {
        self.config
            .get(field)
            .unwrap_or_else(|| i64::from(self.inputs.feedback_mv))
    }

    /// Evaluates one tick with the held inputs.
    ///
    /// `fault_clear` is write-one-to-clear: a high level is consumed by the
    /// tick that samples it, so every write or acknowledge yields a fresh edge.
    pub fn tick(&mut self) -> ProbeOutputs {
        let outputs = self
            .engine
            .step(&self.inputs, &self.config, &mut self.telemetry);
        self.config.set_fault_clear(false);
        outputs
    }

    /// Evaluates `count` ticks and returns the final outputs.
    pub fn run(&mut self, count: u32) -> ProbeOutputs {
        let mut outputs = self.engine.outputs();
        for _ in 0..count {
            outputs = self.tick();
        }
        outputs
    }

    /// Holds `ext_trigger_in` high for a single tick.
    pub fn pulse_trigger(&mut self) -> ProbeOutputs {
        self.inputs.ext_trigger_in = true;
        let outputs = self.tick();
        self.inputs.ext_trigger_in = false;
        outputs
    }

    /// Raises `fault_clear` for a single tick.
    pub fn acknowledge_fault(&mut self) -> ProbeOutputs {
        self.config.set_fault_clear(true);
        self.tick()
    }

    #[must_use]
    pub const fn outputs(&self) -> ProbeOutputs {
        self.engine.outputs()
    }

    #[must_use]
    pub const fn fault_reason(&self) -> Option<FaultReason> {
        self.engine.fault_reason()
    }

    #[must_use]
    pub const fn now(&self) -> u64 {
        self.engine.now()
    }

    /// Resets the engine and releases the held inputs; configuration is kept.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.inputs = ProbeInputs::IDLE;
        self.config.set_fault_clear(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ProbeState;

    #[test]
    fn overflowing_write_is_rejected_at_the_boundary() {
        let mut bench = ProbeBench::<8>::new(TickRate::new(u32::MAX).expect("rate"));
        let err = bench
            .write(ConfigField::MonitorWindowDuration, 2_000_000_000)
            .expect_err("overflow");
        assert!(matches!(err, ConfigError::CycleOverflow { .. }));
        assert_eq!(bench.config().monitor_window_duration(), 5_000);
    }

    #[test]
    fn feedback_writes_are_range_checked() {
        let mut bench = ProbeBench::<8>::default();
        bench
            .write(ConfigField::ProbeMonitorFeedback, -1_500)
            .expect("in range");
        assert_eq!(bench.read(ConfigField::ProbeMonitorFeedback), -1_500);
        assert!(bench.set_feedback(5_001).is_err());
        assert_eq!(bench.inputs().feedback_mv, -1_500);
    }

    #[test]
    fn acknowledge_releases_fault_clear() {
        let mut bench = ProbeBench::<8>::new(TickRate::new(1_000).expect("rate"));
        bench.write(ConfigField::TriggerWaitTimeout, 1).expect("in range");
        bench.set_arm(true);
        bench.run(1_001);
        assert_eq!(bench.outputs().current_state, ProbeState::Fault);

        let outputs = bench.acknowledge_fault();
        assert_eq!(outputs.current_state, ProbeState::Idle);
        assert!(!bench.config().fault_clear());
    }

    #[test]
    fn acknowledge_after_a_written_fault_clear_still_clears() {
        let mut bench = ProbeBench::<8>::new(TickRate::new(1_000).expect("rate"));
        bench.write(ConfigField::TriggerWaitTimeout, 1).expect("in range");
        bench.write(ConfigField::FaultClear, 1).expect("in range");
        bench.tick();
        assert!(!bench.config().fault_clear());

        bench.set_arm(true);
        bench.run(1_001);
        assert_eq!(bench.outputs().current_state, ProbeState::Fault);

        bench.set_arm(false);
        bench.write(ConfigField::FaultClear, 1).expect("in range");
        assert_eq!(bench.tick().current_state, ProbeState::Idle);
    }
}
