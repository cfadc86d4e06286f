#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Tick loop glue between `probe-core` and the board.
//!
//! [`ProbeController`] owns the engine and evaluates one tick per call to
//! [`ProbeController::step`]: it drains operator requests, reads the shared
//! register configuration, samples the board through [`ProbeHardware`], drives
//! the results back out and publishes them to [`crate::status`]. Nothing here
//! touches peripherals directly, so the loop is exercised by host tests.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use probe_core::telemetry::{EventSink, ProbeEvent, TELEMETRY_RING_CAPACITY, TelemetryRecorder};
use probe_core::{
    ConfigError, ConfigField, ConfigSnapshot, ProbeConfig, ProbeEngine, ProbeInputs,
    ProbeOutputs, TickRate,
};

use crate::status;

pub mod scaling;

/// Depth of the operator request queue.
pub const CONTROL_QUEUE_DEPTH: usize = 4;

/// Period of the firmware tick loop in microseconds.
pub const TICK_PERIOD_US: u64 = 10;

/// Engine tick rate matching [`TICK_PERIOD_US`].
pub const FIRMWARE_TICK_HZ: u32 = 100_000;

#[cfg(target_os = "none")]
type ProbeMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type ProbeMutex = NoopRawMutex;

/// Register configuration shared by the console (writer) and tick loop (reader).
pub type SharedConfig = Mutex<ProbeMutex, Cell<ProbeConfig>>;

/// Queue carrying operator requests into the tick loop.
pub type ControlQueue = Channel<ProbeMutex, ControlRequest, CONTROL_QUEUE_DEPTH>;

pub type ControlSender<'a> = Sender<'a, ProbeMutex, ControlRequest, CONTROL_QUEUE_DEPTH>;

pub type ControlReceiver<'a> = Receiver<'a, ProbeMutex, ControlRequest, CONTROL_QUEUE_DEPTH>;

/// Requests the tick loop applies before its next evaluation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlRequest {
    /// Raise `fault_clear` for exactly one tick.
    AcknowledgeFault,
    /// Synchronously reset the engine to IDLE.
    Reset,
}

/// Board access needed by the tick loop.
pub trait ProbeHardware {
    /// Samples `arm_enable`, `ext_trigger_in` and the feedback voltage.
    fn sample(&mut self) -> ProbeInputs;

    /// Applies the outputs published for the tick.
    fn drive(&mut self, outputs: &ProbeOutputs);
}

/// Creates a shared configuration holding the register defaults.
#[must_use]
pub const fn shared_config() -> SharedConfig {
    Mutex::new(Cell::new(ProbeConfig::new()))
}

/// Validates and commits a register write to the shared configuration.
///
/// # Errors
///
/// Returns the range, read-only or cycle-overflow error; the stored
/// configuration is unchanged on error.
pub fn write_field(
    shared: &SharedConfig,
    rate: TickRate,
    field: ConfigField,
    value: i64,
) -> Result<(), ConfigError> {
    shared.lock(|cell| {
        let mut candidate = cell.get();
        candidate.set(field, value)?;
        ConfigSnapshot::capture(&candidate, rate)?;
        cell.set(candidate);
        Ok(())
    })
}

/// Single probe channel driven from the firmware tick loop.
pub struct ProbeController<'a, H, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    engine: ProbeEngine,
    hardware: H,
    config: &'a SharedConfig,
    requests: ControlReceiver<'a>,
    telemetry: TelemetryRecorder<CAPACITY>,
}

impl<'a, H, const CAPACITY: usize> ProbeController<'a, H, CAPACITY>
where
    H: ProbeHardware,
{
    /// Creates a controller and forces the board into the safe state.
    pub fn new(
        rate: TickRate,
        mut hardware: H,
        config: &'a SharedConfig,
        requests: ControlReceiver<'a>,
    ) -> Self {
        hardware.drive(&ProbeOutputs::RESET);
        status::publish(&ProbeOutputs::RESET, None, 0);
        Self {
            engine: ProbeEngine::new(rate),
            hardware,
            config,
            requests,
            telemetry: TelemetryRecorder::new(),
        }
    }

    pub fn engine(&self) -> &ProbeEngine {
        &self.engine
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    pub fn telemetry(&self) -> &TelemetryRecorder<CAPACITY> {
        &self.telemetry
    }

    /// Evaluates one tick.
    pub fn step(&mut self) -> ProbeOutputs {
        let mut acknowledge = false;
        while let Ok(request) = self.requests.try_receive() {
            match request {
                ControlRequest::AcknowledgeFault => acknowledge = true,
                ControlRequest::Reset => {
                    self.engine.reset();
                    log_reset();
                }
            }
        }

        // fault_clear is write-one-to-clear; this tick consumes a written level
        let mut config = self.config.lock(|cell| {
            let config = cell.get();
            if config.fault_clear() {
                let mut consumed = config;
                consumed.set_fault_clear(false);
                cell.set(consumed);
            }
            config
        });
        if acknowledge {
            config.set_fault_clear(true);
        }

        let inputs = self.hardware.sample();
        status::record_feedback(inputs.feedback_mv);
        let mut sink = LoggingSink {
            recorder: &mut self.telemetry,
        };
        let outputs = self.engine.step(&inputs, &config, &mut sink);
        self.hardware.drive(&outputs);
        status::publish(&outputs, self.engine.fault_reason(), self.engine.now());
        outputs
    }
}

/// Records into the telemetry ring and mirrors each event to the log.
struct LoggingSink<'r, const CAPACITY: usize> {
    recorder: &'r mut TelemetryRecorder<CAPACITY>,
}

impl<const CAPACITY: usize> EventSink for LoggingSink<'_, CAPACITY> {
    fn record(&mut self, tick: u64, event: ProbeEvent) {
        let id = self.recorder.push(tick, event);
        log_event(id, tick, &event);
    }
}

#[cfg(target_os = "none")]
fn log_event(id: u32, tick: u64, event: &ProbeEvent) {
    match event {
        ProbeEvent::FaultLatched(_) | ProbeEvent::ConfigRejected(_) => defmt::warn!(
            "probe: #{} t={} {}",
            id,
            tick,
            defmt::Display2Format(event)
        ),
        _ => defmt::info!(
            "probe: #{} t={} {}",
            id,
            tick,
            defmt::Display2Format(event)
        ),
    }
}

#[cfg(not(target_os = "none"))]
fn log_event(_: u32, _: u64, _: &ProbeEvent) {}

#[cfg(target_os = "none")]
fn log_reset() {
    defmt::info!("probe: engine reset to IDLE");
}

#[cfg(not(target_os = "none"))]
fn log_reset() {}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::{FaultReason, ProbeState};

    #[derive(Default)]
    struct BenchHardware {
        inputs: ProbeInputs,
        driven: Option<ProbeOutputs>,
        drive_calls: usize,
    }

    impl ProbeHardware for BenchHardware {
        fn sample(&mut self) -> ProbeInputs {
            self.inputs
        }

        fn drive(&mut self, outputs: &ProbeOutputs) {
            self.driven = Some(*outputs);
            self.drive_calls += 1;
        }
    }

    fn rate() -> TickRate {
        TickRate::new(FIRMWARE_TICK_HZ).expect("rate")
    }

    #[test]
    fn construction_drives_safe_state() {
        let config = shared_config();
        let queue = ControlQueue::new();
        let controller =
            ProbeController::<_, 8>::new(rate(), BenchHardware::default(), &config, queue.receiver());
        assert_eq!(controller.hardware().driven, Some(ProbeOutputs::RESET));
        assert_eq!(controller.hardware().drive_calls, 1);
    }

    #[test]
    fn shared_writes_reach_the_next_firing_cycle() {
        let config = shared_config();
        let queue = ControlQueue::new();
        let mut controller =
            ProbeController::<_, 16>::new(rate(), BenchHardware::default(), &config, queue.receiver());

        write_field(&config, rate(), ConfigField::MonitorEnable, 0).expect("flag");
        write_field(&config, rate(), ConfigField::TrigOutVoltage, 1_200).expect("voltage");

        controller.hardware_mut().inputs.arm_enable = true;
        assert_eq!(controller.step().current_state, ProbeState::Armed);

        controller.hardware_mut().inputs.ext_trigger_in = true;
        let outputs = controller.step();
        assert_eq!(outputs.current_state, ProbeState::Firing);
        assert_eq!(controller.hardware().driven, Some(outputs));
        assert_eq!(
            outputs.trig_out_code,
            probe_core::mv_to_code(1_200),
        );
        assert_eq!(controller.telemetry().len(), 3);
    }

    #[test]
    fn rejected_write_leaves_configuration_untouched() {
        let config = shared_config();
        let slow = TickRate::new(u32::MAX).expect("rate");
        let err = write_field(&config, slow, ConfigField::MonitorWindowDuration, 2_000_000_000)
            .expect_err("overflow");
        assert!(matches!(err, ConfigError::CycleOverflow { .. }));
        assert!(write_field(&config, rate(), ConfigField::ProbeMonitorFeedback, 0).is_err());
        assert_eq!(config.lock(Cell::get), ProbeConfig::default());
    }

    #[test]
    fn acknowledge_request_clears_fault_for_one_tick() {
        let config = shared_config();
        let queue = ControlQueue::new();
        let mut controller =
            ProbeController::<_, 16>::new(rate(), BenchHardware::default(), &config, queue.receiver());
        write_field(&config, rate(), ConfigField::TriggerWaitTimeout, 1).expect("1 s");

        controller.hardware_mut().inputs.arm_enable = true;
        for _ in 0..=FIRMWARE_TICK_HZ {
            controller.step();
        }
        assert_eq!(controller.engine().fault_reason(), Some(FaultReason::Timeout));

        controller.hardware_mut().inputs.arm_enable = false;
        queue.sender().try_send(ControlRequest::AcknowledgeFault).expect("queue space");
        assert_eq!(controller.step().current_state, ProbeState::Idle);
        assert!(!config.lock(Cell::get).fault_clear());
    }

    #[test]
    fn acknowledge_request_clears_after_a_written_fault_clear() {
        let config = shared_config();
        let queue = ControlQueue::new();
        let mut controller =
            ProbeController::<_, 16>::new(rate(), BenchHardware::default(), &config, queue.receiver());
        write_field(&config, rate(), ConfigField::TriggerWaitTimeout, 1).expect("1 s");
        write_field(&config, rate(), ConfigField::FaultClear, 1).expect("flag");

        controller.step();
        assert!(!config.lock(Cell::get).fault_clear());

        controller.hardware_mut().inputs.arm_enable = true;
        for _ in 0..=FIRMWARE_TICK_HZ {
            controller.step();
        }
        assert_eq!(controller.engine().fault_reason(), Some(FaultReason::Timeout));

        controller.hardware_mut().inputs.arm_enable = false;
        queue.sender().try_send(ControlRequest::AcknowledgeFault).expect("queue space");
        assert_eq!(controller.step().current_state, ProbeState::Idle);
    }

    #[test]
    fn dropping_global_enable_cuts_the_pulse() {
        let config = shared_config();
        let queue = ControlQueue::new();
        let mut controller =
            ProbeController::<_, 16>::new(rate(), BenchHardware::default(), &config, queue.receiver());
        write_field(&config, rate(), ConfigField::MonitorEnable, 0).expect("flag");
        write_field(&config, rate(), ConfigField::TrigOutDuration, 50_000).expect("50 us");

        controller.hardware_mut().inputs.arm_enable = true;
        controller.step();
        controller.hardware_mut().inputs.ext_trigger_in = true;
        assert!(controller.step().trig_out_active);

        controller.hardware_mut().inputs.global_enable = false;
        let outputs = controller.step();
        assert_eq!(outputs.current_state, ProbeState::Idle);
        assert!(!outputs.trig_out_active);
        assert_eq!(controller.hardware().driven, Some(outputs));
        assert_eq!(controller.engine().fault_reason(), None);
    }

    #[test]
    fn reset_request_returns_to_idle() {
        let config = shared_config();
        let queue = ControlQueue::new();
        let mut controller =
            ProbeController::<_, 8>::new(rate(), BenchHardware::default(), &config, queue.receiver());
        controller.hardware_mut().inputs.arm_enable = true;
        controller.step();

        controller.hardware_mut().inputs.arm_enable = false;
        queue.sender().try_send(ControlRequest::Reset).expect("queue space");
        let outputs = controller.step();
        assert_eq!(outputs.current_state, ProbeState::Idle);
        assert_eq!(controller.engine().now(), 1);
    }
}
