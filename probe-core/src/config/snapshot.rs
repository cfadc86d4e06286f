use crate::monitor::MonitorWindow;
use crate::pulse::PulseSpec;
use crate::units::{TickRate, mv_to_code};

use super::{ConfigError, ConfigField, ProbeConfig, field_cycles};

/// Tick-domain view of the firing parameters, latched at FIRING entry.
///
/// All conversions happen in [`ConfigSnapshot::capture`]; once built, a
/// snapshot only holds codes and cycle counts that fit the engine counters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConfigSnapshot {
    pub trigger: PulseSpec,
    pub intensity: PulseSpec,
    pub cooldown_cycles: u32,
    /// `None` when the monitor is disabled.
    pub monitor: Option<MonitorWindow>,
}

impl ConfigSnapshot {
    /// Converts `config` into tick-domain values at `rate`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CycleOverflow`] when any duration does not fit
    /// a 32-bit cycle counter at `rate`.
    pub fn capture(config: &ProbeConfig, rate: TickRate) -> Result<Self, ConfigError> {
        let trigger = PulseSpec::new(
            mv_to_code(config.trig_out_voltage()),
            field_cycles(
                ConfigField::TrigOutDuration,
                u64::from(config.trig_out_duration()),
                rate,
            )?,
        );
        let intensity = PulseSpec::new(
            mv_to_code(config.intensity_voltage()),
            field_cycles(
                ConfigField::IntensityDuration,
                u64::from(config.intensity_duration()),
                rate,
            )?,
        );
        let cooldown_cycles = field_cycles(
            ConfigField::CooldownInterval,
            u64::from(config.cooldown_interval()),
            rate,
        )?;

        let monitor = if config.monitor_enable() {
            let start_cycles = field_cycles(
                ConfigField::MonitorWindowStart,
                u64::from(config.monitor_window_start()),
                rate,
            )?;
            let duration_cycles = field_cycles(
                ConfigField::MonitorWindowDuration,
                u64::from(config.monitor_window_duration()),
                rate,
            )?;
            Some(MonitorWindow {
                start_cycles,
                duration_cycles,
                threshold_code: mv_to_code(config.monitor_threshold_voltage()),
                expect_negative: config.monitor_expect_negative(),
            })
        } else {
            None
        };

        Ok(Self {
            trigger,
            intensity,
            cooldown_cycles,
            monitor,
        })
    }
}
