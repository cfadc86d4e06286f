//! Range-validated probe configuration.
//!
//! Every writable register is modelled as a [`ConfigField`] with a declared
//! unit and inclusive range. Writes outside the range are rejected with a
//! [`ConfigError`] and leave the stored configuration untouched; nothing is
//! ever clamped.

mod snapshot;

use core::fmt;

use crate::units::{ConversionError, TickRate, TimeUnit, cycles_to_nanos};

pub use snapshot::ConfigSnapshot;

/// Physical unit attached to a configuration field.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FieldUnit {
    /// Boolean flag written as `0` or `1`.
    Flag,
    Millivolts,
    Duration(TimeUnit),
}

impl FieldUnit {
    /// Suffix used when rendering values of this unit.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            FieldUnit::Flag => "",
            FieldUnit::Millivolts => "mV",
            FieldUnit::Duration(unit) => unit.suffix(),
        }
    }
}

/// Probe register fields addressable by name.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigField {
    TriggerWaitTimeout,
    AutoRearmEnable,
    FaultClear,
    TrigOutVoltage,
    TrigOutDuration,
    IntensityVoltage,
    IntensityDuration,
    CooldownInterval,
    MonitorEnable,
    MonitorThresholdVoltage,
    MonitorExpectNegative,
    MonitorWindowStart,
    MonitorWindowDuration,
    /// Feedback input; range-checked when supplied but never stored.
    ProbeMonitorFeedback,
}

/// Every field in register order.
pub const ALL_FIELDS: [ConfigField; 14] = [
    ConfigField::TriggerWaitTimeout,
    ConfigField::AutoRearmEnable,
    ConfigField::FaultClear,
    ConfigField::TrigOutVoltage,
    ConfigField::TrigOutDuration,
    ConfigField::IntensityVoltage,
    ConfigField::IntensityDuration,
    ConfigField::CooldownInterval,
    ConfigField::MonitorEnable,
    ConfigField::MonitorThresholdVoltage,
    ConfigField::MonitorExpectNegative,
    ConfigField::MonitorWindowStart,
    ConfigField::MonitorWindowDuration,
    ConfigField::ProbeMonitorFeedback,
];

const VOLTAGE_RANGE: (i64, i64) = (-5_000, 5_000);
const FLAG_RANGE: (i64, i64) = (0, 1);
const PULSE_RANGE: (i64, i64) = (20, 50_000);
const WINDOW_LIMIT_NS: i64 = 2_000_000_000;

impl ConfigField {
    /// Register name as used by the console and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ConfigField::TriggerWaitTimeout => "trigger_wait_timeout",
            ConfigField::AutoRearmEnable => "auto_rearm_enable",
            ConfigField::FaultClear => "fault_clear",
            ConfigField::TrigOutVoltage => "trig_out_voltage",
            ConfigField::TrigOutDuration => "trig_out_duration",
            ConfigField::IntensityVoltage => "intensity_voltage",
            ConfigField::IntensityDuration => "intensity_duration",
            ConfigField::CooldownInterval => "cooldown_interval",
            ConfigField::MonitorEnable => "monitor_enable",
            ConfigField::MonitorThresholdVoltage => "monitor_threshold_voltage",
            ConfigField::MonitorExpectNegative => "monitor_expect_negative",
            ConfigField::MonitorWindowStart => "monitor_window_start",
            ConfigField::MonitorWindowDuration => "monitor_window_duration",
            ConfigField::ProbeMonitorFeedback => "probe_monitor_feedback",
        }
    }

    /// Looks a field up by its register name (ASCII case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_FIELDS
            .iter()
            .copied()
            .find(|field| field.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub const fn unit(self) -> FieldUnit {
        match self {
            ConfigField::TriggerWaitTimeout => FieldUnit::Duration(TimeUnit::Seconds),
            ConfigField::AutoRearmEnable
            | ConfigField::FaultClear
            | ConfigField::MonitorEnable
            | ConfigField::MonitorExpectNegative => FieldUnit::Flag,
            ConfigField::TrigOutVoltage
            | ConfigField::IntensityVoltage
            | ConfigField::MonitorThresholdVoltage
            | ConfigField::ProbeMonitorFeedback => FieldUnit::Millivolts,
            ConfigField::TrigOutDuration
            | ConfigField::IntensityDuration
            | ConfigField::MonitorWindowStart
            | ConfigField::MonitorWindowDuration => FieldUnit::Duration(TimeUnit::Nanos),
            ConfigField::CooldownInterval => FieldUnit::Duration(TimeUnit::Micros),
        }
    }

    /// Inclusive `(min, max)` range accepted by the field.
    #[must_use]
    pub const fn range(self) -> (i64, i64) {
        match self {
            ConfigField::TriggerWaitTimeout => (0, 3_600),
            ConfigField::AutoRearmEnable
            | ConfigField::FaultClear
            | ConfigField::MonitorEnable
            | ConfigField::MonitorExpectNegative => FLAG_RANGE,
            ConfigField::TrigOutVoltage
            | ConfigField::IntensityVoltage
            | ConfigField::MonitorThresholdVoltage
            | ConfigField::ProbeMonitorFeedback => VOLTAGE_RANGE,
            ConfigField::TrigOutDuration | ConfigField::IntensityDuration => PULSE_RANGE,
            ConfigField::CooldownInterval => (1, 500_000),
            ConfigField::MonitorWindowStart => (0, WINDOW_LIMIT_NS),
            ConfigField::MonitorWindowDuration => (100, WINDOW_LIMIT_NS),
        }
    }

    /// Returns `true` for fields that cannot be written through the configuration.
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, ConfigField::ProbeMonitorFeedback)
    }

    /// Verifies that `value` lies within the field's range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] describing the accepted bounds.
    pub const fn check(self, value: i64) -> Result<(), ConfigError> {
        let (min, max) = self.range();
        if value < min || value > max {
            Err(ConfigError::OutOfRange {
                field: self,
                value,
                min,
                max,
            })
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while writing or latching configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// Value lies outside the field's inclusive range.
    OutOfRange {
        field: ConfigField,
        value: i64,
        min: i64,
        max: i64,
    },
    /// Duration does not fit the 32-bit cycle counter at the engine tick rate.
    CycleOverflow {
        field: ConfigField,
        value: u64,
        tick_hz: u32,
    },
    /// Field is an input and cannot be assigned.
    ReadOnly(ConfigField),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::OutOfRange {
                field,
                value,
                min,
                max,
            } => {
                let suffix = field.unit().suffix();
                if suffix.is_empty() {
                    write!(f, "{field} must be {min} to {max}, got {value}")
                } else {
                    write!(f, "{field} must be {min} to {max} {suffix}, got {value}")
                }
            }
            ConfigError::CycleOverflow {
                field,
                value,
                tick_hz,
            } => write!(
                f,
                "{field} of {value}{} does not fit a 32-bit cycle count at {tick_hz} Hz",
                field.unit().suffix()
            ),
            ConfigError::ReadOnly(field) => write!(f, "{field} is read-only"),
        }
    }
}

/// Converts a duration field into cycles, mapping overflow to a configuration error.
pub(crate) fn field_cycles(
    field: ConfigField,
    value: u64,
    rate: TickRate,
) -> Result<u32, ConfigError> {
    let unit = match field.unit() {
        FieldUnit::Duration(unit) => unit,
        FieldUnit::Flag | FieldUnit::Millivolts => TimeUnit::Nanos,
    };
    rate.cycles(value, unit).map_err(|err| match err {
        ConversionError::Overflow { .. } | ConversionError::ZeroTickRate => {
            ConfigError::CycleOverflow {
                field,
                value,
                tick_hz: rate.hz(),
            }
        }
    })
}

/// Nanoseconds a nanosecond-valued duration field actually lasts at `rate`.
///
/// Pulse and window durations round up to whole ticks, so at coarse tick
/// rates the realized width can be far longer than the written one. Returns
/// `None` for fields not expressed in nanoseconds and for values that do not
/// convert.
#[must_use]
pub fn realized_nanos(field: ConfigField, value: i64, rate: TickRate) -> Option<u64> {
    if field.unit() != FieldUnit::Duration(TimeUnit::Nanos) {
        return None;
    }
    let value = u64::try_from(value).ok()?;
    let cycles = field_cycles(field, value, rate).ok()?;
    Some(cycles_to_nanos(cycles, rate.hz()))
}

/// Register-level probe configuration with validated setters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ProbeConfig {
    trigger_wait_timeout: u16,
    auto_rearm_enable: bool,
    fault_clear: bool,
    trig_out_voltage: i16,
    trig_out_duration: u16,
    intensity_voltage: i16,
    intensity_duration: u16,
    cooldown_interval: u32,
    monitor_enable: bool,
    monitor_threshold_voltage: i16,
    monitor_expect_negative: bool,
    monitor_window_start: u32,
    monitor_window_duration: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! narrow {
    ($field:expr, $value:expr, $ty:ty) => {{
        $field.check($value)?;
        match <$ty>::try_from($value) {
            Ok(narrowed) => narrowed,
            Err(_) => {
                let (min, max) = $field.range();
                return Err(ConfigError::OutOfRange {
                    field: $field,
                    value: $value,
                    min,
                    max,
                });
            }
        }
    }};
}

impl ProbeConfig {
    /// Creates a configuration holding the register reset values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            trigger_wait_timeout: 2,
            auto_rearm_enable: false,
            fault_clear: false,
            trig_out_voltage: 0,
            trig_out_duration: 100,
            intensity_voltage: 0,
            intensity_duration: 200,
            cooldown_interval: 10,
            monitor_enable: true,
            monitor_threshold_voltage: -200,
            monitor_expect_negative: true,
            monitor_window_start: 0,
            monitor_window_duration: 5_000,
        }
    }

    #[must_use]
    pub const fn trigger_wait_timeout(&self) -> u16 {
        self.trigger_wait_timeout
    }

    #[must_use]
    pub const fn auto_rearm_enable(&self) -> bool {
        self.auto_rearm_enable
    }

    #[must_use]
    pub const fn fault_clear(&self) -> bool {
        self.fault_clear
    }

    #[must_use]
    pub const fn trig_out_voltage(&self) -> i16 {
        self.trig_out_voltage
    }

    #[must_use]
    pub const fn trig_out_duration(&self) -> u16 {
        self.trig_out_duration
    }

    #[must_use]
    pub const fn intensity_voltage(&self) -> i16 {
        self.intensity_voltage
    }

    #[must_use]
    pub const fn intensity_duration(&self) -> u16 {
        self.intensity_duration
    }

    #[must_use]
    pub const fn cooldown_interval(&self) -> u32 {
        self.cooldown_interval
    }

    #[must_use]
    pub const fn monitor_enable(&self) -> bool {
        self.monitor_enable
    }

    #[must_use]
    pub const fn monitor_threshold_voltage(&self) -> i16 {
        self.monitor_threshold_voltage
    }

    #[must_use]
    pub const fn monitor_expect_negative(&self) -> bool {
        self.monitor_expect_negative
    }

    #[must_use]
    pub const fn monitor_window_start(&self) -> u32 {
        self.monitor_window_start
    }

    #[must_use]
    pub const fn monitor_window_duration(&self) -> u32 {
        self.monitor_window_duration
    }

    /// Sets the ARMED dwell limit in seconds (`0` disables the timeout).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] above 3600 s.
    pub fn set_trigger_wait_timeout(&mut self, seconds: u16) -> Result<(), ConfigError> {
        ConfigField::TriggerWaitTimeout.check(i64::from(seconds))?;
        self.trigger_wait_timeout = seconds;
        Ok(())
    }

    pub fn set_auto_rearm_enable(&mut self, enabled: bool) {
        self.auto_rearm_enable = enabled;
    }

    /// Drives the fault acknowledgement level; the engine reacts to its rising edge.
    pub fn set_fault_clear(&mut self, level: bool) {
        self.fault_clear = level;
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] outside ±5000 mV.
    pub fn set_trig_out_voltage(&mut self, mv: i16) -> Result<(), ConfigError> {
        ConfigField::TrigOutVoltage.check(i64::from(mv))?;
        self.trig_out_voltage = mv;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] outside 20–50000 ns.
    pub fn set_trig_out_duration(&mut self, ns: u16) -> Result<(), ConfigError> {
        ConfigField::TrigOutDuration.check(i64::from(ns))?;
        self.trig_out_duration = ns;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] outside ±5000 mV.
    pub fn set_intensity_voltage(&mut self, mv: i16) -> Result<(), ConfigError> {
        ConfigField::IntensityVoltage.check(i64::from(mv))?;
        self.intensity_voltage = mv;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] outside 20–50000 ns.
    pub fn set_intensity_duration(&mut self, ns: u16) -> Result<(), ConfigError> {
        ConfigField::IntensityDuration.check(i64::from(ns))?;
        self.intensity_duration = ns;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] outside 1–500000 µs.
    pub fn set_cooldown_interval(&mut self, us: u32) -> Result<(), ConfigError> {
        ConfigField::CooldownInterval.check(i64::from(us))?;
        self.cooldown_interval = us;
        Ok(())
    }

    pub fn set_monitor_enable(&mut self, enabled: bool) {
        self.monitor_enable = enabled;
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] outside ±5000 mV.
    pub fn set_monitor_threshold_voltage(&mut self, mv: i16) -> Result<(), ConfigError> {
        ConfigField::MonitorThresholdVoltage.check(i64::from(mv))?;
        self.monitor_threshold_voltage = mv;
        Ok(())
    }

    pub fn set_monitor_expect_negative(&mut self, negative: bool) {
        self.monitor_expect_negative = negative;
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] above 2 s.
    pub fn set_monitor_window_start(&mut self, ns: u32) -> Result<(), ConfigError> {
        ConfigField::MonitorWindowStart.check(i64::from(ns))?;
        self.monitor_window_start = ns;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] outside 100 ns – 2 s.
    pub fn set_monitor_window_duration(&mut self, ns: u32) -> Result<(), ConfigError> {
        ConfigField::MonitorWindowDuration.check(i64::from(ns))?;
        self.monitor_window_duration = ns;
        Ok(())
    }

    /// Writes `value` into `field`, validating it against the field range.
    ///
    /// Flags accept `0` and `1`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for out-of-range values and
    /// [`ConfigError::ReadOnly`] for input fields.
    pub fn set(&mut self, field: ConfigField, value: i64) -> Result<(), ConfigError> {
        match field {
            ConfigField::TriggerWaitTimeout => {
                self.trigger_wait_timeout = narrow!(field, value, u16);
            }
            ConfigField::AutoRearmEnable => {
                field.check(value)?;
                self.auto_rearm_enable = value != 0;
            }
            ConfigField::FaultClear => {
                field.check(value)?;
                self.fault_clear = value != 0;
            }
            ConfigField::TrigOutVoltage => self.trig_out_voltage = narrow!(field, value, i16),
            ConfigField::TrigOutDuration => self.trig_out_duration = narrow!(field, value, u16),
            ConfigField::IntensityVoltage => self.intensity_voltage = narrow!(field, value, i16),
            ConfigField::IntensityDuration => {
                self.intensity_duration = narrow!(field, value, u16);
            }
            ConfigField::CooldownInterval => self.cooldown_interval = narrow!(field, value, u32),
            ConfigField::MonitorEnable => {
                field.check(value)?;
                self.monitor_enable = value != 0;
            }
            ConfigField::MonitorThresholdVoltage => {
                self.monitor_threshold_voltage = narrow!(field, value, i16);
            }
            ConfigField::MonitorExpectNegative => {
                field.check(value)?;
                self.monitor_expect_negative = value != 0;
            }
            ConfigField::MonitorWindowStart => {
                self.monitor_window_start = narrow!(field, value, u32);
            }
            ConfigField::MonitorWindowDuration => {
                self.monitor_window_duration = narrow!(field, value, u32);
            }
            ConfigField::ProbeMonitorFeedback => return Err(ConfigError::ReadOnly(field)),
        }
        Ok(())
    }

    /// Reads a stored field as a signed integer; `None` for input fields.
    #[must_use]
    pub fn get(&self, field: ConfigField) -> Option<i64> {
        let value = match field {
            ConfigField::TriggerWaitTimeout => i64::from(self.trigger_wait_timeout),
            ConfigField::AutoRearmEnable => i64::from(self.auto_rearm_enable),
            ConfigField::FaultClear => i64::from(self.fault_clear),
            ConfigField::TrigOutVoltage => i64::from(self.trig_out_voltage),
            ConfigField::TrigOutDuration => i64::from(self.trig_out_duration),
            ConfigField::IntensityVoltage => i64::from(self.intensity_voltage),
            ConfigField::IntensityDuration => i64::from(self.intensity_duration),
            ConfigField::CooldownInterval => i64::from(self.cooldown_interval),
            ConfigField::MonitorEnable => i64::from(self.monitor_enable),
            ConfigField::MonitorThresholdVoltage => i64::from(self.monitor_threshold_voltage),
            ConfigField::MonitorExpectNegative => i64::from(self.monitor_expect_negative),
            ConfigField::MonitorWindowStart => i64::from(self.monitor_window_start),
            ConfigField::MonitorWindowDuration => i64::from(self.monitor_window_duration),
            ConfigField::ProbeMonitorFeedback => return None,
        };
        Some(value)
    }
}
