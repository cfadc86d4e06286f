//! Probe hardware capability profiles.
//!
//! The register ranges describe what the controller can generate; a profile
//! describes what a particular probe accepts. [`ProbeCapabilities::check`]
//! compares a configuration against a profile before it is used with that
//! probe.

use core::fmt;

use crate::config::ProbeConfig;
use crate::pulse::PulseLine;

/// Electrical and timing limits of a probe.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ProbeCapabilities {
    pub name: &'static str,
    pub min_mv: i16,
    pub max_mv: i16,
    pub min_pulse_ns: u32,
    pub max_pulse_ns: u32,
    /// Pulse-width step size.
    pub pulse_resolution_ns: u32,
    pub external_trigger: bool,
    pub internal_trigger: bool,
    pub voltage_sweep: bool,
    pub pulse_train: bool,
}

/// Riscure DS1120A EMFI probe driven through its digital glitch port.
pub const DS1120A: ProbeCapabilities = ProbeCapabilities {
    name: "ds1120a",
    min_mv: 0,
    max_mv: 3_300,
    min_pulse_ns: 10,
    max_pulse_ns: 10_000,
    pulse_resolution_ns: 1,
    external_trigger: true,
    internal_trigger: false,
    voltage_sweep: false,
    pulse_train: false,
};

/// Profiles known to the console.
pub static PROFILES: [ProbeCapabilities; 1] = [DS1120A];

/// Mismatch between a configuration and a probe profile.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CapabilityError {
    VoltageOutOfRange {
        line: PulseLine,
        mv: i16,
        min: i16,
        max: i16,
    },
    PulseWidthOutOfRange {
        line: PulseLine,
        ns: u32,
        min: u32,
        max: u32,
    },
    PulseWidthResolution {
        line: PulseLine,
        ns: u32,
        step: u32,
    },
    /// Controller only fires from `ext_trigger_in`.
    ExternalTriggerUnsupported,
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityError::VoltageOutOfRange { line, mv, min, max } => {
                write!(f, "{line} voltage {mv}mV out of safe range [{min}mV, {max}mV]")
            }
            CapabilityError::PulseWidthOutOfRange { line, ns, min, max } => {
                write!(f, "{line} pulse width {ns}ns out of safe range [{min}ns, {max}ns]")
            }
            CapabilityError::PulseWidthResolution { line, ns, step } => {
                write!(f, "{line} pulse width {ns}ns is not a multiple of {step}ns")
            }
            CapabilityError::ExternalTriggerUnsupported => {
                f.write_str("probe does not accept an external trigger")
            }
        }
    }
}

impl ProbeCapabilities {
    /// Finds a known profile by name (ASCII case-insensitive).
    #[must_use]
    pub fn by_name(name: &str) -> Option<&'static ProbeCapabilities> {
        PROFILES
            .iter()
            .find(|profile| profile.name.eq_ignore_ascii_case(name))
    }

    /// Checks that both output lines of `config` stay within this profile.
    ///
    /// # Errors
    ///
    /// Returns the first [`CapabilityError`] found, trigger line first.
    pub fn check(&self, config: &ProbeConfig) -> Result<(), CapabilityError> {
        if !self.external_trigger {
            return Err(CapabilityError::ExternalTriggerUnsupported);
        }

        let lines = [
            (
                PulseLine::Trigger,
                config.trig_out_voltage(),
                config.trig_out_duration(),
            ),
            (
                PulseLine::Intensity,
                config.intensity_voltage(),
                config.intensity_duration(),
            ),
        ];

        for (line, mv, ns) in lines {
            self.check_voltage(line, mv)?;
            self.check_pulse_width(line, u32::from(ns))?;
        }
        Ok(())
    }

    fn check_voltage(&self, line: PulseLine, mv: i16) -> Result<(), CapabilityError> {
        if (self.min_mv..=self.max_mv).contains(&mv) {
            Ok(())
        } else {
            Err(CapabilityError::VoltageOutOfRange {
                line,
                mv,
                min: self.min_mv,
                max: self.max_mv,
            })
        }
    }

    fn check_pulse_width(&self, line: PulseLine, ns: u32) -> Result<(), CapabilityError> {
        if !(self.min_pulse_ns..=self.max_pulse_ns).contains(&ns) {
            return Err(CapabilityError::PulseWidthOutOfRange {
                line,
                ns,
                min: self.min_pulse_ns,
                max: self.max_pulse_ns,
            });
        }
        if self.pulse_resolution_ns > 1 && ns % self.pulse_resolution_ns != 0 {
            return Err(CapabilityError::PulseWidthResolution {
                line,
                ns,
                step: self.pulse_resolution_ns,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fit_the_ds1120a() {
        assert_eq!(DS1120A.check(&ProbeConfig::default()), Ok(()));
    }

    #[test]
    fn negative_drive_is_outside_the_ds1120a_range() {
        let mut config = ProbeConfig::default();
        config.set_intensity_voltage(-100).expect("register range");
        assert_eq!(
            DS1120A.check(&config),
            Err(CapabilityError::VoltageOutOfRange {
                line: PulseLine::Intensity,
                mv: -100,
                min: 0,
                max: 3_300,
            })
        );
    }

    #[test]
    fn long_pulses_are_rejected() {
        let mut config = ProbeConfig::default();
        config.set_trig_out_duration(20_000).expect("register range");
        assert!(matches!(
            DS1120A.check(&config),
            Err(CapabilityError::PulseWidthOutOfRange {
                line: PulseLine::Trigger,
                ns: 20_000,
                ..
            })
        ));
    }

    #[test]
    fn coarse_resolution_is_enforced() {
        let profile = ProbeCapabilities {
            pulse_resolution_ns: 8,
            ..DS1120A
        };
        let mut config = ProbeConfig::default();
        config.set_trig_out_duration(96).expect("register range");
        config.set_intensity_duration(200).expect("register range");
        assert_eq!(profile.check(&config), Ok(()));

        // the 100 ns default is not a multiple of 8 ns
        config.set_trig_out_duration(100).expect("register range");
        assert!(matches!(
            profile.check(&config),
            Err(CapabilityError::PulseWidthResolution { step: 8, .. })
        ));
    }

    #[test]
    fn profiles_resolve_by_name() {
        assert_eq!(ProbeCapabilities::by_name("DS1120A"), Some(&DS1120A));
        assert_eq!(ProbeCapabilities::by_name("laser"), None);
    }
}
