//! Dual-channel timed pulse generation.
//!
//! A channel is started at a caller-supplied tick and is active on the
//! half-open interval `[start, start + cycles)`. The trigger and intensity
//! channels share a start tick but keep independent counters, so they overlap
//! for the shorter of the two widths.

use core::fmt;

/// Output level and width of one pulse channel, in tick-domain units.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PulseSpec {
    pub code: i16,
    pub cycles: u32,
}

impl PulseSpec {
    #[must_use]
    pub const fn new(code: i16, cycles: u32) -> Self {
        Self { code, cycles }
    }
}

/// Identifies one of the two output lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PulseLine {
    Trigger,
    Intensity,
}

impl fmt::Display for PulseLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PulseLine::Trigger => f.write_str("trig_out"),
            PulseLine::Intensity => f.write_str("intensity_out"),
        }
    }
}

/// Errors raised by the pulse generator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PulseError {
    /// A channel is still driving its output.
    Busy(PulseLine),
}

impl fmt::Display for PulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PulseError::Busy(line) => write!(f, "{line} pulse already active"),
        }
    }
}

/// Output sample of a single channel.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ChannelSample {
    pub active: bool,
    pub code: i16,
}

impl ChannelSample {
    /// Inactive output at zero volts.
    pub const IDLE: Self = Self {
        active: false,
        code: 0,
    };
}

/// Single timed output channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PulseChannel {
    line: PulseLine,
    armed: Option<(u64, PulseSpec)>,
}

impl PulseChannel {
    #[must_use]
    pub const fn new(line: PulseLine) -> Self {
        Self { line, armed: None }
    }

    #[must_use]
    pub const fn line(&self) -> PulseLine {
        self.line
    }

    /// Schedules `spec` to begin at `start_tick`.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::Busy`] when the previous pulse has not finished
    /// by `start_tick`.
    pub fn start(&mut self, start_tick: u64, spec: PulseSpec) -> Result<(), PulseError> {
        if !self.is_complete(start_tick) {
            return Err(PulseError::Busy(self.line));
        }
        self.armed = Some((start_tick, spec));
        Ok(())
    }

    /// Samples the channel at `now`.
    #[must_use]
    pub fn sample(&self, now: u64) -> ChannelSample {
        match self.armed {
            Some((start, spec)) if now >= start && now < end_tick(start, spec) => ChannelSample {
                active: true,
                code: spec.code,
            },
            _ => ChannelSample::IDLE,
        }
    }

    /// Returns `true` once the scheduled pulse has fully elapsed at `now`.
    #[must_use]
    pub fn is_complete(&self, now: u64) -> bool {
        match self.armed {
            Some((start, spec)) => now >= end_tick(start, spec),
            None => true,
        }
    }

    /// Drops any scheduled pulse, forcing the output low.
    pub fn abort(&mut self) {
        self.armed = None;
    }
}

fn end_tick(start: u64, spec: PulseSpec) -> u64 {
    start.saturating_add(u64::from(spec.cycles))
}

/// Trigger and intensity channels driven together.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PulseGenerator {
    trigger: PulseChannel,
    intensity: PulseChannel,
}

/// Combined output of both channels at one tick.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PulseOutputs {
    pub trigger: ChannelSample,
    pub intensity: ChannelSample,
}

impl Default for PulseGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseGenerator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            trigger: PulseChannel::new(PulseLine::Trigger),
            intensity: PulseChannel::new(PulseLine::Intensity),
        }
    }

    /// Starts both channels at `start_tick`.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::Busy`] naming the first channel still active at
    /// `start_tick`; neither channel is modified in that case.
    pub fn start(
        &mut self,
        start_tick: u64,
        trigger: PulseSpec,
        intensity: PulseSpec,
    ) -> Result<(), PulseError> {
        for channel in [&self.trigger, &self.intensity] {
            if !channel.is_complete(start_tick) {
                return Err(PulseError::Busy(channel.line()));
            }
        }

        self.trigger.start(start_tick, trigger)?;
        self.intensity.start(start_tick, intensity)
    }

    #[must_use]
    pub fn sample(&self, now: u64) -> PulseOutputs {
        PulseOutputs {
            trigger: self.trigger.sample(now),
            intensity: self.intensity.sample(now),
        }
    }

    /// Returns `true` when both channels have finished at `now`.
    #[must_use]
    pub fn is_complete(&self, now: u64) -> bool {
        self.trigger.is_complete(now) && self.intensity.is_complete(now)
    }

    pub fn abort(&mut self) {
        self.trigger.abort();
        self.intensity.abort();
    }
}
