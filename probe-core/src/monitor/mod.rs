//! Windowed threshold-crossing detection on the probe feedback input.
//!
//! Offsets are counted in ticks from FIRING entry, with offset `0` being the
//! tick on which the trigger edge was accepted. Samples at offsets inside
//! `[start, start + duration)` are evaluated; the first sample that satisfies
//! the polarity test after one that did not is a crossing. The window closes
//! at offset `start + duration`, and a window that closes without a crossing
//! resolves to [`MonitorVerdict::NotCrossed`].

use core::fmt;

/// Tick-domain monitor parameters latched at FIRING entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MonitorWindow {
    pub start_cycles: u32,
    pub duration_cycles: u32,
    pub threshold_code: i16,
    /// `true` looks for the feedback falling to or below the threshold.
    pub expect_negative: bool,
}

impl MonitorWindow {
    /// Offset at which the window closes.
    #[must_use]
    pub fn end_offset(&self) -> u64 {
        u64::from(self.start_cycles) + u64::from(self.duration_cycles)
    }

    /// Returns `true` when `sample` lies on the expected side of the threshold.
    #[must_use]
    pub const fn satisfied(&self, sample: i16) -> bool {
        if self.expect_negative {
            sample <= self.threshold_code
        } else {
            sample >= self.threshold_code
        }
    }
}

/// Outcome of the monitor for the current firing cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MonitorVerdict {
    /// Window still open or not yet reached.
    Pending,
    Crossed,
    NotCrossed,
    /// Monitoring is off for this cycle; never faults.
    Disabled,
}

impl MonitorVerdict {
    /// Returns `true` once the verdict can no longer change.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        !matches!(self, MonitorVerdict::Pending)
    }
}

impl fmt::Display for MonitorVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MonitorVerdict::Pending => "pending",
            MonitorVerdict::Crossed => "crossed",
            MonitorVerdict::NotCrossed => "not-crossed",
            MonitorVerdict::Disabled => "disabled",
        };
        f.write_str(label)
    }
}

/// Per-cycle crossing detector.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MonitorDetector {
    window: Option<MonitorWindow>,
    offset: u64,
    previous_satisfied: bool,
    verdict: MonitorVerdict,
}

impl Default for MonitorDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorDetector {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            window: None,
            offset: 0,
            previous_satisfied: false,
            verdict: MonitorVerdict::Disabled,
        }
    }

    /// Begins a new cycle. `baseline` is the feedback sample seen on the tick
    /// before FIRING entry and seeds edge detection.
    pub fn start(&mut self, window: Option<MonitorWindow>, baseline: i16) {
        self.window = window;
        self.offset = 0;
        match window {
            Some(window) => {
                self.previous_satisfied = window.satisfied(baseline);
                self.verdict = MonitorVerdict::Pending;
            }
            None => {
                self.previous_satisfied = false;
                self.verdict = MonitorVerdict::Disabled;
            }
        }
    }

    /// Feeds the sample for the next offset and returns the verdict so far.
    pub fn observe(&mut self, sample: i16) -> MonitorVerdict {
        let Some(window) = self.window else {
            return self.verdict;
        };
        if self.verdict.is_resolved() {
            return self.verdict;
        }

        let offset = self.offset;
        self.offset = self.offset.saturating_add(1);

        if offset >= window.end_offset() {
            self.verdict = MonitorVerdict::NotCrossed;
            return self.verdict;
        }

        let satisfied = window.satisfied(sample);
        if offset >= u64::from(window.start_cycles) && satisfied && !self.previous_satisfied {
            self.verdict = MonitorVerdict::Crossed;
        }
        self.previous_satisfied = satisfied;
        self.verdict
    }

    #[must_use]
    pub const fn verdict(&self) -> MonitorVerdict {
        self.verdict
    }

    /// Abandons the current cycle.
    pub fn cancel(&mut self) {
        *self = Self::new();
    }
}
