//! Sticky fault latch and edge detection helpers.

use core::fmt;

/// Cause recorded when the latch is set.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FaultReason {
    /// ARMED dwell exceeded `trigger_wait_timeout`.
    Timeout,
    /// Monitor window closed without a threshold crossing.
    MonitorMismatch,
    /// Configuration could not be latched into tick-domain values.
    InvalidConfiguration,
    /// State register held an unknown encoding.
    IllegalState,
}

impl FaultReason {
    /// Stable numeric code used by telemetry.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            FaultReason::Timeout => 1,
            FaultReason::MonitorMismatch => 2,
            FaultReason::InvalidConfiguration => 3,
            FaultReason::IllegalState => 4,
        }
    }

    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FaultReason::Timeout),
            2 => Some(FaultReason::MonitorMismatch),
            3 => Some(FaultReason::InvalidConfiguration),
            4 => Some(FaultReason::IllegalState),
            _ => None,
        }
    }
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FaultReason::Timeout => "timeout",
            FaultReason::MonitorMismatch => "monitor-mismatch",
            FaultReason::InvalidConfiguration => "invalid-configuration",
            FaultReason::IllegalState => "illegal-state",
        };
        f.write_str(label)
    }
}

/// Rising-edge detector over a sampled level.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RisingEdge {
    previous: bool,
}

impl RisingEdge {
    #[must_use]
    pub const fn new() -> Self {
        Self { previous: false }
    }

    /// Records `level` and returns `true` on a low-to-high transition.
    pub fn update(&mut self, level: bool) -> bool {
        let rising = level && !self.previous;
        self.previous = level;
        rising
    }
}

/// Sticky fault indicator.
///
/// The first reason is retained until the latch is cleared by a rising edge of
/// the acknowledgement signal. The acknowledgement level is tracked on every
/// call so a level held high across the fault cannot clear it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FaultLatch {
    reason: Option<FaultReason>,
    clear: RisingEdge,
}

impl FaultLatch {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reason: None,
            clear: RisingEdge::new(),
        }
    }

    /// Latches `reason`. Returns `true` if the latch was previously clear.
    pub fn set(&mut self, reason: FaultReason) -> bool {
        if self.reason.is_some() {
            return false;
        }
        self.reason = Some(reason);
        true
    }

    /// Samples the acknowledgement level; clears the latch on a rising edge.
    ///
    /// Returns `true` when this call cleared a set latch.
    pub fn clear_on_edge(&mut self, level: bool) -> bool {
        let rising = self.clear.update(level);
        if rising && self.reason.is_some() {
            self.reason = None;
            return true;
        }
        false
    }

    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.reason.is_some()
    }

    #[must_use]
    pub const fn reason(&self) -> Option<FaultReason> {
        self.reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reason_is_retained() {
        let mut latch = FaultLatch::new();
        assert!(latch.set(FaultReason::Timeout));
        assert!(!latch.set(FaultReason::MonitorMismatch));
        assert_eq!(latch.reason(), Some(FaultReason::Timeout));
    }

    #[test]
    fn only_a_rising_edge_clears() {
        let mut latch = FaultLatch::new();
        latch.clear_on_edge(true);
        latch.set(FaultReason::IllegalState);

        // level already high when the fault latched
        assert!(!latch.clear_on_edge(true));
        assert!(latch.is_set());

        assert!(!latch.clear_on_edge(false));
        assert!(latch.clear_on_edge(true));
        assert!(!latch.is_set());
    }

    #[test]
    fn edge_without_fault_is_ignored() {
        let mut latch = FaultLatch::new();
        assert!(!latch.clear_on_edge(true));
        latch.set(FaultReason::Timeout);
        assert!(!latch.clear_on_edge(true));
        assert!(latch.is_set());
    }

    #[test]
    fn reason_codes_round_trip() {
        for reason in [
            FaultReason::Timeout,
            FaultReason::MonitorMismatch,
            FaultReason::InvalidConfiguration,
            FaultReason::IllegalState,
        ] {
            assert_eq!(FaultReason::from_code(reason.code()), Some(reason));
        }
        assert_eq!(FaultReason::from_code(0), None);
    }
}
