//! Probe event catalog and the bounded recorder shared by firmware and host
//! targets.
//!
//! Events carry a compact numeric discriminant (see [`ProbeEventKind::to_raw`])
//! so they can cross diagnostics channels without a schema, while the full
//! [`ProbeEvent`] keeps the payload needed by the console and transcripts.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::config::ConfigError;
use crate::engine::ProbeState;
use crate::fault::FaultReason;
use crate::monitor::MonitorVerdict;

/// Monotonic identifier assigned to recorded events.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Engine events with their payloads.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProbeEvent {
    StateChanged { from: ProbeState, to: ProbeState },
    PulseStarted {
        trigger_cycles: u32,
        intensity_cycles: u32,
    },
    PulseCompleted,
    MonitorResolved(MonitorVerdict),
    FaultLatched(FaultReason),
    FaultCleared,
    /// Configuration could not be latched when arming or firing.
    ConfigRejected(ConfigError),
}

impl ProbeEvent {
    #[must_use]
    pub const fn kind(&self) -> ProbeEventKind {
        match self {
            ProbeEvent::StateChanged { to, .. } => ProbeEventKind::StateEntered(*to),
            ProbeEvent::PulseStarted { .. } => ProbeEventKind::PulseStarted,
            ProbeEvent::PulseCompleted => ProbeEventKind::PulseCompleted,
            ProbeEvent::MonitorResolved(verdict) => ProbeEventKind::MonitorResolved(*verdict),
            ProbeEvent::FaultLatched(reason) => ProbeEventKind::FaultLatched(*reason),
            ProbeEvent::FaultCleared => ProbeEventKind::FaultCleared,
            ProbeEvent::ConfigRejected(_) => ProbeEventKind::ConfigRejected,
        }
    }
}

impl fmt::Display for ProbeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeEvent::StateChanged { from, to } => write!(f, "state {from} -> {to}"),
            ProbeEvent::PulseStarted {
                trigger_cycles,
                intensity_cycles,
            } => write!(
                f,
                "pulse-started trig={trigger_cycles}cyc intensity={intensity_cycles}cyc"
            ),
            ProbeEvent::PulseCompleted => f.write_str("pulse-completed"),
            ProbeEvent::MonitorResolved(verdict) => write!(f, "monitor {verdict}"),
            ProbeEvent::FaultLatched(reason) => write!(f, "fault-latched {reason}"),
            ProbeEvent::FaultCleared => f.write_str("fault-cleared"),
            ProbeEvent::ConfigRejected(err) => write!(f, "config-rejected: {err}"),
        }
    }
}

/// Payload-free event discriminant with a stable numeric encoding.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProbeEventKind {
    StateEntered(ProbeState),
    PulseStarted,
    PulseCompleted,
    MonitorResolved(MonitorVerdict),
    FaultLatched(FaultReason),
    FaultCleared,
    ConfigRejected,
    Custom(u16),
}

impl ProbeEventKind {
    const STATE_ENTERED_BASE: u16 = 0x0000;
    const PULSE_STARTED_CODE: u16 = 0x0040;
    const PULSE_COMPLETED_CODE: u16 = 0x0041;
    const MONITOR_BASE: u16 = 0x0048;
    const FAULT_LATCHED_BASE: u16 = 0x0050;
    const FAULT_CLEARED_CODE: u16 = 0x0058;
    const CONFIG_REJECTED_CODE: u16 = 0x0059;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            ProbeEventKind::StateEntered(state) => Self::STATE_ENTERED_BASE + state.code() as u16,
            ProbeEventKind::PulseStarted => Self::PULSE_STARTED_CODE,
            ProbeEventKind::PulseCompleted => Self::PULSE_COMPLETED_CODE,
            ProbeEventKind::MonitorResolved(verdict) => {
                Self::MONITOR_BASE + verdict_index(verdict)
            }
            ProbeEventKind::FaultLatched(reason) => Self::FAULT_LATCHED_BASE + reason.code() as u16,
            ProbeEventKind::FaultCleared => Self::FAULT_CLEARED_CODE,
            ProbeEventKind::ConfigRejected => Self::CONFIG_REJECTED_CODE,
            ProbeEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`ProbeEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::PULSE_STARTED_CODE => ProbeEventKind::PulseStarted,
            Self::PULSE_COMPLETED_CODE => ProbeEventKind::PulseCompleted,
            Self::FAULT_CLEARED_CODE => ProbeEventKind::FaultCleared,
            Self::CONFIG_REJECTED_CODE => ProbeEventKind::ConfigRejected,
            value if (Self::STATE_ENTERED_BASE..Self::PULSE_STARTED_CODE).contains(&value) => {
                u8::try_from(value - Self::STATE_ENTERED_BASE)
                    .ok()
                    .and_then(ProbeState::from_code)
                    .map_or(ProbeEventKind::Custom(value), ProbeEventKind::StateEntered)
            }
            value if (Self::MONITOR_BASE..Self::FAULT_LATCHED_BASE).contains(&value) => {
                verdict_from_index(value - Self::MONITOR_BASE)
                    .map_or(ProbeEventKind::Custom(value), ProbeEventKind::MonitorResolved)
            }
            value if (Self::FAULT_LATCHED_BASE..Self::FAULT_CLEARED_CODE).contains(&value) => {
                u8::try_from(value - Self::FAULT_LATCHED_BASE)
                    .ok()
                    .and_then(FaultReason::from_code)
                    .map_or(ProbeEventKind::Custom(value), ProbeEventKind::FaultLatched)
            }
            other => ProbeEventKind::Custom(other),
        }
    }
}

const fn verdict_index(verdict: MonitorVerdict) -> u16 {
    match verdict {
        MonitorVerdict::Pending => 0,
        MonitorVerdict::Crossed => 1,
        MonitorVerdict::NotCrossed => 2,
        MonitorVerdict::Disabled => 3,
    }
}

const fn verdict_from_index(index: u16) -> Option<MonitorVerdict> {
    match index {
        0 => Some(MonitorVerdict::Pending),
        1 => Some(MonitorVerdict::Crossed),
        2 => Some(MonitorVerdict::NotCrossed),
        3 => Some(MonitorVerdict::Disabled),
        _ => None,
    }
}

/// Destination for engine events.
///
/// `()` discards everything, which is what the engine uses when the caller
/// does not ask for telemetry.
pub trait EventSink {
    fn record(&mut self, tick: u64, event: ProbeEvent);
}

impl EventSink for () {
    fn record(&mut self, _tick: u64, _event: ProbeEvent) {}
}

impl<S> EventSink for &mut S
where
    S: EventSink + ?Sized,
{
    fn record(&mut self, tick: u64, event: ProbeEvent) {
        (**self).record(tick, event);
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub tick: u64,
    pub event: ProbeEvent,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord, CAPACITY>;

/// Records probe events into a fixed-size ring buffer, dropping the oldest.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: TelemetryRing<CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Appends an event and returns its identifier.
    pub fn push(&mut self, tick: u64, event: ProbeEvent) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord { id, tick, event });
        id
    }

    /// Drops all stored records; identifiers keep counting.
    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl<const CAPACITY: usize> EventSink for TelemetryRecorder<CAPACITY> {
    fn record(&mut self, tick: u64, event: ProbeEvent) {
        self.push(tick, event);
    }
}
