#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! The tick loop publishes every tick's outputs into lightweight atomics so
//! the console can render a `StatusSnapshot` without borrowing the engine.

use portable_atomic::{AtomicI16, AtomicU8, AtomicU32, Ordering};
use probe_core::console::status::StatusSnapshot;
use probe_core::monitor::MonitorVerdict;
use probe_core::{FaultReason, ProbeOutputs, ProbeState};

use crate::probe::FIRMWARE_TICK_HZ;

const TRIG_ACTIVE: u8 = 1 << 0;
const INTENSITY_ACTIVE: u8 = 1 << 1;
const READY: u8 = 1 << 2;
const BUSY: u8 = 1 << 3;
const FAULT: u8 = 1 << 4;

/// Raw FSM state register.
static STATE_CODE: AtomicU8 = AtomicU8::new(ProbeState::IDLE_CODE);
/// Bitmask of the boolean outputs.
static FLAGS: AtomicU8 = AtomicU8::new(READY);
static TRIG_CODE: AtomicI16 = AtomicI16::new(0);
static INTENSITY_CODE: AtomicI16 = AtomicI16::new(0);
static MONITOR: AtomicU8 = AtomicU8::new(0);
/// Latched fault reason code (0 == none).
static FAULT_REASON: AtomicU8 = AtomicU8::new(0);
/// Feedback voltage sampled on the latest tick.
static FEEDBACK_MV: AtomicI16 = AtomicI16::new(0);
/// Low 32 bits of the engine tick counter.
static TICK: AtomicU32 = AtomicU32::new(0);

fn encode_verdict(verdict: MonitorVerdict) -> u8 {
    match verdict {
        MonitorVerdict::Disabled => 0,
        MonitorVerdict::Pending => 1,
        MonitorVerdict::Crossed => 2,
        MonitorVerdict::NotCrossed => 3,
    }
}

fn decode_verdict(raw: u8) -> MonitorVerdict {
    match raw {
        1 => MonitorVerdict::Pending,
        2 => MonitorVerdict::Crossed,
        3 => MonitorVerdict::NotCrossed,
        _ => MonitorVerdict::Disabled,
    }
}

fn flag(mask: u8, bit: u8) -> bool {
    mask & bit != 0
}

/// Stores the outputs of the latest tick.
pub fn publish(outputs: &ProbeOutputs, fault: Option<FaultReason>, tick: u64) {
    let mut mask = 0;
    for (set, bit) in [
        (outputs.trig_out_active, TRIG_ACTIVE),
        (outputs.intensity_out_active, INTENSITY_ACTIVE),
        (outputs.ready, READY),
        (outputs.busy, BUSY),
        (outputs.fault, FAULT),
    ] {
        if set {
            mask |= bit;
        }
    }

    STATE_CODE.store(outputs.state_code, Ordering::Relaxed);
    FLAGS.store(mask, Ordering::Relaxed);
    TRIG_CODE.store(outputs.trig_out_code, Ordering::Relaxed);
    INTENSITY_CODE.store(outputs.intensity_out_code, Ordering::Relaxed);
    MONITOR.store(encode_verdict(outputs.monitor), Ordering::Relaxed);
    FAULT_REASON.store(fault.map_or(0, FaultReason::code), Ordering::Relaxed);
    #[allow(clippy::cast_possible_truncation)]
    TICK.store(tick as u32, Ordering::Relaxed);
}

pub fn record_feedback(mv: i16) {
    FEEDBACK_MV.store(mv, Ordering::Relaxed);
}

pub fn feedback_mv() -> i16 {
    FEEDBACK_MV.load(Ordering::Relaxed)
}

/// Builds a [`StatusSnapshot`] from the stored outputs.
pub fn snapshot() -> StatusSnapshot {
    let state_code = STATE_CODE.load(Ordering::Relaxed);
    let mask = FLAGS.load(Ordering::Relaxed);
    let state = ProbeState::from_code(state_code).unwrap_or(ProbeState::Fault);

    StatusSnapshot {
        outputs: ProbeOutputs {
            trig_out_active: flag(mask, TRIG_ACTIVE),
            trig_out_code: TRIG_CODE.load(Ordering::Relaxed),
            intensity_out_active: flag(mask, INTENSITY_ACTIVE),
            intensity_out_code: INTENSITY_CODE.load(Ordering::Relaxed),
            ready: flag(mask, READY),
            busy: flag(mask, BUSY),
            fault: flag(mask, FAULT),
            current_state: state,
            state_code,
            monitor: decode_verdict(MONITOR.load(Ordering::Relaxed)),
        },
        fault: FaultReason::from_code(FAULT_REASON.load(Ordering::Relaxed)),
        tick: u64::from(TICK.load(Ordering::Relaxed)),
        tick_hz: FIRMWARE_TICK_HZ,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_codes_round_trip() {
        for verdict in [
            MonitorVerdict::Disabled,
            MonitorVerdict::Pending,
            MonitorVerdict::Crossed,
            MonitorVerdict::NotCrossed,
        ] {
            assert_eq!(decode_verdict(encode_verdict(verdict)), verdict);
        }
    }
}
