use std::io;
use std::path::Path;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use probe_core::TickRate;
use session::{Session, TranscriptLogger};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TranscriptProfile {
    Firing,
    Timeout,
    Monitor,
}

impl TranscriptProfile {
    fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Firing => "transcripts/emulator-firing.log",
            TranscriptProfile::Timeout => "transcripts/emulator-timeout.log",
            TranscriptProfile::Monitor => "transcripts/emulator-monitor.log",
        }
    }

    fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Firing => "Probe Emulator firing cycle transcript",
            TranscriptProfile::Timeout => "Probe Emulator trigger timeout transcript",
            TranscriptProfile::Monitor => "Probe Emulator monitor mismatch transcript",
        }
    }

    /// Rate the script runs at; slow clocks keep the tick counts short.
    fn tick_hz(self) -> u32 {
        match self {
            TranscriptProfile::Firing | TranscriptProfile::Monitor => 1_000_000,
            TranscriptProfile::Timeout => 1_000,
        }
    }

    fn script(self) -> &'static [&'static str] {
        match self {
            TranscriptProfile::Firing => &[
                "config",
                "set trig_out_voltage=2500",
                "set trig_out_duration=3000",
                "set intensity_voltage=-1200",
                "set intensity_duration=5000",
                "set cooldown_interval=8",
                "set monitor_enable=off",
                "check",
                "arm",
                "trigger",
                "tick 2",
                "tick 3",
                "status",
                "tick 8",
                "events",
            ],
            TranscriptProfile::Timeout => &[
                "set trigger_wait_timeout=1",
                "arm",
                "tick 998",
                "tick",
                "trigger",
                "disarm",
                "clear",
                "events",
            ],
            TranscriptProfile::Monitor => &[
                "set monitor_threshold_voltage=-1000",
                "set monitor_window_duration=20000",
                "feedback -500",
                "arm",
                "trigger",
                "tick 19",
                "tick",
                "tick 5",
                "disarm",
                "clear",
                "status",
                "events",
            ],
        }
    }
}

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Firing)?;
    record_profile(TranscriptProfile::Timeout)?;
    record_profile(TranscriptProfile::Monitor)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let rate = TickRate::new(profile.tick_hz())
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
    let logger = TranscriptLogger::create(Path::new(profile.log_path()), profile.header())?;
    let mut session = Session::new(rate, Some(logger));

    for line in profile.script() {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}
