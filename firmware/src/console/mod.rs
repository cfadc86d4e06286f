#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Operator console for the firmware target.
//!
//! Bytes arriving on the console UART are assembled into lines by
//! [`LineBuffer`] and executed through the shared `probe-core` dispatcher.
//! Enable, arm, trigger and feedback are physical inputs on the board, so the
//! console refuses the commands that would simulate them.

use core::cell::Cell;
use core::fmt::{self, Write};
use core::str;

use heapless::Vec;
use probe_core::console::commands::{CommandExecutor, CommandOutcome, ProbeControl};
use probe_core::console::grammar::{self, Command};
use probe_core::console::status::{StatusFormatter, for_each_field, write_field_line};
use probe_core::console::catalog;
use probe_core::config::realized_nanos;
use probe_core::{ConfigError, ConfigField, FaultReason, ProbeConfig, ProbeOutputs, TickRate};

use crate::probe::{self, ControlRequest, ControlSender, SharedConfig};
use crate::status;

/// Maximum number of bytes accepted on a single console line.
pub const MAX_LINE_LEN: usize = 96;

/// Errors surfaced while assembling a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineError {
    Overflow,
    InvalidUtf8,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::Overflow => write!(f, "line longer than {MAX_LINE_LEN} bytes"),
            LineError::InvalidUtf8 => f.write_str("line is not valid UTF-8"),
        }
    }
}

/// Byte-wise line assembly with backspace handling.
#[derive(Default)]
pub struct LineBuffer {
    buffer: Vec<u8, MAX_LINE_LEN>,
    overflowed: bool,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            overflowed: false,
        }
    }

    /// Feeds one byte. Returns `true` when a line terminator completes a
    /// non-empty line, which is then available from [`LineBuffer::line`].
    ///
    /// # Errors
    ///
    /// Returns [`LineError::Overflow`] on the terminator of a line that
    /// exceeded [`MAX_LINE_LEN`]; the partial line is discarded.
    pub fn push(&mut self, byte: u8) -> Result<bool, LineError> {
        match byte {
            b'\r' | b'\n' => {
                if self.overflowed {
                    self.clear();
                    return Err(LineError::Overflow);
                }
                Ok(!self.buffer.is_empty())
            }
            0x08 | 0x7f => {
                self.buffer.pop();
                Ok(false)
            }
            value => {
                if self.buffer.push(value).is_err() {
                    self.overflowed = true;
                }
                Ok(false)
            }
        }
    }

    /// The completed line.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::InvalidUtf8`] if the bytes do not decode.
    pub fn line(&self) -> Result<&str, LineError> {
        str::from_utf8(self.buffer.as_slice()).map_err(|_| LineError::InvalidUtf8)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }
}

/// Console view of the probe: configuration through the shared registers,
/// outputs through the published status.
pub struct ConsoleLink<'a> {
    shared: &'a SharedConfig,
    requests: ControlSender<'a>,
    rate: TickRate,
    cached: ProbeConfig,
}

impl<'a> ConsoleLink<'a> {
    pub fn new(shared: &'a SharedConfig, requests: ControlSender<'a>, rate: TickRate) -> Self {
        Self {
            shared,
            requests,
            rate,
            cached: shared.lock(Cell::get),
        }
    }

    fn refresh(&mut self) {
        self.cached = self.shared.lock(Cell::get);
    }

    fn request(&self, request: ControlRequest) {
        if self.requests.try_send(request).is_err() {
            log_request_dropped(request);
        }
    }
}

impl ProbeControl for ConsoleLink<'_> {
    // global_enable and arm_enable are board inputs
    fn set_enable(&mut self, _level: bool) {}

    fn set_arm(&mut self, _level: bool) {}

    fn pulse_trigger(&mut self) -> ProbeOutputs {
        self.outputs()
    }

    fn acknowledge_fault(&mut self) -> ProbeOutputs {
        self.request(ControlRequest::AcknowledgeFault);
        self.outputs()
    }

    fn write_field(&mut self, field: ConfigField, value: i64) -> Result<(), ConfigError> {
        let result = probe::write_field(self.shared, self.rate, field, value);
        self.refresh();
        if let Err(err) = &result {
            log_write_rejected(err);
        }
        result
    }

    fn read_field(&self, field: ConfigField) -> i64 {
        self.cached
            .get(field)
            .unwrap_or_else(|| i64::from(status::feedback_mv()))
    }

    fn config(&self) -> &ProbeConfig {
        &self.cached
    }

    // the tick loop owns time on the board
    fn advance(&mut self, _ticks: u32) -> ProbeOutputs {
        self.outputs()
    }

    fn outputs(&self) -> ProbeOutputs {
        status::snapshot().outputs
    }

    fn fault_reason(&self) -> Option<FaultReason> {
        status::snapshot().fault
    }

    fn reset(&mut self) {
        self.request(ControlRequest::Reset);
    }
}

/// Line-oriented console bound to the firmware probe.
pub struct FirmwareConsole<'a> {
    executor: CommandExecutor<ConsoleLink<'a>>,
}

impl<'a> FirmwareConsole<'a> {
    pub fn new(link: ConsoleLink<'a>) -> Self {
        Self {
            executor: CommandExecutor::new(link),
        }
    }

    /// Executes one console line and writes the reply, one `\r\n`-terminated
    /// line at a time.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> fmt::Result {
        self.executor.probe_mut().refresh();

        let command = match grammar::parse(line) {
            Ok(command) => command,
            Err(err) => return write!(out, "ERR syntax {err}\r\n"),
        };

        if let Some(name) = hardware_input(&command) {
            return write!(out, "ERR {name} is driven by the board\r\n");
        }

        let rate = self.executor.probe().rate;
        match self.executor.dispatch(command) {
            Ok(outcome) => write_outcome(outcome, rate, out),
            Err(err) => write!(out, "ERR {err}\r\n"),
        }
    }
}

fn hardware_input(command: &Command<'_>) -> Option<&'static str> {
    match command {
        Command::Enable(_) => Some("global_enable"),
        Command::Arm | Command::Disarm => Some("arm_enable"),
        Command::Trigger => Some("ext_trigger_in"),
        Command::Feedback(_) => Some("probe_monitor_feedback"),
        Command::Tick(_) => Some("tick"),
        _ => None,
    }
}

fn write_outcome<W: Write>(outcome: CommandOutcome, rate: TickRate, out: &mut W) -> fmt::Result {
    match outcome {
        CommandOutcome::Outputs { .. } => {
            let snapshot = status::snapshot();
            let formatter = StatusFormatter::new(&snapshot);
            formatter.write_state_line(out)?;
            out.write_str("\r\n")?;
            formatter.write_outputs_line(out)?;
            out.write_str("\r\n")?;
            formatter.write_fault_line(out)?;
            out.write_str("\r\n")
        }
        CommandOutcome::Assigned { field, value } => {
            out.write_str("OK ")?;
            write_field_line(out, field, value)?;
            out.write_str("\r\n")?;
            write_coarse_warning(field, value, rate, out)
        }
        CommandOutcome::Value { field, value } => {
            write_field_line(out, field, value)?;
            out.write_str("\r\n")
        }
        CommandOutcome::Config(config) => for_each_field(&config, |field, value| {
            write_field_line(out, field, value)?;
            out.write_str("\r\n")
        }),
        CommandOutcome::Compatible(profile) => {
            write!(out, "OK compatible with {}\r\n", profile.name)
        }
        CommandOutcome::Help(Some(spec)) => write!(out, "{} - {}\r\n", spec.usage, spec.summary),
        CommandOutcome::Help(None) => {
            for spec in catalog::commands() {
                write!(out, "{:<24} - {}\r\n", spec.usage, spec.summary)?;
            }
            Ok(())
        }
    }
}

/// Warns when tick rounding stretches a duration past twice its written value.
fn write_coarse_warning<W: Write>(
    field: ConfigField,
    value: i64,
    rate: TickRate,
    out: &mut W,
) -> fmt::Result {
    let Some(realized) = realized_nanos(field, value, rate) else {
        return Ok(());
    };
    let written = u64::try_from(value).unwrap_or(0);
    if realized <= written.saturating_mul(2) {
        return Ok(());
    }
    write!(
        out,
        "WARN {field} runs as {realized}ns at {} Hz\r\n",
        rate.hz()
    )
}

#[cfg(target_os = "none")]
fn log_write_rejected(err: &ConfigError) {
    defmt::warn!("console: write rejected: {}", defmt::Display2Format(err));
}

#[cfg(not(target_os = "none"))]
fn log_write_rejected(_: &ConfigError) {}

#[cfg(target_os = "none")]
fn log_request_dropped(request: ControlRequest) {
    let name = match request {
        ControlRequest::AcknowledgeFault => "acknowledge",
        ControlRequest::Reset => "reset",
    };
    defmt::warn!("console: request queue full, dropped {}", name);
}

#[cfg(not(target_os = "none"))]
fn log_request_dropped(_: ControlRequest) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ControlQueue, FIRMWARE_TICK_HZ, shared_config};
    use heapless::String;

    fn rate() -> TickRate {
        TickRate::new(FIRMWARE_TICK_HZ).expect("rate")
    }

    #[test]
    fn line_buffer_assembles_and_edits() {
        let mut line = LineBuffer::new();
        for byte in b"sett\x08 x" {
            assert_eq!(line.push(*byte), Ok(false));
        }
        assert_eq!(line.push(b'\r'), Ok(true));
        assert_eq!(line.line(), Ok("set x"));

        line.clear();
        assert_eq!(line.push(b'\n'), Ok(false));
    }

    #[test]
    fn line_buffer_reports_overflow_on_terminator() {
        let mut line = LineBuffer::new();
        for _ in 0..=MAX_LINE_LEN {
            assert_eq!(line.push(b'a'), Ok(false));
        }
        assert_eq!(line.push(b'\n'), Err(LineError::Overflow));
        assert_eq!(line.line(), Ok(""));
    }

    #[test]
    fn writes_land_in_shared_configuration() {
        let shared = shared_config();
        let queue = ControlQueue::new();
        let mut console = FirmwareConsole::new(ConsoleLink::new(&shared, queue.sender(), rate()));

        let mut out: String<128> = String::new();
        console
            .handle_line("set cooldown_interval=25", &mut out)
            .expect("fits");
        assert_eq!(out.as_str(), "OK cooldown_interval=25us\r\n");
        assert_eq!(shared.lock(Cell::get).cooldown_interval(), 25);

        out.clear();
        console
            .handle_line("get cooldown_interval", &mut out)
            .expect("fits");
        assert_eq!(out.as_str(), "cooldown_interval=25us\r\n");
    }

    #[test]
    fn coarse_pulse_widths_are_flagged() {
        let shared = shared_config();
        let queue = ControlQueue::new();
        let mut console = FirmwareConsole::new(ConsoleLink::new(&shared, queue.sender(), rate()));

        let mut out: String<128> = String::new();
        console
            .handle_line("set trig_out_duration=20", &mut out)
            .expect("fits");
        assert_eq!(
            out.as_str(),
            "OK trig_out_duration=20ns\r\nWARN trig_out_duration runs as 10000ns at 100000 Hz\r\n"
        );

        out.clear();
        console
            .handle_line("set monitor_window_duration=20000", &mut out)
            .expect("fits");
        assert_eq!(out.as_str(), "OK monitor_window_duration=20000ns\r\n");
    }

    #[test]
    fn simulated_inputs_are_refused() {
        let shared = shared_config();
        let queue = ControlQueue::new();
        let mut console = FirmwareConsole::new(ConsoleLink::new(&shared, queue.sender(), rate()));

        let mut out: String<128> = String::new();
        console.handle_line("trigger", &mut out).expect("fits");
        assert_eq!(
            out.as_str(),
            "ERR ext_trigger_in is driven by the board\r\n"
        );

        out.clear();
        console.handle_line("enable off", &mut out).expect("fits");
        assert_eq!(out.as_str(), "ERR global_enable is driven by the board\r\n");
    }

    #[test]
    fn clear_and_reset_are_queued_for_the_tick_loop() {
        let shared = shared_config();
        let queue = ControlQueue::new();
        let mut console = FirmwareConsole::new(ConsoleLink::new(&shared, queue.sender(), rate()));

        let mut out: String<512> = String::new();
        console.handle_line("clear", &mut out).expect("fits");
        console.handle_line("reset", &mut out).expect("fits");

        let receiver = queue.receiver();
        assert_eq!(receiver.try_receive(), Ok(ControlRequest::AcknowledgeFault));
        assert_eq!(receiver.try_receive(), Ok(ControlRequest::Reset));
        assert!(receiver.try_receive().is_err());
    }
}
