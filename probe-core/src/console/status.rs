//! Shared status rendering for the console.
//!
//! [`StatusFormatter`] keeps the textual rendering of engine outputs, faults
//! and configuration consistent across the emulator and firmware front-ends.

use core::fmt;

use crate::config::{ConfigField, FieldUnit, ProbeConfig};
use crate::engine::ProbeOutputs;
use crate::fault::FaultReason;
use crate::units::code_to_mv;

/// Point-in-time view rendered by the `status` command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub outputs: ProbeOutputs,
    pub fault: Option<FaultReason>,
    pub tick: u64,
    pub tick_hz: u32,
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    /// Creates a new formatter for the provided snapshot.
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the state line (e.g. `state=ARMED code=0b000001 ready=0 busy=0 fault=0 tick=12`).
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_state_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let outputs = &self.snapshot.outputs;
        write!(
            writer,
            "state={} code=0b{:06b} ready={} busy={} fault={} tick={}",
            outputs.current_state,
            outputs.state_code,
            u8::from(outputs.ready),
            u8::from(outputs.busy),
            u8::from(outputs.fault),
            self.snapshot.tick,
        )
    }

    /// Writes the drive line (e.g. `outputs trig_out=16384(2500mV) intensity_out=off`).
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_outputs_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let outputs = &self.snapshot.outputs;
        writer.write_str("outputs trig_out=")?;
        write_channel(writer, outputs.trig_out_active, outputs.trig_out_code)?;
        writer.write_str(" intensity_out=")?;
        write_channel(writer, outputs.intensity_out_active, outputs.intensity_out_code)
    }

    /// Writes the fault/monitor line (e.g. `fault=timeout monitor=disabled`).
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_fault_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("fault=")?;
        match self.snapshot.fault {
            Some(reason) => write!(writer, "{reason}")?,
            None => writer.write_str("none")?,
        }
        write!(writer, " monitor={}", self.snapshot.outputs.monitor)
    }

    /// Writes the clock line (e.g. `clock 125000000Hz`).
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_clock_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "clock {}Hz", self.snapshot.tick_hz)
    }
}

#[cfg(feature = "alloc")]
impl StatusSnapshot {
    /// Renders the state, outputs and fault lines separated by newlines.
    #[must_use]
    pub fn render(&self) -> alloc::string::String {
        let formatter = StatusFormatter::new(self);
        let mut out = alloc::string::String::new();
        // writing into a String cannot fail
        let _ = formatter.write_state_line(&mut out);
        out.push('\n');
        let _ = formatter.write_outputs_line(&mut out);
        out.push('\n');
        let _ = formatter.write_fault_line(&mut out);
        out.push('\n');
        let _ = formatter.write_clock_line(&mut out);
        out
    }
}

fn write_channel<W: fmt::Write>(writer: &mut W, active: bool, code: i16) -> fmt::Result {
    if active {
        write!(writer, "{code}({}mV)", code_to_mv(code))
    } else {
        writer.write_str("off")
    }
}

/// Writes one configuration field (e.g. `cooldown_interval=10us`).
///
/// # Errors
///
/// Propagates writer failures.
pub fn write_field_line<W: fmt::Write>(
    writer: &mut W,
    field: ConfigField,
    value: i64,
) -> fmt::Result {
    match field.unit() {
        FieldUnit::Flag => write!(writer, "{field}={}", if value != 0 { "on" } else { "off" }),
        unit => write!(writer, "{field}={value}{}", unit.suffix()),
    }
}

/// Writes every stored field of `config`, one per line, through `line`.
///
/// # Errors
///
/// Propagates the first error returned by `line`.
pub fn for_each_field<E>(
    config: &ProbeConfig,
    mut line: impl FnMut(ConfigField, i64) -> Result<(), E>,
) -> Result<(), E> {
    for field in crate::config::ALL_FIELDS {
        if let Some(value) = config.get(field) {
            line(field, value)?;
        }
    }
    Ok(())
}
