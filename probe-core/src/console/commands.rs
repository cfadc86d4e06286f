//! Console command dispatcher.
//!
//! Parsed commands are applied to anything implementing [`ProbeControl`].
//! The dispatcher stays `no_std` friendly so the firmware and emulator can
//! share it.

use core::fmt;

use crate::bench::ProbeBench;
use crate::capability::{CapabilityError, DS1120A, ProbeCapabilities};
use crate::config::{ConfigError, ConfigField, ProbeConfig};
use crate::engine::ProbeOutputs;
use crate::fault::FaultReason;

use super::catalog::{self, CommandSpec};
use super::grammar::{self, Command};

/// Operations the console needs from a probe channel.
pub trait ProbeControl {
    /// Drives the master gate.
    fn set_enable(&mut self, level: bool);

    fn set_arm(&mut self, level: bool);

    /// Holds the trigger input high for one tick.
    fn pulse_trigger(&mut self) -> ProbeOutputs;

    /// Raises the fault acknowledgement for one tick.
    fn acknowledge_fault(&mut self) -> ProbeOutputs;

    /// # Errors
    ///
    /// Returns the configuration error describing why the write was refused.
    fn write_field(&mut self, field: ConfigField, value: i64) -> Result<(), ConfigError>;

    fn read_field(&self, field: ConfigField) -> i64;

    fn config(&self) -> &ProbeConfig;

    /// Evaluates `ticks` ticks and returns the last outputs.
    fn advance(&mut self, ticks: u32) -> ProbeOutputs;

    fn outputs(&self) -> ProbeOutputs;

    fn fault_reason(&self) -> Option<FaultReason>;

    fn reset(&mut self);
}

impl<const CAPACITY: usize> ProbeControl for ProbeBench<CAPACITY> {
    fn set_enable(&mut self, level: bool) {
        ProbeBench::set_enable(self, level);
    }

    fn set_arm(&mut self, level: bool) {
        ProbeBench::set_arm(self, level);
    }

    fn pulse_trigger(&mut self) -> ProbeOutputs {
        ProbeBench::pulse_trigger(self)
    }

    fn acknowledge_fault(&mut self) -> ProbeOutputs {
        ProbeBench::acknowledge_fault(self)
    }

    fn write_field(&mut self, field: ConfigField, value: i64) -> Result<(), ConfigError> {
        self.write(field, value)
    }

    fn read_field(&self, field: ConfigField) -> i64 {
        self.read(field)
    }

    fn config(&self) -> &ProbeConfig {
        ProbeBench::config(self)
    }

    fn advance(&mut self, ticks: u32) -> ProbeOutputs {
        self.run(ticks)
    }

    fn outputs(&self) -> ProbeOutputs {
        ProbeBench::outputs(self)
    }

    fn fault_reason(&self) -> Option<FaultReason> {
        ProbeBench::fault_reason(self)
    }

    fn reset(&mut self) {
        ProbeBench::reset(self);
    }
}

/// Command execution successes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Engine outputs after the command's ticks (or the current ones).
    Outputs {
        outputs: ProbeOutputs,
        fault: Option<FaultReason>,
    },
    Assigned {
        field: ConfigField,
        value: i64,
    },
    Value {
        field: ConfigField,
        value: i64,
    },
    Config(ProbeConfig),
    Compatible(&'static ProbeCapabilities),
    Help(Option<&'static CommandSpec>),
}

/// Errors surfaced while executing a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError<'a> {
    Parse(grammar::ParseError<'a>),
    Config(ConfigError),
    Capability(CapabilityError),
    UnknownProfile(&'a str),
    UnknownTopic(&'a str),
}

impl<'a> From<grammar::ParseError<'a>> for CommandError<'a> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl From<ConfigError> for CommandError<'_> {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl From<CapabilityError> for CommandError<'_> {
    fn from(error: CapabilityError) -> Self {
        Self::Capability(error)
    }
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(err) => err.fmt(f),
            CommandError::Config(err) => err.fmt(f),
            CommandError::Capability(err) => err.fmt(f),
            CommandError::UnknownProfile(name) => write!(f, "unknown probe profile `{name}`"),
            CommandError::UnknownTopic(name) => write!(f, "no help for `{name}`"),
        }
    }
}

/// Applies console commands to a probe channel.
pub struct CommandExecutor<P> {
    probe: P,
}

impl<P> CommandExecutor<P> {
    /// Creates a new executor around the provided probe.
    pub const fn new(probe: P) -> Self {
        Self { probe }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn probe_mut(&mut self) -> &mut P {
        &mut self.probe
    }
}

impl<P> CommandExecutor<P>
where
    P: ProbeControl,
{
    /// Parses and executes a console line.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] for parse failures, rejected writes and
    /// capability mismatches.
    pub fn execute<'a>(&mut self, line: &'a str) -> Result<CommandOutcome, CommandError<'a>> {
        let command = grammar::parse(line)?;
        self.dispatch(command)
    }

    /// Executes an already parsed command.
    ///
    /// # Errors
    ///
    /// See [`CommandExecutor::execute`].
    pub fn dispatch<'a>(
        &mut self,
        command: Command<'a>,
    ) -> Result<CommandOutcome, CommandError<'a>> {
        let outputs = match command {
            Command::Arm => {
                self.probe.set_arm(true);
                self.probe.advance(1)
            }
            Command::Disarm => {
                self.probe.set_arm(false);
                self.probe.advance(1)
            }
            Command::Enable(level) => {
                self.probe.set_enable(level);
                self.probe.advance(1)
            }
            Command::Trigger => self.probe.pulse_trigger(),
            Command::Clear => self.probe.acknowledge_fault(),
            Command::Tick(count) => self.probe.advance(count),
            Command::Status => self.probe.outputs(),
            Command::Reset => {
                self.probe.reset();
                self.probe.outputs()
            }
            Command::Feedback(mv) => {
                let field = ConfigField::ProbeMonitorFeedback;
                self.probe.write_field(field, mv)?;
                return Ok(CommandOutcome::Assigned { field, value: mv });
            }
            Command::Set { field, value } => {
                self.probe.write_field(field, value)?;
                return Ok(CommandOutcome::Assigned { field, value });
            }
            Command::Get(field) => {
                return Ok(CommandOutcome::Value {
                    field,
                    value: self.probe.read_field(field),
                });
            }
            Command::Config => return Ok(CommandOutcome::Config(*self.probe.config())),
            Command::Check(name) => return self.check(name),
            Command::Help(topic) => return help(topic),
        };

        Ok(CommandOutcome::Outputs {
            outputs,
            fault: self.probe.fault_reason(),
        })
    }

    fn check<'a>(&self, name: Option<&'a str>) -> Result<CommandOutcome, CommandError<'a>> {
        let profile = match name {
            Some(name) => {
                ProbeCapabilities::by_name(name).ok_or(CommandError::UnknownProfile(name))?
            }
            None => &DS1120A,
        };
        profile.check(self.probe.config())?;
        Ok(CommandOutcome::Compatible(profile))
    }
}

fn help(topic: Option<&str>) -> Result<CommandOutcome, CommandError<'_>> {
    match topic {
        None => Ok(CommandOutcome::Help(None)),
        Some(name) => catalog::find(name)
            .map(|spec| CommandOutcome::Help(Some(spec)))
            .ok_or(CommandError::UnknownTopic(name)),
    }
}
