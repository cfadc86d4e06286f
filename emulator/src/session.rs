use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant as HostInstant};

use probe_core::console::catalog::{self, CommandSpec};
use probe_core::console::commands::{CommandError, CommandExecutor, CommandOutcome};
use probe_core::config::realized_nanos;
use probe_core::console::status::{StatusSnapshot, for_each_field, write_field_line};
use probe_core::{ProbeBench, TickRate};

pub struct Session {
    executor: CommandExecutor<ProbeBench>,
    transcript: Option<TranscriptLogger>,
    started_at: HostInstant,
}

impl Session {
    pub fn new(rate: TickRate, transcript: Option<TranscriptLogger>) -> Self {
        Self {
            executor: CommandExecutor::new(ProbeBench::new(rate)),
            transcript,
            started_at: HostInstant::now(),
        }
    }

    pub fn bench(&self) -> &ProbeBench {
        self.executor.probe()
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.log(elapsed, TranscriptRole::Host, trimmed)?;

        let lines = if trimmed.eq_ignore_ascii_case("events") {
            self.describe_events()
        } else {
            match self.executor.execute(trimmed) {
                Ok(outcome) => self.describe_outcome(outcome),
                Err(err) => vec![describe_error(&err)],
            }
        };

        for line in &lines {
            self.log(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(lines)
    }

    fn describe_outcome(&self, outcome: CommandOutcome) -> Vec<String> {
        match outcome {
            CommandOutcome::Outputs { outputs, fault } => {
                let bench = self.bench();
                let snapshot = StatusSnapshot {
                    outputs,
                    fault,
                    tick: bench.now(),
                    tick_hz: bench.engine().rate().hz(),
                };
                snapshot.render().lines().map(str::to_owned).collect()
            }
            CommandOutcome::Assigned { field, value } => {
                let mut lines = vec![format!("OK {}", field_line(field, value))];
                let rate = self.bench().engine().rate();
                let written = u64::try_from(value).unwrap_or(0);
                let coarse = realized_nanos(field, value, rate)
                    .filter(|&realized| realized > written.saturating_mul(2));
                if let Some(realized) = coarse {
                    lines.push(format!("WARN {field} runs as {realized}ns at {} Hz", rate.hz()));
                }
                lines
            }
            CommandOutcome::Value { field, value } => vec![field_line(field, value)],
            CommandOutcome::Config(config) => {
                let mut lines = Vec::new();
                // collecting into a Vec cannot fail
                let _ = for_each_field(&config, |field, value| {
                    lines.push(field_line(field, value));
                    Ok::<(), ()>(())
                });
                lines
            }
            CommandOutcome::Compatible(profile) => vec![format!(
                "OK compatible with {} ({}..{} mV, {}..{} ns)",
                profile.name,
                profile.min_mv,
                profile.max_mv,
                profile.min_pulse_ns,
                profile.max_pulse_ns,
            )],
            CommandOutcome::Help(Some(spec)) => vec![describe_spec(spec)],
            CommandOutcome::Help(None) => {
                let mut lines = vec!["Available commands:".to_string()];
                lines.extend(
                    catalog::commands()
                        .iter()
                        .map(|spec| format!("  {}", describe_spec(spec))),
                );
                lines.push(format!("  {:<28} - list recorded telemetry events", "events"));
                lines.push("Type `help <topic>` for a specific command.".to_string());
                lines
            }
        }
    }

    fn describe_events(&self) -> Vec<String> {
        let telemetry = self.bench().telemetry();
        if telemetry.is_empty() {
            return vec!["no events recorded".to_string()];
        }

        telemetry
            .oldest_first()
            .map(|record| {
                format!(
                    "#{:<4} tick={:<10} code=0x{:04x} {}",
                    record.id,
                    record.tick,
                    record.event.kind().to_raw(),
                    record.event,
                )
            })
            .collect()
    }

    fn log(&mut self, elapsed: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(elapsed, role, line),
            None => Ok(()),
        }
    }
}

fn describe_spec(spec: &CommandSpec) -> String {
    format!("{:<28} - {}", spec.usage, spec.summary)
}

fn describe_error(error: &CommandError<'_>) -> String {
    let class = match error {
        CommandError::Parse(_) => "syntax",
        CommandError::Config(_) => "config",
        CommandError::Capability(_) => "capability",
        CommandError::UnknownProfile(_) => "profile",
        CommandError::UnknownTopic(_) => "help",
    };
    format!("ERR {class} {error}")
}

fn field_line(field: probe_core::ConfigField, value: i64) -> String {
    let mut line = String::new();
    // writing into a String cannot fail
    let _ = write_field_line(&mut line, field, value);
    line
}

/// Append-only session log with millisecond offsets.
pub struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    pub fn create(path: &Path, header: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header(header)?;
        Ok(logger)
    }

    fn write_header(&mut self, header: &str) -> io::Result<()> {
        writeln!(self.writer, "# {header}")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
