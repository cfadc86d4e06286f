mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use probe_core::TickRate;

use session::{Session, TranscriptLogger};

const USAGE: &str = "Usage: probe-emulator [--tick-hz <hz>] [--transcript <path>]";

struct Options {
    rate: TickRate,
    transcript: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let transcript = match options.transcript {
        Some(path) => Some(TranscriptLogger::create(
            &path,
            "Probe Emulator interactive transcript",
        )?),
        None => None,
    };

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let styled = stdout.is_tty();
    let mut writer = stdout.lock();
    let mut session = Session::new(options.rate, transcript);
    let mut line = String::new();

    writeln!(
        writer,
        "Probe Emulator ready at {} Hz. Type `help` for commands or `exit` to quit.",
        options.rate.hz()
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            if styled && is_alarm(&response) {
                writeln!(writer, "{}", response.red().bold())?;
            } else {
                writeln!(writer, "{response}")?;
            }
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

/// Error replies and latched-fault lines are highlighted on a terminal.
fn is_alarm(line: &str) -> bool {
    line.starts_with("ERR ")
        || line.starts_with("state=FAULT")
        || (line.starts_with("fault=") && !line.starts_with("fault=none"))
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        rate: TickRate::DEFAULT,
        transcript: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--tick-hz" => {
                let raw = value()?;
                let hz = raw
                    .parse::<u32>()
                    .map_err(|err| format!("Invalid tick rate `{raw}`: {err}"))?;
                options.rate =
                    TickRate::new(hz).map_err(|err| format!("Invalid tick rate `{raw}`: {err}"))?;
            }
            "--transcript" => options.transcript = Some(PathBuf::from(value()?)),
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    Ok(options)
}
