mod session;
mod sim;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use acquisition_core::leds::LedFlags;
use session::Session;

/// Desired LED levels shared with the refresh thread.
static LED_FLAGS: LedFlags = LedFlags::new();

fn main() -> io::Result<()> {
    let transcript = parse_transcript_path().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: acquisition-emulator [--transcript <path>]");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(&LED_FLAGS, transcript.as_deref())?;
    let mut line = String::new();

    writeln!(
        writer,
        "LED mux emulator ready. Type `help` for commands or `exit` to quit."
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
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    writeln!(
        writer,
        "Session closed at {}ms after {} cycles.",
        session.now().as_millis(),
        session.acquisition().process_itr()
    )?;
    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_transcript_path() -> Result<Option<PathBuf>, String> {
    let mut args = env::args().skip(1);
    let Some(arg) = args.next() else {
        return Ok(None);
    };

    let path = if let Some(value) = arg.strip_prefix("--transcript=") {
        value.to_string()
    } else if arg == "--transcript" {
        args.next()
            .ok_or_else(|| "Expected value after --transcript".to_string())?
    } else {
        return Err(format!("Unknown argument `{arg}`"));
    };

    if let Some(extra) = args.next() {
        return Err(format!("Unexpected argument `{extra}`"));
    }
    Ok(Some(PathBuf::from(path)))
}
