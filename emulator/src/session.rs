use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use acquisition_core::channels::{ALL_LEDS, ChannelId};
use acquisition_core::config::AcquisitionConfig;
use acquisition_core::control::commands::{CommandExecutor, CommandOutcome};
use acquisition_core::control::status::write_outcome;
use acquisition_core::leds::LedFlags;
use acquisition_core::orchestrator::Acquisition;
use acquisition_core::report::{CycleReport, ReportSink};
use acquisition_core::telemetry::{EventId, TelemetryPayload, TelemetryRecord};

use crate::sim::{LedRefresher, SimInstant, SimulatedAdc};

pub type EmulatedAcquisition = Acquisition<'static, SimulatedAdc, SimInstant>;

/// Simulated time covered by one `tick`.
pub const TICK_STEP: Duration = Duration::from_millis(1);

/// Upper bound for `tick <n>` so a typo cannot stall the console.
pub const MAX_TICKS_PER_COMMAND: u32 = 600_000;

pub const EMULATOR_HELP: &[(&str, &str)] = &[
    ("tick", "tick [n]                       - advance the simulated clock n ms"),
    (
        "adc",
        "adc fail <n>|disconnect|connect|set <ch> <value> - shape ADC answers",
    ),
    ("leds", "leds                           - show the LED pin levels"),
    ("log", "log                            - print telemetry since the last call"),
];

/// Collects report lines produced while ticking.
#[derive(Default)]
struct LineSink {
    lines: Vec<String>,
}

impl ReportSink<SimInstant> for LineSink {
    fn publish(&mut self, report: &CycleReport<SimInstant>) {
        let mut line = String::new();
        if report
            .write_line(&mut line, report.completed_at.as_millis())
            .is_ok()
        {
            self.lines.push(line);
        }
    }
}

pub struct Session {
    executor: CommandExecutor<EmulatedAcquisition>,
    leds: LedRefresher,
    transcript: Option<TranscriptLogger>,
    now: SimInstant,
    telemetry_cursor: EventId,
}

impl Session {
    pub fn new(flags: &'static LedFlags, transcript: Option<&Path>) -> io::Result<Self> {
        let acquisition = Acquisition::new(AcquisitionConfig::default(), SimulatedAdc::new(), flags)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error.to_string()))?;
        let leds = LedRefresher::spawn(flags)?;
        let transcript = transcript.map(TranscriptLogger::new).transpose()?;

        Ok(Self {
            executor: CommandExecutor::new(acquisition),
            leds,
            transcript,
            now: SimInstant::ZERO,
            telemetry_cursor: 0,
        })
    }

    pub fn now(&self) -> SimInstant {
        self.now
    }

    pub fn acquisition(&self) -> &EmulatedAcquisition {
        self.executor.target()
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.record(TranscriptRole::Host, &[trimmed.to_string()])?;

        let mut words = trimmed.split_whitespace();
        let head = words.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = words.collect();
        let lines = match head.as_str() {
            "tick" => self.handle_tick(&args),
            "adc" => self.handle_adc(&args),
            "leds" if args.is_empty() => vec![self.describe_leds()],
            "log" if args.is_empty() => self.drain_telemetry(),
            "help" => self.handle_help(trimmed, &args),
            _ => self.handle_control(trimmed),
        };

        self.record(TranscriptRole::Emulator, &lines)?;
        Ok(lines)
    }

    fn handle_tick(&mut self, args: &[&str]) -> Vec<String> {
        let count = match args {
            [] => 1,
            [value] => match value.parse::<u32>() {
                Ok(count) if (1..=MAX_TICKS_PER_COMMAND).contains(&count) => count,
                _ => {
                    return vec![format!(
                        "ERR invalid tick count `{value}` (1..={MAX_TICKS_PER_COMMAND})"
                    )];
                }
            },
            _ => return vec!["ERR usage: tick [n]".to_string()],
        };

        let mut sink = LineSink::default();
        for _ in 0..count {
            self.now = self.now + TICK_STEP;
            self.executor.target_mut().tick_into(self.now, &mut sink);
        }

        let mut lines = sink.lines;
        lines.push(format!("OK ticked {count} now={}ms", self.now.as_millis()));
        lines
    }

    fn handle_adc(&mut self, args: &[&str]) -> Vec<String> {
        let adc = self.executor.target_mut().adc_mut();
        let line = match args {
            ["fail", count] => match count.parse::<u32>() {
                Ok(count) => {
                    adc.fail_next(count);
                    format!("OK adc failing next {count} reads")
                }
                Err(_) => format!("ERR invalid failure count `{count}`"),
            },
            ["disconnect"] => {
                adc.set_connected(false);
                "OK adc disconnected".to_string()
            }
            ["connect"] => {
                adc.set_connected(true);
                "OK adc connected".to_string()
            }
            ["set", channel, value] => {
                let channel = channel
                    .parse::<usize>()
                    .ok()
                    .and_then(ChannelId::from_index);
                match (channel, value.parse::<i16>()) {
                    (Some(channel), Ok(value)) => {
                        adc.set_level(channel.adc_input(), value);
                        format!("OK adc {} level={value}", channel.adc_input())
                    }
                    (None, _) => "ERR unknown channel".to_string(),
                    (_, Err(_)) => format!("ERR invalid level `{value}`"),
                }
            }
            _ => "ERR usage: adc fail <n>|disconnect|connect|set <ch> <value>".to_string(),
        };
        vec![line]
    }

    fn describe_leds(&self) -> String {
        let levels = self.leds.levels();
        let mut line = String::from("leds");
        for (led, lit) in ALL_LEDS.iter().zip(levels) {
            let _ = write!(line, " {}={}", led.name, if lit { "on" } else { "off" });
        }
        line
    }

    fn drain_telemetry(&mut self) -> Vec<String> {
        let recorder = self.executor.target().telemetry();
        let lines: Vec<String> = recorder
            .oldest_first()
            .filter(|record| record.id >= self.telemetry_cursor)
            .map(describe_record)
            .collect();
        self.telemetry_cursor = recorder.next_event_id();

        if lines.is_empty() {
            vec!["log: no new events".to_string()]
        } else {
            lines
        }
    }

    fn handle_help(&mut self, line: &str, args: &[&str]) -> Vec<String> {
        if let [topic] = args
            && let Some((_, usage)) = EMULATOR_HELP
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(topic))
        {
            return vec![(*usage).to_string()];
        }

        let mut lines = self.handle_control(line);
        if args.is_empty() {
            let names: Vec<&str> = EMULATOR_HELP.iter().map(|(name, _)| *name).collect();
            lines.push(format!("emulator: {}", names.join(" ")));
        }
        lines
    }

    fn handle_control(&mut self, line: &str) -> Vec<String> {
        let mut out = String::new();
        let rendered = match self.executor.execute(line, self.now) {
            Ok(outcome) => write_outcome(&mut out, &outcome)
                .map(|()| matches!(outcome, CommandOutcome::Status(_))),
            Err(error) => write!(out, "ERR {error}").map(|()| false),
        };

        let mut lines: Vec<String> = match rendered {
            Ok(_) => out.lines().map(str::to_string).collect(),
            Err(_) => vec!["ERR response could not be rendered".to_string()],
        };
        if matches!(rendered, Ok(true)) {
            lines.push(self.describe_emulator());
        }
        lines
    }

    fn describe_emulator(&self) -> String {
        let adc = self.executor.target().adc();
        format!(
            "emulator now={}ms adc={} pending-failures={} reads={} led-refresh={}",
            self.now.as_millis(),
            if adc.is_connected() {
                "connected"
            } else {
                "disconnected"
            },
            adc.pending_failures(),
            adc.reads(),
            self.leds.passes(),
        )
    }

    fn record(&mut self, role: TranscriptRole, lines: &[String]) -> io::Result<()> {
        let now = self.now;
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(now, role, line)?;
            }
        }
        Ok(())
    }
}

fn describe_record(record: &TelemetryRecord<SimInstant>) -> String {
    let mut line = format!(
        "#{} +{}ms {}",
        record.id,
        record.timestamp.as_millis(),
        record.event
    );
    let _ = match record.details {
        TelemetryPayload::None => Ok(()),
        TelemetryPayload::Led(led) => match led.elapsed_since_previous {
            Some(elapsed) => write!(line, " after={}ms", elapsed.as_millis()),
            None => Ok(()),
        },
        TelemetryPayload::Sample(error) => write!(line, " ({error})"),
        TelemetryPayload::Cycle(cycle) => write!(
            line,
            " cycle={} samples={} missed={}",
            cycle.cycle, cycle.samples, cycle.missed
        ),
        TelemetryPayload::Fault { failures } => write!(line, " failures={failures}"),
    };
    line
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
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
        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# LED mux emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, now: SimInstant, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            now.as_millis(),
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
