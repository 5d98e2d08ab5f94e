//! Control-line tooling shared between firmware and emulator targets.
//!
//! The grammar lives in [`grammar`] and is implemented with a token/parse
//! pipeline that stays compatible with `no_std`. [`commands`] applies parsed
//! commands to an acquisition system and [`status`] renders the results.

pub mod commands;
pub mod grammar;
pub mod status;

/// Help topics understood by `help <topic>`, with their one-line usage.
pub const HELP_TOPICS: [(&str, &str); 8] = [
    ("start", "start - begin cycling the enabled channels"),
    ("stop", "stop - halt after abandoning the active cycle"),
    ("reset", "reset - return every channel to idle and clear counters"),
    ("status", "status - show run state, channels and health"),
    (
        "timing",
        "timing <ch> [open=<dur>] [delay=<dur>] [read=<n>|<dur>] - update channel timing",
    ),
    ("enable", "enable <ch> / disable <ch> - include or skip a channel"),
    ("fault", "fault clear - release a latched connection fault"),
    ("help", "help [topic] - list commands or describe one"),
];

/// Usage line for `topic`, matched case-insensitively. `disable` shares the
/// `enable` entry.
#[must_use]
pub fn help_for(topic: &str) -> Option<&'static str> {
    let topic = if topic.eq_ignore_ascii_case("disable") {
        "enable"
    } else {
        topic
    };

    HELP_TOPICS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(topic))
        .map(|(_, usage)| *usage)
}
