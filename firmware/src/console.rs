#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Operator console plumbing for the USB CDC link.
//!
//! Raw USB packets travel between the USB task and the acquisition task as
//! [`ConsoleFrame`]s over two static channels. The acquisition task feeds
//! inbound bytes through a [`LineAssembler`] and hands each completed line to
//! the shared command executor.

use core::fmt;
use core::str;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use heapless::{String, Vec};

/// Maximum number of bytes accepted on a single console line (excluding terminator).
pub const MAX_LINE_LEN: usize = 96;

/// Payload size of one console frame; matches the CDC bulk packet size.
pub const FRAME_LEN: usize = 64;

/// Depth of each console frame queue.
pub const CONSOLE_QUEUE_DEPTH: usize = 8;

pub type ConsoleFrame = Vec<u8, FRAME_LEN>;
pub type ConsoleLine = String<MAX_LINE_LEN>;

#[cfg(target_os = "none")]
type ConsoleMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type ConsoleMutex = NoopRawMutex;

pub type ConsoleQueue = Channel<ConsoleMutex, ConsoleFrame, CONSOLE_QUEUE_DEPTH>;

/// Frames received from the host.
#[cfg(target_os = "none")]
pub static CONSOLE_RX_QUEUE: ConsoleQueue = Channel::new();
/// Frames waiting to be written to the host.
#[cfg(target_os = "none")]
pub static CONSOLE_TX_QUEUE: ConsoleQueue = Channel::new();

/// Errors surfaced while assembling a line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConsoleError {
    /// The line exceeded [`MAX_LINE_LEN`]; it is discarded up to the next terminator.
    LineOverflow,
    /// The completed line was not valid UTF-8.
    InvalidUtf8,
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::LineOverflow => write!(f, "line exceeds {MAX_LINE_LEN} bytes"),
            ConsoleError::InvalidUtf8 => f.write_str("line is not valid UTF-8"),
        }
    }
}

/// Byte-at-a-time line editor with backspace support.
#[derive(Default)]
pub struct LineAssembler {
    buffer: Vec<u8, MAX_LINE_LEN>,
    discarding: bool,
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Feeds one byte. Returns the finished line when a terminator arrives.
    ///
    /// Blank lines are swallowed. An overflow is reported once, on the byte
    /// that overflowed; the rest of that line is dropped silently.
    pub fn push(&mut self, byte: u8) -> Result<Option<ConsoleLine>, ConsoleError> {
        match byte {
            b'\r' | b'\n' => {
                if core::mem::take(&mut self.discarding) || self.buffer.is_empty() {
                    self.buffer.clear();
                    return Ok(None);
                }
                let line = self.finish();
                self.buffer.clear();
                line.map(Some)
            }
            0x08 | 0x7f => {
                self.buffer.pop();
                Ok(None)
            }
            _ if self.discarding => Ok(None),
            value => {
                if self.buffer.push(value).is_err() {
                    self.buffer.clear();
                    self.discarding = true;
                    return Err(ConsoleError::LineOverflow);
                }
                Ok(None)
            }
        }
    }

    fn finish(&self) -> Result<ConsoleLine, ConsoleError> {
        let text = str::from_utf8(&self.buffer).map_err(|_| ConsoleError::InvalidUtf8)?;
        let mut line = ConsoleLine::new();
        line.push_str(text).map_err(|_| ConsoleError::LineOverflow)?;
        Ok(line)
    }

    /// Drops any partial line, e.g. when the host disconnects.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

/// Splits `text` into frames, terminating it with `\r\n`.
///
/// Returns the number of frames that did not fit into the queue.
pub fn send_text(queue: &ConsoleQueue, text: &str) -> usize {
    let mut dropped = 0;
    let mut frame = ConsoleFrame::new();
    for &byte in text.as_bytes().iter().chain(b"\r\n") {
        if frame.is_full() {
            dropped += usize::from(!try_send(queue, core::mem::take(&mut frame)));
        }
        // The frame was flushed above when full.
        let _ = frame.push(byte);
    }
    if !frame.is_empty() {
        dropped += usize::from(!try_send(queue, frame));
    }
    dropped
}

fn try_send(queue: &ConsoleQueue, frame: ConsoleFrame) -> bool {
    match queue.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => false,
    }
}
