//! Keyboard input
//!
//! Translates raw characters into logical keys, suppresses OS auto-repeat
//! and carries events from the input thread to the processing thread over
//! a bounded single-producer queue.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::collections::HashSet;
use std::io::BufRead;
use std::time::Duration;

/// Event delivered to the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Pressed(u32),
    Released(u32),
    Quit,
}

impl KeyEvent {
    /// Logical key number, if any
    pub fn key(&self) -> Option<u32> {
        match self {
            KeyEvent::Pressed(k) | KeyEvent::Released(k) => Some(*k),
            KeyEvent::Quit => None,
        }
    }
}

/// Result of translating one physical key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalKey {
    Record(u32),
    Quit,
}

const SHIFTED_DIGITS: [char; 10] = ['!', '@', '#', '$', '%', '^', '&', '*', '(', ')'];

/// Map a keyboard character to a logical key.
///
/// Digits `1`..`9`,`0` are keys 1..10; their shifted symbols on a US
/// layout are keys 11..20. Escape and `q` quit.
pub fn map_char(c: char) -> Option<LogicalKey> {
    match c {
        '1'..='9' => Some(LogicalKey::Record(c as u32 - '0' as u32)),
        '0' => Some(LogicalKey::Record(10)),
        '\u{1b}' | 'q' | 'Q' => Some(LogicalKey::Quit),
        _ => SHIFTED_DIGITS
            .iter()
            .position(|&s| s == c)
            .map(|i| LogicalKey::Record(i as u32 + 11)),
    }
}

/// Parse one line-oriented command: `+N` press, `-N` release, `q` quit.
///
/// A bare mapped character (`3`, `#`) is read as a press.
pub fn parse_command(line: &str) -> Option<KeyEvent> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix('+') {
        return rest.parse().ok().map(KeyEvent::Pressed);
    }
    if let Some(rest) = line.strip_prefix('-') {
        return rest.parse().ok().map(KeyEvent::Released);
    }
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => match map_char(c)? {
            LogicalKey::Record(k) => Some(KeyEvent::Pressed(k)),
            LogicalKey::Quit => Some(KeyEvent::Quit),
        },
        _ => None,
    }
}

/// Filters auto-repeat: a press for a key already held is dropped, as is a
/// release for a key that is not held.
#[derive(Debug, Default)]
pub struct KeyTracker {
    held: HashSet<u32>,
}

impl KeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(&mut self, event: KeyEvent) -> Option<KeyEvent> {
        match event {
            KeyEvent::Pressed(k) => {
                if !self.held.insert(k) {
                    tracing::trace!("Key {} auto-repeat suppressed", k);
                    return None;
                }
            }
            KeyEvent::Released(k) => {
                if !self.held.remove(&k) {
                    tracing::trace!("Key {} released without press", k);
                    return None;
                }
            }
            KeyEvent::Quit => self.held.clear(),
        }
        Some(event)
    }

    pub fn is_held(&self, key: u32) -> bool {
        self.held.contains(&key)
    }
}

/// Receiving end of the key queue (processing thread)
pub struct KeyQueue {
    receiver: Receiver<KeyEvent>,
}

impl KeyQueue {
    /// Create a bounded queue with sender/receiver pair
    pub fn new(capacity: usize) -> (KeySender, Self) {
        let (sender, receiver) = bounded(capacity);
        (KeySender { sender }, Self { receiver })
    }

    /// Try to receive the next event without blocking
    pub fn try_recv(&self) -> Option<KeyEvent> {
        self.receiver.try_recv().ok()
    }

    /// Receive with timeout; `None` on timeout
    pub fn recv_timeout(&self, timeout: Duration) -> Option<KeyEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(KeyEvent::Quit),
        }
    }

    /// Drain everything queued so far, in order
    pub fn drain(&self) -> Vec<KeyEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Sending end of the key queue (input thread)
#[derive(Clone)]
pub struct KeySender {
    sender: Sender<KeyEvent>,
}

impl KeySender {
    /// Queue an event, waiting for room if the queue is full.
    ///
    /// Meant for the input thread, which has nothing else to do; a dropped
    /// release would leave its key recording. Returns `false` once the
    /// receiving side is gone.
    pub fn send(&self, event: KeyEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Queue an event without blocking; a full queue drops it
    pub fn try_send(&self, event: KeyEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event @ KeyEvent::Released(key))) => {
                tracing::error!(
                    "Key queue full, dropping {:?}; key {} stays recording until pressed again",
                    event,
                    key
                );
                false
            }
            Err(TrySendError::Full(event)) => {
                tracing::warn!("Key queue full, dropping {:?}", event);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Read line commands from `reader` until quit or EOF, forwarding them
pub fn forward_lines<R: BufRead>(reader: R, sender: &KeySender) {
    let mut tracker = KeyTracker::new();
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Input read failed: {}", e);
                break;
            }
        };
        let Some(event) = parse_command(&line) else {
            if !line.trim().is_empty() {
                tracing::warn!("Unrecognised input '{}'", line.trim());
            }
            continue;
        };
        if let Some(event) = tracker.filter(event) {
            if !sender.send(event) || event == KeyEvent::Quit {
                return;
            }
        }
    }
    sender.send(KeyEvent::Quit);
}

/// Spawn the stdin reader thread
pub fn spawn_stdin_reader(sender: KeySender) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("gridloop-input".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            forward_lines(stdin.lock(), &sender);
            tracing::debug!("Input thread finished");
        })
}
