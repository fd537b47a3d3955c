//! Raw input events
//!
//! The detector only cares about the `(type, code, value)` triple of a kernel
//! input event. Events come either from `evdev` streams or, for keyboard
//! detection, straight from the device file as `struct input_event` records.

use std::mem::size_of;

use nix::libc;

/// `EV_SYN`: separator between event batches
pub const EV_SYN: u16 = 0x00;
/// `EV_KEY`: key or button state change
pub const EV_KEY: u16 = 0x01;

/// Size of one `struct input_event` record on this platform.
///
/// Two `timeval` fields (seconds, microseconds), then `u16` type, `u16` code
/// and `i32` value; the timeval width depends on the pointer size.
pub const INPUT_EVENT_SIZE: usize = size_of::<libc::input_event>();

const TIMEVAL_SIZE: usize = size_of::<libc::timeval>();

/// Meaning of the `value` field of an `EV_KEY` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Up,
    Down,
    Hold,
}

impl KeyValue {
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyValue::Up),
            1 => Some(KeyValue::Down),
            2 => Some(KeyValue::Hold),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            KeyValue::Up => 0,
            KeyValue::Down => 1,
            KeyValue::Hold => 2,
        }
    }
}

/// A normalized kernel input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub fn new(kind: u16, code: u16, value: i32) -> Self {
        Self { kind, code, value }
    }

    /// Shorthand for an `EV_KEY` event.
    pub fn key(code: u16, value: KeyValue) -> Self {
        Self::new(EV_KEY, code, value.as_raw())
    }

    pub fn is_key(&self) -> bool {
        self.kind == EV_KEY
    }

    /// Decode one `struct input_event` record (native endianness).
    ///
    /// Returns `None` if `buf` is shorter than [`INPUT_EVENT_SIZE`].
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < INPUT_EVENT_SIZE {
            return None;
        }
        let body = &buf[TIMEVAL_SIZE..];
        let kind = u16::from_ne_bytes([body[0], body[1]]);
        let code = u16::from_ne_bytes([body[2], body[3]]);
        let value = i32::from_ne_bytes([body[4], body[5], body[6], body[7]]);
        Some(Self { kind, code, value })
    }
}

impl From<evdev::InputEvent> for RawEvent {
    fn from(event: evdev::InputEvent) -> Self {
        Self::new(event.event_type().0, event.code(), event.value())
    }
}

/// Build an `input_event` record the way the kernel lays it out.
#[cfg(test)]
pub(crate) fn encode_record(kind: u16, code: u16, value: i32) -> Vec<u8> {
    let mut record = vec![0u8; INPUT_EVENT_SIZE];
    record[..8].copy_from_slice(&1_700_000_000i64.to_ne_bytes()[..8]);
    record[TIMEVAL_SIZE..TIMEVAL_SIZE + 2].copy_from_slice(&kind.to_ne_bytes());
    record[TIMEVAL_SIZE + 2..TIMEVAL_SIZE + 4].copy_from_slice(&code.to_ne_bytes());
    record[TIMEVAL_SIZE + 4..TIMEVAL_SIZE + 8].copy_from_slice(&value.to_ne_bytes());
    record
}
