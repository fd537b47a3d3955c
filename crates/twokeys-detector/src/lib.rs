//! twokeys keyboard hotkey detector
//!
//! Reads key events from Linux input devices, tracks which keys are held,
//! and reports configured hotkey combinations to the twokeys server.
//!
//! The pipeline for one keyboard is:
//! [`device`] sources feed [`event::RawEvent`]s into a [`session`], whose
//! [`detector::HotkeyDetector`] runs them through the [`tracker`] and the
//! [`matcher`]; fired hotkeys go to a [`report::Reporter`].

pub mod detect;
pub mod detector;
pub mod device;
pub mod event;
pub mod keymap;
pub mod matcher;
pub mod report;
pub mod session;
pub mod shutdown;
pub mod tracker;

pub use detector::HotkeyDetector;
pub use report::{HotkeyReport, HttpReporter, Reporter};
pub use session::{KeyboardSession, SessionError, SessionHandle, SessionState};
pub use shutdown::Shutdown;
