//! Keyboard detection
//!
//! Watches every device under an inputs directory and reports the first one
//! on which a key goes down. Used to find the device path of a keyboard that
//! is not configured yet.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::task::JoinSet;

use crate::device::{EventSource, RawDeviceSource};
use crate::event::KeyValue;

/// Where persistent keyboard symlinks live.
pub const DEFAULT_INPUTS_DIR: &str = "/dev/input/by-id";

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Cannot read inputs directory {path}: {source}")]
    InputsDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No readable input device in {0}")]
    NoDevices(PathBuf),

    #[error("Every input device in {0} stopped before a key was pressed")]
    NoKeyPress(PathBuf),
}

/// Wait for a key press on any device in `inputs_dir` and return its path.
///
/// All other readers are stopped before this returns.
pub async fn detect_keyboard(inputs_dir: &Path) -> Result<PathBuf, DetectError> {
    let entries = std::fs::read_dir(inputs_dir).map_err(|source| DetectError::InputsDir {
        path: inputs_dir.to_path_buf(),
        source,
    })?;

    let mut sources = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        match RawDeviceSource::open(&path) {
            Ok(source) => sources.push(source),
            Err(e) => tracing::debug!("Skipping {}: {}", path.display(), e),
        }
    }

    if sources.is_empty() {
        return Err(DetectError::NoDevices(inputs_dir.to_path_buf()));
    }

    tracing::info!("Press any key on the keyboard to detect...");
    first_key_press(sources)
        .await
        .ok_or_else(|| DetectError::NoKeyPress(inputs_dir.to_path_buf()))
}

/// Race `sources` until one of them reports a key press.
///
/// Returns `None` if every source fails first.
pub async fn first_key_press<S: EventSource>(sources: Vec<S>) -> Option<PathBuf> {
    let mut readers = JoinSet::new();
    for source in sources {
        readers.spawn(wait_for_key_press(source));
    }

    let mut detected = None;
    while let Some(result) = readers.join_next().await {
        match result {
            Ok(Ok(path)) => {
                detected = Some(path);
                break;
            }
            Ok(Err(e)) => tracing::debug!("Reader stopped: {}", e),
            Err(e) => tracing::warn!("Reader task failed: {}", e),
        }
    }

    readers.abort_all();
    while readers.join_next().await.is_some() {}

    if let Some(path) = &detected {
        tracing::info!("Detected keyboard at {}", path.display());
    }
    detected
}

async fn wait_for_key_press<S: EventSource>(mut source: S) -> io::Result<PathBuf> {
    loop {
        let event = source.next_event().await?;
        if event.is_key() && KeyValue::from_raw(event.value) == Some(KeyValue::Down) {
            return Ok(source.path().to_path_buf());
        }
    }
}
