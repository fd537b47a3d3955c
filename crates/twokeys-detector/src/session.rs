//! Keyboard sessions
//!
//! A session watches every device file of one logical keyboard. Each device
//! gets a reader task that forwards key events over a channel; the session
//! loop is the only place the detector state is touched, so events from all
//! devices are applied one at a time in arrival order.
//!
//! Lifecycle: `Idle -> Watching -> ShuttingDown -> Stopped`. Shutdown is
//! entered on request or on the first device error. Readers hand their
//! sources back when they stop, so every grabbed device is released exactly
//! once.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use twokeys_config::KeyboardConfig;

use crate::detector::HotkeyDetector;
use crate::device::{EvdevSource, EventSource};
use crate::event::RawEvent;
use crate::keymap::KeymapError;
use crate::report::Reporter;
use crate::shutdown::Shutdown;

/// Events buffered between the readers and the session loop.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error reading {path}: {source}")]
    Device {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Keymap(#[from] KeymapError),

    #[error("Session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Watching,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Watching => "watching",
            SessionState::ShuttingDown => "shutting down",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

enum ReaderMessage {
    Event(RawEvent),
    Failed { path: PathBuf, source: io::Error },
}

pub struct KeyboardSession<S: EventSource> {
    sources: Vec<S>,
    detector: HotkeyDetector,
    reporter: Arc<dyn Reporter>,
    lock: bool,
    state: watch::Sender<SessionState>,
}

impl KeyboardSession<EvdevSource> {
    /// Open every device file of `keyboard`.
    pub fn open(
        keyboard: &KeyboardConfig,
        lock: bool,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self, SessionError> {
        let detector = HotkeyDetector::from_config(keyboard)?;

        let sources = keyboard
            .paths
            .iter()
            .map(|path| {
                EvdevSource::open(path).map_err(|source| SessionError::Open {
                    path: path.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(sources, detector, reporter, lock))
    }
}

impl<S: EventSource> KeyboardSession<S> {
    pub fn new(
        sources: Vec<S>,
        detector: HotkeyDetector,
        reporter: Arc<dyn Reporter>,
        lock: bool,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            sources,
            detector,
            reporter,
            lock,
            state,
        }
    }

    pub fn keyboard(&self) -> &str {
        self.detector.keyboard()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Run the session on its own task.
    pub fn spawn(self, shutdown: Shutdown) -> SessionHandle {
        let keyboard = self.keyboard().to_string();
        let state = self.state.subscribe();
        let task = tokio::spawn(self.run(shutdown.clone()));
        SessionHandle {
            keyboard,
            shutdown,
            state,
            task,
        }
    }

    /// Watch the devices until `shutdown` fires or a device fails.
    ///
    /// Returns `Ok` for a requested shutdown and the device error otherwise.
    /// Devices are released before this returns in both cases.
    pub async fn run(mut self, shutdown: Shutdown) -> Result<(), SessionError> {
        let mut sources = std::mem::take(&mut self.sources);

        if self.lock {
            if let Err(e) = lock_all(&mut sources) {
                self.set_state(SessionState::Stopped);
                return Err(e);
            }
            tracing::info!(
                "Locked {} device(s) for keyboard {}",
                sources.len(),
                self.keyboard()
            );
        } else {
            tracing::info!("Watching keyboard {} without locking", self.keyboard());
        }

        let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let readers: Vec<JoinHandle<S>> = sources
            .into_iter()
            .map(|source| tokio::spawn(read_events(source, tx.clone(), shutdown.clone())))
            .collect();
        drop(tx);

        self.set_state(SessionState::Watching);

        let outcome = loop {
            tokio::select! {
                biased;

                _ = shutdown.wait() => break Ok(()),

                message = rx.recv() => match message {
                    Some(ReaderMessage::Event(event)) => {
                        if let Some(report) = self.detector.process(event) {
                            self.reporter.report(report);
                        }
                    }
                    Some(ReaderMessage::Failed { path, source }) => {
                        tracing::error!("Device {} failed: {}", path.display(), source);
                        break Err(SessionError::Device { path, source });
                    }
                    None => break Ok(()),
                },
            }
        };

        self.set_state(SessionState::ShuttingDown);
        shutdown.trigger();
        // Unblocks any reader waiting on a full channel
        drop(rx);

        let mut sources = Vec::with_capacity(readers.len());
        for reader in readers {
            match reader.await {
                Ok(source) => sources.push(source),
                Err(e) => tracing::warn!("Reader task for {} failed: {}", self.keyboard(), e),
            }
        }

        if self.lock {
            release_all(&mut sources);
        }

        self.set_state(SessionState::Stopped);
        outcome
    }

    fn set_state(&self, state: SessionState) {
        tracing::debug!("Keyboard {} is {}", self.keyboard(), state);
        self.state.send_replace(state);
    }
}

/// Grab every source, releasing the ones already grabbed if one fails.
fn lock_all<S: EventSource>(sources: &mut [S]) -> Result<(), SessionError> {
    for index in 0..sources.len() {
        if let Err(source) = sources[index].grab() {
            let path = sources[index].path().to_path_buf();
            release_all(&mut sources[..index]);
            return Err(SessionError::Lock { path, source });
        }
        tracing::debug!("Grabbed {}", sources[index].path().display());
    }
    Ok(())
}

fn release_all<S: EventSource>(sources: &mut [S]) {
    for source in sources {
        match source.ungrab() {
            Ok(()) => tracing::debug!("Released {}", source.path().display()),
            Err(e) => tracing::warn!("Failed to release {}: {}", source.path().display(), e),
        }
    }
}

/// Forward key events from one device until shutdown or a read error.
/// Gives the source back so the session can release it.
async fn read_events<S: EventSource>(
    mut source: S,
    tx: mpsc::Sender<ReaderMessage>,
    shutdown: Shutdown,
) -> S {
    loop {
        let result = tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            result = source.next_event() => result,
        };

        match result {
            Ok(event) if event.is_key() => {
                if tx.send(ReaderMessage::Event(event)).await.is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(source_error) => {
                let path = source.path().to_path_buf();
                let _ = tx
                    .send(ReaderMessage::Failed {
                        path,
                        source: source_error,
                    })
                    .await;
                break;
            }
        }
    }
    source
}

/// Handle to a spawned [`KeyboardSession`].
pub struct SessionHandle {
    keyboard: String,
    shutdown: Shutdown,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<Result<(), SessionError>>,
}

impl SessionHandle {
    pub fn keyboard(&self) -> &str {
        &self.keyboard
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Request shutdown and wait until every device is released.
    pub async fn stop(self) -> Result<(), SessionError> {
        self.shutdown.trigger();
        self.join().await
    }

    /// Wait for the session to end on its own.
    pub async fn join(self) -> Result<(), SessionError> {
        self.task.await?
    }
}
