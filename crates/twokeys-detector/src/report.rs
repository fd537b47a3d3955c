//! Hotkey reporting
//!
//! Fired hotkeys are handed to a [`Reporter`]. The detector never waits for
//! delivery: [`HttpReporter`] posts each report from its own task, and any
//! failure is logged there and dropped.

use std::time::Duration;

use serde::Serialize;
use twokeys_config::ServerConfig;

/// Server route that runs a hotkey.
pub const TRIGGER_PATH: &str = "/api/post/trigger";

/// Upper bound for a single report request.
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(2);

/// Payload sent to the server for every fired hotkey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HotkeyReport {
    /// Name of the keyboard in the config
    pub keyboard: String,
    /// The hotkey's combination string as written in the config
    pub hotkey: String,
    /// Raw value of the triggering event (1 = press, 0 = release)
    pub value: i32,
}

/// Receiver of fired hotkeys.
///
/// Implementations must return promptly; anything slow belongs in a spawned
/// task.
pub trait Reporter: Send + Sync + 'static {
    fn report(&self, report: HotkeyReport);
}

/// Posts reports to the twokeys server as JSON.
#[derive(Clone)]
pub struct HttpReporter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpReporter {
    pub fn new(server: &ServerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REPORT_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: trigger_url(server),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Full URL of the trigger route on `server`.
pub fn trigger_url(server: &ServerConfig) -> String {
    format!("http://{}:{}{}", server.host, server.port, TRIGGER_PATH)
}

impl Reporter for HttpReporter {
    /// Must be called from within a tokio runtime.
    fn report(&self, report: HotkeyReport) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        tokio::spawn(async move {
            tracing::info!("Sending hotkey {} to server...", report.hotkey);

            match client.post(&endpoint).json(&report).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!("Server accepted hotkey {}", report.hotkey);
                }
                Ok(response) => {
                    tracing::warn!(
                        "Server rejected hotkey {}: HTTP {}",
                        report.hotkey,
                        response.status().as_u16()
                    );
                }
                Err(e) if e.is_timeout() => {
                    tracing::warn!(
                        "Request for hotkey {} timed out; the server may be down or busy running another hotkey",
                        report.hotkey
                    );
                }
                Err(e) if e.is_connect() => {
                    tracing::error!("Couldn't connect to the server at {}: {}", endpoint, e);
                }
                Err(e) => {
                    tracing::error!("Failed to send hotkey {}: {}", report.hotkey, e);
                }
            }
        });
    }
}
