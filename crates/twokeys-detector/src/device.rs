//! Input device access
//!
//! [`EventSource`] is what a keyboard session reads from: one per device file.
//! [`EvdevSource`] is the real implementation on top of `evdev`'s async event
//! stream; the device is grabbed through the stream it is read from.
//! [`RawDeviceSource`] reads `input_event` records straight from any readable
//! file descriptor and is used to probe devices that have not been
//! configured yet. It is never locked.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use evdev::Device;
use futures::future::BoxFuture;
use nix::libc;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

use crate::event::{RawEvent, INPUT_EVENT_SIZE};

/// A stream of raw input events from one device handle.
pub trait EventSource: Send + 'static {
    /// Path of the device file (used in logs and errors).
    fn path(&self) -> &Path;

    /// Wait for the next event. Events come in kernel order; an error means
    /// the handle is unusable.
    fn next_event(&mut self) -> BoxFuture<'_, io::Result<RawEvent>>;

    /// Take exclusive access to the device. Sources that cannot be locked
    /// leave this as a no-op.
    fn grab(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Release exclusive access.
    fn ungrab(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An evdev device file read through tokio.
pub struct EvdevSource {
    path: PathBuf,
    stream: evdev::EventStream,
}

impl EvdevSource {
    /// Open a device file for async reading.
    pub fn open(path: &Path) -> io::Result<Self> {
        let device = Device::open(path)?;
        tracing::debug!(
            "Opened '{}' at {}",
            device.name().unwrap_or("Unknown"),
            path.display()
        );
        let stream = device.into_event_stream()?;
        Ok(Self {
            path: path.to_path_buf(),
            stream,
        })
    }
}

impl EventSource for EvdevSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn next_event(&mut self) -> BoxFuture<'_, io::Result<RawEvent>> {
        Box::pin(async move { self.stream.next_event().await.map(RawEvent::from) })
    }

    fn grab(&mut self) -> io::Result<()> {
        self.stream.device_mut().grab()
    }

    fn ungrab(&mut self) -> io::Result<()> {
        self.stream.device_mut().ungrab()
    }
}

/// A device file read record by record without going through evdev.
pub struct RawDeviceSource {
    path: PathBuf,
    fd: AsyncFd<File>,
}

impl RawDeviceSource {
    /// Open `path` non-blocking. Fails for files that cannot be polled.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            fd: AsyncFd::with_interest(file, Interest::READABLE)?,
        })
    }

    async fn read_record(&mut self) -> io::Result<RawEvent> {
        let mut record = [0u8; INPUT_EVENT_SIZE];
        let mut filled = 0;

        while filled < INPUT_EVENT_SIZE {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.read(&mut record[filled..])
            }) {
                Ok(Ok(0)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "device closed",
                    ))
                }
                Ok(Ok(read)) => filled += read,
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => continue,
            }
        }

        RawEvent::decode(&record)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "short input event"))
    }
}

impl EventSource for RawDeviceSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn next_event(&mut self) -> BoxFuture<'_, io::Result<RawEvent>> {
        Box::pin(self.read_record())
    }
}

/// Information about an input device
#[derive(Debug)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub name: String,
    pub vendor: u16,
    pub product: u16,
}

impl DeviceInfo {
    /// Get vendor:product string (e.g., "3434:0361")
    pub fn vendor_product(&self) -> String {
        format!("{:04x}:{:04x}", self.vendor, self.product)
    }
}

/// Enumerate keyboard-capable devices under `/dev/input`.
pub fn enumerate_keyboards() -> Result<Vec<DeviceInfo>> {
    let mut devices = Vec::new();

    for entry in std::fs::read_dir("/dev/input")? {
        let entry = entry?;
        let path = entry.path();

        // Only look at event* devices
        if !path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false)
        {
            continue;
        }

        match Device::open(&path) {
            Ok(device) if is_keyboard(&device) => {
                let id = device.input_id();
                devices.push(DeviceInfo {
                    name: device.name().unwrap_or("Unknown").to_string(),
                    path,
                    vendor: id.vendor(),
                    product: id.product(),
                });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Could not open {}: {}", path.display(), e);
            }
        }
    }

    devices.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(devices)
}

/// Check if a device is a keyboard
pub fn is_keyboard(device: &Device) -> bool {
    device.supported_events().contains(evdev::EventType::KEY)
        && device
            .supported_keys()
            .map(|keys| keys.contains(evdev::Key::KEY_A))
            .unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Channel-backed event sources for session tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;

    /// Counters shared between a [`FakeSource`] and the test.
    #[derive(Debug, Default)]
    pub struct GrabCounters {
        pub grabs: AtomicUsize,
        pub ungrabs: AtomicUsize,
    }

    impl GrabCounters {
        pub fn grabs(&self) -> usize {
            self.grabs.load(Ordering::SeqCst)
        }

        pub fn ungrabs(&self) -> usize {
            self.ungrabs.load(Ordering::SeqCst)
        }
    }

    /// Replays whatever the test pushes into its channel. Dropping the sender
    /// behaves like unplugging the device.
    pub struct FakeSource {
        path: PathBuf,
        events: mpsc::UnboundedReceiver<io::Result<RawEvent>>,
        counters: Arc<GrabCounters>,
    }

    pub type FakeFeed = mpsc::UnboundedSender<io::Result<RawEvent>>;

    impl FakeSource {
        pub fn new(path: &str) -> (Self, FakeFeed, Arc<GrabCounters>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let counters = Arc::new(GrabCounters::default());
            let source = Self {
                path: PathBuf::from(path),
                events: rx,
                counters: counters.clone(),
            };
            (source, tx, counters)
        }
    }

    impl EventSource for FakeSource {
        fn path(&self) -> &Path {
            &self.path
        }

        fn next_event(&mut self) -> BoxFuture<'_, io::Result<RawEvent>> {
            Box::pin(async move {
                match self.events.recv().await {
                    Some(result) => result,
                    None => Err(io::Error::new(io::ErrorKind::NotFound, "No such device")),
                }
            })
        }

        fn grab(&mut self) -> io::Result<()> {
            self.counters.grabs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn ungrab(&mut self) -> io::Result<()> {
            self.counters.ungrabs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_product_format() {
        let info = DeviceInfo {
            path: PathBuf::from("/dev/input/event3"),
            name: "Keychron K3 Pro".to_string(),
            vendor: 0x3434,
            product: 0x361,
        };
        assert_eq!(info.vendor_product(), "3434:0361");
    }

    #[test]
    fn test_open_missing_device() {
        let result = EvdevSource::open(Path::new("/nonexistent/input/event99"));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_raw_source_rejects_regular_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(RawDeviceSource::open(file.path()).is_err());
    }

    #[tokio::test]
    async fn test_raw_source_reads_records() {
        use std::io::Write;

        use crate::event::{encode_record, KeyValue, EV_KEY, EV_SYN};

        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("event0");
        nix::unistd::mkfifo(fifo.as_path(), nix::sys::stat::Mode::S_IRWXU).unwrap();

        // Holding both ends keeps the reader from seeing end of file
        let mut writer = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&fifo)
            .unwrap();
        let mut source = RawDeviceSource::open(&fifo).unwrap();
        assert_eq!(source.path(), fifo.as_path());

        let mut bytes = encode_record(EV_KEY, 30, 1);
        bytes.extend(encode_record(EV_SYN, 0, 0));
        // Split mid-record to exercise partial reads
        writer.write_all(&bytes[..INPUT_EVENT_SIZE / 2]).unwrap();
        writer.flush().unwrap();
        let first = tokio::spawn(async move {
            let event = source.next_event().await;
            (source, event)
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        writer.write_all(&bytes[INPUT_EVENT_SIZE / 2..]).unwrap();

        let (mut source, first) = first.await.unwrap();
        assert_eq!(first.unwrap(), RawEvent::key(30, KeyValue::Down));
        assert_eq!(source.next_event().await.unwrap(), RawEvent::new(EV_SYN, 0, 0));
    }

    #[tokio::test]
    async fn test_raw_source_lock_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("event0");
        nix::unistd::mkfifo(fifo.as_path(), nix::sys::stat::Mode::S_IRWXU).unwrap();
        let _writer = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&fifo)
            .unwrap();

        // A FIFO rejects input ioctls, so these only succeed without one
        let mut source = RawDeviceSource::open(&fifo).unwrap();
        assert!(source.grab().is_ok());
        assert!(source.ungrab().is_ok());
    }
}
