//! Port session: the owner of the single active serial connection.
//!
//! The session enforces the Closed/Open state machine, serializes every
//! public operation behind one internal lock, and runs the reception
//! dispatcher on a dedicated background thread while the port is open.
//!
//! One session instance owns at most one hardware handle; the intended
//! usage is exactly one session per process. Construct it explicitly and
//! pass it to whatever needs it, together with the event bus it reports
//! on.

use crate::encoder::encode_payload;
use crate::params::ConnectionParameters;
use crate::serial::{LinkOpener, SerialLink, SystemLinkOpener};
use parking_lot::Mutex;
use portkit_core::{EventBus, PortEvent, SessionError};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long the dispatcher sleeps when no bytes are available.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Back-off after a failed read, so a dead device does not flood the
/// error channel.
const FAILURE_BACKOFF: Duration = Duration::from_millis(100);

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortState {
    /// No hardware handle held.
    #[default]
    Closed,
    /// Handle held, dispatcher running.
    Open,
}

type SharedLink = Arc<Mutex<Box<dyn SerialLink>>>;

/// State guarded by the session lock.
///
/// State and counters are only ever mutated while holding this lock.
struct SessionInner {
    state: PortState,
    params: ConnectionParameters,
    link: Option<SharedLink>,
    bytes_received: u64,
    bytes_sent: u64,
}

struct ReaderHandle {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// The single live serial connection
///
/// All mutating operations return success/failure and additionally report
/// failures exactly once on the event bus; nothing here panics across the
/// component boundary. The hardware handle is released on every exit
/// path, including drop.
pub struct PortSession {
    inner: Arc<Mutex<SessionInner>>,
    events: Arc<EventBus>,
    opener: Box<dyn LinkOpener>,
    reader: Mutex<Option<ReaderHandle>>,
}

impl PortSession {
    /// Create a session reporting on the given bus, backed by the system
    /// serial subsystem
    pub fn new(events: Arc<EventBus>) -> Self {
        Self::with_opener(events, Box::new(SystemLinkOpener))
    }

    /// Create a session with a custom link opener
    pub fn with_opener(events: Arc<EventBus>, opener: Box<dyn LinkOpener>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                state: PortState::Closed,
                params: ConnectionParameters::default(),
                link: None,
                bytes_received: 0,
                bytes_sent: 0,
            })),
            events,
            opener,
            reader: Mutex::new(None),
        }
    }

    /// Update the connection parameters
    ///
    /// Allowed in either state. An open session is closed first, the new
    /// parameters applied, then reopened, so configuration changes are
    /// never silently dropped while connected. Invalid parameters leave
    /// the active set unchanged and report a `ConfigurationError`.
    pub fn configure(&self, params: ConnectionParameters) -> bool {
        if let Err(e) = params.validate() {
            self.report(e);
            return false;
        }

        let was_open = self.is_open();
        if was_open {
            self.close();
        }

        {
            let mut inner = self.inner.lock();
            inner.params = params;
        }
        self.events
            .publish(PortEvent::status("Serial port configuration updated"));

        if was_open {
            self.open()
        } else {
            true
        }
    }

    /// Open the port with the active parameters
    ///
    /// Valid only from Closed with a non-empty target port name; resets
    /// both counters and starts the reception dispatcher. Opening while
    /// already Open is a no-op returning `false`. An open failure is
    /// reported on the error channel and leaves the state at Closed.
    pub fn open(&self) -> bool {
        let port_name = {
            let mut inner = self.inner.lock();
            if inner.state == PortState::Open {
                return false;
            }
            if inner.params.port_name.is_empty() {
                return false;
            }

            let link: SharedLink = match self.opener.open(&inner.params) {
                Ok(link) => Arc::new(Mutex::new(link)),
                Err(e) => {
                    drop(inner);
                    self.report(e);
                    return false;
                }
            };
            inner.link = Some(link.clone());
            inner.state = PortState::Open;
            inner.bytes_received = 0;
            inner.bytes_sent = 0;

            // The dispatcher handle is installed before the session lock
            // is released, so a racing close() always finds it. Lock
            // order: session lock, then reader slot.
            let stop = Arc::new(AtomicBool::new(false));
            let handle = {
                let inner_for_reader = self.inner.clone();
                let events = self.events.clone();
                let stop = stop.clone();
                thread::spawn(move || reader_loop(inner_for_reader, link, events, stop))
            };
            *self.reader.lock() = Some(ReaderHandle { stop, handle });

            inner.params.port_name.clone()
        };

        tracing::info!("Serial port {} opened", port_name);
        self.events
            .publish(PortEvent::status(format!("Serial port {} opened", port_name)));
        true
    }

    /// Close the port
    ///
    /// No-op when already Closed. Stops the dispatcher, releases the
    /// hardware handle, and forces the state to Closed even if the
    /// release itself fails (which is reported as a `CloseFailure`).
    pub fn close(&self) {
        // The reader slot is emptied under the session lock so an open()
        // racing this close() cannot install a dispatcher that nobody
        // stops. Joining happens after both locks are released: the
        // dispatcher may need the session lock to finish its iteration.
        let (was_open, link, port_name, reader) = {
            let mut inner = self.inner.lock();
            let was_open = inner.state == PortState::Open;
            inner.state = PortState::Closed;
            let reader = self.reader.lock().take();
            (
                was_open,
                inner.link.take(),
                inner.params.port_name.clone(),
                reader,
            )
        };

        if let Some(reader) = reader {
            reader.stop.store(true, Ordering::SeqCst);
            if reader.handle.join().is_err() {
                tracing::warn!("Reception dispatcher panicked during shutdown");
            }
        }

        let mut release_failed = false;
        if let Some(link) = link {
            if let Err(e) = link.lock().flush() {
                release_failed = true;
                self.report(SessionError::CloseFailure {
                    port: port_name.clone(),
                    reason: e.to_string(),
                });
            }
            // Dropping the last handle releases the hardware.
        }

        if was_open && !release_failed {
            tracing::info!("Serial port {} closed", port_name);
            self.events
                .publish(PortEvent::status(format!("Serial port {} closed", port_name)));
        }
    }

    /// Encode and transmit a payload
    ///
    /// `hex_mode` interprets `text` as hex digit pairs (separators
    /// allowed); otherwise the text is sent as UTF-8. The whole byte
    /// sequence is written in a single call; `bytes_sent` grows by the
    /// exact byte count on success and is untouched on any failure.
    pub fn send(&self, text: &str, hex_mode: bool) -> bool {
        let bytes = match encode_payload(text, hex_mode) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.report(e);
                return false;
            }
        };

        let mut inner = self.inner.lock();
        let Some(link) = inner.link.clone() else {
            drop(inner);
            self.report(SessionError::TransmitFailure {
                reason: "port is not open".to_string(),
            });
            return false;
        };

        // Lock order: session lock, then link lock. The dispatcher never
        // holds both at once, so this cannot deadlock.
        let write_result = {
            let mut guard = link.lock();
            guard.write_all(&bytes).and_then(|_| guard.flush())
        };

        match write_result {
            Ok(()) => {
                inner.bytes_sent += bytes.len() as u64;
                drop(inner);
                self.events
                    .publish(PortEvent::status(format!("Sent {} bytes", bytes.len())));
                true
            }
            Err(e) => {
                drop(inner);
                self.report(SessionError::TransmitFailure {
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    /// Zero both counters
    pub fn reset_counters(&self) {
        {
            let mut inner = self.inner.lock();
            inner.bytes_received = 0;
            inner.bytes_sent = 0;
        }
        self.events.publish(PortEvent::status("Counters reset"));
    }

    /// Current session state
    pub fn state(&self) -> PortState {
        self.inner.lock().state
    }

    /// Whether the port is currently open
    pub fn is_open(&self) -> bool {
        self.state() == PortState::Open
    }

    /// Total bytes received since open or the last counter reset
    pub fn bytes_received(&self) -> u64 {
        self.inner.lock().bytes_received
    }

    /// Total bytes sent since open or the last counter reset
    pub fn bytes_sent(&self) -> u64 {
        self.inner.lock().bytes_sent
    }

    /// The configured target port name (empty before first configure)
    pub fn current_port_name(&self) -> String {
        self.inner.lock().params.port_name.clone()
    }

    /// Copy of the active connection parameters
    pub fn active_parameters(&self) -> ConnectionParameters {
        self.inner.lock().params.clone()
    }

    fn report(&self, err: SessionError) {
        tracing::warn!("{}", err);
        self.events
            .publish(PortEvent::error(err.code(), err.to_string()));
    }
}

impl Drop for PortSession {
    fn drop(&mut self) {
        self.close();
    }
}

enum ReadOutcome {
    Idle,
    Data(Vec<u8>),
    Failed(io::Error),
}

/// Reception dispatcher loop.
///
/// Drains exactly the currently-available byte count in one pass and
/// republishes it as a data event. Runs until the stop flag is raised by
/// `close()`. Read failures are reported and the loop keeps going.
fn reader_loop(
    inner: Arc<Mutex<SessionInner>>,
    link: SharedLink,
    events: Arc<EventBus>,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::SeqCst) {
        // The link lock is released before the session lock is taken.
        let outcome = {
            let mut guard = link.lock();
            match guard.available() {
                Ok(0) => ReadOutcome::Idle,
                Ok(n) => {
                    let mut buf = vec![0u8; n];
                    match guard.read(&mut buf) {
                        Ok(0) => ReadOutcome::Idle,
                        Ok(read) => {
                            buf.truncate(read);
                            ReadOutcome::Data(buf)
                        }
                        Err(e)
                            if e.kind() == io::ErrorKind::TimedOut
                                || e.kind() == io::ErrorKind::Interrupted =>
                        {
                            // The availability signal was stale; wait for
                            // the next one.
                            ReadOutcome::Idle
                        }
                        Err(e) => ReadOutcome::Failed(e),
                    }
                }
                Err(e) => ReadOutcome::Failed(e),
            }
        };

        match outcome {
            ReadOutcome::Idle => thread::sleep(POLL_INTERVAL),
            ReadOutcome::Data(bytes) => {
                {
                    let mut session = inner.lock();
                    if session.state != PortState::Open {
                        break;
                    }
                    session.bytes_received += bytes.len() as u64;
                }
                events.publish(PortEvent::data(bytes));
            }
            ReadOutcome::Failed(e) => {
                tracing::warn!("Serial read failed: {}", e);
                let err = SessionError::ReceiveFailure {
                    reason: e.to_string(),
                };
                events.publish(PortEvent::error(err.code(), err.to_string()));
                thread::sleep(FAILURE_BACKOFF);
            }
        }
    }
}
