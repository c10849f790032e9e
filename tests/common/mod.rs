//! Scripted stand-in for a controller reached over SSH.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ppmac_control::transport::{SshTarget, Transport, TransportError, TransportFactory};
use ppmac_control::{Session, SessionSettings};

pub const STARTUP_BANNER: &str = "STDIN Open for ASCII Input";

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connect { host: String, user: String, port: String },
    Disconnect,
    Write { data: String, timeout: Duration },
    Read { terminator: u8, timeout: Duration },
}

type Handler = dyn Fn(&str) -> Result<String, TransportError> + Send + Sync;

pub struct MockController {
    handler: Box<Handler>,
    delay: Duration,
    events: Mutex<Vec<Event>>,
    connect_error: Mutex<Option<TransportError>>,
    handshake_error: Mutex<Option<TransportError>>,
    created: AtomicUsize,
    in_flight: AtomicBool,
    overlaps: AtomicUsize,
}

impl MockController {
    /// `handler` gets each command without its newline and returns the reply
    /// text that precedes the ACK byte.
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&str) -> Result<String, TransportError> + Send + Sync + 'static,
    {
        Self::with_delay(handler, Duration::ZERO)
    }

    /// Like `new`, but every write and every read takes `delay`.
    pub fn with_delay<F>(handler: F, delay: Duration) -> Arc<Self>
    where
        F: Fn(&str) -> Result<String, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            delay,
            events: Mutex::new(Vec::new()),
            connect_error: Mutex::new(None),
            handshake_error: Mutex::new(None),
            created: AtomicUsize::new(0),
            in_flight: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
        })
    }

    /// Controller answering every command with a fixed reply.
    pub fn replying(reply: &str) -> Arc<Self> {
        let reply = reply.to_string();
        Self::new(move |_| Ok(reply.clone()))
    }

    pub fn factory(self: &Arc<Self>) -> impl TransportFactory + 'static {
        let controller = Arc::clone(self);
        move || -> Box<dyn Transport> {
            controller.created.fetch_add(1, Ordering::SeqCst);
            Box::new(MockTransport {
                controller: Arc::clone(&controller),
                last_write: None,
                connected: false,
            })
        }
    }

    pub fn fail_connect(&self, error: TransportError) {
        *self.connect_error.lock().unwrap() = Some(error);
    }

    pub fn fail_handshake(&self, error: TransportError) {
        *self.handshake_error.lock().unwrap() = Some(error);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Commands written so far, newlines included.
    pub fn writes(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Write { data, .. } => Some(data),
                _ => None,
            })
            .collect()
    }

    pub fn write_timeouts(&self) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Write { timeout, .. } => Some(timeout),
                _ => None,
            })
            .collect()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Writes that started while another write/read pair was unfinished.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

struct MockTransport {
    controller: Arc<MockController>,
    last_write: Option<String>,
    connected: bool,
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, target: &SshTarget) -> Result<(), TransportError> {
        self.controller.record(Event::Connect {
            host: target.host().to_string(),
            user: target.user().to_string(),
            port: target.port().to_string(),
        });
        if let Some(error) = *self.controller.connect_error.lock().unwrap() {
            return Err(error);
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.controller.record(Event::Disconnect);
        self.connected = false;
        Ok(())
    }

    async fn write(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        let text = String::from_utf8_lossy(data).into_owned();
        if self.controller.in_flight.swap(true, Ordering::SeqCst) {
            self.controller.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.controller.record(Event::Write {
            data: text.clone(),
            timeout,
        });
        if !self.controller.delay.is_zero() {
            tokio::time::sleep(self.controller.delay).await;
        }
        self.last_write = Some(text);
        Ok(data.len())
    }

    async fn read_until(&mut self, max_len: usize, terminator: u8, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.controller.record(Event::Read { terminator, timeout });
        if !self.controller.delay.is_zero() {
            tokio::time::sleep(self.controller.delay).await;
        }
        let command = self.last_write.take().unwrap_or_default();
        self.controller.in_flight.store(false, Ordering::SeqCst);

        if terminator == b'\n' {
            if let Some(error) = *self.controller.handshake_error.lock().unwrap() {
                return Err(error);
            }
            let banner = if command.starts_with("gpascii") { STARTUP_BANNER } else { "" };
            return Ok(banner.as_bytes().to_vec());
        }

        let mut reply = (self.controller.handler)(command.trim_end_matches('\n'))?.into_bytes();
        reply.truncate(max_len);
        Ok(reply)
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Session connected to `controller`, with the handshake already cleared
/// from the event log.
pub async fn connected_session(controller: &Arc<MockController>) -> Session {
    connected_session_with(controller, SessionSettings::default()).await
}

pub async fn connected_session_with(controller: &Arc<MockController>, settings: SessionSettings) -> Session {
    init_logging();
    let session = Session::with_settings(controller.factory(), settings).unwrap();
    session
        .connect("ppmac", "root", "deltatau", "22", false)
        .await
        .unwrap();
    controller.clear();
    session
}
