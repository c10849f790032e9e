//! Connection lifecycle and the request/reply transaction engine.
//!
//! A [`Session`] owns at most one transport. Every controller operation is one
//! transaction: the gate is taken with a bounded wait, the command is written,
//! the reply is read up to the ACK byte, trimmed and checked for an
//! `error #N:` marker, and the gate is released.
pub mod axis;
pub mod controller;
pub mod download;
pub mod gate;
pub mod tasks;

pub use gate::{GateError, GatePermit, TransactionGate};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::config::{self, ConnectionConfig, SessionSettings};
use crate::models::{ConnectionInfo, ConnectionState};
use crate::protocol::{self, check_error, trim_right_crlf, Command, ProtocolError, ACK, REPLY_BUFFER_LEN};
use crate::transport::{SshTarget, Transport, TransportError, TransportFactory, MAX_FIELD_LEN};

use tasks::Smoothing;

const STARTUP_COMMAND: &str = "gpascii -2\n";
const SHORT_STARTUP_COMMAND: &str = "gpascii\n";
const ECHO_COMMAND: &str = "echo7\n";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PmacError {
    #[error("Controller reported error #{0}")]
    Controller(u32),

    #[error("Generic error")]
    Generic,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No transport set up")]
    NoTransportSet,

    #[error("Unexpected reply from controller")]
    UnexpectedReply,

    #[error("Unexpected software error")]
    Software,

    #[error("Parameters are in the wrong order")]
    OutOfOrder,

    #[error("Error opening a file")]
    FileOpen,

    #[error("Error reading a file")]
    FileRead,

    #[error("Error sending 'close' to the controller")]
    ProgramClose,

    #[error("Error while splitting a string")]
    Splitter,

    #[error("Unexpected parameter")]
    UnexpectedParam,

    #[error("Timed out waiting for exclusive access")]
    SemaphoreTimeout,

    #[error("Error waiting for exclusive access")]
    SemaphoreError,

    #[error("Error releasing exclusive access")]
    SemaphoreRelease,

    #[error("Invalid parameter")]
    InvalidParam,

    #[error("Invalid host name")]
    InvalidHostName,

    #[error("Invalid user name")]
    InvalidUserName,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Invalid port")]
    InvalidPort,
}

impl PmacError {
    /// Integer status of this error. Controller errors are `-N`, transport
    /// errors `-102..=-115`, everything else `-101` or `-230..=-246`.
    pub fn code(&self) -> i32 {
        match self {
            PmacError::Controller(n) => -(i32::try_from(*n).unwrap_or(i32::MAX)),
            PmacError::Generic => -101,
            PmacError::Transport(e) => match e {
                TransportError::Generic => -102,
                TransportError::NoBytesWritten => -103,
                TransportError::NotConnected => -104,
                TransportError::PasswordAuth => -105,
                TransportError::Pty => -106,
                TransportError::PublicKeyAuth => -107,
                TransportError::Shell => -108,
                TransportError::SocketConnect => -109,
                TransportError::SessionInit => -110,
                TransportError::SessionCreate => -111,
                TransportError::ReadTimeout => -112,
                TransportError::WriteTimeout => -113,
                TransportError::UnknownHost => -114,
                TransportError::InvalidParameter => -115,
            },
            PmacError::NoTransportSet => -230,
            PmacError::UnexpectedReply => -231,
            PmacError::Software => -232,
            PmacError::OutOfOrder => -233,
            PmacError::FileOpen => -234,
            PmacError::FileRead => -235,
            PmacError::ProgramClose => -236,
            PmacError::Splitter => -237,
            PmacError::UnexpectedParam => -238,
            PmacError::SemaphoreTimeout => -239,
            PmacError::SemaphoreError => -240,
            PmacError::SemaphoreRelease => -241,
            PmacError::InvalidParam => -242,
            PmacError::InvalidHostName => -243,
            PmacError::InvalidUserName => -244,
            PmacError::InvalidPassword => -245,
            PmacError::InvalidPort => -246,
        }
    }

    pub fn is_controller_error(&self) -> bool {
        matches!(self, PmacError::Controller(_))
    }
}

impl From<ProtocolError> for PmacError {
    fn from(error: ProtocolError) -> Self {
        log::debug!("Rejected before sending: {}", error);
        match error {
            ProtocolError::OutOfOrder { .. } => PmacError::OutOfOrder,
            ProtocolError::TooManyItems { .. } | ProtocolError::CommandTooLong { .. } => PmacError::InvalidParam,
        }
    }
}

impl From<GateError> for PmacError {
    fn from(error: GateError) -> Self {
        match error {
            GateError::TimedOut => PmacError::SemaphoreTimeout,
            GateError::Closed => PmacError::SemaphoreError,
        }
    }
}

pub type Result<T> = std::result::Result<T, PmacError>;

/// Integer status of an operation result: 0 on success, the error code otherwise.
pub fn status_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}

/// Client session with one controller.
pub struct Session {
    factory: Box<dyn TransportFactory>,
    settings: SessionSettings,
    transport: Mutex<Option<Box<dyn Transport>>>,
    lifecycle: Mutex<()>,
    gate: TransactionGate,
    connected: AtomicBool,
    common_timeout_ms: AtomicU64,
    info: RwLock<ConnectionInfo>,
    smoothing: Mutex<Smoothing>,
}

impl Session {
    pub fn new(factory: impl TransportFactory + 'static) -> Self {
        Self::build(Box::new(factory), SessionSettings::default())
    }

    pub fn with_settings(factory: impl TransportFactory + 'static, settings: SessionSettings) -> config::Result<Self> {
        settings.validate()?;
        Ok(Self::build(Box::new(factory), settings))
    }

    fn build(factory: Box<dyn TransportFactory>, settings: SessionSettings) -> Self {
        let info = ConnectionInfo::new();
        log::debug!("Session {} created with {:?}", info.id, settings);
        Self {
            factory,
            transport: Mutex::new(None),
            lifecycle: Mutex::new(()),
            gate: TransactionGate::new(settings.lock_wait()),
            connected: AtomicBool::new(false),
            common_timeout_ms: AtomicU64::new(settings.common_timeout_ms),
            info: RwLock::new(info),
            smoothing: Mutex::new(Smoothing::default()),
            settings,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Open the transport and start the gpascii shell on it.
    ///
    /// An existing connection is torn down first. On any failure the session
    /// is left disconnected.
    pub async fn connect(&self, host: &str, user: &str, password: &str, port: &str, short_startup: bool) -> Result<()> {
        if host.chars().count() > MAX_FIELD_LEN {
            return Err(PmacError::InvalidHostName);
        }
        if self.gate.is_closed() {
            log::warn!("Connect to {} refused, session was shut down", host);
            return Err(PmacError::SemaphoreError);
        }

        let _lifecycle = self.lifecycle.lock().await;
        let mut slot = self.transport.lock().await;

        if let Some(mut previous) = slot.take() {
            self.connected.store(false, Ordering::Release);
            log::info!("Dropping previous connection before reconnecting to {}", host);
            if let Err(e) = previous.disconnect().await {
                log::warn!("Previous transport did not disconnect cleanly: {}", e);
            }
        }

        self.set_state(ConnectionState::Connecting).await;
        log::info!("Connecting to {}:{} as {}", host, port, user);

        match self.open(host, user, password, port, short_startup).await {
            Ok(transport) => {
                *slot = Some(transport);
                self.connected.store(true, Ordering::Release);
                let mut info = self.info.write().await;
                info.state = ConnectionState::Connected;
                info.host = Some(host.to_string());
                info.port = Some(port.to_string());
                info.connected_at = Some(Utc::now());
                info.touch();
                log::info!("Session {} connected to {}:{}", info.id, host, port);
                Ok(())
            }
            Err(e) => {
                log::warn!("Connection to {}:{} failed: {}", host, port, e);
                let mut info = self.info.write().await;
                info.state = ConnectionState::Disconnected;
                info.host = None;
                info.port = None;
                info.connected_at = None;
                Err(e)
            }
        }
    }

    pub async fn connect_with(&self, config: &ConnectionConfig) -> Result<()> {
        self.connect(&config.host, &config.user, &config.password, &config.port, config.short_startup)
            .await
    }

    async fn open(&self, host: &str, user: &str, password: &str, port: &str, short_startup: bool) -> Result<Box<dyn Transport>> {
        let mut target = SshTarget::new(host).map_err(|_| PmacError::InvalidHostName)?;
        target.set_user(user).map_err(|_| PmacError::InvalidUserName)?;
        target.set_password(password).map_err(|_| PmacError::InvalidPassword)?;
        target.set_port(port).map_err(|_| PmacError::InvalidPort)?;

        let mut transport = self.factory.create();
        transport.connect(&target).await?;

        if let Err(e) = self.handshake(&mut *transport, short_startup).await {
            if let Err(close_err) = transport.disconnect().await {
                log::debug!("Disconnect after failed handshake: {}", close_err);
            }
            return Err(e);
        }
        Ok(transport)
    }

    async fn handshake(&self, transport: &mut dyn Transport, short_startup: bool) -> Result<()> {
        let startup = if short_startup { SHORT_STARTUP_COMMAND } else { STARTUP_COMMAND };
        let write_timeout = self.settings.handshake_write_timeout();
        let read_timeout = self.settings.handshake_read_timeout();

        for command in [startup, ECHO_COMMAND] {
            transport.write(command.as_bytes(), write_timeout).await?;
            let line = transport.read_until(REPLY_BUFFER_LEN, b'\n', read_timeout).await?;
            log::debug!(
                "Handshake {:?} answered {:?}",
                command.trim_end(),
                trim_right_crlf(&String::from_utf8_lossy(&line))
            );
        }
        Ok(())
    }

    /// Close the transport. A session without one is left as is.
    pub async fn disconnect(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let mut slot = self.transport.lock().await;

        if let Some(transport) = slot.as_mut() {
            transport.disconnect().await?;
            *slot = None;
            self.connected.store(false, Ordering::Release);
            self.set_state(ConnectionState::Disconnected).await;
            log::info!("Disconnected from controller");
        }
        Ok(())
    }

    /// Disconnect and refuse every later transaction.
    ///
    /// A transaction still in flight completes on the wire but reports
    /// [`PmacError::SemaphoreRelease`]. A shut-down session cannot reconnect.
    pub async fn shutdown(&self) -> Result<()> {
        self.gate.close();
        self.disconnect().await
    }

    /// Ask the controller for its global status.
    ///
    /// Returns `false` straight away when no connection was made.
    pub async fn is_connected(&self, timeout: Option<Duration>) -> bool {
        if !self.connected.load(Ordering::Acquire) {
            return false;
        }
        match self.write_read_with_timeout(&Command::global_status(), timeout).await {
            Ok(reply) => reply.len() == 9,
            Err(e) => {
                log::debug!("Connection check failed: {}", e);
                false
            }
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.info.read().await.state
    }

    pub async fn info(&self) -> ConnectionInfo {
        self.info.read().await.clone()
    }

    /// Common timeout in milliseconds.
    pub fn timeout(&self) -> u64 {
        self.common_timeout_ms.load(Ordering::Relaxed)
    }

    /// Change the common timeout. Values of zero or below are rejected.
    pub fn set_timeout(&self, timeout_ms: i64) -> Result<()> {
        let value = u64::try_from(timeout_ms)
            .ok()
            .filter(|&ms| ms > 0)
            .ok_or(PmacError::InvalidParam)?;
        self.common_timeout_ms.store(value, Ordering::Relaxed);
        log::debug!("Common timeout set to {} ms", value);
        Ok(())
    }

    fn effective_timeout(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or_else(|| Duration::from_millis(self.timeout()))
    }

    /// Send a raw command line and return the trimmed reply.
    pub async fn send_command(&self, command: &str) -> Result<String> {
        self.send_command_with_timeout(command, None).await
    }

    pub async fn send_command_with_timeout(&self, command: &str, timeout: Option<Duration>) -> Result<String> {
        if command.is_empty() {
            return Ok(String::new());
        }
        let command = Command::raw(command)?;
        self.write_read_with_timeout(&command, timeout).await
    }

    /// One transaction with the common timeout.
    pub async fn write_read(&self, command: &Command) -> Result<String> {
        self.write_read_with_timeout(command, None).await
    }

    pub async fn write_read_with_timeout(&self, command: &Command, timeout: Option<Duration>) -> Result<String> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(PmacError::NoTransportSet);
        }
        let permit = self.gate.acquire().await?;
        let timeout = self.effective_timeout(timeout);

        let result = {
            let mut slot = self.transport.lock().await;
            match slot.as_mut() {
                Some(transport) => Self::exchange(&mut **transport, command, timeout).await,
                None => Err(PmacError::NoTransportSet),
            }
        };

        if result.is_ok() {
            self.info.write().await.touch();
        }
        Self::release(permit, result)
    }

    /// Transaction whose reply is only checked for errors.
    pub async fn execute(&self, command: &Command) -> Result<()> {
        self.write_read(command).await.map(|_| ())
    }

    /// Write, read to the ACK, trim and check for a controller error.
    ///
    /// Callers must hold the gate.
    pub(crate) async fn exchange(transport: &mut dyn Transport, command: &Command, timeout: Duration) -> Result<String> {
        Self::exchange_bytes(transport, command.as_bytes(), timeout).await
    }

    /// Same as [`Session::exchange`] for a line that need not be UTF-8.
    pub(crate) async fn exchange_bytes(transport: &mut dyn Transport, line: &[u8], timeout: Duration) -> Result<String> {
        transport.write(line, timeout).await?;
        let raw = transport.read_until(REPLY_BUFFER_LEN, ACK, timeout).await?;
        let text = String::from_utf8_lossy(&raw);
        let reply = trim_right_crlf(&text).to_string();
        log::debug!(
            "{:?} -> {:?} ({} ms)",
            String::from_utf8_lossy(line).trim_end(),
            reply,
            timeout.as_millis()
        );

        match check_error(&reply) {
            0 => Ok(reply),
            n => Err(PmacError::Controller(n)),
        }
    }

    pub(crate) fn release<T>(permit: GatePermit, result: Result<T>) -> Result<T> {
        if let Err(e) = permit.release() {
            log::error!("Releasing the transaction gate failed: {}", e);
            return Err(PmacError::SemaphoreRelease);
        }
        result
    }

    pub(crate) async fn query_number<T: protocol::reply::ReplyNumber>(&self, command: &Command) -> Result<T> {
        let reply = self.write_read(command).await?;
        protocol::reply::parse_number(&reply).ok_or(PmacError::UnexpectedReply)
    }

    async fn set_state(&self, state: ConnectionState) {
        let mut info = self.info.write().await;
        info.state = state;
        if state == ConnectionState::Disconnected {
            info.connected_at = None;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.gate.close();
        if let Some(transport) = self.transport.get_mut().take() {
            log::debug!("Session dropped while connected; closing transport");
            drop(transport);
        }
    }
}
