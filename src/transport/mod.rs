#[cfg(feature = "ssh")]
pub mod ssh;

#[cfg(feature = "ssh")]
pub use ssh::SshTransport;

use std::time::Duration;

use async_trait::async_trait;

/// Longest host, user, password or port string a transport accepts
pub const MAX_FIELD_LEN: usize = 255;

pub const DEFAULT_SSH_PORT: &str = "22";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("SSH generic error")]
    Generic,

    #[error("Zero bytes written")]
    NoBytesWritten,

    #[error("Not connected")]
    NotConnected,

    #[error("Authentication by password failed")]
    PasswordAuth,

    #[error("Failed requesting dumb pty")]
    Pty,

    #[error("Authentication by public key failed")]
    PublicKeyAuth,

    #[error("Unable to request shell on allocated pty")]
    Shell,

    #[error("Socket failed to connect")]
    SocketConnect,

    #[error("SSH initialization failed")]
    SessionInit,

    #[error("Failed to create an SSH session")]
    SessionCreate,

    #[error("Read timed out")]
    ReadTimeout,

    #[error("Write timed out")]
    WriteTimeout,

    #[error("Host unknown")]
    UnknownHost,

    #[error("Invalid parameter")]
    InvalidParameter,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Where to open the remote shell and with which credentials.
///
/// Every field is bounded to [`MAX_FIELD_LEN`] characters; the setters
/// reject longer values with [`TransportError::InvalidParameter`].
#[derive(Clone)]
pub struct SshTarget {
    host: String,
    user: String,
    password: String,
    port: String,
}

impl SshTarget {
    pub fn new(host: &str) -> Result<Self> {
        Ok(Self {
            host: bounded(host)?,
            user: String::new(),
            password: String::new(),
            port: DEFAULT_SSH_PORT.to_string(),
        })
    }

    pub fn set_user(&mut self, user: &str) -> Result<()> {
        self.user = bounded(user)?;
        Ok(())
    }

    /// An empty password selects public key authentication.
    pub fn set_password(&mut self, password: &str) -> Result<()> {
        self.password = bounded(password)?;
        Ok(())
    }

    pub fn set_port(&mut self, port: &str) -> Result<()> {
        self.port = bounded(port)?;
        Ok(())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn port(&self) -> &str {
        &self.port
    }
}

// Hand-written so the password never reaches a log line.
impl std::fmt::Debug for SshTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTarget")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

fn bounded(value: &str) -> Result<String> {
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(TransportError::InvalidParameter);
    }
    Ok(value.to_string())
}

/// Split the bytes before the first `terminator` off the front of `pending`.
///
/// Only `pending[scanned..]` is searched; earlier bytes were checked on a
/// previous call. `Ok(None)` means more input is needed. Once `max_len` bytes
/// are buffered without a terminator the reply can never complete, which is
/// a [`TransportError::Generic`].
#[cfg_attr(not(feature = "ssh"), allow(dead_code))]
pub(crate) fn take_reply(
    pending: &mut Vec<u8>,
    scanned: usize,
    max_len: usize,
    terminator: u8,
) -> Result<Option<Vec<u8>>> {
    if let Some(pos) = pending[scanned..].iter().position(|&b| b == terminator) {
        let end = scanned + pos;
        let reply: Vec<u8> = pending.drain(..=end).take(end).collect();
        return Ok(Some(reply));
    }
    if pending.len() >= max_len {
        log::error!("{} bytes buffered without a terminator", pending.len());
        return Err(TransportError::Generic);
    }
    Ok(None)
}

/// Byte channel to the controller's remote shell.
///
/// Implementations own one remote session. `read_until` returns the bytes
/// received before `terminator` (the terminator itself is dropped) and fails
/// with [`TransportError::ReadTimeout`] when it is not seen in time.
#[async_trait]
pub trait Transport: Send {
    async fn connect(&mut self, target: &SshTarget) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    async fn write(&mut self, data: &[u8], timeout: Duration) -> Result<usize>;

    async fn read_until(&mut self, max_len: usize, terminator: u8, timeout: Duration) -> Result<Vec<u8>>;
}

/// Builds a fresh, unconnected transport for each connect attempt.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Box<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn() -> Box<dyn Transport> + Send + Sync,
{
    fn create(&self) -> Box<dyn Transport> {
        self()
    }
}
