//! SSH transport built on libssh2 bindings.
//!
//! The channel runs in non-blocking mode once the shell is up; reads and
//! writes poll it with a short sleep in between until their deadline.
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use ssh2::{Channel, Session};
use tokio::time::{sleep, Instant};

use super::{take_reply, Result, SshTarget, Transport, TransportError};

const POLL_INTERVAL: Duration = Duration::from_millis(2);
const BANNER_TIMEOUT: Duration = Duration::from_millis(1000);
const MAX_WRITE_LEN: usize = 5119;

pub struct SshTransport {
    session: Option<Session>,
    channel: Option<Channel>,
    pending: Vec<u8>,
}

impl SshTransport {
    pub fn new() -> Self {
        Self {
            session: None,
            channel: None,
            pending: Vec::new(),
        }
    }

    /// Factory closure suitable for `Session::new`
    pub fn boxed() -> Box<dyn Transport> {
        Box::new(Self::new())
    }

    fn channel(&mut self) -> Result<&mut Channel> {
        self.channel.as_mut().ok_or(TransportError::NotConnected)
    }

    /// Drop anything the shell sent that nobody asked for yet.
    fn flush(&mut self) -> Result<()> {
        self.pending.clear();
        let channel = self.channel()?;
        let mut scratch = [0u8; 2048];
        loop {
            match channel.read(&mut scratch) {
                Ok(0) => return Ok(()),
                Ok(_) => continue,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(_) => return Err(TransportError::NotConnected),
            }
        }
    }

    /// Poll the channel once, appending whatever arrived to `pending`.
    fn poll_into_pending(&mut self) -> Result<usize> {
        let mut chunk = [0u8; 1024];
        let channel = self.channel()?;
        match channel.read(&mut chunk) {
            Ok(n) => {
                self.pending.extend_from_slice(&chunk[..n]);
                Ok(n)
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => {
                log::warn!("SSH channel read failed: {}", e);
                Err(TransportError::Generic)
            }
        }
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn open_shell(target: SshTarget) -> Result<(Session, Channel)> {
    let port: u16 = target.port().parse().map_err(|_| TransportError::UnknownHost)?;
    let address = (target.host(), port)
        .to_socket_addrs()
        .map_err(|_| TransportError::UnknownHost)?
        .next()
        .ok_or(TransportError::UnknownHost)?;

    let tcp = TcpStream::connect(address).map_err(|_| TransportError::SocketConnect)?;
    let mut session = Session::new().map_err(|_| TransportError::SessionInit)?;
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|e| {
        log::warn!("SSH handshake with {} failed: {}", target.host(), e);
        TransportError::SessionCreate
    })?;

    if target.password().is_empty() {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/home").join(target.user()));
        let private_key = home.join(".ssh").join("id_rsa");
        let public_key = home.join(".ssh").join("id_rsa.pub");
        session
            .userauth_pubkey_file(target.user(), Some(public_key.as_path()), &private_key, None)
            .map_err(|_| TransportError::PublicKeyAuth)?;
    } else {
        session
            .userauth_password(target.user(), target.password())
            .map_err(|_| TransportError::PasswordAuth)?;
    }

    let mut channel = session.channel_session().map_err(|_| TransportError::Generic)?;
    channel.request_pty("dumb", None, None).map_err(|_| TransportError::Pty)?;
    channel.shell().map_err(|_| TransportError::Shell)?;
    session.set_blocking(false);

    Ok((session, channel))
}

#[async_trait]
impl Transport for SshTransport {
    async fn connect(&mut self, target: &SshTarget) -> Result<()> {
        let owned = target.clone();
        let (session, channel) = tokio::task::spawn_blocking(move || open_shell(owned))
            .await
            .map_err(|_| TransportError::Generic)??;

        self.session = Some(session);
        self.channel = Some(channel);
        self.pending.clear();

        // Welcome line, then the prompt.
        for (what, terminator) in [("welcome line", b'\n'), ("prompt", b' ')] {
            if let Err(e) = self.read_until(1024, terminator, BANNER_TIMEOUT).await {
                log::debug!("No {} after opening the shell: {}", what, e);
            }
        }

        log::info!("SSH shell open on {}:{}", target.host(), target.port());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.channel = None;
        self.pending.clear();
        if let Some(session) = self.session.take() {
            if let Err(e) = session.disconnect(None, "Normal Shutdown", None) {
                log::debug!("SSH disconnect reported: {}", e);
            }
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8], timeout: Duration) -> Result<usize> {
        if self.channel.is_none() {
            return Err(TransportError::NotConnected);
        }
        if data.len() > MAX_WRITE_LEN {
            return Err(TransportError::InvalidParameter);
        }
        self.flush()?;

        let deadline = Instant::now() + timeout;
        let mut written = 0;
        while written < data.len() {
            match self.channel()?.write(&data[written..]) {
                Ok(0) => return Err(TransportError::NoBytesWritten),
                Ok(n) => written += n,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(TransportError::WriteTimeout);
                    }
                    sleep(POLL_INTERVAL).await;
                }
                Err(_) => return Err(TransportError::NoBytesWritten),
            }
        }

        // The pty echoes the command back, with each newline expanded to CR LF.
        let echoed = written + data.iter().filter(|&&b| b == b'\n').count();
        while self.pending.len() < echoed {
            if Instant::now() >= deadline {
                return Err(TransportError::WriteTimeout);
            }
            if self.poll_into_pending()? == 0 {
                sleep(POLL_INTERVAL).await;
            }
        }
        self.pending.drain(..echoed);

        Ok(written)
    }

    async fn read_until(&mut self, max_len: usize, terminator: u8, timeout: Duration) -> Result<Vec<u8>> {
        if self.channel.is_none() {
            return Err(TransportError::NotConnected);
        }

        let deadline = Instant::now() + timeout;
        let mut scanned = 0;
        loop {
            if let Some(reply) = take_reply(&mut self.pending, scanned, max_len, terminator)? {
                return Ok(reply);
            }
            scanned = self.pending.len();

            if Instant::now() >= deadline {
                return Err(TransportError::ReadTimeout);
            }
            if self.poll_into_pending()? == 0 {
                sleep(POLL_INTERVAL).await;
            }
        }
    }
}
