//! Program download.
//!
//! The file goes over line by line while the gate is held, so nothing else can
//! land in the middle of a program buffer. Lines are sent as the file holds
//! them, bytes unchanged. A `close` follows whenever at least one line was
//! handed to the transport, even if its exchange failed.
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::protocol::command::program_line;
use crate::protocol::Command;
use crate::transport::Transport;

use super::{PmacError, Result, Session};

impl Session {
    pub async fn download_program(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !self.connected.load(Ordering::Acquire) {
            return Err(PmacError::NoTransportSet);
        }

        let file = File::open(path).await.map_err(|e| {
            log::error!("Cannot open program file {}: {}", path.display(), e);
            PmacError::FileOpen
        })?;

        let permit = self.gate.acquire().await?;
        let timeout = self.effective_timeout(None);
        log::info!("Downloading {}", path.display());

        let result = {
            let mut slot = self.transport.lock().await;
            match slot.as_mut() {
                Some(transport) => send_program(&mut **transport, file, timeout).await,
                None => Err(PmacError::NoTransportSet),
            }
        };

        match &result {
            Ok(sent) => log::info!("Downloaded {} lines from {}", sent, path.display()),
            Err(e) => log::error!("Download of {} aborted: {}", path.display(), e),
        }
        Self::release(permit, result.map(|_| ()))
    }
}

async fn send_program(transport: &mut dyn Transport, file: File, timeout: Duration) -> Result<usize> {
    let mut reader = BufReader::new(file);
    let mut raw = Vec::new();
    let mut attempted = 0;
    let mut outcome = Ok(());

    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                log::error!("Program file read failed after {} lines: {}", attempted, e);
                outcome = Err(PmacError::FileRead);
                break;
            }
        }
        if raw.iter().all(|&b| b == b'\n' || b == b'\r') {
            continue;
        }

        let line = match program_line(&raw) {
            Ok(line) => line,
            Err(e) => {
                outcome = Err(e.into());
                break;
            }
        };
        // Counted before the exchange: a line that failed may still have
        // opened a buffer on the controller.
        attempted += 1;
        if let Err(e) = Session::exchange_bytes(transport, &line, timeout).await {
            log::error!("Line {:?} rejected: {}", String::from_utf8_lossy(&line).trim_end(), e);
            outcome = Err(e);
            break;
        }
    }

    if attempted > 0 {
        if let Err(e) = Session::exchange(transport, &Command::close(), timeout).await {
            log::error!("Closing the program buffer failed: {}", e);
            if outcome.is_ok() {
                outcome = Err(PmacError::ProgramClose);
            }
        }
    }

    outcome.map(|_| attempted)
}
