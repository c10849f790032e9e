use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session connection state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot of a session, safe to hand to a UI or a log.
///
/// Credentials are never part of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub id: Uuid,
    pub host: Option<String>,
    pub port: Option<String>,
    pub state: ConnectionState,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
}

impl ConnectionInfo {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            host: None,
            port: None,
            state: ConnectionState::Disconnected,
            connected_at: None,
            last_activity: Utc::now(),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected)
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// CPU time taken by each controller task class, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUsage {
    pub phase: f64,
    pub servo: f64,
    pub rt_int: f64,
    pub background: f64,
    pub total: f64,
}

/// Active and running flags of a PLC or motion program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramState {
    pub active: bool,
    pub running: bool,
}

/// Software travel limits of a motor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SoftwareLimits {
    pub max_pos: f64,
    pub min_pos: f64,
}
