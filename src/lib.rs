//! Client library for the `gpascii` command shell of Power PMAC motion
//! controllers.
//!
//! ```no_run
//! # async fn demo() -> ppmac_control::Result<()> {
//! # #[cfg(feature = "ssh")] {
//! use ppmac_control::{Session, transport::SshTransport};
//!
//! let session = Session::new(SshTransport::boxed);
//! session.connect("192.168.0.200", "root", "deltatau", "22", false).await?;
//! let position = session.axis_position(1).await?;
//! session.axis_move_rel(1, 10.0).await?;
//! # let _ = position;
//! # }
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod models;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::{ConfigError, ConnectionConfig, SessionSettings};
pub use models::{ConnectionInfo, ConnectionState, ProgramState, SoftwareLimits, TaskUsage};
pub use protocol::{VarKind, VarValue};
pub use session::{status_code, PmacError, Result, Session};
pub use transport::{SshTarget, Transport, TransportError, TransportFactory};
