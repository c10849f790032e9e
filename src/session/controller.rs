//! Controller-wide queries, PLC and motion program control, variables.
use crate::models::ProgramState;
use crate::protocol::reply::{parse_batch, parse_bool_pair, parse_program_names, parse_status32, parse_status64};
use crate::protocol::{BatchRange, Command, VarKind, VarValue};
use crate::transport::TransportError;

use super::{PmacError, Result, Session};

impl Session {
    pub async fn firmware_version(&self) -> Result<String> {
        self.write_read(&Command::firmware_version()).await
    }

    pub async fn global_status(&self) -> Result<u32> {
        let reply = self.write_read(&Command::global_status()).await?;
        parse_status32(&reply).ok_or(PmacError::UnexpectedReply)
    }

    pub async fn coord_status(&self, cs: i32) -> Result<u64> {
        let reply = self.write_read(&Command::coord_status(cs)?).await?;
        parse_status64(&reply).ok_or(PmacError::UnexpectedReply)
    }

    pub async fn multi_coord_status(&self, first: i32, last: i32) -> Result<Vec<u64>> {
        let range = BatchRange::new(first, last)?;
        let reply = self.write_read(&Command::multi_coord_status(range)?).await?;
        parse_batch(&reply, range.count(), parse_status64).ok_or(PmacError::UnexpectedReply)
    }

    /// Names of the programs currently held in the controller's buffers.
    pub async fn program_names(&self) -> Result<Vec<String>> {
        let reply = self.write_read(&Command::program_buffer()).await?;
        parse_program_names(&reply).ok_or(PmacError::UnexpectedReply)
    }

    pub async fn enable_plc(&self, plc: i32) -> Result<()> {
        self.execute(&Command::enable_plc(plc)?).await
    }

    pub async fn disable_plc(&self, plc: i32) -> Result<()> {
        self.execute(&Command::disable_plc(plc)?).await
    }

    pub async fn plc_state(&self, plc: i32) -> Result<ProgramState> {
        self.program_state(&Command::plc_state(plc)?).await
    }

    pub async fn mprog_state(&self, cs: i32) -> Result<ProgramState> {
        self.program_state(&Command::mprog_state(cs)?).await
    }

    async fn program_state(&self, command: &Command) -> Result<ProgramState> {
        let reply = self.write_read(command).await?;
        let (active, running) = parse_bool_pair(&reply).ok_or(PmacError::UnexpectedReply)?;
        Ok(ProgramState { active, running })
    }

    pub async fn run_mprog(&self, cs: i32) -> Result<()> {
        self.execute(&Command::run_mprog(cs)?).await
    }

    pub async fn abort_mprog(&self, cs: i32) -> Result<()> {
        self.execute(&Command::abort_mprog(cs)?).await
    }

    /// Restart the controller.
    ///
    /// The controller stops answering once it takes the command, so a read
    /// timeout counts as success.
    pub async fn reset(&self) -> Result<()> {
        match self.execute(&Command::reset()).await {
            Err(PmacError::Transport(TransportError::ReadTimeout)) => {
                log::info!("Controller reset, no reply expected");
                Ok(())
            }
            other => other,
        }
    }

    pub async fn stop_all_axes(&self) -> Result<()> {
        self.execute(&Command::kill_all()).await
    }

    /// Read a named variable as `kind`.
    pub async fn variable(&self, name: &str, kind: VarKind) -> Result<VarValue> {
        let reply = self.write_read(&Command::get_variable(name)?).await?;
        kind.parse(&reply).ok_or(PmacError::UnexpectedReply)
    }

    pub async fn set_variable(&self, name: &str, value: impl Into<VarValue>) -> Result<()> {
        self.execute(&Command::set_variable(name, &value.into())?).await
    }

    /// CPU temperature in degrees Celsius.
    pub async fn cpu_temperature(&self) -> Result<f64> {
        self.query_number(&Command::get_variable("Sys.CpuTemp")?).await
    }

    /// Seconds since the controller powered up.
    pub async fn running_time(&self) -> Result<f64> {
        self.query_number(&Command::get_variable("Sys.Time")?).await
    }
}
