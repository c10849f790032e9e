//! Per-motor queries and motion commands.
use crate::models::SoftwareLimits;
use crate::protocol::reply::{parse_batch, parse_bool, parse_number, parse_status64};
use crate::protocol::{BatchRange, Command};

use super::{PmacError, Result, Session};

impl Session {
    pub async fn motor_status(&self, motor: i32) -> Result<u64> {
        let reply = self.write_read(&Command::motor_status(motor)?).await?;
        parse_status64(&reply).ok_or(PmacError::UnexpectedReply)
    }

    /// Status words of motors `first..=last`, in order.
    pub async fn multi_motor_status(&self, first: i32, last: i32) -> Result<Vec<u64>> {
        let range = BatchRange::new(first, last)?;
        let reply = self.write_read(&Command::multi_motor_status(range)?).await?;
        parse_batch(&reply, range.count(), parse_status64).ok_or(PmacError::UnexpectedReply)
    }

    /// Whether the servo loop of `motor` is closed.
    pub async fn motor_powered(&self, motor: i32) -> Result<bool> {
        let reply = self.write_read(&Command::motor_powered(motor)?).await?;
        parse_bool(&reply).ok_or(PmacError::UnexpectedReply)
    }

    pub async fn axis_velocity(&self, axis: i32) -> Result<f64> {
        self.query_number(&Command::axis_velocity(axis)?).await
    }

    pub async fn axes_velocities(&self, first: i32, last: i32) -> Result<Vec<f64>> {
        let range = BatchRange::new(first, last)?;
        let reply = self.write_read(&Command::axes_velocities(range)?).await?;
        parse_batch(&reply, range.count(), parse_number::<f64>).ok_or(PmacError::UnexpectedReply)
    }

    pub async fn set_axis_velocity(&self, axis: i32, velocity: f64) -> Result<()> {
        self.execute(&Command::set_axis_velocity(axis, velocity)?).await
    }

    pub async fn axis_acceleration(&self, axis: i32) -> Result<f64> {
        self.query_number(&Command::axis_acceleration(axis)?).await
    }

    pub async fn set_axis_acceleration(&self, axis: i32, acceleration: f64) -> Result<()> {
        self.execute(&Command::set_axis_acceleration(axis, acceleration)?).await
    }

    pub async fn axis_deadband(&self, axis: i32) -> Result<f64> {
        self.query_number(&Command::axis_deadband(axis)?).await
    }

    pub async fn set_axis_deadband(&self, axis: i32, deadband: f64) -> Result<()> {
        self.execute(&Command::set_axis_deadband(axis, deadband)?).await
    }

    pub async fn axis_software_limits(&self, axis: i32) -> Result<SoftwareLimits> {
        let reply = self.write_read(&Command::axis_software_limits(axis)?).await?;
        match parse_batch(&reply, 2, parse_number::<f64>).as_deref() {
            Some(&[max_pos, min_pos]) => Ok(SoftwareLimits { max_pos, min_pos }),
            _ => Err(PmacError::UnexpectedReply),
        }
    }

    pub async fn set_axis_software_limits(&self, axis: i32, max_pos: f64, min_pos: f64) -> Result<()> {
        self.execute(&Command::set_axis_software_limits(axis, max_pos, min_pos)?)
            .await
    }

    pub async fn axis_position(&self, axis: i32) -> Result<f64> {
        self.query_number(&Command::axis_position(axis)?).await
    }

    pub async fn axes_positions(&self, first: i32, last: i32) -> Result<Vec<f64>> {
        let range = BatchRange::new(first, last)?;
        let reply = self.write_read(&Command::axes_positions(range)?).await?;
        parse_batch(&reply, range.count(), parse_number::<f64>).ok_or(PmacError::UnexpectedReply)
    }

    /// Kill `axis` and redefine its current position.
    pub async fn axis_define_position(&self, axis: i32, position: f64) -> Result<()> {
        self.execute(&Command::axis_define_position(axis, position)?).await
    }

    pub async fn axis_move_abs(&self, axis: i32, position: f64) -> Result<()> {
        self.execute(&Command::axis_move_abs(axis, position)?).await
    }

    pub async fn axis_move_rel(&self, axis: i32, distance: f64) -> Result<()> {
        self.execute(&Command::axis_move_rel(axis, distance)?).await
    }

    pub async fn axis_jog_positive(&self, axis: i32) -> Result<()> {
        self.execute(&Command::axis_jog_positive(axis)?).await
    }

    pub async fn axis_jog_negative(&self, axis: i32) -> Result<()> {
        self.execute(&Command::axis_jog_negative(axis)?).await
    }

    pub async fn axis_home(&self, axis: i32) -> Result<()> {
        self.execute(&Command::axis_home(axis)?).await
    }

    pub async fn axis_stop(&self, axis: i32) -> Result<()> {
        self.execute(&Command::axis_stop(axis)?).await
    }

    pub async fn axis_abort(&self, axis: i32) -> Result<()> {
        self.execute(&Command::axis_abort(axis)?).await
    }
}
