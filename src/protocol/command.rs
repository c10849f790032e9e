//! Command lines for the gpascii shell.
//!
//! Every builder produces a complete, newline-terminated line and refuses to
//! produce one longer than the ceiling for its kind of command.
use std::fmt;
use std::ops::RangeInclusive;

use super::{ProtocolError, VarValue, MAX_BATCH_ITEMS};

/// Ceiling for single-target commands
pub const FIXED_COMMAND_MAX: usize = 128;

/// Ceiling for commands using `first..last` range syntax
pub const RANGE_COMMAND_MAX: usize = 512;

/// Ceiling for expanded batches, raw commands and program lines
pub const LONG_COMMAND_MAX: usize = 5120;

/// Counters queried for the task usage figures, in reply order.
pub const TASK_COUNTERS: [&str; 9] = [
    "Sys.FltrPhaseTime",
    "Sys.FltrServoTime",
    "Sys.FltrRtIntTime",
    "Sys.FltrBgTime",
    "Sys.BgSleepTime",
    "Sys.PhaseDeltaTime",
    "Sys.ServoDeltaTime",
    "Sys.RtIntDeltaTime",
    "Sys.BgDeltaTime",
];

/// Inclusive index range for batch queries over motors or coordinate systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRange {
    first: i32,
    last: i32,
}

impl BatchRange {
    pub fn new(first: i32, last: i32) -> Result<Self, ProtocolError> {
        if first > last {
            return Err(ProtocolError::OutOfOrder { first, last });
        }
        let count = (i64::from(last) - i64::from(first) + 1) as usize;
        if count > MAX_BATCH_ITEMS {
            return Err(ProtocolError::TooManyItems {
                count,
                max: MAX_BATCH_ITEMS,
            });
        }
        Ok(Self { first, last })
    }

    pub fn first(&self) -> i32 {
        self.first
    }

    pub fn last(&self) -> i32 {
        self.last
    }

    pub fn count(&self) -> usize {
        (self.last - self.first + 1) as usize
    }

    pub fn indices(&self) -> RangeInclusive<i32> {
        self.first..=self.last
    }
}

/// One line of a program file as it goes on the wire.
///
/// The bytes are kept as read, carriage returns and non-UTF-8 bytes
/// included; only a missing `\n` is added.
pub fn program_line(raw: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut line = raw.to_vec();
    if line.last() != Some(&b'\n') {
        line.push(b'\n');
    }
    if line.len() > LONG_COMMAND_MAX {
        return Err(ProtocolError::CommandTooLong {
            len: line.len(),
            max: LONG_COMMAND_MAX,
        });
    }
    Ok(line)
}

/// A newline-terminated command line ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    line: String,
}

impl Command {
    /// Wrap `text`, appending the newline if it is missing.
    pub fn new(text: impl Into<String>, max_len: usize) -> Result<Self, ProtocolError> {
        let mut line = text.into();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        if line.len() > max_len {
            return Err(ProtocolError::CommandTooLong {
                len: line.len(),
                max: max_len,
            });
        }
        Ok(Self { line })
    }

    fn fixed(text: String) -> Result<Self, ProtocolError> {
        Self::new(text, FIXED_COMMAND_MAX)
    }

    pub fn as_str(&self) -> &str {
        &self.line
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.line.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    /// Raw user command; may be as long as a reply buffer.
    pub fn raw(text: &str) -> Result<Self, ProtocolError> {
        Self::new(text, LONG_COMMAND_MAX)
    }

    pub fn close() -> Self {
        Self {
            line: "close\n".to_string(),
        }
    }

    // Controller

    pub fn firmware_version() -> Self {
        Self {
            line: "vers\n".to_string(),
        }
    }

    pub fn global_status() -> Self {
        Self {
            line: "?\n".to_string(),
        }
    }

    pub fn program_buffer() -> Self {
        Self {
            line: "buffer\n".to_string(),
        }
    }

    pub fn reset() -> Self {
        Self {
            line: "$$$\n".to_string(),
        }
    }

    pub fn kill_all() -> Self {
        Self {
            line: "#*k\n".to_string(),
        }
    }

    pub fn task_counters() -> Self {
        Self {
            line: format!("{}\n", TASK_COUNTERS.join(" ")),
        }
    }

    pub fn motor_status(motor: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("#{}?", motor))
    }

    pub fn coord_status(cs: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("&{}?", cs))
    }

    pub fn multi_motor_status(range: BatchRange) -> Result<Self, ProtocolError> {
        Self::new(format!("#{}..{}?", range.first, range.last), RANGE_COMMAND_MAX)
    }

    pub fn multi_coord_status(range: BatchRange) -> Result<Self, ProtocolError> {
        Self::new(format!("&{}..{}?", range.first, range.last), RANGE_COMMAND_MAX)
    }

    pub fn enable_plc(plc: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("enable plc {}", plc))
    }

    pub fn disable_plc(plc: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("disable plc {}", plc))
    }

    pub fn plc_state(plc: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("Plc[{0}].Active Plc[{0}].Running", plc))
    }

    pub fn mprog_state(cs: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("Coord[{0}].ProgActive Coord[{0}].ProgRunning", cs))
    }

    pub fn run_mprog(cs: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("&{}r", cs))
    }

    pub fn abort_mprog(cs: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("&{}a", cs))
    }

    pub fn get_variable(name: &str) -> Result<Self, ProtocolError> {
        Self::fixed(name.to_string())
    }

    pub fn set_variable(name: &str, value: &VarValue) -> Result<Self, ProtocolError> {
        Self::fixed(format!("{}={}", name, value.to_command_value()))
    }

    // Motors

    pub fn motor_powered(motor: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("Motor[{}].ServoCtrl", motor))
    }

    pub fn axis_velocity(axis: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("Motor[{}].JogSpeed", axis))
    }

    pub fn set_axis_velocity(axis: i32, velocity: f64) -> Result<Self, ProtocolError> {
        Self::fixed(format!("Motor[{}].JogSpeed={:.6}", axis, velocity))
    }

    /// One `Motor[n].JogSpeed ` term per index. The space after the last
    /// term is part of the wire format.
    pub fn axes_velocities(range: BatchRange) -> Result<Self, ProtocolError> {
        let text: String = range
            .indices()
            .map(|axis| format!("Motor[{}].JogSpeed ", axis))
            .collect();
        Self::new(text, LONG_COMMAND_MAX)
    }

    pub fn axis_acceleration(axis: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("Motor[{}].JogTa", axis))
    }

    pub fn set_axis_acceleration(axis: i32, acceleration: f64) -> Result<Self, ProtocolError> {
        Self::fixed(format!("Motor[{}].JogTa={:.6}", axis, acceleration))
    }

    pub fn axis_deadband(axis: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("Motor[{}].Servo.OutDbOn", axis))
    }

    pub fn set_axis_deadband(axis: i32, deadband: f64) -> Result<Self, ProtocolError> {
        Self::fixed(format!("Motor[{}].Servo.OutDbOn={:.6}", axis, deadband))
    }

    pub fn axis_software_limits(axis: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("Motor[{0}].MaxPos Motor[{0}].MinPos", axis))
    }

    pub fn set_axis_software_limits(axis: i32, max_pos: f64, min_pos: f64) -> Result<Self, ProtocolError> {
        Self::fixed(format!(
            "Motor[{0}].MaxPos={1:.6} Motor[{0}].MinPos={2:.6}",
            axis, max_pos, min_pos
        ))
    }

    pub fn axis_position(axis: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("#{}p", axis))
    }

    pub fn axes_positions(range: BatchRange) -> Result<Self, ProtocolError> {
        Self::new(format!("#{}..{}p", range.first, range.last), RANGE_COMMAND_MAX)
    }

    pub fn axis_define_position(axis: i32, position: f64) -> Result<Self, ProtocolError> {
        Self::fixed(format!("#{0}k Motor[{0}].Pos={1:.6}", axis, position))
    }

    pub fn axis_move_abs(axis: i32, position: f64) -> Result<Self, ProtocolError> {
        Self::fixed(format!("#{}j={:.2}", axis, position))
    }

    pub fn axis_move_rel(axis: i32, distance: f64) -> Result<Self, ProtocolError> {
        Self::fixed(format!("#{}j^{:.2}", axis, distance))
    }

    pub fn axis_jog_positive(axis: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("#{}j+", axis))
    }

    pub fn axis_jog_negative(axis: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("#{}j-", axis))
    }

    pub fn axis_home(axis: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("#{}hm", axis))
    }

    pub fn axis_stop(axis: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("#{}j/", axis))
    }

    pub fn axis_abort(axis: i32) -> Result<Self, ProtocolError> {
        Self::fixed(format!("#{}k", axis))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.line.trim_end_matches('\n'))
    }
}
