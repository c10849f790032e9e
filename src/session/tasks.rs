//! CPU time taken by the controller's phase, servo, real-time interrupt and
//! background tasks.
//!
//! The controller reports filtered execution times and task periods in
//! microseconds. Lower-priority task times include the higher-priority tasks
//! that preempted them, so each class is derived by subtracting how many times
//! the faster tasks can have run inside it.
use crate::models::TaskUsage;
use crate::protocol::command::TASK_COUNTERS;
use crate::protocol::reply::parse_counters;
use crate::protocol::Command;

use super::{Result, Session};

/// Background sleep time assumed when the controller reports 0
const DEFAULT_BG_SLEEP_USEC: f64 = 1000.0;

/// Raw `Sys.*` timing counters, microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TaskCounters {
    pub fltr_phase_time: f64,
    pub fltr_servo_time: f64,
    pub fltr_rt_int_time: f64,
    pub fltr_bg_time: f64,
    pub bg_sleep_time: f64,
    pub phase_delta_time: f64,
    pub servo_delta_time: f64,
    pub rt_int_delta_time: f64,
    pub bg_delta_time: f64,
}

impl TaskCounters {
    pub fn from_reply(reply: &str) -> Self {
        let [
            fltr_phase_time,
            fltr_servo_time,
            fltr_rt_int_time,
            fltr_bg_time,
            bg_sleep_time,
            phase_delta_time,
            servo_delta_time,
            rt_int_delta_time,
            bg_delta_time,
        ] = parse_counters::<{ TASK_COUNTERS.len() }>(reply);
        Self {
            fltr_phase_time,
            fltr_servo_time,
            fltr_rt_int_time,
            fltr_bg_time,
            bg_sleep_time,
            phase_delta_time,
            servo_delta_time,
            rt_int_delta_time,
            bg_delta_time,
        }
    }
}

/// Last positive servo and RT interrupt task times.
///
/// A sample can come out at or below zero when the filters lag; the previous
/// positive value is used instead. Lives as long as the session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Smoothing {
    pub last_servo_time: f64,
    pub last_rt_int_time: f64,
}

impl Smoothing {
    fn keep_positive(last: &mut f64, sample: f64) -> f64 {
        if sample > 0.0 {
            *last = sample;
            sample
        } else {
            *last
        }
    }
}

/// Whole periods of `period` that fit in `span`, plus one.
fn runs(span: f64, period: f64) -> f64 {
    // Saturating cast: a zero period gives a huge count rather than NaN.
    ((span / period) as i32) as f64 + 1.0
}

pub fn compute_usage(counters: &TaskCounters, smoothing: &mut Smoothing) -> TaskUsage {
    let c = counters;

    let phase = c.fltr_phase_time;

    let servo = c.fltr_servo_time - runs(c.fltr_servo_time, c.phase_delta_time) * phase;
    let servo = Smoothing::keep_positive(&mut smoothing.last_servo_time, servo);

    let rt_int = c.fltr_rt_int_time
        - runs(c.fltr_rt_int_time, c.phase_delta_time) * phase
        - runs(c.fltr_rt_int_time, c.servo_delta_time) * servo;
    let rt_int = Smoothing::keep_positive(&mut smoothing.last_rt_int_time, rt_int);

    let bg_span = c.fltr_bg_time + c.fltr_rt_int_time;
    let mut background = bg_span;
    for preempted in [
        runs(bg_span, c.rt_int_delta_time) * rt_int,
        runs(bg_span, c.servo_delta_time) * servo,
        runs(bg_span, c.phase_delta_time) * phase,
    ] {
        if background > preempted {
            background -= preempted;
        }
    }

    let bg_sleep = if c.bg_sleep_time == 0.0 {
        DEFAULT_BG_SLEEP_USEC
    } else {
        c.bg_sleep_time
    };
    let overall = c.fltr_rt_int_time + c.fltr_bg_time + bg_sleep;

    let phase_pct = runs(overall, c.phase_delta_time) * phase / overall * 100.0;
    let servo_pct = runs(overall, c.servo_delta_time) * servo / overall * 100.0;
    let rt_int_pct = runs(overall, c.rt_int_delta_time) * rt_int / overall * 100.0;
    let bg_pct = background / overall * 100.0;

    TaskUsage {
        phase: phase_pct,
        servo: servo_pct,
        rt_int: rt_int_pct,
        background: bg_pct,
        total: phase_pct + servo_pct + rt_int_pct + bg_pct,
    }
}

impl Session {
    /// Query the timing counters once and derive every task class's share.
    pub async fn task_usage(&self) -> Result<TaskUsage> {
        let reply = self.write_read(&Command::task_counters()).await?;
        let counters = TaskCounters::from_reply(&reply);
        let mut smoothing = self.smoothing.lock().await;
        let usage = compute_usage(&counters, &mut smoothing);
        log::debug!("Task usage {:?} from {:?}", usage, counters);
        Ok(usage)
    }

    /// CPU share of all controller tasks together.
    pub async fn cpu_usage(&self) -> Result<f64> {
        Ok(self.task_usage().await?.total)
    }

    pub async fn phase_task_usage(&self) -> Result<f64> {
        Ok(self.task_usage().await?.phase)
    }

    pub async fn servo_task_usage(&self) -> Result<f64> {
        Ok(self.task_usage().await?.servo)
    }

    pub async fn rt_int_task_usage(&self) -> Result<f64> {
        Ok(self.task_usage().await?.rt_int)
    }

    pub async fn bg_task_usage(&self) -> Result<f64> {
        Ok(self.task_usage().await?.background)
    }

    /// Current cross-call smoothing values.
    pub async fn task_smoothing(&self) -> Smoothing {
        *self.smoothing.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TaskCounters {
        TaskCounters {
            fltr_phase_time: 2.0,
            fltr_servo_time: 10.0,
            fltr_rt_int_time: 30.0,
            fltr_bg_time: 100.0,
            bg_sleep_time: 870.0,
            phase_delta_time: 50.0,
            servo_delta_time: 200.0,
            rt_int_delta_time: 400.0,
            bg_delta_time: 1000.0,
        }
    }

    #[test]
    fn decomposes_task_times() {
        let mut smoothing = Smoothing::default();
        let usage = compute_usage(&sample(), &mut smoothing);

        // servo = 10 - 1*2 = 8; rti = 30 - 1*2 - 1*8 = 20
        assert_eq!(smoothing.last_servo_time, 8.0);
        assert_eq!(smoothing.last_rt_int_time, 20.0);
        // bg span 130: 130 - 1*20 - 1*8 - 3*2 = 96; overall 1000
        assert!((usage.background - 9.6).abs() < 1e-9);
        assert!((usage.phase - 21.0 * 2.0 / 10.0).abs() < 1e-9);
        assert!((usage.servo - 6.0 * 8.0 / 10.0).abs() < 1e-9);
        assert!((usage.rt_int - 3.0 * 20.0 / 10.0).abs() < 1e-9);
        let sum = usage.phase + usage.servo + usage.rt_int + usage.background;
        assert!((usage.total - sum).abs() < 1e-9);
    }

    #[test]
    fn non_positive_samples_reuse_last_value() {
        let mut smoothing = Smoothing {
            last_servo_time: 7.0,
            last_rt_int_time: 11.0,
        };
        let mut counters = sample();
        counters.fltr_servo_time = 1.0;
        counters.fltr_rt_int_time = 0.0;
        compute_usage(&counters, &mut smoothing);
        assert_eq!(smoothing.last_servo_time, 7.0);
        assert_eq!(smoothing.last_rt_int_time, 11.0);
    }

    #[test]
    fn zero_sleep_time_means_one_millisecond() {
        let mut counters = sample();
        counters.bg_sleep_time = 0.0;
        let usage = compute_usage(&counters, &mut Smoothing::default());
        // overall = 30 + 100 + 1000
        assert!((usage.background - 96.0 / 1130.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn counters_parse_leniently() {
        let counters = TaskCounters::from_reply("2 10 30\r\n100 870 50 200 400 1000");
        assert_eq!(counters, sample());
        assert_eq!(TaskCounters::from_reply("garbage").fltr_phase_time, 0.0);
    }
}
