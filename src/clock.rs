// src/clock.rs
// Virtual time source: real-time tracking or simulated event-jumping,
// with mid-run speed changes modelled as a timed control event.

use std::time::Instant;

use crate::error::ClockError;

/// Clock operating mode. `Simulated` is fixed at construction and never
/// reads wall time; `Real` tracks wall time, optionally scaled by
/// `speed`, or jumps to the next alarm when `speed` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    Real,
    Simulated,
}

/// Virtual time source owned by the [`crate::scheduler::Scheduler`].
///
/// `speed` of `None` means "jump": in `Real` mode that behaves exactly
/// like `Simulated` mode — the clock advances only when the scheduler
/// explicitly jumps it to the next alarm's `fire_time`.
pub struct Clock {
    mode: ClockMode,
    speed: Option<f64>,
    time: f64,
    start_wall: Instant,
    start_virtual: f64,
}

impl Clock {
    pub fn new(mode: ClockMode, initial_time: f64, speed: Option<f64>) -> Self {
        Self {
            mode,
            speed,
            time: initial_time,
            start_wall: Instant::now(),
            start_virtual: initial_time,
        }
    }

    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    pub fn now(&self) -> f64 {
        self.time
    }

    pub fn speed(&self) -> Option<f64> {
        self.speed
    }

    /// Time never moves backward while a run is active.
    pub fn set_time(&mut self, t: f64) -> Result<(), ClockError> {
        if t < self.time {
            return Err(ClockError::TimeTravel {
                now: self.time,
                requested: t,
            });
        }
        self.time = t;
        self.reanchor();
        Ok(())
    }

    /// Re-anchor `(start_wall, start_virtual)` to now and adopt a new
    /// speed. Used both by `set_speed` and by the control-alarm handler
    /// that implements `set_new_clock_speed_as_timed_event`.
    pub fn set_speed(&mut self, speed: Option<f64>) {
        self.reanchor();
        self.speed = speed;
    }

    fn reanchor(&mut self) {
        self.start_wall = Instant::now();
        self.start_virtual = self.time;
    }

    /// Advance the clock for one scheduler cycle.
    ///
    /// `outbox_empty`, `wake_set_empty` and `next_alarm` describe the
    /// state the scheduler observed this cycle: in `Real` mode with a
    /// finite `speed` the virtual time tracks wall time; otherwise (
    /// `Simulated`, or `Real` with `speed = None`) the clock only moves
    /// when there is nothing left to do but wait for the next alarm.
    pub fn advance(&mut self, outbox_empty: bool, wake_set_empty: bool, next_alarm: Option<f64>) -> f64 {
        match (self.mode, self.speed) {
            (ClockMode::Real, Some(speed)) => {
                let wall_elapsed = self.start_wall.elapsed().as_secs_f64();
                self.time = self.start_virtual + wall_elapsed * speed;
            }
            _ => {
                if outbox_empty && wake_set_empty {
                    if let Some(fire_time) = next_alarm {
                        self.time = fire_time;
                    }
                }
            }
        }
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_jump_advances_to_next_alarm() {
        let mut clock = Clock::new(ClockMode::Simulated, 0.0, None);
        let now = clock.advance(true, true, Some(5.0));
        assert_eq!(now, 5.0);
    }

    #[test]
    fn simulated_does_not_jump_when_work_pending() {
        let mut clock = Clock::new(ClockMode::Simulated, 0.0, None);
        let now = clock.advance(false, true, Some(5.0));
        assert_eq!(now, 0.0);
    }

    #[test]
    fn set_time_backward_rejected() {
        let mut clock = Clock::new(ClockMode::Simulated, 10.0, None);
        let err = clock.set_time(5.0).unwrap_err();
        assert!(matches!(err, ClockError::TimeTravel { .. }));
    }
}
