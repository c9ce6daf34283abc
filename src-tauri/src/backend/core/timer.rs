use std::time::Duration;

use super::clock::ClockHandle;
use super::error::CoordinatorError;
use super::models::{StartTimerRequest, TimerCompletion, TimerState};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick from a clock that has since been replaced or cancelled.
    Stale,
    Updated(TimerState),
    /// The countdown hit zero on this tick. `last` is the zero-remaining
    /// state, `reset` the zero value left behind by the implicit stop.
    Completed {
        last: TimerState,
        completion: TimerCompletion,
        reset: TimerState,
    },
}

/// Canonical countdown state and its tick clock.
///
/// Every tick carries the generation it was armed with; only the current
/// generation may mutate the state.
#[derive(Debug, Default)]
pub struct TimerEngine {
    state: TimerState,
    clock: Option<ClockHandle>,
    generation: u64,
}

impl TimerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a countdown, replacing any running one. `arm` receives the
    /// new generation and must return the clock that will deliver its ticks.
    pub fn start(
        &mut self,
        request: StartTimerRequest,
        arm: impl FnOnce(u64) -> ClockHandle,
    ) -> Result<TimerState, CoordinatorError> {
        request.validate()?;

        self.cancel_clock();
        self.generation += 1;
        self.state = TimerState {
            is_running: true,
            remaining_seconds: request.initial_seconds(),
            total_minutes: request.total_minutes,
            activity: request.activity,
            emotion_name: request.emotion_name,
        };
        self.clock = Some(arm(self.generation));

        Ok(self.state.clone())
    }

    /// Returns the zero value when a timer was active, `None` when idle.
    pub fn stop(&mut self) -> Option<TimerState> {
        let was_active = self.clock.is_some() || !self.state.is_zero();
        self.cancel_clock();
        self.generation += 1;
        if !was_active {
            return None;
        }
        self.state = TimerState::default();
        Some(self.state.clone())
    }

    pub fn tick(&mut self, generation: u64) -> TickOutcome {
        if generation != self.generation || self.clock.is_none() || !self.state.is_running {
            return TickOutcome::Stale;
        }

        self.state.remaining_seconds = (self.state.remaining_seconds - 1).max(0);
        if self.state.remaining_seconds > 0 {
            return TickOutcome::Updated(self.state.clone());
        }

        let last = self.state.clone();
        let completion = TimerCompletion::capture(&last);
        let reset = self.stop().unwrap_or_default();
        TickOutcome::Completed {
            last,
            completion,
            reset,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn cancel_clock(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.cancel();
        }
    }
}
