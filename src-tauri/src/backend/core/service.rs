use super::clock::ClockHandle;
use super::error::CoordinatorError;
use super::flash::{FlashController, FlashTick, TrayClick};
use super::models::{FlashState, StartTimerRequest, TimerCompletion, TimerState, TrayIcon};
use super::timer::{TickOutcome, TimerEngine};

/// Result of starting a timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    pub state: TimerState,
    /// Completion whose flashing was cut short by the new timer.
    pub dismissed: Option<TimerCompletion>,
}

/// Sole owner of the timer and flash state machines. Every mutation of
/// either goes through a method here.
#[derive(Debug, Default)]
pub struct TimerService {
    engine: TimerEngine,
    flash: FlashController,
}

impl TimerService {
    pub fn start(
        &mut self,
        request: StartTimerRequest,
        arm: impl FnOnce(u64) -> ClockHandle,
    ) -> Result<Started, CoordinatorError> {
        request.validate()?;
        let dismissed = self.flash.end();
        let state = self.engine.start(request, arm)?;
        Ok(Started { state, dismissed })
    }

    pub fn stop(&mut self) -> Option<TimerState> {
        self.engine.stop()
    }

    pub fn tick(&mut self, generation: u64) -> TickOutcome {
        self.engine.tick(generation)
    }

    /// Only a completion that has just been produced by `tick` may start
    /// flashing, and never while a new countdown is running.
    pub fn begin_flashing(
        &mut self,
        completion: TimerCompletion,
        original_icon: TrayIcon,
        arm: impl FnOnce(u64) -> ClockHandle,
    ) -> bool {
        if self.engine.is_running() {
            return false;
        }
        self.flash.begin(completion, original_icon, arm)
    }

    pub fn flash_tick(&mut self, generation: u64) -> FlashTick {
        self.flash.tick(generation)
    }

    pub fn end_flashing(&mut self) -> Option<TimerCompletion> {
        self.flash.end()
    }

    pub fn tray_click(&mut self) -> TrayClick {
        self.flash.click()
    }

    pub fn timer(&self) -> TimerState {
        self.engine.state()
    }

    pub fn flash(&self) -> FlashState {
        self.flash.state()
    }

    pub fn snapshot(&self) -> (TimerState, FlashState) {
        (self.engine.state(), self.flash.state())
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn is_flashing(&self) -> bool {
        self.flash.is_flashing()
    }
}
