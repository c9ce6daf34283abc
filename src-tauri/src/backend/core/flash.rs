use std::time::Duration;

use super::clock::ClockHandle;
use super::models::{FlashState, TimerCompletion, TrayIcon, TrayMode};

pub const MAX_FLASHES: u32 = 10;
pub const FLASH_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashTick {
    Stale,
    Frame(FlashState),
    /// The flash limit was reached and the tray is back in normal mode.
    Finished(TimerCompletion),
}

/// What the single tray click handler should do for the current mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayClick {
    /// Flashing was dismissed; open the journal for this completion.
    OpenJournal(TimerCompletion),
    /// Normal behaviour: toggle the widget window.
    ToggleWidget,
}

/// Post-completion attention signal on the tray icon.
#[derive(Debug)]
pub struct FlashController {
    state: FlashState,
    clock: Option<ClockHandle>,
    generation: u64,
}

impl Default for FlashController {
    fn default() -> Self {
        Self::new(MAX_FLASHES)
    }
}

impl FlashController {
    pub fn new(max_flashes: u32) -> Self {
        Self {
            state: FlashState::idle(max_flashes),
            clock: None,
            generation: 0,
        }
    }

    /// Enters flashing mode. Returns false when already flashing.
    pub fn begin(
        &mut self,
        completion: TimerCompletion,
        original_icon: TrayIcon,
        arm: impl FnOnce(u64) -> ClockHandle,
    ) -> bool {
        if self.state.is_flashing() {
            return false;
        }

        self.generation += 1;
        self.state = FlashState {
            mode: TrayMode::Flashing,
            flash_count: 0,
            max_flashes: self.state.max_flashes,
            icon_visible: true,
            completion: Some(completion),
            original_icon: Some(original_icon),
        };
        self.clock = Some(arm(self.generation));
        true
    }

    pub fn tick(&mut self, generation: u64) -> FlashTick {
        if generation != self.generation || !self.state.is_flashing() {
            return FlashTick::Stale;
        }

        self.state.flash_count += 1;
        if self.state.flash_count >= self.state.max_flashes {
            return match self.end() {
                Some(completion) => FlashTick::Finished(completion),
                None => FlashTick::Stale,
            };
        }

        self.state.icon_visible = !self.state.icon_visible;
        FlashTick::Frame(self.state.clone())
    }

    /// Leaves flashing mode, returning the completion it was showing.
    /// Calling it again is a no-op.
    pub fn end(&mut self) -> Option<TimerCompletion> {
        if let Some(clock) = self.clock.take() {
            clock.cancel();
        }
        if !self.state.is_flashing() {
            return None;
        }

        self.generation += 1;
        let completion = self.state.completion.take();
        self.state = FlashState::idle(self.state.max_flashes);
        completion
    }

    pub fn click(&mut self) -> TrayClick {
        match self.state.mode {
            TrayMode::Flashing => match self.end() {
                Some(completion) => TrayClick::OpenJournal(completion),
                None => TrayClick::ToggleWidget,
            },
            TrayMode::Normal => TrayClick::ToggleWidget,
        }
    }

    pub fn state(&self) -> FlashState {
        self.state.clone()
    }

    pub fn is_flashing(&self) -> bool {
        self.state.is_flashing()
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
