use std::time::{Duration, Instant};

/// Outcome of releasing a press-and-hold gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    /// Released before the hold threshold: a plain tap, no recording.
    Tap,
    /// Released after a hold started: stop the recording.
    Stop,
    /// Release without a matching press.
    Ignored,
}

/// Press-and-hold recording gesture.
///
/// A short threshold disambiguates a tap from an intentional hold: the
/// caller polls `should_start` (e.g. on a timer or pointer-move) and starts
/// recording only once it fires. Pointer-up and pointer-leave both call
/// `release` and converge on the same stop decision.
#[derive(Debug)]
pub struct HoldGesture {
    threshold: Duration,
    pressed_at: Option<Instant>,
    started: bool,
}

impl HoldGesture {
    pub const DEFAULT_THRESHOLD: Duration = Duration::from_millis(200);

    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            pressed_at: None,
            started: false,
        }
    }

    pub fn press(&mut self, now: Instant) {
        self.pressed_at = Some(now);
        self.started = false;
    }

    /// True exactly once, when the press has been held past the threshold.
    pub fn should_start(&mut self, now: Instant) -> bool {
        match self.pressed_at {
            Some(pressed_at) if !self.started && now.duration_since(pressed_at) >= self.threshold => {
                self.started = true;
                true
            }
            _ => false,
        }
    }

    pub fn release(&mut self, now: Instant) -> HoldOutcome {
        let Some(pressed_at) = self.pressed_at.take() else {
            return HoldOutcome::Ignored;
        };

        let held = self.started || now.duration_since(pressed_at) >= self.threshold;
        self.started = false;

        if held {
            HoldOutcome::Stop
        } else {
            HoldOutcome::Tap
        }
    }
}

impl Default for HoldGesture {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

/// Double-press detector for the stop key.
///
/// Returns true when two presses land within the window; the caller then
/// triggers the same `stop()` contract as the other interaction modes.
#[derive(Debug)]
pub struct DoublePress {
    window: Duration,
    last_press: Option<Instant>,
}

impl DoublePress {
    pub const DEFAULT_WINDOW: Duration = Duration::from_millis(400);

    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_press: None,
        }
    }

    pub fn press(&mut self, now: Instant) -> bool {
        let is_double = self
            .last_press
            .map(|last| now.duration_since(last) <= self.window)
            .unwrap_or(false);

        // A detected double press resets the state so a third press
        // doesn't count as another pair.
        self.last_press = if is_double { None } else { Some(now) };
        is_double
    }
}

impl Default for DoublePress {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}
