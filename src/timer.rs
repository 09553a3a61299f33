/// Countdown driven by simulated milliseconds, ticked once per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameTimer {
    duration_ms: i32,
    remaining_ms: i32,
    active: bool,
}

impl FrameTimer {
    pub fn new(duration_ms: u32) -> Self {
        Self {
            duration_ms: duration_ms.min(i32::MAX as u32) as i32,
            remaining_ms: 0,
            active: false,
        }
    }

    /// Starts counting down unless already running.
    pub fn start(&mut self) {
        if !self.active {
            self.restart();
        }
    }

    pub fn restart(&mut self) {
        self.remaining_ms = self.duration_ms;
        self.active = true;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn remaining_ms(&self) -> i32 {
        if self.active {
            self.remaining_ms
        } else {
            0
        }
    }

    /// Elapsed share of the duration, from 0 at start to 1 at expiry.
    pub fn progress(&self) -> f32 {
        if !self.active || self.duration_ms <= 0 {
            return 0.0;
        }
        1.0 - self.remaining_ms as f32 / self.duration_ms as f32
    }

    /// Advances the countdown. Returns true on the tick it reaches zero.
    pub fn tick(&mut self, elapsed_ms: u32) -> bool {
        if !self.active {
            return false;
        }
        self.remaining_ms = self
            .remaining_ms
            .saturating_sub(elapsed_ms.min(i32::MAX as u32) as i32);
        if self.remaining_ms <= 0 {
            self.active = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_does_not_rewind_a_running_timer() {
        let mut timer = FrameTimer::new(100);
        timer.start();
        timer.tick(40);
        timer.start();
        assert_eq!(timer.remaining_ms(), 60);
        timer.restart();
        assert_eq!(timer.remaining_ms(), 100);
    }

    #[test]
    fn progress_runs_from_zero_to_one() {
        let mut timer = FrameTimer::new(400);
        assert_eq!(timer.progress(), 0.0);
        timer.start();
        assert_eq!(timer.progress(), 0.0);
        timer.tick(100);
        assert_eq!(timer.progress(), 0.25);
        timer.tick(300);
        assert_eq!(timer.progress(), 0.0);
    }

    #[test]
    fn tick_reports_expiry_once() {
        let mut timer = FrameTimer::new(32);
        timer.start();
        assert!(!timer.tick(16));
        assert!(timer.tick(16));
        assert!(!timer.is_active());
        assert!(!timer.tick(16));
    }
}
