//! Frame counter: consecutive-frame persistence of a condition

/// Result of feeding one frame to a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterUpdate {
    /// Count after this frame
    pub count: u32,
    /// Target reached (`count >= target`)
    pub reached: bool,
    /// A non-zero run was broken by this frame
    pub was_reset: bool,
}

/// Debouncing counter, saturating at its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCounter {
    count: u32,
    target: u32,
}

impl FrameCounter {
    pub fn new(target: u32) -> Self {
        Self { count: 0, target }
    }

    /// Increment on a satisfying frame, reset to 0 otherwise
    pub fn update(&mut self, satisfied: bool) -> CounterUpdate {
        let was_reset = !satisfied && self.count > 0;
        if satisfied {
            self.count = self.count.saturating_add(1).min(self.target);
        } else {
            self.count = 0;
        }
        CounterUpdate {
            count: self.count,
            reached: satisfied && self.count >= self.target,
            was_reset,
        }
    }

    /// Force the count to 0
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Enter a new phase: adopt its target and start from 0
    pub fn retarget(&mut self, target: u32) {
        self.target = target;
        self.reset();
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn target(&self) -> u32 {
        self.target
    }
}
