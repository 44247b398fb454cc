//! Progressive accumulation state.
//!
//! The trace kernel blends each new sample into the running average with
//! weight `1 / frame_count`. Any camera change invalidates the average, so the
//! counter restarts and the new view geometry is flagged for upload.

/// Sample counter and dirty flag shared between the input and render phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulationState {
    frame_count: u32,
    dirty: bool,
}

impl AccumulationState {
    /// Counter at 1 with the dirty flag set, so the first frame uploads the
    /// initial view geometry.
    pub fn new() -> Self {
        Self {
            frame_count: 1,
            dirty: true,
        }
    }

    /// Current sample index.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// True while fresh view geometry is waiting to be pushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Restart accumulation after the camera moved.
    pub fn on_camera_changed(&mut self) {
        self.frame_count = 0;
        self.dirty = true;
    }

    /// Advance the counter once per rendered frame and return the new value.
    pub fn on_frame_rendered(&mut self) -> u32 {
        self.frame_count = self.frame_count.saturating_add(1);
        self.frame_count
    }

    /// Consume the dirty flag. Returns whether it was set.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl Default for AccumulationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_one() {
        let state = AccumulationState::new();

        assert_eq!(state.frame_count(), 1);
        assert!(state.is_dirty());
    }

    #[test]
    fn test_counts_consecutive_frames() {
        let mut state = AccumulationState::new();

        for n in 1..=10 {
            assert_eq!(state.on_frame_rendered(), 1 + n);
        }
        assert_eq!(state.frame_count(), 11);
    }

    #[test]
    fn test_camera_change_resets() {
        let mut state = AccumulationState::new();
        state.take_dirty();
        for _ in 0..42 {
            state.on_frame_rendered();
        }

        state.on_camera_changed();

        assert_eq!(state.frame_count(), 0);
        assert!(state.is_dirty());
        assert_eq!(state.on_frame_rendered(), 1);
    }

    #[test]
    fn test_take_dirty_clears_once() {
        let mut state = AccumulationState::new();

        assert!(state.take_dirty());
        assert!(!state.take_dirty());
        assert!(!state.is_dirty());
    }

    #[test]
    fn test_counter_saturates() {
        let mut state = AccumulationState {
            frame_count: u32::MAX,
            dirty: false,
        };

        assert_eq!(state.on_frame_rendered(), u32::MAX);
    }
}
