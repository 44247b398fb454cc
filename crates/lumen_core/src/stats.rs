/// Frames-per-second counter averaged over a fixed window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsCounter {
    fps: f32,
    frame_count: u32,
    elapsed: f32,
    window: f32,
}

impl FpsCounter {
    /// Counter that refreshes its reading every 0.5 seconds.
    pub fn new() -> Self {
        Self::with_window(0.5)
    }

    pub fn with_window(window: f32) -> Self {
        Self {
            fps: 0.0,
            frame_count: 0,
            elapsed: 0.0,
            window,
        }
    }

    /// Record one frame. Returns the new reading when the window elapses.
    pub fn tick(&mut self, delta_time: f32) -> Option<f32> {
        self.frame_count += 1;
        self.elapsed += delta_time;

        if self.elapsed < self.window || self.elapsed <= 0.0 {
            return None;
        }

        self.fps = self.frame_count as f32 / self.elapsed;
        self.frame_count = 0;
        self.elapsed = 0.0;
        Some(self.fps)
    }

    /// Last reading, 0 until the first window completes.
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_after_window() {
        let mut counter = FpsCounter::new();

        for _ in 0..3 {
            assert_eq!(counter.tick(0.125), None);
        }
        let fps = counter.tick(0.125).unwrap();

        assert!((fps - 8.0).abs() < 1e-3);
        assert_eq!(counter.fps(), fps);
    }

    #[test]
    fn test_window_restarts() {
        let mut counter = FpsCounter::with_window(1.0);

        assert!(counter.tick(1.0).is_some());
        assert_eq!(counter.tick(0.25), None);
        let fps = counter.tick(0.75).unwrap();

        assert!((fps - 2.0).abs() < 1e-3);
    }
}
