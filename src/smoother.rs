// src/smoother.rs

use std::collections::VecDeque;

/// Temporal smoother for one space's occupancy using a sliding window.
///
/// Raw per-frame detection is noisy (shadows, headlight flicker, partial
/// occlusion); a majority vote over the last few frames removes single-frame
/// flicker without unbounded latency.
pub struct OccupancySmoother {
    history: VecDeque<bool>,
    window_size: usize,
}

impl OccupancySmoother {
    /// # Arguments
    /// * `window_size` - Number of frames in the vote (e.g. 7 frames, about a
    ///   quarter second at 30 fps)
    pub fn new(window_size: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(window_size.max(1)),
            window_size: window_size.max(1),
        }
    }

    /// Push the raw decision and return the majority vote over the window.
    ///
    /// Must be called exactly once per space per frame tick. A tie on an
    /// even-length window resolves to not occupied.
    pub fn smooth(&mut self, raw_occupied: bool) -> bool {
        self.history.push_back(raw_occupied);
        if self.history.len() > self.window_size {
            self.history.pop_front();
        }

        let occupied_votes = self.history.iter().filter(|&&v| v).count();
        occupied_votes > self.history.len() / 2
    }

    /// Drop all history (operator reset after remapping).
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_input_converges_to_that_value() {
        for k in 1..=9 {
            let mut smoother = OccupancySmoother::new(k);
            let mut last = false;
            for _ in 0..k {
                last = smoother.smooth(true);
            }
            assert!(last, "window {k} full of true must vote true");

            let mut smoother = OccupancySmoother::new(k);
            for _ in 0..k {
                assert!(!smoother.smooth(false));
            }
        }
    }

    #[test]
    fn test_even_window_tie_is_not_occupied() {
        let mut smoother = OccupancySmoother::new(4);
        smoother.smooth(true);
        smoother.smooth(true);
        smoother.smooth(false);
        let result = smoother.smooth(false);
        // History [true, true, false, false]: 2 votes out of 4 is a tie.
        assert!(!result);
    }

    #[test]
    fn test_single_frame_flicker_is_suppressed() {
        let mut smoother = OccupancySmoother::new(7);
        for _ in 0..7 {
            smoother.smooth(true);
        }
        // One spurious free frame in a steady occupied stream.
        assert!(smoother.smooth(false));
    }

    #[test]
    fn test_window_is_bounded() {
        let mut smoother = OccupancySmoother::new(3);
        for _ in 0..10 {
            smoother.smooth(true);
        }
        assert_eq!(smoother.history_len(), 3);
        // Two fresh false votes flip a 3-frame window.
        smoother.smooth(false);
        assert!(!smoother.smooth(false));
    }

    #[test]
    fn test_reset_clears_history() {
        let mut smoother = OccupancySmoother::new(5);
        for _ in 0..5 {
            smoother.smooth(true);
        }
        smoother.reset();
        assert_eq!(smoother.history_len(), 0);
        // First vote after reset decides alone.
        assert!(!smoother.smooth(false));
    }
}
