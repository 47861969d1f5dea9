use color_eyre::Result;

/// Tracks window size changes between frames and decides when the swapchain is rebuilt
#[derive(Debug, Default)]
pub struct RenderState {
    resized: bool,
    minimized: bool,
}

impl RenderState {
    pub fn window_resized(&mut self, width: u32, height: u32) {
        self.minimized = width == 0 || height == 0;
        self.resized = true;
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    pub fn resize_pending(&self) -> bool {
        self.resized
    }

    /// Runs `recreate` unless the window is minimized. The pending resize
    /// stays flagged while minimized so the next restore picks it up.
    /// Returns whether `recreate` ran.
    pub fn recreate_with<F>(&mut self, recreate: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        if self.minimized {
            log::debug!("Window minimized, skipping swapchain recreation");
            self.resized = true;
            return Ok(false);
        }
        recreate()?;
        self.resized = false;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimized_window_skips_recreation_until_restored() {
        let mut state = RenderState::default();
        let mut rebuilds = 0;

        state.window_resized(0, 0);
        let ran = state.recreate_with(|| { rebuilds += 1; Ok(()) }).unwrap();
        assert!(!ran);
        assert_eq!(rebuilds, 0);
        assert!(state.resize_pending());

        state.window_resized(800, 600);
        let ran = state.recreate_with(|| { rebuilds += 1; Ok(()) }).unwrap();
        assert!(ran);
        assert_eq!(rebuilds, 1);
        assert!(!state.resize_pending());
    }

    #[test]
    fn failed_recreation_keeps_resize_pending() {
        let mut state = RenderState::default();
        state.window_resized(640, 480);
        let result = state.recreate_with(|| Err(color_eyre::eyre::eyre!("boom")));
        assert!(result.is_err());
        assert!(state.resize_pending());
    }

    #[test]
    fn zero_width_alone_counts_as_minimized() {
        let mut state = RenderState::default();
        state.window_resized(0, 720);
        assert!(state.is_minimized());
    }
}
