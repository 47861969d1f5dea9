use ash::vk;
use color_eyre::eyre::eyre;
use color_eyre::Result;

/// Contains configuration options for the renderer like frames in flight, vsync and clear values
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Must be at least 1. Every per-frame resource is created this many times.
    pub frames_in_flight: usize,
    /// Forces FIFO presentation, otherwise MAILBOX is preferred when available
    pub vsync: bool,
    pub clear_color: [f32; 4],
    pub depth_format: vk::Format,
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(eyre!("frames_in_flight must be at least 1"));
        }
        Ok(())
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            vsync: false,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            depth_format: vk::Format::D32_SFLOAT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RenderConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_frames_in_flight_is_rejected() {
        let config = RenderConfig {
            frames_in_flight: 0,
            ..RenderConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("frames_in_flight"));
    }
}
