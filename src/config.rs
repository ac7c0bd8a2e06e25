use crate::Error;

// -------------------------------------------------------------------------------------------------

/// Global signal and timing setup of a playfield and its outputs.
///
/// The engine always renders interleaved stereo. All durations within the engine (envelope
/// phases, cloud intervals) are counted in interleaved samples, not frames, so a millisecond
/// spans `sample_rate * channel_count / 1000` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count. Only stereo is supported.
    pub channel_count: usize,
    /// Number of frames rendered per output block.
    pub block_frames: usize,
    /// Number of blocks an output keeps queued ahead of playback.
    pub lookahead_blocks: usize,
    /// Size of the playfield plane, used to place new sources.
    pub viewport: (i32, i32),
    /// Capacity of the message queue between player and audio thread.
    pub message_queue_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: Self::DEFAULT_SAMPLE_RATE,
            channel_count: Self::CHANNEL_COUNT,
            block_frames: 3000,
            lookahead_blocks: 3,
            viewport: (1600, 900),
            message_queue_size: 1024,
        }
    }
}

impl EngineConfig {
    pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
    pub const CHANNEL_COUNT: usize = 2;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_block_frames(mut self, block_frames: usize) -> Self {
        self.block_frames = block_frames;
        self
    }

    pub fn with_lookahead_blocks(mut self, lookahead_blocks: usize) -> Self {
        self.lookahead_blocks = lookahead_blocks;
        self
    }

    pub fn with_viewport(mut self, width: i32, height: i32) -> Self {
        self.viewport = (width, height);
        self
    }

    pub fn with_message_queue_size(mut self, size: usize) -> Self {
        self.message_queue_size = size;
        self
    }

    /// Number of interleaved samples in a single output block.
    pub fn block_samples(&self) -> usize {
        self.block_frames * self.channel_count
    }

    /// Convert a duration in milliseconds into a number of interleaved samples.
    pub fn millis_to_samples(&self, millis: u32) -> usize {
        (millis as f64 * (self.sample_rate as f64 * self.channel_count as f64) / 1000.0) as usize
    }

    /// Convert a number of interleaved samples into milliseconds.
    pub fn samples_to_millis(&self, samples: usize) -> f64 {
        samples as f64 / ((self.sample_rate as f64 * self.channel_count as f64) / 1000.0)
    }

    /// Validate all parameters.
    pub fn validate(&self) -> Result<(), Error> {
        if self.channel_count != Self::CHANNEL_COUNT {
            return Err(Error::ParameterError(format!(
                "Unsupported channel count: {}. Only stereo output is supported",
                self.channel_count
            )));
        }
        if self.sample_rate == 0 {
            return Err(Error::ParameterError(
                "Sample rate must be > 0".to_string(),
            ));
        }
        if self.block_frames == 0 {
            return Err(Error::ParameterError(
                "Block size must be > 0".to_string(),
            ));
        }
        if self.message_queue_size == 0 {
            return Err(Error::ParameterError(
                "Message queue size must be > 0".to_string(),
            ));
        }
        if self.viewport.0 <= 0 || self.viewport.1 <= 0 {
            return Err(Error::ParameterError(format!(
                "Invalid viewport size: {}x{}",
                self.viewport.0, self.viewport.1
            )));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis() {
        let config = EngineConfig::default();
        assert_eq!(config.millis_to_samples(0), 0);
        assert_eq!(config.millis_to_samples(5), 441);
        assert_eq!(config.millis_to_samples(50), 4410);
        assert_eq!(config.millis_to_samples(1000), 88200);
        assert!((config.samples_to_millis(4410) - 50.0).abs() < 1e-9);
        assert_eq!(config.block_samples(), 6000);
    }

    #[test]
    fn validation() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::default()
            .with_block_frames(0)
            .validate()
            .is_err());
        assert!(EngineConfig::default()
            .with_viewport(0, 100)
            .validate()
            .is_err());
        let mut mono = EngineConfig::default();
        mono.channel_count = 1;
        assert!(mono.validate().is_err());
    }
}
