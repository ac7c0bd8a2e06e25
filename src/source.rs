//! Decoded source recordings, placed on the playfield as spatial sampling areas.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rand::Rng;

use crate::{
    config::EngineConfig,
    utils::{
        decoder::AudioDecoder,
        rect::{Point, Rect},
        unique_usize_id,
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Unique id of a [`SourceBuffer`] within a playfield.
pub type SourceId = usize;

// -------------------------------------------------------------------------------------------------

/// A decoded, immutable recording plus its playback volume and placement rectangle.
///
/// The placement rectangle defines the spatial address space of the recording: a grain's
/// horizontal position within the rectangle selects the offset into the sample buffer,
/// its vertical position attenuates the volume (top = full volume, bottom = silent).
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    id: SourceId,
    name: Option<String>,
    samples: Arc<[f32]>,
    volume: f32,
    placement: Rect,
}

impl SourceBuffer {
    /// Sample offsets into the source are rounded up to multiples of this value, so they
    /// always point to the start of an interleaved frame.
    pub const BLOCK_ALIGNMENT: usize = 8;
    /// Initial volume of new sources.
    pub const DEFAULT_VOLUME: f32 = 0.5;
    /// Initial placement size of sources loaded from files.
    pub const DEFAULT_WIDTH: i32 = 350;
    pub const DEFAULT_HEIGHT: i32 = 100;

    /// Create a new source from interleaved, normalized samples.
    pub fn new<S: Into<Arc<[f32]>>>(samples: S, placement: Rect) -> Self {
        Self {
            id: unique_usize_id(),
            name: None,
            samples: samples.into(),
            volume: Self::DEFAULT_VOLUME,
            placement,
        }
    }

    /// Create a new source by decoding the given audio file.
    pub fn from_file<P: AsRef<Path>>(path: P, placement: Rect) -> Result<Self, Error> {
        let path = path.as_ref();
        let decoded = AudioDecoder::from_file(path)?.decode_all()?;
        if decoded.channel_count != EngineConfig::CHANNEL_COUNT
            || decoded.sample_rate != EngineConfig::DEFAULT_SAMPLE_RATE
        {
            log::warn!(
                "'{}' has {} channels at {} Hz: it will be played as is, without conversion",
                path.display(),
                decoded.channel_count,
                decoded.sample_rate
            );
        }
        log::info!(
            "loaded source '{}' with {} samples",
            path.display(),
            decoded.samples.len()
        );
        let mut source = Self::new(decoded.samples, placement);
        source.name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        Ok(source)
    }

    /// Load all wav files from the given directory, placing each one with the default size
    /// at a random position within the viewport. Files which fail to load are skipped.
    pub fn load_dir<P: AsRef<Path>, R: Rng>(
        dir: P,
        viewport: (i32, i32),
        rng: &mut R,
    ) -> Result<Vec<Self>, Error> {
        let mut paths = std::fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_wav_file(path))
            .collect::<Vec<PathBuf>>();
        paths.sort();

        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let max_x = (viewport.0 - Self::DEFAULT_WIDTH).max(1);
            let max_y = (viewport.1 - Self::DEFAULT_HEIGHT).max(1);
            let placement = Rect::new(
                rng.random_range(0..max_x),
                rng.random_range(0..max_y),
                Self::DEFAULT_WIDTH,
                Self::DEFAULT_HEIGHT,
            )?;
            match Self::from_file(&path, placement) {
                Ok(source) => sources.push(source),
                Err(err) => log::warn!("skipping source '{}': {err}", path.display()),
            }
        }
        Ok(sources)
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    /// File name of the source, when it got loaded from a file.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
    /// Set a new volume. Values get clamped to [0, 1], non finite values mute the source.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub fn placement(&self) -> Rect {
        self.placement
    }
    pub fn set_placement(&mut self, placement: Rect) {
        self.placement = placement;
    }

    /// Block aligned sample offset for a grain at the given position: the horizontal
    /// position within the placement maps linearly to the sample buffer.
    ///
    /// The result may exceed the buffer length, when rounding up to the block alignment
    /// crosses the end of the buffer.
    pub fn sample_offset_for(&self, position: Point) -> usize {
        let relative_x = (position.x - self.placement.x()).max(0) as u64;
        let offset = relative_x * self.samples.len() as u64 / self.placement.width() as u64;
        (offset as usize).next_multiple_of(Self::BLOCK_ALIGNMENT)
    }

    /// Volume of a grain at the given position: the source's volume, attenuated linearly
    /// from full volume at the top to silence at the bottom of the placement.
    pub fn vertical_gain_for(&self, position: Point) -> f32 {
        let height = self.placement.height();
        let factor = (height - (position.y - self.placement.y())) as f32 / height as f32;
        self.volume * factor
    }
}

fn is_wav_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{rngs::SmallRng, SeedableRng};

    fn source(len: usize, placement: Rect) -> SourceBuffer {
        SourceBuffer::new(vec![0.5; len], placement)
    }

    #[test]
    fn defaults() {
        let a = source(16, Rect::new(0, 0, 10, 10).unwrap());
        let b = source(16, Rect::new(0, 0, 10, 10).unwrap());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.volume(), SourceBuffer::DEFAULT_VOLUME);
        assert_eq!(a.len(), 16);
        assert!(!a.is_empty());
        assert!(a.name().is_none());
    }

    #[test]
    fn volume_is_clamped() {
        let mut source = source(16, Rect::new(0, 0, 10, 10).unwrap());
        source.set_volume(1.5);
        assert_eq!(source.volume(), 1.0);
        source.set_volume(-0.5);
        assert_eq!(source.volume(), 0.0);
        for invalid in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            source.set_volume(0.5);
            source.set_volume(invalid);
            assert_eq!(source.volume(), 0.0);
        }
    }

    #[test]
    fn offsets_are_block_aligned() {
        let source = source(1000, Rect::new(100, 0, 100, 50).unwrap());
        assert_eq!(source.sample_offset_for(Point::new(100, 0)), 0);
        // 1 * 1000 / 100 = 10 -> 16
        assert_eq!(source.sample_offset_for(Point::new(101, 0)), 16);
        // 50 * 1000 / 100 = 500 -> 504
        assert_eq!(source.sample_offset_for(Point::new(150, 0)), 504);
        // 99 * 1000 / 100 = 990 -> 992
        assert_eq!(source.sample_offset_for(Point::new(199, 0)), 992);

        let short = self::source(12, Rect::new(0, 0, 4, 4).unwrap());
        // 3 * 12 / 4 = 9 -> 16, past the end of the buffer
        assert_eq!(short.sample_offset_for(Point::new(3, 0)), 16);
    }

    #[test]
    fn vertical_gain() {
        let mut source = source(16, Rect::new(0, 100, 10, 200).unwrap());
        source.set_volume(1.0);
        assert_eq!(source.vertical_gain_for(Point::new(0, 100)), 1.0);
        assert_eq!(source.vertical_gain_for(Point::new(0, 200)), 0.5);
        assert_eq!(source.vertical_gain_for(Point::new(0, 250)), 0.25);
        source.set_volume(0.5);
        assert_eq!(source.vertical_gain_for(Point::new(0, 200)), 0.25);
    }

    #[test]
    fn load_missing_dir() {
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(SourceBuffer::load_dir("this/dir/does/not/exist", (1600, 900), &mut rng).is_err());
    }

    #[test]
    fn load_dir_with_files() {
        let dir = std::env::temp_dir().join(format!("grainfield-sources-{}", unique_usize_id()));
        std::fs::create_dir_all(&dir).unwrap();
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(dir.join("loop.wav"), spec).unwrap();
        for _ in 0..256 {
            writer.write_sample(1000i16).unwrap();
        }
        writer.finalize().unwrap();
        std::fs::write(dir.join("broken.wav"), b"not a wav file").unwrap();
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let mut rng = SmallRng::seed_from_u64(1);
        let sources = SourceBuffer::load_dir(&dir, (1600, 900), &mut rng).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(sources.len(), 1);
        let source = &sources[0];
        assert_eq!(source.name(), Some("loop"));
        assert_eq!(source.len(), 256);
        assert_eq!(source.placement().width(), SourceBuffer::DEFAULT_WIDTH);
        assert_eq!(source.placement().height(), SourceBuffer::DEFAULT_HEIGHT);
        assert!(source.placement().right() <= 1600);
        assert!(source.placement().bottom() <= 900);
    }
}
