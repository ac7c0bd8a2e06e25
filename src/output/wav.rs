use std::{
    fs::File,
    io::BufWriter,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
    thread,
    time::Duration,
};

use crossbeam_channel::{bounded, Receiver};
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::{
    config::EngineConfig,
    error::Error,
    output::{render_block, OutputDevice},
    player::AudioSource,
    utils::pcm::sample_to_pcm16,
};

// -------------------------------------------------------------------------------------------------

/// Output device, which renders a source into a 16-bit PCM wav file instead of playing it back.
///
/// NOTE: Unlike the other output devices, the wav output device is initially paused, so it
/// must be resumed manually after everything you want to render got set up. Rendering runs
/// as fast as possible on a background thread.
pub struct WavOutput {
    stream: Arc<Mutex<WavStream>>,
    finished: Receiver<()>,
}

impl WavOutput {
    /// Open a wav output which renders the given source into the given file, with the
    /// default block size.
    ///
    /// * `file_path`: Target file path. Should end with ".wav" extension.
    /// * `source`: The source to render. Its channel layout and rate define the file's specs.
    /// * `duration`: Max length of the written content. Renders until closed when `None`.
    pub fn open<P: AsRef<Path>, S: AudioSource>(
        file_path: P,
        source: S,
        duration: Option<Duration>,
    ) -> Result<Self, Error> {
        Self::open_with_config(file_path, source, duration, &EngineConfig::default())
    }

    /// Open a wav output, using the block size of the given config.
    pub fn open_with_config<P: AsRef<Path>, S: AudioSource>(
        file_path: P,
        source: S,
        duration: Option<Duration>,
        config: &EngineConfig,
    ) -> Result<Self, Error> {
        let channel_count = source.channel_count();
        let sample_rate = source.sample_rate();
        let spec = WavSpec {
            channels: channel_count as u16,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(file_path.as_ref(), spec)?;
        log::info!(
            "rendering into wav file '{}': {channel_count} channels at {sample_rate} Hz",
            file_path.as_ref().display()
        );

        let stream = Arc::new(Mutex::new(WavStream {
            writer: Some(writer),
            channel_count,
            sample_rate,
            source: Box::new(source),
            buffer: vec![0.0; config.block_frames.max(1) * channel_count],
            max_samples: duration.map(|duration| {
                (duration.as_secs_f64() * sample_rate as f64) as u64 * channel_count as u64
            }),
            started: false,
            finished: false,
            playback_pos: 0,
        }));

        let (finished_send, finished) = bounded(1);

        // Render in a new detached thread
        thread::Builder::new()
            .name("wav_output".to_string())
            .spawn({
                let stream = Arc::clone(&stream);
                move || {
                    loop {
                        let running = {
                            let mut stream = lock_stream(&stream);
                            if let Err(err) = stream.process() {
                                log::error!("failed to render wav output: {err}");
                                stream.finished = true;
                            }
                            if stream.finished {
                                stream.started = false;
                                break;
                            }
                            stream.started
                        };
                        if !running {
                            // avoid busy waiting while paused
                            thread::sleep(Duration::from_millis(1));
                        }
                    }
                    // Finalize the wav file when done
                    if let Some(writer) = lock_stream(&stream).writer.take() {
                        if let Err(err) = writer.finalize() {
                            log::error!("failed to finalize wav file: {err}");
                        }
                    }
                    let _ = finished_send.send(());
                }
            })?;

        Ok(Self { stream, finished })
    }

    /// Block until the duration got rendered or the output got closed.
    pub fn wait_until_finished(&self) {
        let _ = self.finished.recv();
    }

    fn stream(&self) -> MutexGuard<'_, WavStream> {
        lock_stream(&self.stream)
    }
}

impl OutputDevice for WavOutput {
    fn channel_count(&self) -> usize {
        self.stream().channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.stream().sample_rate
    }

    fn sample_position(&self) -> u64 {
        self.stream().playback_pos
    }

    fn is_running(&self) -> bool {
        self.stream().started
    }

    fn pause(&mut self) {
        self.stream().started = false;
    }

    fn resume(&mut self) {
        let mut stream = self.stream();
        stream.started = !stream.finished;
    }

    fn close(&mut self) {
        self.stream().finished = true;
    }
}

impl Drop for WavOutput {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock_stream(stream: &Mutex<WavStream>) -> MutexGuard<'_, WavStream> {
    stream.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// -------------------------------------------------------------------------------------------------

struct WavStream {
    writer: Option<WavWriter<BufWriter<File>>>,
    channel_count: usize,
    sample_rate: u32,
    source: Box<dyn AudioSource>,
    buffer: Vec<f32>,
    max_samples: Option<u64>,
    started: bool,
    finished: bool,
    playback_pos: u64,
}

impl WavStream {
    fn process(&mut self) -> Result<(), Error> {
        // Do nothing when we didn't start yet
        if !self.started || self.finished {
            return Ok(());
        }

        // Limit the block to the remaining duration
        let mut block_len = self.buffer.len();
        if let Some(max_samples) = self.max_samples {
            let remaining = max_samples.saturating_sub(self.playback_pos);
            if remaining == 0 {
                self.finished = true;
                return Ok(());
            }
            block_len = block_len.min(remaining as usize);
        }

        let block = &mut self.buffer[..block_len];
        render_block(self.source.as_mut(), block);

        if let Some(writer) = self.writer.as_mut() {
            for sample in block.iter() {
                writer.write_sample(sample_to_pcm16(*sample))?;
            }
        }

        self.playback_pos += block_len as u64;
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use crate::utils::unique_usize_id;

    struct ConstantSource(f32);

    impl AudioSource for ConstantSource {
        fn write(&mut self, output: &mut [f32]) -> usize {
            output.iter_mut().for_each(|s| *s = self.0);
            output.len()
        }
        fn channel_count(&self) -> usize {
            2
        }
        fn sample_rate(&self) -> u32 {
            44100
        }
    }

    #[test]
    fn renders_duration() {
        let path = std::env::temp_dir().join(format!("grainfield-wav-{}.wav", unique_usize_id()));
        let mut output = WavOutput::open_with_config(
            &path,
            ConstantSource(0.5),
            Some(Duration::from_millis(100)),
            &EngineConfig::default().with_block_frames(1000),
        )
        .unwrap();
        assert!(!output.is_running());
        output.resume();
        output.wait_until_finished();
        assert!(!output.is_running());
        assert_eq!(output.sample_position(), 8820);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.spec().channels, 2);
        let samples = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(samples.len(), 8820);
        assert!(samples.iter().all(|s| *s == 16383));
    }
}
