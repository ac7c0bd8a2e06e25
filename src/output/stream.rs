use std::{
    io::Write,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};

use crate::{
    config::EngineConfig,
    error::Error,
    output::{render_block, OutputDevice},
    player::AudioSource,
    utils::pcm::{convert_to_pcm16_into, PcmByteOrder, PCM16_BYTES_PER_SAMPLE},
};

// -------------------------------------------------------------------------------------------------

/// Output device, which streams raw 16-bit PCM bytes into any writer, e.g. a pipe into an
/// external player or a socket.
///
/// A render thread converts blocks of `block_frames` frames into PCM bytes and queues them
/// for a writer thread. At most `lookahead_blocks` blocks are queued at once: the render
/// thread refills the queue as soon as the writer consumed a block. Byte buffers circulate
/// between both threads, so no memory is allocated after opening the stream.
///
/// Unlike the wav output, the stream output starts running immediately.
pub struct PcmStreamOutput {
    channel_count: usize,
    sample_rate: u32,
    state: Arc<StreamState>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl PcmStreamOutput {
    /// Open a stream with the default block size and lookahead, writing in the host's
    /// native byte order.
    pub fn open<W, S>(writer: W, source: S) -> Result<Self, Error>
    where
        W: Write + Send + 'static,
        S: AudioSource,
    {
        Self::open_with_config(writer, source, &EngineConfig::default(), PcmByteOrder::native())
    }

    /// Open a stream with the block size and lookahead of the given config.
    pub fn open_with_config<W, S>(
        mut writer: W,
        mut source: S,
        config: &EngineConfig,
        byte_order: PcmByteOrder,
    ) -> Result<Self, Error>
    where
        W: Write + Send + 'static,
        S: AudioSource,
    {
        config.validate()?;
        let channel_count = source.channel_count();
        let sample_rate = source.sample_rate();
        let block_samples = config.block_frames * channel_count;
        let lookahead = config.lookahead_blocks.max(1);

        let state = Arc::new(StreamState {
            running: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            playback_pos: AtomicU64::new(0),
        });

        // blocks ready to be written and blocks ready to be refilled
        let (filled_send, filled_recv) = bounded::<Vec<u8>>(lookahead);
        let (free_send, free_recv) = bounded::<Vec<u8>>(lookahead + 1);
        for _ in 0..lookahead + 1 {
            let _ = free_send.send(vec![0; block_samples * PCM16_BYTES_PER_SAMPLE]);
        }

        log::info!(
            "opening pcm stream: {channel_count} channels at {sample_rate} Hz, \
            {} frames per block, {lookahead} blocks lookahead",
            config.block_frames
        );

        let render_thread = thread::Builder::new()
            .name("pcm_render".to_string())
            .spawn({
                let state = Arc::clone(&state);
                let mut samples = vec![0.0; block_samples];
                move || {
                    if let Err(err) = audio_thread_priority::promote_current_thread_to_real_time(
                        block_samples as u32 / channel_count.max(1) as u32,
                        sample_rate,
                    ) {
                        log::warn!("failed to promote render thread to audio priority: {err}");
                    }
                    Self::render(&mut source, &mut samples, byte_order, &state, &free_recv, &filled_send);
                }
            })?;

        let write_thread = thread::Builder::new()
            .name("pcm_write".to_string())
            .spawn({
                let state = Arc::clone(&state);
                move || {
                    for bytes in filled_recv.iter() {
                        if let Err(err) = writer.write_all(&bytes) {
                            log::error!("failed to write pcm stream: {err}");
                            state.closed.store(true, Ordering::Relaxed);
                            break;
                        }
                        if free_send.send(bytes).is_err() {
                            break;
                        }
                    }
                    if let Err(err) = writer.flush() {
                        log::error!("failed to flush pcm stream: {err}");
                    }
                }
            })?;

        Ok(Self {
            channel_count,
            sample_rate,
            state,
            threads: vec![render_thread, write_thread],
        })
    }

    fn render<S: AudioSource>(
        source: &mut S,
        samples: &mut [f32],
        byte_order: PcmByteOrder,
        state: &StreamState,
        free_recv: &Receiver<Vec<u8>>,
        filled_send: &Sender<Vec<u8>>,
    ) {
        const POLL_INTERVAL: Duration = Duration::from_millis(10);

        while !state.closed.load(Ordering::Relaxed) {
            if !state.running.load(Ordering::Relaxed) {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            let Ok(mut bytes) = free_recv.recv_timeout(POLL_INTERVAL) else {
                continue;
            };
            render_block(source, samples);
            convert_to_pcm16_into(samples, &mut bytes, byte_order);
            state
                .playback_pos
                .fetch_add(samples.len() as u64, Ordering::Relaxed);

            // block until the writer consumed a block or the stream got closed
            loop {
                match filled_send.send_timeout(bytes, POLL_INTERVAL) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Timeout(pending)) => {
                        if state.closed.load(Ordering::Relaxed) {
                            return;
                        }
                        bytes = pending;
                    }
                    Err(SendTimeoutError::Disconnected(_)) => return,
                }
            }
        }
    }
}

impl OutputDevice for PcmStreamOutput {
    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn sample_position(&self) -> u64 {
        self.state.playback_pos.load(Ordering::Relaxed)
    }

    fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Relaxed) && !self.state.closed.load(Ordering::Relaxed)
    }

    fn pause(&mut self) {
        self.state.running.store(false, Ordering::Relaxed);
    }

    fn resume(&mut self) {
        self.state.running.store(true, Ordering::Relaxed);
    }

    fn close(&mut self) {
        self.state.closed.store(true, Ordering::Relaxed);
        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                log::error!("pcm stream thread panicked");
            }
        }
    }
}

impl Drop for PcmStreamOutput {
    fn drop(&mut self) {
        self.close();
    }
}

// -------------------------------------------------------------------------------------------------

struct StreamState {
    running: AtomicBool,
    closed: AtomicBool,
    playback_pos: AtomicU64,
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    /// Writer which collects all bytes into a shared buffer.
    #[derive(Clone, Default)]
    struct SharedWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

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
    fn streams_pcm_blocks() {
        let writer = SharedWriter::default();
        let config = EngineConfig::default()
            .with_block_frames(64)
            .with_lookahead_blocks(2);
        let mut output = PcmStreamOutput::open_with_config(
            writer.clone(),
            ConstantSource(1.0),
            &config,
            PcmByteOrder::Little,
        )
        .unwrap();
        assert!(output.is_running());

        // wait until a few blocks got written
        for _ in 0..500 {
            if writer.0.lock().unwrap().len() >= 4 * 64 * 2 * 2 {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        output.close();
        assert!(!output.is_running());

        let bytes = writer.0.lock().unwrap();
        assert!(bytes.len() >= 4 * 64 * 2 * 2);
        assert_eq!(bytes.len() % (64 * 2 * 2), 0);
        assert!(bytes.chunks_exact(2).all(|chunk| chunk == [0xFF, 0x7F]));
        assert!(output.sample_position() >= (bytes.len() / 2) as u64);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig::default().with_block_frames(0);
        assert!(PcmStreamOutput::open_with_config(
            Vec::new(),
            ConstantSource(0.0),
            &config,
            PcmByteOrder::Little
        )
        .is_err());
    }
}
