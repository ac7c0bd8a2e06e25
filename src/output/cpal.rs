use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    StreamConfig,
};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::{
    error::Error,
    output::{render_block, OutputDevice},
    player::AudioSource,
    utils::pcm::sample_to_pcm16,
};

// -------------------------------------------------------------------------------------------------

const PREFERRED_SAMPLE_FORMAT: cpal::SampleFormat = cpal::SampleFormat::I16;
const PREFERRED_BUFFER_SIZE: cpal::BufferSize = if cfg!(debug_assertions) {
    cpal::BufferSize::Default
} else {
    cpal::BufferSize::Fixed(2048)
};

/// Size of the float render buffer in frames. Larger device buffers are rendered in chunks.
const RENDER_BUFFER_FRAMES: usize = 4096;

// -------------------------------------------------------------------------------------------------

/// Real-time output on the system's default audio device.
///
/// The device stream lives on its own thread, as cpal streams can't be moved across threads
/// on all platforms. The source gets rendered within the device's audio callback.
pub struct CpalOutput {
    channel_count: usize,
    sample_rate: u32,
    state: Arc<CallbackState>,
    stream_send: Sender<StreamMsg>,
    stream_thread: Option<thread::JoinHandle<()>>,
}

impl CpalOutput {
    /// Open the default output device and start playing the given source.
    pub fn open<S: AudioSource>(source: S) -> Result<Self, Error> {
        let channel_count = source.channel_count();
        let sample_rate = source.sample_rate();
        let state = Arc::new(CallbackState {
            running: AtomicBool::new(true),
            playback_pos: AtomicU64::new(0),
        });

        let (stream_send, stream_recv) = bounded::<StreamMsg>(16);
        let (opened_send, opened_recv) = bounded::<Result<(), Error>>(1);

        let stream_thread = thread::Builder::new()
            .name("audio_output".to_string())
            .spawn({
                let state = Arc::clone(&state);
                move || {
                    let stream = match Stream::open(source, state) {
                        Ok(stream) => {
                            let _ = opened_send.send(Ok(()));
                            stream
                        }
                        Err(err) => {
                            let _ = opened_send.send(Err(err));
                            return;
                        }
                    };
                    stream.run(stream_recv);
                }
            })?;

        // wait until the stream got opened, passing on device errors
        opened_recv
            .recv()
            .map_err(|err| Error::OutputDeviceError(Box::new(err)))??;

        Ok(Self {
            channel_count,
            sample_rate,
            state,
            stream_send,
            stream_thread: Some(stream_thread),
        })
    }

    fn send_to_stream(&self, msg: StreamMsg) {
        if self.stream_send.send(msg).is_err() {
            log::error!("output stream thread is dead");
        }
    }
}

impl OutputDevice for CpalOutput {
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
        self.state.running.load(Ordering::Relaxed)
    }

    fn pause(&mut self) {
        self.state.running.store(false, Ordering::Relaxed);
        self.send_to_stream(StreamMsg::Pause);
    }

    fn resume(&mut self) {
        self.state.running.store(true, Ordering::Relaxed);
        self.send_to_stream(StreamMsg::Resume);
    }

    fn close(&mut self) {
        if let Some(stream_thread) = self.stream_thread.take() {
            self.state.running.store(false, Ordering::Relaxed);
            self.send_to_stream(StreamMsg::Close);
            if stream_thread.join().is_err() {
                log::error!("output stream thread panicked");
            }
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

// -------------------------------------------------------------------------------------------------

enum StreamMsg {
    Pause,
    Resume,
    Close,
}

struct Stream {
    stream: cpal::Stream,
    _device: cpal::Device,
}

impl Stream {
    fn open<S: AudioSource>(source: S, state: Arc<CallbackState>) -> Result<Self, Error> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(cpal::DefaultStreamConfigError::DeviceNotAvailable)?;
        if let Ok(name) = device.name() {
            log::info!("using audio device: {name}");
        }

        let supported = Self::preferred_output_config(&device, &source)?;
        if supported.channels() as usize != source.channel_count()
            || supported.sample_rate().0 != source.sample_rate()
        {
            return Err(Error::OutputDeviceError(
                format!(
                    "device does not support {} channels at {} Hz",
                    source.channel_count(),
                    source.sample_rate()
                )
                .into(),
            ));
        }
        let config = StreamConfig {
            buffer_size: PREFERRED_BUFFER_SIZE,
            ..supported.config()
        };

        let mut callback = StreamCallback {
            buffer: vec![0.0; RENDER_BUFFER_FRAMES * source.channel_count()],
            source: Box::new(source),
            state,
        };

        log::info!("opening output stream: {config:?}");
        let on_error = |err: cpal::StreamError| log::error!("audio output error: {err}");
        let stream = match supported.sample_format() {
            cpal::SampleFormat::I16 => device.build_output_stream(
                &config,
                move |output: &mut [i16], _| callback.write_pcm16(output),
                on_error,
                None,
            )?,
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config,
                move |output: &mut [f32], _| callback.write_f32(output),
                on_error,
                None,
            )?,
            format => {
                return Err(Error::OutputDeviceError(
                    format!("unsupported device sample format: {format:?}").into(),
                ))
            }
        };
        stream.play()?;

        Ok(Self {
            stream,
            _device: device,
        })
    }

    fn preferred_output_config<S: AudioSource>(
        device: &cpal::Device,
        source: &S,
    ) -> Result<cpal::SupportedStreamConfig, Error> {
        let sample_rate = cpal::SampleRate(source.sample_rate());
        for s in device.supported_output_configs()? {
            let rates = s.min_sample_rate()..=s.max_sample_rate();
            if s.channels() as usize == source.channel_count()
                && s.sample_format() == PREFERRED_SAMPLE_FORMAT
                && rates.contains(&sample_rate)
            {
                return Ok(s.with_sample_rate(sample_rate));
            }
        }
        Ok(device.default_output_config()?)
    }

    fn run(self, stream_recv: Receiver<StreamMsg>) {
        // runs until closed or until the output got dropped
        while let Ok(msg) = stream_recv.recv() {
            match msg {
                StreamMsg::Pause => {
                    log::debug!("pausing audio output stream");
                    if let Err(err) = self.stream.pause() {
                        log::error!("failed to pause stream: {err}");
                    }
                }
                StreamMsg::Resume => {
                    log::debug!("resuming audio output stream");
                    if let Err(err) = self.stream.play() {
                        log::error!("failed to start stream: {err}");
                    }
                }
                StreamMsg::Close => break,
            }
        }
        log::debug!("closing audio output stream");
        let _ = self.stream.pause();
    }
}

// -------------------------------------------------------------------------------------------------

struct CallbackState {
    running: AtomicBool,
    playback_pos: AtomicU64,
}

struct StreamCallback {
    source: Box<dyn AudioSource>,
    buffer: Vec<f32>,
    state: Arc<CallbackState>,
}

impl StreamCallback {
    fn write_pcm16(&mut self, output: &mut [i16]) {
        for chunk in output.chunks_mut(self.buffer.len()) {
            let rendered = self.render(chunk.len());
            for (o, s) in chunk.iter_mut().zip(rendered) {
                *o = sample_to_pcm16(*s);
            }
        }
    }

    fn write_f32(&mut self, output: &mut [f32]) {
        for chunk in output.chunks_mut(self.buffer.len()) {
            let rendered = self.render(chunk.len());
            chunk.copy_from_slice(rendered);
        }
    }

    fn render(&mut self, len: usize) -> &[f32] {
        let buffer = &mut self.buffer[..len];
        if self.state.running.load(Ordering::Relaxed) {
            render_block(self.source.as_mut(), buffer);
            self.state
                .playback_pos
                .fetch_add(len as u64, Ordering::Relaxed);
        } else {
            buffer.iter_mut().for_each(|s| *s = 0.0);
        }
        buffer
    }
}

// -------------------------------------------------------------------------------------------------

impl From<cpal::DefaultStreamConfigError> for Error {
    fn from(err: cpal::DefaultStreamConfigError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::SupportedStreamConfigsError> for Error {
    fn from(err: cpal::SupportedStreamConfigsError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::BuildStreamError> for Error {
    fn from(err: cpal::BuildStreamError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::PlayStreamError> for Error {
    fn from(err: cpal::PlayStreamError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}
