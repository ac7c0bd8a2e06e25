//! Decodes audio files into interleaved, normalized float sample buffers.

use std::{fs::File, io, path::Path};

use symphonia::core::{
    audio::{SampleBuffer, SignalSpec},
    codecs::{CodecParameters, Decoder, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

use crate::error::Error;

// -------------------------------------------------------------------------------------------------

/// A fully decoded audio file.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved, normalized samples.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channel_count: usize,
}

// -------------------------------------------------------------------------------------------------

/// Thin wrapper around a symphonia format reader and decoder for a file's default track.
pub struct AudioDecoder {
    track_id: u32,
    decoder: Box<dyn Decoder>,
    format: Box<dyn FormatReader>,
}

impl AudioDecoder {
    /// Create a new decoder from the given file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path.as_ref()).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                Error::MediaFileNotFound
            } else {
                Error::IoError(err)
            }
        })?;
        let source_stream = MediaSourceStream::new(Box::new(file), Default::default());
        Self::from_source_stream(source_stream)
    }

    /// Create a new decoder from the given in-memory file buffer.
    pub fn from_buffer(buffer: Vec<u8>) -> Result<Self, Error> {
        let cursor = Box::new(io::Cursor::new(buffer));
        let source_stream = MediaSourceStream::new(cursor, Default::default());
        Self::from_source_stream(source_stream)
    }

    /// Create a new decoder from the given Symphonia MediaSourceStream
    pub fn from_source_stream(source_stream: MediaSourceStream) -> Result<Self, Error> {
        // Unused hint to help the format registry guess what format reader is appropriate.
        let hint = Hint::new();

        // Use the default options when reading and decoding.
        let format_opts: FormatOptions = Default::default();
        let metadata_opts: MetadataOptions = Default::default();
        let decoder_opts: DecoderOptions = Default::default();

        // Probe the media source stream for a format.
        let probed = symphonia::default::get_probe()
            .format(&hint, source_stream, &format_opts, &metadata_opts)
            .map_err(|_| Error::MediaFileProbeError)?;

        let format = probed.format;

        let track = format.default_track().ok_or(Error::MediaFileProbeError)?;
        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &decoder_opts)
            .map_err(|err| Error::AudioDecodingError(Box::new(err)))?;

        Ok(Self {
            track_id,
            decoder,
            format,
        })
    }

    pub fn codec_params(&self) -> &CodecParameters {
        self.decoder.codec_params()
    }

    pub fn signal_spec(&self) -> Result<SignalSpec, Error> {
        let params = self.codec_params();
        match (params.sample_rate, params.channels) {
            (Some(rate), Some(channels)) => Ok(SignalSpec { rate, channels }),
            _ => Err(Error::MediaFileProbeError),
        }
    }

    /// Decode all remaining packets of the track into a single interleaved buffer.
    pub fn decode_all(&mut self) -> Result<DecodedAudio, Error> {
        let spec = self.signal_spec()?;

        let mut samples = Vec::new();
        let mut packet_samples: Option<(SampleBuffer<f32>, usize)> = None;
        loop {
            // Demux an encoded packet from the media format.
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    break; // End of this stream.
                }
                Err(err) => {
                    return Err(Error::AudioDecodingError(Box::new(err)));
                }
            };
            // If the packet does not belong to the selected track, skip over it.
            if packet.track_id() != self.track_id {
                continue;
            }
            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let frames = decoded.capacity();
                    if packet_samples
                        .as_ref()
                        .is_none_or(|(_, capacity)| *capacity < frames)
                    {
                        packet_samples =
                            Some((SampleBuffer::new(frames as u64, *decoded.spec()), frames));
                    }
                    if let Some((buffer, _)) = packet_samples.as_mut() {
                        buffer.copy_interleaved_ref(decoded);
                        samples.extend_from_slice(buffer.samples());
                    }
                }
                Err(SymphoniaError::IoError(err)) => {
                    // The packet failed to decode due to an IO error, skip the packet.
                    log::warn!("io decode error: {err}");
                    continue;
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    // The packet failed to decode due to invalid data, skip the packet.
                    log::warn!("decode error: {err}");
                    continue;
                }
                Err(err) => {
                    return Err(Error::AudioDecodingError(Box::new(err)));
                }
            }
        }

        Ok(DecodedAudio {
            samples,
            sample_rate: spec.rate,
            channel_count: spec.channels.count(),
        })
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file() {
        assert!(matches!(
            AudioDecoder::from_file("this/file/does/not/exist.wav"),
            Err(Error::MediaFileNotFound)
        ));
    }

    #[test]
    fn garbage_buffer() {
        assert!(matches!(
            AudioDecoder::from_buffer(vec![0x13; 128]),
            Err(Error::MediaFileProbeError)
        ));
    }

    #[test]
    fn decode_wav_buffer() {
        // write a tiny 16-bit stereo wav into memory
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..64 {
                writer.write_sample(i16::MAX / 2).unwrap();
                writer.write_sample(i16::MIN / 2).unwrap();
            }
            writer.finalize().unwrap();
        }

        let mut decoder = AudioDecoder::from_buffer(cursor.into_inner()).unwrap();
        let decoded = decoder.decode_all().unwrap();
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.channel_count, 2);
        assert_eq!(decoded.samples.len(), 128);
        assert!((decoded.samples[0] - 0.5).abs() < 0.001);
        assert!((decoded.samples[1] + 0.5).abs() < 0.001);
    }
}
