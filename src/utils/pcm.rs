//! Conversion of normalized float samples into 16-bit signed PCM.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

// -------------------------------------------------------------------------------------------------

/// Size of a single 16-bit PCM sample in bytes.
pub const PCM16_BYTES_PER_SAMPLE: usize = 2;

// -------------------------------------------------------------------------------------------------

/// Byte order of encoded PCM samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmByteOrder {
    Little,
    Big,
}

impl Default for PcmByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

impl PcmByteOrder {
    /// The byte order of the host platform.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Convert a single float sample to a signed 16-bit value.
///
/// Samples get clamped to [-1, 1] first. Positive values scale with `i16::MAX`, negative ones
/// with the magnitude of `i16::MIN`, so both ends of the range are reachable. Fractions are
/// truncated towards zero.
#[inline]
pub fn sample_to_pcm16(sample: f32) -> i16 {
    let sample = sample.clamp(-1.0, 1.0);
    if sample >= 0.0 {
        (sample * i16::MAX as f32) as i16
    } else {
        (sample * -(i16::MIN as f32)) as i16
    }
}

// -------------------------------------------------------------------------------------------------

/// Convert the given float samples into 16-bit PCM bytes in the given byte order.
/// Interleaving of the input is preserved.
pub fn convert_to_pcm16(samples: &[f32], byte_order: PcmByteOrder) -> Vec<u8> {
    let mut bytes = vec![0; samples.len() * PCM16_BYTES_PER_SAMPLE];
    convert_to_pcm16_into(samples, &mut bytes, byte_order);
    bytes
}

/// Convert the given float samples into an existing byte buffer, without allocating.
///
/// Converts as many samples as fit into `bytes` and returns the number of bytes written.
pub fn convert_to_pcm16_into(samples: &[f32], bytes: &mut [u8], byte_order: PcmByteOrder) -> usize {
    match byte_order {
        PcmByteOrder::Little => write_samples::<LittleEndian>(samples, bytes),
        PcmByteOrder::Big => write_samples::<BigEndian>(samples, bytes),
    }
}

fn write_samples<B: ByteOrder>(samples: &[f32], bytes: &mut [u8]) -> usize {
    let mut written = 0;
    for (sample, chunk) in samples
        .iter()
        .zip(bytes.chunks_exact_mut(PCM16_BYTES_PER_SAMPLE))
    {
        B::write_i16(chunk, sample_to_pcm16(*sample));
        written += PCM16_BYTES_PER_SAMPLE;
    }
    written
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale() {
        assert_eq!(
            convert_to_pcm16(&[1.0, -1.0], PcmByteOrder::Little),
            vec![0xFF, 0x7F, 0x00, 0x80]
        );
        assert_eq!(
            convert_to_pcm16(&[1.0, -1.0], PcmByteOrder::Big),
            vec![0x7F, 0xFF, 0x80, 0x00]
        );
    }

    #[test]
    fn clamps_and_truncates() {
        assert_eq!(sample_to_pcm16(0.0), 0);
        assert_eq!(sample_to_pcm16(2.5), i16::MAX);
        assert_eq!(sample_to_pcm16(-7.0), i16::MIN);
        assert_eq!(sample_to_pcm16(0.5), 16383);
        assert_eq!(sample_to_pcm16(-0.5), -16384);
    }

    #[test]
    fn native_order() {
        let bytes = convert_to_pcm16(&[0.25], PcmByteOrder::default());
        let value = sample_to_pcm16(0.25);
        assert_eq!(bytes, value.to_ne_bytes().to_vec());
    }

    #[test]
    fn into_short_buffer() {
        let mut bytes = [0u8; 3];
        let written = convert_to_pcm16_into(&[1.0, 1.0], &mut bytes, PcmByteOrder::Little);
        assert_eq!(written, 2);
        assert_eq!(bytes, [0xFF, 0x7F, 0x00]);
    }
}
