//! Audio sinks, which pull blocks from an [`AudioSource`] and play or store them.

#[cfg(feature = "cpal-output")]
pub mod cpal;
pub mod stream;
#[cfg(feature = "wav-output")]
pub mod wav;

#[cfg(feature = "assert-allocs")]
use assert_no_alloc::assert_no_alloc;

use crate::{player::AudioSource, utils::buffer::clear_buffer};

// -------------------------------------------------------------------------------------------------

/// Common controls of all output devices.
pub trait OutputDevice {
    /// Actual output channel count.
    fn channel_count(&self) -> usize;
    /// Actual output sample rate.
    fn sample_rate(&self) -> u32;
    /// Number of **samples** (NOT frames) rendered so far.
    fn sample_position(&self) -> u64;

    /// True while the output is rendering.
    fn is_running(&self) -> bool;
    /// Pause rendering, without dropping the source.
    fn pause(&mut self);
    /// Resume from paused rendering.
    fn resume(&mut self);

    /// Stop rendering and release the device.
    fn close(&mut self);
}

// -------------------------------------------------------------------------------------------------

/// Render a single block from the given source: apply its pending messages, then write the
/// block. Unwritten samples get muted. Returns the number of written samples.
///
/// With the `assert-allocs` feature, the write is checked to not allocate.
pub(crate) fn render_block<S: AudioSource + ?Sized>(source: &mut S, output: &mut [f32]) -> usize {
    source.process_messages();

    #[cfg(feature = "assert-allocs")]
    let written = assert_no_alloc(|| source.write(output));
    #[cfg(not(feature = "assert-allocs"))]
    let written = source.write(output);

    clear_buffer(&mut output[written..]);
    written
}
