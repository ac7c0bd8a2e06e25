//! Single grain playback unit and the grain cloud scheduler.

pub mod cloud;

use crate::utils::{envelope::Envelope, rect::Point};

// -------------------------------------------------------------------------------------------------

/// A short, enveloped snippet of audio.
///
/// A grain owns its envelope and a scratch buffer with the already mixed source audio it
/// plays back. The buffer has to be filled by the owner right after [`Self::trigger`]: the
/// grain itself knows nothing about the sources it plays. The envelope's total elapsed
/// sample count is the playback cursor into the buffer.
///
/// The scratch buffer's allocation is kept for the grain's whole lifetime: triggers and
/// releases only change its length, so retriggering a grain with an unchanged envelope never
/// allocates.
#[derive(Debug, Clone)]
pub struct Grain {
    envelope: Envelope,
    buffer: Vec<f32>,
    position: Point,
}

impl Grain {
    /// Create a new, idle grain with the given envelope. The buffer is preallocated to fit
    /// the envelope's length.
    pub fn new(envelope: Envelope) -> Self {
        let buffer = Vec::with_capacity(envelope.length());
        Self {
            envelope,
            buffer,
            position: Point::default(),
        }
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Replace the envelope with an idle copy of the given template's durations.
    ///
    /// This stops the grain. Its buffer is released with the next [`Self::advance`].
    pub fn set_envelope(&mut self, template: &Envelope) {
        self.envelope = Envelope::with_durations_of(template);
        self.buffer
            .reserve(self.envelope.length().saturating_sub(self.buffer.len()));
    }

    /// Grain length in samples: the total envelope length.
    pub fn length(&self) -> usize {
        self.envelope.length()
    }

    /// Current playback position in the buffer.
    pub fn index(&self) -> usize {
        self.envelope.total_elapsed()
    }

    /// Position on the playfield at which the grain got triggered.
    pub fn position(&self) -> Point {
        self.position
    }

    pub fn is_active(&self) -> bool {
        self.envelope.is_running()
    }

    pub fn current_amplitude(&self) -> f32 {
        self.envelope.amplitude()
    }

    /// Buffer sample at the given index, or silence when the index is out of bounds.
    #[inline]
    pub fn sample_at(&self, index: usize) -> f32 {
        self.buffer.get(index).copied().unwrap_or(0.0)
    }

    /// Enveloped sample at the current playback position.
    #[inline]
    pub fn current_sample(&self) -> f32 {
        self.sample_at(self.index()) * self.current_amplitude()
    }

    pub fn buffer(&self) -> &[f32] {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut [f32] {
        &mut self.buffer
    }

    /// Start playing the grain at the given position, with a zeroed buffer of the grain's
    /// length, which needs to be filled in by the caller.
    pub fn trigger(&mut self, position: Point) {
        self.position = position;
        self.buffer.clear();
        self.buffer.resize(self.envelope.length(), 0.0);
        self.envelope.trigger();
    }

    /// Move forward by a single sample. Releases the buffer as soon as the envelope stopped.
    pub fn advance(&mut self) {
        self.envelope.advance();
        if !self.envelope.is_running() {
            self.buffer.clear();
        }
    }

    /// Turn this grain into a fresh, idle one with the given template's envelope durations.
    pub(crate) fn reset(&mut self, template: &Envelope) {
        self.set_envelope(template);
        self.buffer.clear();
        self.position = Point::default();
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_grain() {
        let grain = Grain::new(Envelope::new(2, 4, 2));
        assert!(!grain.is_active());
        assert_eq!(grain.length(), 8);
        assert!(grain.buffer().is_empty());
        assert_eq!(grain.sample_at(0), 0.0);
        assert_eq!(grain.current_sample(), 0.0);
    }

    #[test]
    fn trigger_and_release() {
        let mut grain = Grain::new(Envelope::new(1, 2, 1));
        grain.trigger(Point::new(3, 4));
        assert!(grain.is_active());
        assert_eq!(grain.position(), Point::new(3, 4));
        assert_eq!(grain.buffer(), &[0.0; 4]);
        assert_eq!(grain.index(), 0);

        grain.buffer_mut().copy_from_slice(&[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(grain.sample_at(3), 0.4);
        assert_eq!(grain.sample_at(4), 0.0);

        let mut played = Vec::new();
        while grain.is_active() {
            grain.advance();
            if grain.is_active() {
                played.push(grain.current_sample());
            }
        }
        // attack reaches full amplitude on the first sample, then sustain
        assert_eq!(played, vec![0.2, 0.3, 0.4]);
        assert!(grain.buffer().is_empty());
        assert_eq!(grain.current_sample(), 0.0);
    }

    #[test]
    fn retrigger_keeps_allocation() {
        let mut grain = Grain::new(Envelope::new(4, 8, 4));
        grain.trigger(Point::default());
        let capacity = grain.buffer.capacity();
        assert!(capacity >= 16);
        for _ in 0..32 {
            grain.advance();
        }
        assert!(grain.buffer().is_empty());
        grain.trigger(Point::default());
        assert_eq!(grain.buffer().len(), 16);
        assert_eq!(grain.buffer.capacity(), capacity);
    }

    #[test]
    fn new_envelope_stops_grain() {
        let mut grain = Grain::new(Envelope::new(2, 2, 2));
        grain.trigger(Point::default());
        grain.advance();
        assert!(grain.is_active());

        grain.set_envelope(&Envelope::new(10, 10, 10));
        assert!(!grain.is_active());
        assert_eq!(grain.length(), 30);
        // buffer gets released with the next advance
        assert_eq!(grain.buffer().len(), 6);
        grain.advance();
        assert!(grain.buffer().is_empty());
    }
}
