//! Linear three phase Attack/Sustain/Decay envelope, advanced one sample at a time.

// -------------------------------------------------------------------------------------------------

/// Current processing phase of an [`Envelope`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopePhase {
    /// Ramping up from 0 to 1.
    #[default]
    Attack,
    /// Holding full amplitude.
    Sustain,
    /// Ramping down from 1 to 0.
    Decay,
}

// -------------------------------------------------------------------------------------------------

/// Amplitude envelope of a single grain, with durations given in samples.
///
/// The phase checks in [`Self::advance`] are deliberately not exclusive: a single call
/// falls through into the next phase as soon as the current one completed. Zero length
/// phases are therefore skipped within the same sample tick, and an envelope with all
/// durations set to zero stops on its very first advance.
///
/// The amplitude value only is meaningful while the envelope is running. Once the decay
/// completed, the last calculated amplitude stays around but should no longer be used.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    attack: usize,
    sustain: usize,
    decay: usize,
    phase: EnvelopePhase,
    elapsed: usize,
    total_elapsed: usize,
    amplitude: f32,
    running: bool,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl Envelope {
    /// Create a new, idle envelope with the given phase durations in samples.
    pub const fn new(attack: usize, sustain: usize, decay: usize) -> Self {
        Self {
            attack,
            sustain,
            decay,
            phase: EnvelopePhase::Attack,
            elapsed: 0,
            total_elapsed: 0,
            amplitude: 0.0,
            running: false,
        }
    }

    /// Create a new, idle envelope which copies the durations of the given one.
    /// The runtime state of `other` is not copied.
    pub const fn with_durations_of(other: &Envelope) -> Self {
        Self::new(other.attack, other.sustain, other.decay)
    }

    /// Attack duration in samples.
    pub fn attack(&self) -> usize {
        self.attack
    }
    /// Sustain duration in samples.
    pub fn sustain(&self) -> usize {
        self.sustain
    }
    /// Decay duration in samples.
    pub fn decay(&self) -> usize {
        self.decay
    }
    /// Sum of all phase durations in samples.
    pub fn length(&self) -> usize {
        self.attack + self.sustain + self.decay
    }

    /// The phase we're currently in.
    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }
    /// Samples elapsed since the current phase started.
    pub fn elapsed(&self) -> usize {
        self.elapsed
    }
    /// Samples elapsed since the last trigger.
    pub fn total_elapsed(&self) -> usize {
        self.total_elapsed
    }
    /// Last calculated amplitude in range [0, 1].
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }
    /// True after a trigger, until the decay phase completed.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Restart the envelope from the beginning of its attack phase.
    pub fn trigger(&mut self) {
        self.elapsed = 0;
        self.total_elapsed = 0;
        self.phase = EnvelopePhase::Attack;
        self.running = true;
    }

    /// Move the envelope forward by a single sample. Does nothing when not running.
    pub fn advance(&mut self) {
        if !self.running {
            return;
        }

        self.total_elapsed += 1;
        self.elapsed += 1;

        if self.phase == EnvelopePhase::Attack {
            if self.elapsed >= self.attack {
                self.phase = EnvelopePhase::Sustain;
                self.elapsed = 0;
            } else {
                self.amplitude = self.elapsed as f32 / self.attack as f32;
            }
        }

        if self.phase == EnvelopePhase::Sustain {
            if self.elapsed >= self.sustain {
                self.phase = EnvelopePhase::Decay;
                self.elapsed = 0;
            } else {
                self.amplitude = 1.0;
            }
        }

        if self.phase == EnvelopePhase::Decay {
            if self.elapsed >= self.decay {
                self.running = false;
            } else {
                self.amplitude = 1.0 - self.elapsed as f32 / self.decay as f32;
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
