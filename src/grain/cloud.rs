use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    config::EngineConfig,
    grain::Grain,
    source::SourceBuffer,
    utils::{
        buffer::screen_blend,
        envelope::Envelope,
        rect::{Point, Rect},
        unique_usize_id,
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Unique id of a [`GrainCloud`] within a playfield.
pub type CloudId = usize;

/// Size of the visual grain marker. Trigger positions are picked so that a marker of this
/// size, drawn at the grain's position, stays within the cloud's placement.
pub const GRAIN_MARKER_SIZE: i32 = 16;

// -------------------------------------------------------------------------------------------------

/// Scheduling parameters of a [`GrainCloud`].
#[derive(Debug, Clone, PartialEq)]
pub struct CloudParameters {
    /// Number of grains in the cloud.
    pub density: usize,
    /// Number of samples between two cloud wide grain retriggers.
    pub interval: usize,
    /// Envelope template for all grains. Its durations define the grain length.
    pub envelope: Envelope,
}

impl Default for CloudParameters {
    fn default() -> Self {
        Self::from_millis(3, 50, 5, 40, 5, &EngineConfig::default())
    }
}

impl CloudParameters {
    /// Create new parameters from durations in milliseconds, converted to interleaved sample
    /// counts with the given config's sample rate and channel layout.
    pub fn from_millis(
        density: usize,
        interval_ms: u32,
        attack_ms: u32,
        sustain_ms: u32,
        decay_ms: u32,
        config: &EngineConfig,
    ) -> Self {
        Self {
            density,
            interval: config.millis_to_samples(interval_ms),
            envelope: Envelope::new(
                config.millis_to_samples(attack_ms),
                config.millis_to_samples(sustain_ms),
                config.millis_to_samples(decay_ms),
            ),
        }
    }

    /// Validate all parameters.
    pub fn validate(&self) -> Result<(), Error> {
        if self.interval == 0 {
            return Err(Error::ParameterError(
                "Cloud interval must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// Schedules and mixes a pool of grains, which spatially sample all sources overlapping the
/// cloud's placement.
///
/// Grains live in a fixed pool: the first `density` slots are live, the remaining ones are
/// idle spares, kept around so that density changes don't need to allocate on the audio
/// thread. Density changes get applied at the start of the next tick.
///
/// Every `interval` ticks all live grains get retriggered at once, each at a new random
/// position within the cloud's placement. A grain's buffer then gets filled from every
/// source whose placement contains the grain's position: the horizontal position selects
/// the offset into the source, the vertical position the gain.
#[derive(Debug, Clone)]
pub struct GrainCloud {
    id: CloudId,
    placement: Rect,
    density: usize,
    interval: usize,
    envelope: Envelope,
    grains: Vec<Grain>,
    live_grains: usize,
    elapsed: usize,
    current_sample: f32,
    rng: SmallRng,
}

impl GrainCloud {
    /// Create a new cloud with the given placement, parameters and random generator for
    /// grain positions.
    pub fn new(placement: Rect, parameters: CloudParameters, rng: SmallRng) -> Self {
        let CloudParameters {
            density,
            interval,
            envelope,
        } = parameters;
        let envelope = Envelope::with_durations_of(&envelope);
        let grains = (0..density)
            .map(|_| Grain::new(Envelope::with_durations_of(&envelope)))
            .collect();
        Self {
            id: unique_usize_id(),
            placement,
            density,
            interval,
            envelope,
            grains,
            live_grains: 0,
            elapsed: 0,
            current_sample: 0.0,
            rng,
        }
    }

    /// Create a new cloud with a random generator seeded from the OS.
    pub fn with_random_seed(placement: Rect, parameters: CloudParameters) -> Self {
        Self::new(placement, parameters, SmallRng::from_os_rng())
    }

    /// Create a new cloud with a deterministically seeded random generator.
    pub fn with_seed(placement: Rect, parameters: CloudParameters, seed: u64) -> Self {
        Self::new(placement, parameters, SmallRng::seed_from_u64(seed))
    }

    pub fn id(&self) -> CloudId {
        self.id
    }

    /// Mixed sample of the last tick.
    pub fn current_sample(&self) -> f32 {
        self.current_sample
    }

    /// Live grains of the cloud.
    pub fn grains(&self) -> &[Grain] {
        &self.grains[..self.live_grains]
    }

    /// Number of live grains which are currently playing.
    pub fn active_grain_count(&self) -> usize {
        self.grains().iter().filter(|grain| grain.is_active()).count()
    }

    pub fn placement(&self) -> Rect {
        self.placement
    }
    pub fn set_placement(&mut self, placement: Rect) {
        self.placement = placement;
    }

    pub fn density(&self) -> usize {
        self.density
    }
    /// Set a new grain count. The pool gets resized with the next tick: retained grains
    /// keep playing, dropped ones are silenced, new ones start idle.
    pub fn set_density(&mut self, density: usize) {
        if density > self.grains.len() {
            let envelope = &self.envelope;
            self.grains
                .resize_with(density, || Grain::new(Envelope::with_durations_of(envelope)));
        }
        self.density = density;
    }

    pub fn interval(&self) -> usize {
        self.interval
    }
    /// Set a new retrigger interval in samples. The running interval count is kept.
    pub fn set_interval(&mut self, interval: usize) {
        self.interval = interval;
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }
    /// Set a new envelope template. All grains get an idle copy of it: this stops all
    /// playing grains until the next retrigger.
    pub fn set_envelope(&mut self, envelope: &Envelope) {
        self.envelope = Envelope::with_durations_of(envelope);
        for grain in &mut self.grains {
            grain.set_envelope(&self.envelope);
        }
    }

    /// Current parameters of the cloud.
    pub fn parameters(&self) -> CloudParameters {
        CloudParameters {
            density: self.density,
            interval: self.interval,
            envelope: self.envelope.clone(),
        }
    }
    /// Apply density, interval and envelope at once. The envelope only gets replaced when
    /// its durations changed.
    pub fn set_parameters(&mut self, parameters: &CloudParameters) {
        self.set_density(parameters.density);
        self.set_interval(parameters.interval);
        if Envelope::with_durations_of(&parameters.envelope) != self.envelope {
            self.set_envelope(&parameters.envelope);
        }
    }

    /// Run a single sample tick: resize the pool, retrigger grains when the interval
    /// elapsed, mix all active grains and advance them. Returns the new current sample.
    pub fn advance(&mut self, sources: &[SourceBuffer]) -> f32 {
        self.resize_pool();

        self.elapsed += 1;
        if self.elapsed >= self.interval {
            self.elapsed = 0;
            self.trigger_grains(sources);
        }

        let mut sample = 0.0;
        for grain in &mut self.grains[..self.live_grains] {
            if grain.is_active() {
                sample = screen_blend(sample, grain.current_sample());
            }
            grain.advance();
        }
        self.current_sample = sample;
        sample
    }

    fn resize_pool(&mut self) {
        let (live, density) = (self.live_grains, self.density);
        if live > density {
            for grain in &mut self.grains[density..live] {
                grain.reset(&self.envelope);
            }
        } else if live < density {
            // spare slots are normally allocated in `set_density` already
            if self.grains.len() < density {
                let envelope = &self.envelope;
                self.grains
                    .resize_with(density, || Grain::new(Envelope::with_durations_of(envelope)));
            }
            for grain in &mut self.grains[live..density] {
                grain.reset(&self.envelope);
            }
        }
        self.live_grains = density;
    }

    fn trigger_grains(&mut self, sources: &[SourceBuffer]) {
        let placement = self.placement;
        for grain in &mut self.grains[..self.live_grains] {
            let position = random_position(&mut self.rng, placement);
            grain.trigger(position);
            for source in sources
                .iter()
                .filter(|source| source.placement().contains(position))
            {
                mix_source(grain.buffer_mut(), source, position);
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Pick a random grain position within the placement, keeping room for the grain marker.
/// Placements which are too small for the marker resolve to their origin.
fn random_position<R: Rng>(rng: &mut R, placement: Rect) -> Point {
    let pick = |rng: &mut R, start: i32, end: i32| {
        let end = end.saturating_sub(GRAIN_MARKER_SIZE);
        if end > start {
            rng.random_range(start..end)
        } else {
            start
        }
    };
    let x = pick(rng, placement.left(), placement.right());
    let y = pick(rng, placement.top(), placement.bottom());
    Point::new(x, y)
}

/// Blend the block aligned segment of the source at the given grain position into the
/// grain's buffer.
///
/// The subtracted blend term uses the unscaled source samples from the start of the source,
/// not the gain scaled segment which gets added. This is how the cloud always sounded, so
/// it's kept as is.
fn mix_source(buffer: &mut [f32], source: &SourceBuffer, position: Point) {
    let samples = source.samples();
    let offset = source.sample_offset_for(position);
    if offset >= samples.len() {
        return;
    }
    let count = buffer.len().min(samples.len() - offset);
    let segment = &samples[offset..offset + count];
    let gain = source.vertical_gain_for(position);
    for ((output, value), head) in buffer.iter_mut().zip(segment).zip(samples) {
        *output = *output + value * gain - *output * (head * gain);
    }
}

// -------------------------------------------------------------------------------------------------
