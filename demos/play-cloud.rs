//! Places a few recordings on a playfield and drifts grain clouds across them.

use std::{f32::consts::PI, thread, time::Duration};

use rand::Rng;

#[cfg(feature = "cpal-output")]
use grainfield::outputs::CpalOutput;
use grainfield::{
    outputs::{OutputDevice, PcmStreamOutput, WavOutput},
    utils::rect::{Point, Rect},
    CloudParameters, EngineConfig, Error, PanelId, Player, PlayfieldSource, SourceBuffer,
};

// -------------------------------------------------------------------------------------------------

// Common demo code
#[path = "./common/arguments.rs"]
mod arguments;

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

/// Default playback duration in seconds
const DEFAULT_DURATION: u64 = 10;

/// Cloud parameters (tweak as needed!)
const CLOUD_DENSITY: usize = 3;
const CLOUD_INTERVAL_MS: u32 = 50;
const GRAIN_ATTACK_MS: u32 = 5;
const GRAIN_SUSTAIN_MS: u32 = 40;
const GRAIN_DECAY_MS: u32 = 5;

/// How often the clouds get moved
const UPDATE_INTERVAL: Duration = Duration::from_millis(250);

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Error> {
    // Parse optional arguments
    let args = arguments::parse();
    let duration = Duration::from_secs(args.duration.unwrap_or(DEFAULT_DURATION));

    let config = EngineConfig::default();
    let (mut player, source) = Player::new(config.clone())?;

    // Load or synthesize sources
    let mut rng = rand::rng();
    if let Some(sources_path) = &args.sources_path {
        for source in SourceBuffer::load_dir(sources_path, config.viewport, &mut rng)? {
            player.add_source(source)?;
        }
    }
    if player.source_ids().next().is_none() {
        log::info!("no sources loaded, using a synthesized sweep");
        player.add_source(sweep(&config)?)?;
    }

    // Drop a cloud onto the center of each source
    let parameters = CloudParameters::from_millis(
        CLOUD_DENSITY,
        CLOUD_INTERVAL_MS,
        GRAIN_ATTACK_MS,
        GRAIN_SUSTAIN_MS,
        GRAIN_DECAY_MS,
        &config,
    );
    let source_ids = player.source_ids().collect::<Vec<_>>();
    let mut clouds = Vec::new();
    for source_id in source_ids {
        let placement = player.placement(PanelId::Source(source_id))?;
        let center = Point::new(
            placement.x() + placement.width() / 2,
            placement.y() + placement.height() / 2,
        );
        clouds.push(player.add_cloud_at(center, parameters.clone())?);
    }

    log::info!("playing {} clouds for {duration:?}", clouds.len());

    // Render offline into a wav file
    if let Some(output_path) = &args.output_path {
        let mut output = WavOutput::open_with_config(output_path, source, Some(duration), &config)?;
        output.resume();
        output.wait_until_finished();
        return Ok(());
    }

    // Or play in real-time, while moving clouds around
    let mut output = open_realtime_output(&args, source, &config)?;
    let steps = (duration.as_millis() / UPDATE_INTERVAL.as_millis()).max(1);
    for _ in 0..steps {
        thread::sleep(UPDATE_INTERVAL);
        for cloud_id in &clouds {
            let id = PanelId::Cloud(*cloud_id);
            let placement = player.placement(id)?;
            let origin = Point::new(
                placement.x() + rng.random_range(-8..=8),
                placement.y() + rng.random_range(-4..=4),
            );
            player.move_panel(id, origin)?;
            player.set_cloud_density(*cloud_id, rng.random_range(1..=CLOUD_DENSITY * 2))?;
        }
    }
    output.close();

    Ok(())
}

// -------------------------------------------------------------------------------------------------

fn open_realtime_output(
    args: &arguments::Arguments,
    source: PlayfieldSource,
    config: &EngineConfig,
) -> Result<Box<dyn OutputDevice>, Error> {
    if args.pcm_stdout {
        return Ok(Box::new(PcmStreamOutput::open_with_config(
            std::io::stdout(),
            source,
            config,
            Default::default(),
        )?));
    }
    open_device_output(source)
}

#[cfg(feature = "cpal-output")]
fn open_device_output(source: PlayfieldSource) -> Result<Box<dyn OutputDevice>, Error> {
    Ok(Box::new(CpalOutput::open(source)?))
}

#[cfg(not(feature = "cpal-output"))]
fn open_device_output(_source: PlayfieldSource) -> Result<Box<dyn OutputDevice>, Error> {
    Err(Error::ParameterError(
        "no audio device output available: use --pcm or --output".to_string(),
    ))
}

/// Two seconds of a stereo sine sweep, placed at the top left of the viewport.
fn sweep(config: &EngineConfig) -> Result<SourceBuffer, Error> {
    let frames = config.sample_rate as usize * 2;
    let mut phase = 0.0_f32;
    let mut samples = Vec::with_capacity(frames * config.channel_count);
    for frame in 0..frames {
        let frequency = 110.0 + 770.0 * frame as f32 / frames as f32;
        phase = (phase + 2.0 * PI * frequency / config.sample_rate as f32) % (2.0 * PI);
        let value = phase.sin() * 0.8;
        samples.extend(std::iter::repeat(value).take(config.channel_count));
    }
    let placement = Rect::new(
        100,
        100,
        SourceBuffer::DEFAULT_WIDTH,
        SourceBuffer::DEFAULT_HEIGHT,
    )?;
    Ok(SourceBuffer::new(samples, placement))
}
