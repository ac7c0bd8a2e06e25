use grainfield::{
    utils::{
        buffer::screen_blend,
        envelope::Envelope,
        pcm::{convert_to_pcm16, PcmByteOrder},
        rect::{Point, Rect},
    },
    AudioSource, CloudParameters, EngineConfig, GrainCloud, PanelId, Player, Playfield,
    SourceBuffer,
};

// -------------------------------------------------------------------------------------------------

fn rect(x: i32, y: i32, width: i32, height: i32) -> Rect {
    Rect::new(x, y, width, height).unwrap()
}

fn noise(len: usize) -> Vec<f32> {
    // deterministic, roughly uniform values in [-0.5, 0.5)
    (0..len)
        .map(|i| ((i * 7919 % 1000) as f32 / 1000.0) - 0.5)
        .collect()
}

// -------------------------------------------------------------------------------------------------

#[test]
fn envelope_stops_after_its_length() {
    for (attack, sustain, decay) in [(1, 1, 1), (3, 0, 2), (10, 20, 5), (1, 0, 0)] {
        let mut envelope = Envelope::new(attack, sustain, decay);
        envelope.trigger();
        let length = attack + sustain + decay;
        for call in 1..=length {
            envelope.advance();
            assert_eq!(envelope.is_running(), call < length);
        }
    }

    let mut silent = Envelope::new(0, 0, 0);
    silent.trigger();
    silent.advance();
    assert!(!silent.is_running());
}

#[test]
fn single_grain_over_constant_source() {
    let mut source = SourceBuffer::new(vec![0.5; 16], rect(0, 0, 16, 16));
    source.set_volume(0.5);
    let sources = [source];
    let parameters = CloudParameters {
        density: 1,
        interval: 1,
        envelope: Envelope::new(0, 1, 0),
    };
    let mut cloud = GrainCloud::with_seed(rect(0, 0, 16, 16), parameters, 0);

    cloud.advance(&sources);
    let grain = &cloud.grains()[0];
    assert!(grain.is_active());
    assert_eq!(grain.sample_at(0), screen_blend(0.0, 0.5 * 0.5));

    cloud.advance(&sources);
    let grain = &cloud.grains()[0];
    assert_eq!(grain.current_amplitude(), 1.0);
    assert_eq!(cloud.current_sample(), grain.sample_at(0) * 1.0);
    assert_eq!(cloud.current_sample(), 0.25);
}

#[test]
fn distant_clouds_are_silent() {
    let mut playfield = Playfield::new();
    playfield.add_source(SourceBuffer::new(noise(8192), rect(0, 0, 350, 100)));
    playfield.add_cloud(GrainCloud::with_seed(
        rect(600, 600, 160, 160),
        CloudParameters::default(),
        1,
    ));
    let mut output = vec![0.0; 6000];
    playfield.produce(&mut output);
    assert!(output.iter().all(|s| *s == 0.0));
}

#[test]
fn overlapping_clouds_produce_sound() {
    let mut playfield = Playfield::new();
    playfield.add_source(SourceBuffer::new(noise(44100), rect(0, 0, 350, 100)));
    let parameters = CloudParameters::from_millis(3, 5, 1, 2, 1, &EngineConfig::default());
    playfield.add_cloud(GrainCloud::with_seed(rect(100, 0, 160, 160), parameters, 2));

    let mut output = vec![0.0; 6000];
    playfield.produce(&mut output);
    assert!(output.iter().any(|s| *s != 0.0));
    assert!(output.iter().all(|s| s.abs() <= 1.0));

    let bytes = convert_to_pcm16(&output, PcmByteOrder::Little);
    assert_eq!(bytes.len(), output.len() * 2);
}

#[test]
fn player_renders_reproducibly() {
    fn render() -> Vec<f32> {
        let (mut player, mut source) = Player::new(EngineConfig::default()).unwrap();
        player
            .add_source(SourceBuffer::new(noise(22050), rect(0, 0, 350, 100)))
            .unwrap();
        let cloud_id = player
            .add_cloud(GrainCloud::with_seed(
                rect(50, 20, 160, 160),
                CloudParameters::from_millis(4, 10, 2, 5, 2, &EngineConfig::default()),
                3,
            ))
            .unwrap();

        let mut output = vec![0.0; 2 * 1000];
        source.process_messages();
        source.write(&mut output[..1000]);

        player.set_cloud_density(cloud_id, 8).unwrap();
        player
            .move_panel(PanelId::Cloud(cloud_id), Point::new(80, 0))
            .unwrap();
        source.process_messages();
        source.write(&mut output[1000..]);
        output
    }

    let first = render();
    let second = render();
    assert_eq!(first, second);
    assert!(first.iter().any(|s| *s != 0.0));
}
