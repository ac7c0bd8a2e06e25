//! Thread handoff between the interactive side, which edits the playfield, and the audio
//! thread, which renders it.

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

use crate::{
    config::EngineConfig,
    grain::cloud::{CloudId, CloudParameters, GrainCloud},
    playfield::{PanelId, Playfield},
    source::{SourceBuffer, SourceId},
    utils::{
        envelope::Envelope,
        rect::{Point, Rect},
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Types that can produce interleaved `f32` audio samples. `Send`able across threads.
pub trait AudioSource: Send + 'static {
    /// Apply pending control messages. Called by outputs once before each [`Self::write`]
    /// call. This is the only place where a source may allocate.
    fn process_messages(&mut self) {}

    /// Write at most `output.len()` samples into `output`. Returns the number of written
    /// samples. Must never block nor allocate.
    fn write(&mut self, output: &mut [f32]) -> usize;

    fn channel_count(&self) -> usize;
    fn sample_rate(&self) -> u32;
}

// -------------------------------------------------------------------------------------------------

/// Mutations of a [`Playfield`], sent from the [`Player`] to its [`PlayfieldSource`].
#[derive(Debug)]
pub enum PlayfieldMessage {
    AddSource(SourceBuffer),
    RemoveSource(SourceId),
    SetSourceVolume(SourceId, f32),
    AddCloud(Box<GrainCloud>),
    RemoveCloud(CloudId),
    SetCloudDensity(CloudId, usize),
    SetCloudInterval(CloudId, usize),
    SetCloudEnvelope(CloudId, Envelope),
    SetCloudParameters(CloudId, CloudParameters),
    SetPlacement(PanelId, Rect),
}

/// Panels which got removed on the audio thread and get dropped on the player's thread.
#[derive(Debug)]
#[allow(dead_code)]
enum RemovedPanel {
    Source(SourceBuffer),
    Cloud(Box<GrainCloud>),
}

// -------------------------------------------------------------------------------------------------

/// Controls a playfield which is rendered by a [`PlayfieldSource`] on another thread.
///
/// All edits are sent as [`PlayfieldMessage`]s through a bounded lock free queue. They get
/// applied by the source at the start of the next rendered block. The player mirrors the
/// placements of all panels, so hit tests don't need to access the playfield.
pub struct Player {
    config: EngineConfig,
    messages: Arc<ArrayQueue<PlayfieldMessage>>,
    removed: Arc<ArrayQueue<RemovedPanel>>,
    sources: Vec<(SourceId, Rect)>,
    clouds: Vec<(CloudId, Rect)>,
}

impl Player {
    /// Create a new player and its source for an initially empty playfield.
    pub fn new(config: EngineConfig) -> Result<(Self, PlayfieldSource), Error> {
        Self::with_playfield(config, Playfield::new())
    }

    /// Create a new player and its source for the given playfield.
    pub fn with_playfield(
        config: EngineConfig,
        playfield: Playfield,
    ) -> Result<(Self, PlayfieldSource), Error> {
        config.validate()?;
        let messages = Arc::new(ArrayQueue::new(config.message_queue_size));
        let removed = Arc::new(ArrayQueue::new(config.message_queue_size));
        let player = Self {
            config: config.clone(),
            messages: Arc::clone(&messages),
            removed: Arc::clone(&removed),
            sources: playfield
                .sources()
                .iter()
                .map(|source| (source.id(), source.placement()))
                .collect(),
            clouds: playfield
                .clouds()
                .iter()
                .map(|cloud| (cloud.id(), cloud.placement()))
                .collect(),
        };
        let source = PlayfieldSource {
            playfield,
            messages,
            removed,
            sample_rate: config.sample_rate,
            channel_count: config.channel_count,
        };
        Ok((player, source))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ids of all sources, in the order they got added.
    pub fn source_ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.sources.iter().map(|(id, _)| *id)
    }

    /// Ids of all clouds, in the order they got added.
    pub fn cloud_ids(&self) -> impl Iterator<Item = CloudId> + '_ {
        self.clouds.iter().map(|(id, _)| *id)
    }

    /// Add a new source to the playfield.
    pub fn add_source(&mut self, source: SourceBuffer) -> Result<SourceId, Error> {
        let (id, placement) = (source.id(), source.placement());
        self.send(PlayfieldMessage::AddSource(source))?;
        self.sources.push((id, placement));
        Ok(id)
    }

    /// Remove a source from the playfield.
    pub fn remove_source(&mut self, id: SourceId) -> Result<(), Error> {
        let index = self.source_index(id)?;
        self.send(PlayfieldMessage::RemoveSource(id))?;
        self.sources.remove(index);
        Ok(())
    }

    /// Set a source's volume. The value gets clamped to [0, 1].
    pub fn set_source_volume(&mut self, id: SourceId, volume: f32) -> Result<(), Error> {
        self.source_index(id)?;
        self.send(PlayfieldMessage::SetSourceVolume(id, volume))
    }

    /// Add a new cloud to the playfield.
    pub fn add_cloud(&mut self, cloud: GrainCloud) -> Result<CloudId, Error> {
        let (id, placement) = (cloud.id(), cloud.placement());
        self.send(PlayfieldMessage::AddCloud(Box::new(cloud)))?;
        self.clouds.push((id, placement));
        Ok(id)
    }

    /// Add a new cloud with the default cloud size, centered at the given point.
    pub fn add_cloud_at(
        &mut self,
        center: Point,
        parameters: CloudParameters,
    ) -> Result<CloudId, Error> {
        parameters.validate()?;
        let placement = Rect::centered_at(
            center,
            Playfield::DEFAULT_CLOUD_SIZE,
            Playfield::DEFAULT_CLOUD_SIZE,
        )?;
        self.add_cloud(GrainCloud::with_random_seed(placement, parameters))
    }

    /// Remove a cloud from the playfield.
    pub fn remove_cloud(&mut self, id: CloudId) -> Result<(), Error> {
        let index = self.cloud_index(id)?;
        self.send(PlayfieldMessage::RemoveCloud(id))?;
        self.clouds.remove(index);
        Ok(())
    }

    pub fn set_cloud_density(&mut self, id: CloudId, density: usize) -> Result<(), Error> {
        self.cloud_index(id)?;
        self.send(PlayfieldMessage::SetCloudDensity(id, density))
    }

    /// Set a cloud's retrigger interval in samples.
    pub fn set_cloud_interval(&mut self, id: CloudId, interval: usize) -> Result<(), Error> {
        self.cloud_index(id)?;
        if interval == 0 {
            return Err(Error::ParameterError(
                "Cloud interval must be > 0".to_string(),
            ));
        }
        self.send(PlayfieldMessage::SetCloudInterval(id, interval))
    }

    /// Set a cloud's grain envelope. This stops all playing grains of the cloud.
    pub fn set_cloud_envelope(&mut self, id: CloudId, envelope: Envelope) -> Result<(), Error> {
        self.cloud_index(id)?;
        self.send(PlayfieldMessage::SetCloudEnvelope(id, envelope))
    }

    pub fn set_cloud_parameters(
        &mut self,
        id: CloudId,
        parameters: CloudParameters,
    ) -> Result<(), Error> {
        self.cloud_index(id)?;
        parameters.validate()?;
        self.send(PlayfieldMessage::SetCloudParameters(id, parameters))
    }

    /// Current placement of the given panel.
    pub fn placement(&self, id: PanelId) -> Result<Rect, Error> {
        match id {
            PanelId::Source(id) => Ok(self.sources[self.source_index(id)?].1),
            PanelId::Cloud(id) => Ok(self.clouds[self.cloud_index(id)?].1),
        }
    }

    /// Replace the placement of the given panel.
    pub fn set_placement(&mut self, id: PanelId, placement: Rect) -> Result<(), Error> {
        let slot = match id {
            PanelId::Source(id) => {
                let index = self.source_index(id)?;
                &mut self.sources[index].1
            }
            PanelId::Cloud(id) => {
                let index = self.cloud_index(id)?;
                &mut self.clouds[index].1
            }
        };
        if *slot != placement {
            Self::push_message(&self.messages, PlayfieldMessage::SetPlacement(id, placement))?;
            *slot = placement;
        }
        Ok(())
    }

    /// Move the given panel's top left corner, keeping its size.
    pub fn move_panel(&mut self, id: PanelId, origin: Point) -> Result<(), Error> {
        let placement = self.placement(id)?.with_origin(origin)?;
        self.set_placement(id, placement)
    }

    /// Resize the given panel, keeping its top left corner in place. Sizes are clamped to
    /// [`Playfield::MIN_PANEL_SIZE`].
    pub fn resize_panel(&mut self, id: PanelId, width: i32, height: i32) -> Result<(), Error> {
        let current = self.placement(id)?;
        let placement = Rect::new(
            current.x(),
            current.y(),
            width.max(Playfield::MIN_PANEL_SIZE),
            height.max(Playfield::MIN_PANEL_SIZE),
        )?;
        self.set_placement(id, placement)
    }

    /// The panel at the given position. Clouds take precedence over sources.
    pub fn panel_at(&self, point: Point) -> Option<PanelId> {
        self.clouds
            .iter()
            .find(|(_, placement)| placement.contains(point))
            .map(|(id, _)| PanelId::Cloud(*id))
            .or_else(|| {
                self.sources
                    .iter()
                    .find(|(_, placement)| placement.contains(point))
                    .map(|(id, _)| PanelId::Source(*id))
            })
    }

    /// Drop panels which got removed by the audio thread.
    pub fn collect_garbage(&mut self) {
        while self.removed.pop().is_some() {}
    }

    fn source_index(&self, id: SourceId) -> Result<usize, Error> {
        self.sources
            .iter()
            .position(|(source_id, _)| *source_id == id)
            .ok_or(Error::SourceNotFoundError(id))
    }

    fn cloud_index(&self, id: CloudId) -> Result<usize, Error> {
        self.clouds
            .iter()
            .position(|(cloud_id, _)| *cloud_id == id)
            .ok_or(Error::CloudNotFoundError(id))
    }

    fn send(&mut self, message: PlayfieldMessage) -> Result<(), Error> {
        self.collect_garbage();
        Self::push_message(&self.messages, message)
    }

    fn push_message(
        queue: &ArrayQueue<PlayfieldMessage>,
        message: PlayfieldMessage,
    ) -> Result<(), Error> {
        queue.push(message).map_err(|_| {
            log::warn!("playfield message queue is full, dropping message");
            Error::SendError("message queue is full".to_string())
        })
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.collect_garbage();
    }
}

// -------------------------------------------------------------------------------------------------

/// Renders a [`Playfield`] as an [`AudioSource`], applying the edits of its [`Player`].
pub struct PlayfieldSource {
    playfield: Playfield,
    messages: Arc<ArrayQueue<PlayfieldMessage>>,
    removed: Arc<ArrayQueue<RemovedPanel>>,
    sample_rate: u32,
    channel_count: usize,
}

impl PlayfieldSource {
    pub fn playfield(&self) -> &Playfield {
        &self.playfield
    }

    /// Apply a single message to the playfield.
    fn apply(&mut self, message: PlayfieldMessage) {
        let result = match message {
            PlayfieldMessage::AddSource(source) => {
                self.playfield.add_source(source);
                Ok(())
            }
            PlayfieldMessage::RemoveSource(id) => self
                .playfield
                .remove_source(id)
                .map(|source| self.dispose(RemovedPanel::Source(source))),
            PlayfieldMessage::SetSourceVolume(id, volume) => self
                .playfield
                .source_mut(id)
                .map(|source| source.set_volume(volume))
                .ok_or(Error::SourceNotFoundError(id)),
            PlayfieldMessage::AddCloud(cloud) => {
                self.playfield.add_cloud(*cloud);
                Ok(())
            }
            PlayfieldMessage::RemoveCloud(id) => self
                .playfield
                .remove_cloud(id)
                .map(|cloud| self.dispose(RemovedPanel::Cloud(Box::new(cloud)))),
            PlayfieldMessage::SetCloudDensity(id, density) => {
                log::debug!("setting density of cloud #{id} to {density}");
                self.with_cloud(id, |cloud| cloud.set_density(density))
            }
            PlayfieldMessage::SetCloudInterval(id, interval) => {
                self.with_cloud(id, |cloud| cloud.set_interval(interval))
            }
            PlayfieldMessage::SetCloudEnvelope(id, envelope) => {
                self.with_cloud(id, |cloud| cloud.set_envelope(&envelope))
            }
            PlayfieldMessage::SetCloudParameters(id, parameters) => {
                log::debug!("setting parameters of cloud #{id} to {parameters:?}");
                self.with_cloud(id, |cloud| cloud.set_parameters(&parameters))
            }
            PlayfieldMessage::SetPlacement(id, placement) => {
                self.playfield.set_placement(id, placement)
            }
        };
        if let Err(err) = result {
            log::warn!("failed to apply playfield message: {err}");
        }
    }

    fn with_cloud<F: FnOnce(&mut GrainCloud)>(&mut self, id: CloudId, f: F) -> Result<(), Error> {
        let cloud = self
            .playfield
            .cloud_mut(id)
            .ok_or(Error::CloudNotFoundError(id))?;
        f(cloud);
        Ok(())
    }

    /// Hand a removed panel over to the player thread. When the queue is full, the panel
    /// gets dropped right here.
    fn dispose(&self, panel: RemovedPanel) {
        if self.removed.push(panel).is_err() {
            log::warn!("garbage queue is full, dropping removed panel on the audio thread");
        }
    }
}

impl AudioSource for PlayfieldSource {
    fn process_messages(&mut self) {
        while let Some(message) = self.messages.pop() {
            self.apply(message);
        }
    }

    fn write(&mut self, output: &mut [f32]) -> usize {
        self.playfield.produce(output);
        output.len()
    }

    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: i32, y: i32, width: i32, height: i32) -> Rect {
        Rect::new(x, y, width, height).unwrap()
    }

    fn render(source: &mut PlayfieldSource, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0; frames * source.channel_count()];
        source.process_messages();
        assert_eq!(source.write(&mut output), output.len());
        output
    }

    #[test]
    fn messages_apply_on_next_block() {
        let (mut player, mut source) = Player::new(EngineConfig::default()).unwrap();
        let source_id = player
            .add_source(SourceBuffer::new(vec![0.5; 1024], rect(0, 0, 200, 200)))
            .unwrap();
        let cloud_id = player
            .add_cloud(GrainCloud::with_seed(
                rect(0, 0, 100, 100),
                CloudParameters {
                    density: 2,
                    interval: 4,
                    envelope: Envelope::new(2, 4, 2),
                },
                0,
            ))
            .unwrap();
        assert!(source.playfield().is_empty());

        let output = render(&mut source, 64);
        assert!(source.playfield().source(source_id).is_some());
        assert!(source.playfield().cloud(cloud_id).is_some());
        assert!(output.iter().any(|s| *s != 0.0));

        player.set_source_volume(source_id, 2.0).unwrap();
        player.set_cloud_density(cloud_id, 5).unwrap();
        player.set_cloud_interval(cloud_id, 16).unwrap();
        player
            .set_cloud_envelope(cloud_id, Envelope::new(1, 2, 3))
            .unwrap();
        render(&mut source, 1);

        let playfield = source.playfield();
        assert_eq!(playfield.source(source_id).unwrap().volume(), 1.0);
        let cloud = playfield.cloud(cloud_id).unwrap();
        assert_eq!(cloud.density(), 5);
        assert_eq!(cloud.interval(), 16);
        assert_eq!(cloud.envelope(), &Envelope::new(1, 2, 3));
    }

    #[test]
    fn remove_panels() {
        let (mut player, mut source) = Player::new(EngineConfig::default()).unwrap();
        let source_id = player
            .add_source(SourceBuffer::new(vec![0.5; 64], rect(0, 0, 50, 50)))
            .unwrap();
        let cloud_id = player
            .add_cloud_at(Point::new(100, 100), CloudParameters::default())
            .unwrap();
        render(&mut source, 8);

        player.remove_cloud(cloud_id).unwrap();
        player.remove_source(source_id).unwrap();
        assert!(matches!(
            player.remove_cloud(cloud_id),
            Err(Error::CloudNotFoundError(_))
        ));
        assert!(matches!(
            player.set_source_volume(source_id, 1.0),
            Err(Error::SourceNotFoundError(_))
        ));
        render(&mut source, 8);
        assert!(source.playfield().is_empty());
        assert_eq!(player.removed.len(), 2);
        player.collect_garbage();
        assert!(player.removed.is_empty());
    }

    #[test]
    fn full_queue_reports_send_error() {
        let config = EngineConfig::default().with_message_queue_size(2);
        let (mut player, mut source) = Player::new(config).unwrap();
        let id = player
            .add_cloud_at(Point::new(100, 100), CloudParameters::default())
            .unwrap();
        player.set_cloud_density(id, 4).unwrap();
        assert!(matches!(
            player.set_cloud_density(id, 5),
            Err(Error::SendError(_))
        ));
        render(&mut source, 1);
        assert!(player.set_cloud_density(id, 6).is_ok());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let (mut player, _source) = Player::new(EngineConfig::default()).unwrap();
        let id = player
            .add_cloud_at(Point::new(100, 100), CloudParameters::default())
            .unwrap();
        assert!(matches!(
            player.set_cloud_interval(id, 0),
            Err(Error::ParameterError(_))
        ));
        assert!(Player::new(EngineConfig::default().with_block_frames(0)).is_err());
    }

    #[test]
    fn hit_tests_and_placements() {
        let (mut player, mut source) = Player::new(EngineConfig::default()).unwrap();
        let source_id = player
            .add_source(SourceBuffer::new(vec![0.5; 64], rect(0, 0, 300, 100)))
            .unwrap();
        let cloud_id = player
            .add_cloud_at(Point::new(100, 100), CloudParameters::default())
            .unwrap();
        assert_eq!(
            player.panel_at(Point::new(10, 10)),
            Some(PanelId::Source(source_id))
        );
        assert_eq!(
            player.panel_at(Point::new(50, 50)),
            Some(PanelId::Cloud(cloud_id))
        );
        assert_eq!(player.panel_at(Point::new(500, 500)), None);

        player
            .move_panel(PanelId::Cloud(cloud_id), Point::new(400, 400))
            .unwrap();
        player
            .resize_panel(PanelId::Source(source_id), 0, 50)
            .unwrap();
        assert_eq!(
            player.panel_at(Point::new(50, 50)),
            None,
        );
        render(&mut source, 1);
        let playfield = source.playfield();
        assert_eq!(
            playfield.cloud(cloud_id).unwrap().placement(),
            rect(400, 400, 160, 160)
        );
        assert_eq!(
            playfield.source(source_id).unwrap().placement(),
            rect(0, 0, 10, 50)
        );
    }
}
