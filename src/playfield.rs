//! The playfield: all placed sources and grain clouds, mixed into a single output stream.

use crate::{
    grain::cloud::{CloudId, CloudParameters, GrainCloud},
    source::{SourceBuffer, SourceId},
    utils::{
        buffer::screen_blend,
        rect::{Point, Rect},
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Identifies a single panel on the playfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelId {
    Source(SourceId),
    Cloud(CloudId),
}

// -------------------------------------------------------------------------------------------------

/// Borrowed view on a single panel on the playfield.
#[derive(Debug, Clone, Copy)]
pub enum PanelRef<'a> {
    Source(&'a SourceBuffer),
    Cloud(&'a GrainCloud),
}

impl PanelRef<'_> {
    pub fn id(&self) -> PanelId {
        match self {
            Self::Source(source) => PanelId::Source(source.id()),
            Self::Cloud(cloud) => PanelId::Cloud(cloud.id()),
        }
    }

    pub fn placement(&self) -> Rect {
        match self {
            Self::Source(source) => source.placement(),
            Self::Cloud(cloud) => cloud.placement(),
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Owns all sources and grain clouds and mixes the clouds into a single output stream.
///
/// Sources and clouds are kept in insertion order: sources are blended into grains and clouds
/// into the output in the order they got added.
#[derive(Debug, Clone, Default)]
pub struct Playfield {
    sources: Vec<SourceBuffer>,
    clouds: Vec<GrainCloud>,
}

impl Playfield {
    /// Smallest width or height a panel can be resized to.
    pub const MIN_PANEL_SIZE: i32 = 10;
    /// Size of clouds which get added via [`Self::add_cloud_at`].
    pub const DEFAULT_CLOUD_SIZE: i32 = 160;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn sources(&self) -> &[SourceBuffer] {
        &self.sources
    }

    pub fn clouds(&self) -> &[GrainCloud] {
        &self.clouds
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.clouds.is_empty()
    }

    pub fn source(&self, id: SourceId) -> Option<&SourceBuffer> {
        self.sources.iter().find(|source| source.id() == id)
    }
    pub fn source_mut(&mut self, id: SourceId) -> Option<&mut SourceBuffer> {
        self.sources.iter_mut().find(|source| source.id() == id)
    }

    pub fn cloud(&self, id: CloudId) -> Option<&GrainCloud> {
        self.clouds.iter().find(|cloud| cloud.id() == id)
    }
    pub fn cloud_mut(&mut self, id: CloudId) -> Option<&mut GrainCloud> {
        self.clouds.iter_mut().find(|cloud| cloud.id() == id)
    }

    /// Add a new source. Returns the source's id.
    pub fn add_source(&mut self, source: SourceBuffer) -> SourceId {
        let id = source.id();
        log::info!(
            "adding source #{id} '{}' with {} samples",
            source.name().unwrap_or("unnamed"),
            source.len()
        );
        self.sources.push(source);
        id
    }

    /// Remove the source with the given id.
    pub fn remove_source(&mut self, id: SourceId) -> Result<SourceBuffer, Error> {
        let index = self
            .sources
            .iter()
            .position(|source| source.id() == id)
            .ok_or(Error::SourceNotFoundError(id))?;
        log::info!("removing source #{id}");
        Ok(self.sources.remove(index))
    }

    /// Add a new cloud. Returns the cloud's id.
    pub fn add_cloud(&mut self, cloud: GrainCloud) -> CloudId {
        let id = cloud.id();
        log::info!(
            "adding cloud #{id} with density {} at {:?}",
            cloud.density(),
            cloud.placement()
        );
        self.clouds.push(cloud);
        id
    }

    /// Add a new cloud with the default size, centered at the given point.
    pub fn add_cloud_at(
        &mut self,
        center: Point,
        parameters: CloudParameters,
    ) -> Result<CloudId, Error> {
        parameters.validate()?;
        let placement = Rect::centered_at(
            center,
            Self::DEFAULT_CLOUD_SIZE,
            Self::DEFAULT_CLOUD_SIZE,
        )?;
        Ok(self.add_cloud(GrainCloud::with_random_seed(placement, parameters)))
    }

    /// Remove the cloud with the given id.
    pub fn remove_cloud(&mut self, id: CloudId) -> Result<GrainCloud, Error> {
        let index = self
            .clouds
            .iter()
            .position(|cloud| cloud.id() == id)
            .ok_or(Error::CloudNotFoundError(id))?;
        log::info!("removing cloud #{id}");
        Ok(self.clouds.remove(index))
    }

    /// All panels: sources first, then clouds.
    pub fn panels(&self) -> impl Iterator<Item = PanelRef<'_>> {
        self.sources
            .iter()
            .map(PanelRef::Source)
            .chain(self.clouds.iter().map(PanelRef::Cloud))
    }

    /// The panel at the given position. Clouds take precedence over sources; among panels of
    /// the same kind, the one which got added first wins.
    pub fn panel_at(&self, point: Point) -> Option<PanelRef<'_>> {
        self.clouds
            .iter()
            .find(|cloud| cloud.placement().contains(point))
            .map(PanelRef::Cloud)
            .or_else(|| {
                self.sources
                    .iter()
                    .find(|source| source.placement().contains(point))
                    .map(PanelRef::Source)
            })
    }

    /// Placement of the given panel.
    pub fn placement(&self, id: PanelId) -> Result<Rect, Error> {
        match id {
            PanelId::Source(id) => self
                .source(id)
                .map(SourceBuffer::placement)
                .ok_or(Error::SourceNotFoundError(id)),
            PanelId::Cloud(id) => self
                .cloud(id)
                .map(GrainCloud::placement)
                .ok_or(Error::CloudNotFoundError(id)),
        }
    }

    /// Replace the placement of the given panel.
    pub fn set_placement(&mut self, id: PanelId, placement: Rect) -> Result<(), Error> {
        match id {
            PanelId::Source(id) => self
                .source_mut(id)
                .ok_or(Error::SourceNotFoundError(id))?
                .set_placement(placement),
            PanelId::Cloud(id) => self
                .cloud_mut(id)
                .ok_or(Error::CloudNotFoundError(id))?
                .set_placement(placement),
        }
        Ok(())
    }

    /// Move the given panel's top left corner to a new position, keeping its size.
    pub fn move_panel(&mut self, id: PanelId, origin: Point) -> Result<(), Error> {
        let placement = self.placement(id)?.with_origin(origin)?;
        self.set_placement(id, placement)
    }

    /// Resize the given panel, keeping its top left corner in place. Sizes are clamped to
    /// [`Self::MIN_PANEL_SIZE`].
    pub fn resize_panel(&mut self, id: PanelId, width: i32, height: i32) -> Result<(), Error> {
        let current = self.placement(id)?;
        let placement = Rect::new(
            current.x(),
            current.y(),
            width.max(Self::MIN_PANEL_SIZE),
            height.max(Self::MIN_PANEL_SIZE),
        )?;
        self.set_placement(id, placement)
    }

    /// Run a single sample tick: blend the current samples of all clouds, then advance all
    /// clouds. The returned sample thus is the mix of the previous cloud ticks.
    pub fn next_sample(&mut self) -> f32 {
        let Self { sources, clouds } = self;
        let mut sample = 0.0;
        for cloud in clouds.iter_mut() {
            sample = screen_blend(sample, cloud.current_sample());
            cloud.advance(sources);
        }
        sample
    }

    /// Fill the given interleaved buffer, running one tick per sample: the channels of a frame
    /// are consecutive ticks.
    pub fn produce(&mut self, output: &mut [f32]) {
        for sample in output.iter_mut() {
            *sample = self.next_sample();
        }
    }
}

// -------------------------------------------------------------------------------------------------
