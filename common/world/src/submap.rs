use std::{fmt, sync::Arc};

use serde_json::{Map, Value};

use crate::coords::{SubmapPos, TilePos};

/// Identifier of a terrain type, such as "t_rock" or "t_open_air".
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct TerrainId(pub Arc<str>);

impl TerrainId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TerrainId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for TerrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted map chunk, as seen by the map buffer.
///
/// The buffer never looks inside a submap. It only asks whether the content
/// could be regenerated from terrain alone (`is_uniform`), and delegates
/// encoding to `store` and decoding to `load`.
pub trait Submap: Default + Send + Sync + 'static {
    /// The submap holds nothing but its tile's default terrain, as built by
    /// `uniform`, so it can be rebuilt instead of stored.
    fn is_uniform(&self) -> bool;

    /// Set when the content regressed to uniform after being non-uniform,
    /// meaning a stale file may still exist on disk.
    fn reverted(&self) -> bool;

    /// Called once the stale file of a reverted submap is gone.
    fn set_reverted(&mut self, reverted: bool);

    /// Build a uniform submap of the given default terrain.
    fn uniform(terrain: &TerrainId) -> Self;

    /// Write submap-specific members into the record object.
    /// The members "version" and "coordinates" are reserved.
    fn store(&self, out: &mut Map<String, Value>);

    /// Apply one record member. `version` is the format version the record was written with.
    fn load(&mut self, member: &Value, name: &str, version: u32) -> Result<(), SubmapLoadError>;
}

#[derive(thiserror::Error, Debug)]
pub enum SubmapLoadError {
    /// A member had a JSON type the submap does not understand.
    #[error("[M301] Member '{name}' has an unexpected type, expected {expected}.")]
    UnexpectedType { name: String, expected: &'static str },

    /// Run-length encoded tile data did not cover the submap exactly.
    #[error("[M302] Member '{name}' describes {found} tiles, expected {expected}.")]
    WrongTileCount {
        name: String,
        found: usize,
        expected: usize,
    },
}

/// Default terrain per tile, as provided by the overmap.
pub trait TerrainLookup: Send + Sync + 'static {
    /// The terrain that fills every submap of this tile, or None if the
    /// tile's terrain cannot be reconstructed as uniform submaps.
    fn uniform_terrain(&self, tile: TilePos) -> Option<TerrainId>;
}

impl<F> TerrainLookup for F
where
    F: Fn(TilePos) -> Option<TerrainId> + Send + Sync + 'static,
{
    fn uniform_terrain(&self, tile: TilePos) -> Option<TerrainId> {
        self(tile)
    }
}

/// Membership test for the part of the world that is actively simulated.
pub trait RealityBubble {
    fn contains(&self, pos: SubmapPos) -> bool;

    /// A tile is inside the bubble if any of its submaps is.
    fn contains_tile(&self, tile: TilePos) -> bool {
        tile.submaps().into_iter().any(|pos| self.contains(pos))
    }
}

impl<F> RealityBubble for F
where
    F: Fn(SubmapPos) -> bool,
{
    fn contains(&self, pos: SubmapPos) -> bool {
        self(pos)
    }
}

/// An inclusive box of submap coordinates.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct SubmapBounds {
    pub min: SubmapPos,
    pub max: SubmapPos,
}

impl SubmapBounds {
    /// Box of `radius` submaps around `center` on the XY plane, spanning the given z levels.
    pub fn around(center: SubmapPos, radius: i32, min_z: i32, max_z: i32) -> Self {
        Self {
            min: SubmapPos::new(center.x() - radius, center.y() - radius, min_z),
            max: SubmapPos::new(center.x() + radius, center.y() + radius, max_z),
        }
    }

    /// Iterate every submap in the box.
    pub fn iter(&self) -> impl Iterator<Item = SubmapPos> {
        let (min, max) = (self.min, self.max);
        (min.z()..=max.z()).flat_map(move |z| {
            (min.y()..=max.y())
                .flat_map(move |y| (min.x()..=max.x()).map(move |x| SubmapPos::new(x, y, z)))
        })
    }
}

impl RealityBubble for SubmapBounds {
    fn contains(&self, pos: SubmapPos) -> bool {
        pos.0.cmpge(self.min.0).all() && pos.0.cmple(self.max.0).all()
    }
}
