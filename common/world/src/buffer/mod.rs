//! The in-memory working set of submaps, backed by quad files on disk.
//!
//! Submaps are owned by the buffer. A lookup that misses memory falls through to
//! the quad file that stores the submap (see `loader`). Saving writes every
//! resident quad back to disk concurrently and optionally drops what was saved
//! (see `saver`).

use std::{path::Path, sync::Arc};

use bevy::{
    ecs::resource::Resource,
    log::{debug, error, warn},
};
use fxhash::FxHashMap;

use crate::{
    config::MapBufferConfig,
    coords::{SubmapPos, TilePos},
    submap::{RealityBubble, Submap, TerrainLookup},
};

pub mod loader;
pub mod path;
pub mod quad;
pub mod saver;

#[derive(Resource)]
pub struct MapBuffer<S: Submap> {
    /// Resident submaps. At most one entry per coordinate.
    submaps: FxHashMap<SubmapPos, S>,

    /// Default terrain, used to rebuild submaps that were never written.
    terrain: Arc<dyn TerrainLookup>,

    config: MapBufferConfig,
}

impl<S: Submap> MapBuffer<S> {
    pub fn new(config: MapBufferConfig, terrain: Arc<dyn TerrainLookup>) -> Self {
        Self {
            submaps: FxHashMap::default(),
            terrain,
            config,
        }
    }

    pub fn config(&self) -> &MapBufferConfig {
        &self.config
    }

    pub fn save_root(&self) -> &Path {
        &self.config.save_root
    }

    /// Number of resident submaps.
    pub fn len(&self) -> usize {
        self.submaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submaps.is_empty()
    }

    /// Iterate resident submaps, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (SubmapPos, &S)> {
        self.submaps.iter().map(|(pos, sm)| (*pos, sm))
    }

    /// Distinct quads that have at least one resident submap.
    pub fn resident_tiles(&self) -> Vec<TilePos> {
        let mut tiles: Vec<TilePos> = self.submaps.keys().map(|pos| pos.tile()).collect();
        tiles.sort_unstable();
        tiles.dedup();
        tiles
    }

    /// Drop every resident submap. Nothing is saved.
    pub fn clear(&mut self) {
        self.submaps.clear();
    }

    /// Drop every resident submap outside of the reality bubble. Nothing is saved.
    /// Returns the number of dropped submaps.
    pub fn clear_outside_reality_bubble(&mut self, bubble: &impl RealityBubble) -> usize {
        let before = self.submaps.len();
        self.submaps.retain(|pos, _| bubble.contains(*pos));
        before - self.submaps.len()
    }

    /// Insert a submap. Never overwrites: if the coordinate is
    /// occupied, the submap is handed back to the caller.
    pub fn add_submap(&mut self, pos: SubmapPos, submap: S) -> Result<(), S> {
        use std::collections::hash_map::Entry;
        match self.submaps.entry(pos) {
            Entry::Occupied(_) => Err(submap),
            Entry::Vacant(entry) => {
                entry.insert(submap);
                Ok(())
            }
        }
    }

    /// Remove a resident submap, without saving it.
    pub fn remove_submap(&mut self, pos: SubmapPos) -> Option<S> {
        let removed = self.submaps.remove(&pos);
        if removed.is_none() {
            warn!("[M001] Tried to remove non-existing submap {pos}.");
        }
        removed
    }

    /// Get a resident submap. Never touches the disk.
    pub fn get(&self, pos: SubmapPos) -> Option<&S> {
        self.submaps.get(&pos)
    }

    /// Get a resident submap. Never touches the disk.
    pub fn get_mut(&mut self, pos: SubmapPos) -> Option<&mut S> {
        self.submaps.get_mut(&pos)
    }

    /// Get a submap, loading its quad from disk if it isn't resident.
    ///
    /// Returns None if the submap exists neither in memory nor on disk, in which
    /// case it has to be generated. Load failures are logged and also return None.
    pub fn lookup_submap(&mut self, pos: SubmapPos) -> Option<&mut S> {
        debug!("lookup_submap {pos}");
        if !self.submaps.contains_key(&pos) && !self.load_or_log(pos) {
            return None;
        }
        self.submaps.get_mut(&pos)
    }

    /// Check whether a submap exists in memory or on disk.
    /// Like `lookup_submap`, a miss loads the submap's quad.
    pub fn submap_exists(&mut self, pos: SubmapPos) -> bool {
        self.submaps.contains_key(&pos) || self.load_or_log(pos)
    }

    fn load_or_log(&mut self, pos: SubmapPos) -> bool {
        match self.unserialize_submaps(pos) {
            Ok(found) => found,
            Err(e) => {
                error!("[M002] Failed to load submap {pos}: {e}");
                false
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use crate::{coords::SubmapPos, grid::GridSubmap, submap::SubmapBounds};

    fn rock() -> GridSubmap {
        GridSubmap::filled("t_rock".into())
    }

    #[test]
    fn add_never_overwrites() {
        let dir = TempDir::new();
        let mut buffer = buffer_in(&dir, FlatTerrain::new(None));
        let pos = SubmapPos::new(1, 2, 3);

        assert!(buffer.add_submap(pos, rock()).is_ok());

        let dirt = GridSubmap::filled("t_dirt".into());
        let rejected = buffer.add_submap(pos, dirt.clone()).unwrap_err();
        assert_eq!(rejected, dirt);
        assert_eq!(buffer.get(pos), Some(&rock()));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn remove_missing_is_noop() {
        let dir = TempDir::new();
        let mut buffer = buffer_in(&dir, FlatTerrain::new(None));
        let pos = SubmapPos::new(0, 0, 0);
        buffer.add_submap(pos, rock()).unwrap();

        assert!(buffer.remove_submap(SubmapPos::new(9, 9, 9)).is_none());
        assert_eq!(buffer.remove_submap(pos), Some(rock()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn clear_outside_bubble_keeps_inside() {
        let dir = TempDir::new();
        let mut buffer = buffer_in(&dir, FlatTerrain::new(None));
        let bounds = SubmapBounds::around(SubmapPos::new(0, 0, 0), 1, 0, 0);
        for x in -3..=3 {
            buffer.add_submap(SubmapPos::new(x, 0, 0), rock()).unwrap();
        }

        assert_eq!(buffer.clear_outside_reality_bubble(&bounds), 4);
        let mut kept: Vec<_> = buffer.iter().map(|(pos, _)| pos.x()).collect();
        kept.sort();
        assert_eq!(kept, vec![-1, 0, 1]);

        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn miss_without_file_needs_generation() {
        let dir = TempDir::new();
        let terrain = FlatTerrain::new(Some("t_rock"));
        let mut buffer = buffer_in(&dir, terrain.clone());
        let pos = SubmapPos::new(4, 4, 0);

        assert!(buffer.lookup_submap(pos).is_none());
        assert!(!buffer.submap_exists(pos));
        assert!(buffer.is_empty());

        // no file, so the terrain is never consulted.
        assert_eq!(terrain.lookups(), 0);
    }

    #[test]
    fn resident_tiles_are_distinct() {
        let dir = TempDir::new();
        let mut buffer = buffer_in(&dir, FlatTerrain::new(None));
        for pos in [(0, 0, 0), (1, 1, 0), (2, 0, 0), (-1, 0, 0)] {
            buffer.add_submap(SubmapPos::from([pos.0, pos.1, pos.2]), rock()).unwrap();
        }
        assert_eq!(buffer.resident_tiles().len(), 3);
    }
}
