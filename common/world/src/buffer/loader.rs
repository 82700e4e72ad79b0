use bevy::log::{debug, error, warn};

use crate::{
    buffer::{
        MapBuffer,
        quad::{self, QuadFiles, QuadLoadError},
    },
    coords::SubmapPos,
    submap::Submap,
};

impl<S: Submap> MapBuffer<S> {
    /// Load the quad containing `pos` into the buffer.
    ///
    /// Every record of the quad file is inserted, except for coordinates that are
    /// already resident. Quad members without a record were uniform when saved,
    /// so they are rebuilt from the tile's default terrain.
    ///
    /// Returns whether `pos` is resident afterward. `Ok(false)` means
    /// the submap does not exist yet and has to be generated.
    pub fn unserialize_submaps(&mut self, pos: SubmapPos) -> Result<bool, QuadLoadError> {
        let tile = pos.tile();
        let files = QuadFiles::new(&self.config.save_root, tile, self.config.legacy_separator);

        let Some(path) = files.existing()? else {
            return Ok(false);
        };

        debug!("Loading quad {tile} from '{}'.", path.display());
        quad::read_quad(path, |record_pos, sm: S| {
            if self.add_submap(record_pos, sm).is_err() {
                warn!(
                    "[M003] Submap {record_pos} was already loaded, keeping the resident copy. (file: '{}')",
                    path.display()
                );
            }
        })?;

        // fill in uniform submaps that were not serialized
        let terrain = self.terrain.uniform_terrain(tile);
        if let Some(terrain) = &terrain {
            for member in tile.submaps() {
                if !self.submaps.contains_key(&member) {
                    self.submaps.insert(member, S::uniform(terrain));
                }
            }
        }

        if !self.submaps.contains_key(&pos) {
            error!(
                "[M004] File '{}' did not contain the expected submap {pos} for non-uniform terrain {}.",
                path.display(),
                terrain.as_ref().map_or("<none>", |t| t.as_str()),
            );
            return Ok(false);
        }

        Ok(true)
    }
}
