//! Stand-in for the overmap and map generation.
//!
//! Below ground is solid rock, above ground is open air, and the surface is a
//! grass field with the odd tree. Only the surface produces non-uniform submaps.

use bevy::prelude::*;
use world::{GridSubmap, Submap, SubmapPos, TerrainId, TerrainLookup, TilePos, grid::SUBMAP_SIZE};

#[derive(Resource, Clone, Debug)]
pub struct Overmap {
    rock: TerrainId,
    air: TerrainId,
    grass: TerrainId,
    tree: TerrainId,
}

impl Default for Overmap {
    fn default() -> Self {
        Self {
            rock: TerrainId::new("t_rock"),
            air: TerrainId::new("t_open_air"),
            grass: TerrainId::new("t_grass"),
            tree: TerrainId::new("t_tree"),
        }
    }
}

impl Overmap {
    /// Generate the submap at this position from scratch.
    pub fn generate(&self, pos: SubmapPos) -> GridSubmap {
        if let Some(terrain) = self.uniform_terrain(pos.tile()) {
            return GridSubmap::uniform(&terrain);
        }

        let mut sm = GridSubmap::filled(self.grass.clone());
        let hash = spot_hash(pos);
        if hash & 3 != 0 {
            let x = (hash >> 8) as usize % SUBMAP_SIZE;
            let y = (hash >> 16) as usize % SUBMAP_SIZE;
            sm.set_terrain(x, y, self.tree.clone());
        }
        sm
    }
}

impl TerrainLookup for Overmap {
    fn uniform_terrain(&self, tile: TilePos) -> Option<TerrainId> {
        match tile.z() {
            z if z < 0 => Some(self.rock.clone()),
            z if z > 0 => Some(self.air.clone()),
            _ => None,
        }
    }
}

/// Deterministic per-submap hash, so regenerated submaps match earlier ones.
fn spot_hash(pos: SubmapPos) -> u32 {
    let [x, y, z] = pos.to_array().map(|n| n as u32);
    let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77) ^ z.wrapping_mul(0xC2B2_AE3D);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2C1B_3C6D);
    h ^ (h >> 12)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let overmap = Overmap::default();
        for x in -4..4 {
            let pos = SubmapPos::new(x, 3, 0);
            assert_eq!(overmap.generate(pos), overmap.generate(pos));
        }
    }

    #[test]
    fn only_surface_is_non_uniform() {
        let overmap = Overmap::default();
        assert!(overmap.generate(SubmapPos::new(0, 0, -2)).is_uniform());
        assert!(overmap.generate(SubmapPos::new(0, 0, 3)).is_uniform());
        assert_eq!(overmap.uniform_terrain(TilePos::new(0, 0, 0)), None);
        assert_eq!(
            overmap.uniform_terrain(TilePos::new(0, 0, -1)),
            Some(TerrainId::new("t_rock"))
        );
    }
}
