//! A plain terrain-grid submap.

use bevy::log::debug;
use serde_json::{Map, Value, json};

use crate::submap::{Submap, SubmapLoadError, TerrainId};

/// Number of tiles along one axis of a submap.
pub const SUBMAP_SIZE: usize = 12;

/// Number of tiles in a submap.
pub const SUBMAP_AREA: usize = SUBMAP_SIZE * SUBMAP_SIZE;

/// A 12x12 grid of terrain, stored row-major (Y-major).
///
/// A grid is uniform only while it holds exactly what `Submap::uniform` built
/// from its tile's default terrain. Any edit clears that, even one that happens
/// to leave every tile equal, since the edited terrain may not be the default.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct GridSubmap {
    terrain: Vec<TerrainId>,
    uniform: bool,
    reverted: bool,
}

impl Default for GridSubmap {
    fn default() -> Self {
        Self::filled(TerrainId::new("t_null"))
    }
}

impl GridSubmap {
    /// A grid with every tile set to `terrain`. Not uniform, use
    /// `Submap::uniform` for the default terrain of a tile.
    pub fn filled(terrain: TerrainId) -> Self {
        Self {
            terrain: vec![terrain; SUBMAP_AREA],
            uniform: false,
            reverted: false,
        }
    }

    #[inline]
    const fn index(x: usize, y: usize) -> usize {
        assert!(x < SUBMAP_SIZE && y < SUBMAP_SIZE);
        x + y * SUBMAP_SIZE
    }

    pub fn terrain(&self, x: usize, y: usize) -> &TerrainId {
        &self.terrain[Self::index(x, y)]
    }

    /// Assign the terrain of one tile. The grid is no longer uniform.
    pub fn set_terrain(&mut self, x: usize, y: usize, terrain: TerrainId) {
        self.terrain[Self::index(x, y)] = terrain;
        self.uniform = false;
    }

    /// Assign every tile. The grid is no longer uniform.
    pub fn fill(&mut self, terrain: TerrainId) {
        self.terrain.fill(terrain);
        self.uniform = false;
    }

    /// Reset every tile to the default terrain of the tile, making the grid
    /// uniform again. Flags the grid as reverted if it held edited content.
    pub fn revert(&mut self, default: TerrainId) {
        if !self.uniform {
            self.reverted = true;
        }
        self.terrain.fill(default);
        self.uniform = true;
    }

    /// Iterate runs of identical terrain, in storage order.
    fn runs(&self) -> impl Iterator<Item = (&TerrainId, usize)> {
        let mut rest = self.terrain.as_slice();
        std::iter::from_fn(move || {
            let first = rest.first()?;
            let len = rest.iter().take_while(|t| *t == first).count();
            rest = &rest[len..];
            Some((first, len))
        })
    }

    fn load_terrain(&mut self, member: &Value, name: &str) -> Result<(), SubmapLoadError> {
        let unexpected = || SubmapLoadError::UnexpectedType {
            name: name.to_owned(),
            expected: "an array of terrain runs",
        };

        let runs = member.as_array().ok_or_else(unexpected)?;
        let mut terrain = Vec::with_capacity(SUBMAP_AREA);
        for run in runs {
            match run {
                Value::String(id) => terrain.push(TerrainId::new(id)),
                Value::Array(pair) => match pair.as_slice() {
                    [Value::String(id), count] => {
                        let count = count.as_u64().ok_or_else(unexpected)?;
                        let count = usize::try_from(count).unwrap_or(usize::MAX);
                        // checked before extending, so a bogus count can't allocate unbounded memory.
                        let found = terrain.len().saturating_add(count);
                        if found > SUBMAP_AREA {
                            return Err(SubmapLoadError::WrongTileCount {
                                name: name.to_owned(),
                                found,
                                expected: SUBMAP_AREA,
                            });
                        }
                        terrain.resize(found, TerrainId::new(id));
                    }
                    _ => return Err(unexpected()),
                },
                _ => return Err(unexpected()),
            }
        }

        if terrain.len() != SUBMAP_AREA {
            return Err(SubmapLoadError::WrongTileCount {
                name: name.to_owned(),
                found: terrain.len(),
                expected: SUBMAP_AREA,
            });
        }

        self.terrain = terrain;
        Ok(())
    }
}

impl Submap for GridSubmap {
    fn is_uniform(&self) -> bool {
        self.uniform
    }

    fn reverted(&self) -> bool {
        self.reverted
    }

    fn set_reverted(&mut self, reverted: bool) {
        self.reverted = reverted;
    }

    fn uniform(terrain: &TerrainId) -> Self {
        Self {
            uniform: true,
            ..Self::filled(terrain.clone())
        }
    }

    fn store(&self, out: &mut Map<String, Value>) {
        let runs = self
            .runs()
            .map(|(id, len)| match len {
                1 => json!(id.as_str()),
                _ => json!([id.as_str(), len]),
            })
            .collect();
        out.insert("terrain".into(), Value::Array(runs));
        if self.uniform {
            out.insert("uniform".into(), Value::Bool(true));
        }
    }

    fn load(&mut self, member: &Value, name: &str, version: u32) -> Result<(), SubmapLoadError> {
        match name {
            "terrain" => self.load_terrain(member, name),
            "uniform" => {
                self.uniform = member.as_bool().ok_or(SubmapLoadError::UnexpectedType {
                    name: name.to_owned(),
                    expected: "a boolean",
                })?;
                Ok(())
            }
            _ => {
                debug!("Ignoring unknown submap member '{name}' (version {version}).");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_load_keeps_layout() {
        let mut sm = GridSubmap::filled("t_rock".into());
        sm.set_terrain(3, 4, "t_floor".into());
        sm.set_terrain(11, 11, "t_wall".into());

        let mut out = Map::new();
        sm.store(&mut out);

        let mut loaded = GridSubmap::default();
        loaded.load(&out["terrain"], "terrain", 1).unwrap();
        assert_eq!(loaded, sm);
        assert!(!loaded.is_uniform());
    }

    #[test]
    fn uniform_stores_one_run() {
        let sm = GridSubmap::uniform(&"t_open_air".into());
        let mut out = Map::new();
        sm.store(&mut out);
        assert_eq!(out["terrain"], json!([["t_open_air", 144]]));
        assert_eq!(out["uniform"], json!(true));

        let mut loaded = GridSubmap::default();
        for (name, member) in &out {
            loaded.load(member, name, 1).unwrap();
        }
        assert_eq!(loaded, sm);
        assert!(loaded.is_uniform());
    }

    #[test]
    fn edits_are_never_uniform() {
        // same terrain everywhere, but not the default one.
        let mut sm = GridSubmap::filled("t_dirt".into());
        assert!(!sm.is_uniform());

        let mut sm2 = GridSubmap::uniform(&"t_rock".into());
        sm2.set_terrain(3, 3, "t_rock".into());
        assert!(!sm2.is_uniform());

        sm.fill("t_rock".into());
        assert!(!sm.is_uniform());
        assert!(!sm.reverted());
    }

    #[test]
    fn revert_marks_reverted_only_after_edits() {
        let mut sm = GridSubmap::uniform(&"t_rock".into());
        sm.revert("t_rock".into());
        assert!(!sm.reverted());

        sm.set_terrain(0, 0, "t_floor".into());
        sm.revert("t_rock".into());
        assert!(sm.reverted());
        assert!(sm.is_uniform());
        assert_eq!(sm.terrain(0, 0).as_str(), "t_rock");
    }

    #[test]
    fn rejects_short_terrain() {
        let mut sm = GridSubmap::default();
        let err = sm
            .load(&json!([["t_rock", 100]]), "terrain", 1)
            .unwrap_err();
        assert!(matches!(err, SubmapLoadError::WrongTileCount { found: 100, .. }));

        let err = sm.load(&json!([["t_rock", 1000]]), "terrain", 1).unwrap_err();
        assert!(matches!(err, SubmapLoadError::WrongTileCount { found: 1000, .. }));

        // a run count past any sane size is rejected, not added up.
        let err = sm
            .load(&json!(["t_rock", ["t_rock", u64::MAX]]), "terrain", 1)
            .unwrap_err();
        assert!(matches!(err, SubmapLoadError::WrongTileCount { found: usize::MAX, .. }));

        let err = sm.load(&json!({"t_rock": 144}), "terrain", 1).unwrap_err();
        assert!(matches!(err, SubmapLoadError::UnexpectedType { .. }));
    }

    #[test]
    fn ignores_unknown_members() {
        let mut sm = GridSubmap::default();
        sm.load(&json!(5), "radiation", 1).unwrap();
        assert_eq!(sm, GridSubmap::default());
    }
}
