//! Absolute grid coordinates used by the map buffer.
//!
//! There are three nested grids:
//!  - Submap: the smallest persisted map chunk.
//!  - Tile: a 2x2 block of submaps on the XY plane, also called a quad. One quad is one file.
//!  - Segment: a 32x32 block of tiles on the XY plane, which selects the save directory.
//!
//! Z is shared by all three grids, projecting never changes it.

use std::{cmp::Ordering, fmt};

use bevy::math::{IVec3, ivec3};

/// Number of submaps along one horizontal axis of a tile.
pub const SUBMAPS_PER_TILE: i32 = 2;

/// Number of tiles along one horizontal axis of a segment.
pub const TILES_PER_SEGMENT: i32 = 32;

/// Offsets of the four quad members from the tile's base submap,
/// in the order they are written to a quad file.
pub const QUAD_OFFSETS: [IVec3; 4] = [
    IVec3::new(0, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(1, 0, 0),
    IVec3::new(1, 1, 0),
];

macro_rules! grid_pos {
    ($name:ident) => {
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
        pub struct $name(pub IVec3);

        impl $name {
            pub const fn new(x: i32, y: i32, z: i32) -> Self {
                Self(ivec3(x, y, z))
            }

            #[inline(always)]
            pub const fn x(self) -> i32 {
                self.0.x
            }

            #[inline(always)]
            pub const fn y(self) -> i32 {
                self.0.y
            }

            #[inline(always)]
            pub const fn z(self) -> i32 {
                self.0.z
            }

            pub const fn to_array(self) -> [i32; 3] {
                [self.0.x, self.0.y, self.0.z]
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                self.to_array().cmp(&other.to_array())
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl From<IVec3> for $name {
            fn from(value: IVec3) -> Self {
                Self(value)
            }
        }

        impl From<[i32; 3]> for $name {
            fn from([x, y, z]: [i32; 3]) -> Self {
                Self::new(x, y, z)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "({}, {}, {})", self.0.x, self.0.y, self.0.z)
            }
        }
    };
}

grid_pos!(SubmapPos);
grid_pos!(TilePos);
grid_pos!(SegmentPos);

impl SubmapPos {
    /// The tile (quad) that stores this submap.
    pub const fn tile(self) -> TilePos {
        TilePos::new(
            self.0.x.div_euclid(SUBMAPS_PER_TILE),
            self.0.y.div_euclid(SUBMAPS_PER_TILE),
            self.0.z,
        )
    }
}

impl TilePos {
    /// The submap at offset (0,0) of this quad.
    ///
    /// Every tile returned by `SubmapPos::tile` has a base. Tiles with an x or y
    /// outside of `i32::MIN / 2..=i32::MAX / 2` store no addressable submap, and
    /// the multiplication overflows for them.
    pub const fn base(self) -> SubmapPos {
        SubmapPos::new(
            self.0.x * SUBMAPS_PER_TILE,
            self.0.y * SUBMAPS_PER_TILE,
            self.0.z,
        )
    }

    /// All four submaps stored by this quad, in file order.
    pub fn submaps(self) -> [SubmapPos; 4] {
        let base = self.base().0;
        QUAD_OFFSETS.map(|offs| SubmapPos(base + offs))
    }

    /// The segment whose directory contains this quad's file.
    pub const fn segment(self) -> SegmentPos {
        SegmentPos::new(
            self.0.x.div_euclid(TILES_PER_SEGMENT),
            self.0.y.div_euclid(TILES_PER_SEGMENT),
            self.0.z,
        )
    }
}
