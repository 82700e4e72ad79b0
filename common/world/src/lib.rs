//! A write-back cache of map submaps, persisted as quad files.
//!
//! The [`MapBuffer`] owns every resident submap. Lookups that miss memory load the
//! submap's quad from disk, and saving writes all resident quads back concurrently,
//! skipping quads whose content can be rebuilt from the default terrain.

pub use crate::{
    buffer::{
        MapBuffer,
        quad::{FORMAT_VERSION, QuadAction, QuadLoadError, QuadSaveError, QuadSaved},
        saver::{LogProgress, SaveError, SaveProgress, SaveSummary},
    },
    config::{ConfigError, MapBufferConfig},
    coords::{SegmentPos, SubmapPos, TilePos},
    grid::GridSubmap,
    submap::{RealityBubble, Submap, SubmapBounds, SubmapLoadError, TerrainId, TerrainLookup},
};

pub mod buffer;
pub mod config;
pub mod coords;
pub mod grid;
pub mod submap;
