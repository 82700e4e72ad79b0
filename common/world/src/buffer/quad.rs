//! Reading and writing of quad files.
//!
//! A quad file is a JSON array with one record per resident submap of the quad:
//!
//! ```json
//! [ { "version": 1, "coordinates": [x, y, z], ...submap members... }, ... ]
//! ```
//!
//! Submaps that are uniform can be rebuilt from the overmap terrain, so a quad
//! whose resident submaps are all uniform is not written at all. A missing quad
//! file therefore means "nothing to load", not "nothing was ever there".

use std::{
    fmt, fs,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{
    Deserializer,
    de::{self, DeserializeSeed, SeqAccess, Visitor},
    ser::{SerializeSeq, Serializer},
};
use serde_json::{Map, Value, json};

use crate::{
    buffer::path,
    coords::{SubmapPos, TilePos},
    submap::{Submap, SubmapLoadError},
};

/// Format version written into every record.
pub const FORMAT_VERSION: u32 = 1;

/// The files a quad may be stored in.
#[derive(Clone, Debug)]
pub struct QuadFiles {
    /// Segment directory containing the quad.
    pub dir: PathBuf,

    /// Canonical path, the only one ever written.
    pub path: PathBuf,

    /// Path used by old saves, if it differs from the canonical one.
    pub legacy: Option<PathBuf>,
}

impl QuadFiles {
    pub fn new(save_root: &Path, tile: TilePos, legacy_separator: char) -> Self {
        let dir = path::segment_dir(save_root, tile);
        Self {
            path: path::quad_path(&dir, tile),
            legacy: path::legacy_quad_path(&dir, tile, legacy_separator),
            dir,
        }
    }

    /// The file to read from: the canonical one if it exists, else the legacy one if it exists.
    pub fn existing(&self) -> io::Result<Option<&Path>> {
        if self.path.try_exists()? {
            return Ok(Some(&self.path));
        }

        if let Some(legacy) = &self.legacy
            && legacy.try_exists()?
        {
            return Ok(Some(legacy));
        }

        Ok(None)
    }

    /// Remove the legacy file, if there is one.
    fn remove_legacy(&self) -> io::Result<bool> {
        match &self.legacy {
            Some(legacy) => remove_if_exists(legacy),
            None => Ok(false),
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// What `save_quad` did on disk.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum QuadAction {
    /// The quad file was (re)written.
    Written,

    /// The quad reverted to uniform, its stale file was deleted.
    Deleted,

    /// The quad is uniform and has no file, nothing was touched.
    Skipped,
}

/// Result of saving one quad.
#[derive(Clone, Debug)]
pub struct QuadSaved {
    pub action: QuadAction,

    /// Submaps that may be dropped from memory now that they are persisted.
    pub evictable: Vec<SubmapPos>,
}

#[derive(thiserror::Error, Debug)]
pub enum QuadSaveError {
    #[error("[M101] I/O failure while saving quad: {0}")]
    Io(#[from] io::Error),

    #[error("[M102] Failed to encode quad: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum QuadLoadError {
    #[error("[M201] I/O failure while loading quad: {0}")]
    Io(#[from] io::Error),

    #[error("[M202] Quad file is not valid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("[M203] A record in the quad file has no 'coordinates' member.")]
    MissingCoordinates,

    #[error("[M204] A record in the quad file has invalid coordinates: {0}")]
    InvalidCoordinates(serde_json::Error),

    #[error("[M205] Failed to load submap {pos}: {source}")]
    Submap {
        pos: SubmapPos,
        #[source]
        source: SubmapLoadError,
    },

    #[error("[M206] A record in the quad file has an invalid version: {0}")]
    InvalidVersion(Value),
}

/// Persist one quad.
///
/// `members` are the resident submaps of the quad, in quad order. Quad members
/// that aren't resident are simply absent from the slice.
///
/// If `delete_after_save` is set, every member that no longer needs to stay in
/// memory is reported as evictable. Nothing is removed here.
pub fn save_quad<S: Submap>(
    files: &QuadFiles,
    members: &[(SubmapPos, S)],
    delete_after_save: bool,
) -> Result<QuadSaved, QuadSaveError> {
    let all_uniform = members.iter().all(|(_, sm)| sm.is_uniform());

    let evictable = if delete_after_save {
        members.iter().map(|(pos, _)| *pos).collect()
    } else {
        Vec::new()
    };

    if all_uniform {
        let reverted = members.iter().any(|(_, sm)| sm.reverted());
        if !reverted {
            return Ok(QuadSaved {
                action: QuadAction::Skipped,
                evictable,
            });
        }

        // The content on disk is stale. Whatever the file held is now
        // reconstructible from terrain, so the file must go.
        let removed = remove_if_exists(&files.path)?;
        let removed_legacy = files.remove_legacy()?;
        let action = if removed || removed_legacy {
            QuadAction::Deleted
        } else {
            QuadAction::Skipped
        };
        return Ok(QuadSaved { action, evictable });
    }

    fs::create_dir_all(&files.dir)?;
    write_records(&files.path, members)?;

    // the canonical file supersedes any legacy one.
    files.remove_legacy()?;

    Ok(QuadSaved {
        action: QuadAction::Written,
        evictable,
    })
}

/// Write the records to a sibling file, then move it over the destination.
/// The sibling file is removed again if anything fails.
fn write_records<S: Submap>(path: &Path, members: &[(SubmapPos, S)]) -> Result<(), QuadSaveError> {
    let tmp = path.with_extension("map.tmp");
    let result = write_sequence(&tmp, members).and_then(|()| Ok(fs::rename(&tmp, path)?));
    if result.is_err() {
        let _ = remove_if_exists(&tmp);
    }
    result
}

fn write_sequence<S: Submap>(tmp: &Path, members: &[(SubmapPos, S)]) -> Result<(), QuadSaveError> {
    let mut writer = BufWriter::new(fs::File::create(tmp)?);

    let mut ser = serde_json::Serializer::new(&mut writer);
    let mut seq = ser.serialize_seq(Some(members.len()))?;
    for (pos, sm) in members {
        let mut record = Map::new();
        sm.store(&mut record);
        record.insert("version".into(), json!(FORMAT_VERSION));
        record.insert("coordinates".into(), json!(pos.to_array()));
        seq.serialize_element(&record)?;
    }
    seq.end()?;

    writer.flush()?;
    Ok(())
}

/// Stream the records of a quad file, handing each decoded submap to `on_submap`.
///
/// Records are decoded one at a time, so the file is never held in memory as a whole.
pub fn read_quad<S, F>(path: &Path, on_submap: F) -> Result<(), QuadLoadError>
where
    S: Submap,
    F: FnMut(SubmapPos, S),
{
    let reader = BufReader::new(fs::File::open(path)?);
    let mut de = serde_json::Deserializer::from_reader(reader);

    let mut seed = RecordSeq {
        on_submap,
        failure: None,
        _marker: std::marker::PhantomData::<S>,
    };

    let result = (&mut seed).deserialize(&mut de);
    if let Some(e) = seed.failure {
        return Err(e);
    }
    result?;
    de.end()?;
    Ok(())
}

/// Decode one record into a submap.
fn parse_record<S: Submap>(mut record: Map<String, Value>) -> Result<(SubmapPos, S), QuadLoadError> {
    // Version has to be known before any other member is applied,
    // and members can appear in any order.
    let version = match record.remove("version") {
        Some(version) => version
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or(QuadLoadError::InvalidVersion(version))?,
        None => 0,
    };

    let coordinates = record
        .remove("coordinates")
        .ok_or(QuadLoadError::MissingCoordinates)?;
    let pos = serde_json::from_value::<[i32; 3]>(coordinates)
        .map(SubmapPos::from)
        .map_err(QuadLoadError::InvalidCoordinates)?;

    let mut sm = S::default();
    for (name, member) in &record {
        sm.load(member, name, version)
            .map_err(|source| QuadLoadError::Submap { pos, source })?;
    }

    Ok((pos, sm))
}

struct RecordSeq<S, F> {
    on_submap: F,
    failure: Option<QuadLoadError>,
    _marker: std::marker::PhantomData<S>,
}

impl<'de, S, F> DeserializeSeed<'de> for &mut RecordSeq<S, F>
where
    S: Submap,
    F: FnMut(SubmapPos, S),
{
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, S, F> Visitor<'de> for &mut RecordSeq<S, F>
where
    S: Submap,
    F: FnMut(SubmapPos, S),
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of submap records")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while let Some(record) = seq.next_element::<Map<String, Value>>()? {
            match parse_record::<S>(record) {
                Ok((pos, sm)) => (self.on_submap)(pos, sm),
                Err(e) => {
                    let msg = e.to_string();
                    self.failure = Some(e);
                    return Err(de::Error::custom(msg));
                }
            }
        }
        Ok(())
    }
}
