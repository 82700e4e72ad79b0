//! Where quads live on disk.
//!
//! Layout: `<save_root>/maps/<segX>.<segY>.<segZ>/<tileX>.<tileY>.<tileZ>.map`

use std::path::{Path, PathBuf};

use crate::coords::TilePos;

/// Directory holding the segment that contains this quad.
pub fn segment_dir(save_root: &Path, tile: TilePos) -> PathBuf {
    let seg = tile.segment();
    save_root
        .join("maps")
        .join(format!("{}.{}.{}", seg.x(), seg.y(), seg.z()))
}

/// Canonical file of a quad, e.g. "1234.7.8.map".
pub fn quad_path(dir: &Path, tile: TilePos) -> PathBuf {
    dir.join(format!("{}.{}.{}.map", tile.x(), tile.y(), tile.z()))
}

/// File name old saves used for a quad, with the numbers formatted using
/// thousands separators, e.g. "1,234.7.8.map".
///
/// Returns None if the name would equal the canonical one.
pub fn legacy_quad_path(dir: &Path, tile: TilePos, separator: char) -> Option<PathBuf> {
    let [x, y, z] = tile.to_array();
    if [x, y, z].iter().all(|n| n.unsigned_abs() < 1000) {
        return None;
    }

    Some(dir.join(format!(
        "{}.{}.{}.map",
        group_thousands(x, separator),
        group_thousands(y, separator),
        group_thousands(z, separator),
    )))
}

fn group_thousands(n: i32, separator: char) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_paths() {
        let tile = TilePos::new(1234, -7, 8);
        let dir = segment_dir(Path::new("/save"), tile);
        assert_eq!(dir, PathBuf::from("/save/maps/38.-1.8"));
        assert_eq!(
            quad_path(&dir, tile),
            PathBuf::from("/save/maps/38.-1.8/1234.-7.8.map")
        );
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0, ','), "0");
        assert_eq!(group_thousands(999, ','), "999");
        assert_eq!(group_thousands(1000, ','), "1,000");
        assert_eq!(group_thousands(-1234567, ','), "-1,234,567");
        assert_eq!(group_thousands(i32::MIN, '.'), "-2.147.483.648");
    }

    #[test]
    fn legacy_path_only_when_different() {
        let dir = Path::new("maps");
        assert_eq!(legacy_quad_path(dir, TilePos::new(999, -999, 0), ','), None);
        assert_eq!(
            legacy_quad_path(dir, TilePos::new(1234, 7, -8), ','),
            Some(PathBuf::from("maps/1,234.7.-8.map"))
        );
    }
}
