use furrow_common::TileActionKind;
use furrow_kernel::ChunkCoord;
use glam::IVec2;

use crate::payload::DiffHint;

/// Compare two row-major soil snapshots of the chunk at `coord`.
///
/// Each tile whose level dropped yields a `Dig` hint and each tile whose
/// level rose yields a `Fill` hint, in world coordinates.
pub fn soil_diffs(
    coord: ChunkCoord,
    chunk_size: i32,
    previous: &[u8],
    current: &[u8],
) -> Vec<DiffHint> {
    debug_assert_eq!(previous.len(), current.len());
    let origin = coord.origin(chunk_size);
    previous
        .iter()
        .zip(current)
        .enumerate()
        .filter_map(|(i, (before, after))| {
            let action = match after.cmp(before) {
                std::cmp::Ordering::Less => TileActionKind::Dig,
                std::cmp::Ordering::Greater => TileActionKind::Fill,
                std::cmp::Ordering::Equal => return None,
            };
            let i = i as i32;
            let pos = origin + IVec2::new(i % chunk_size, i / chunk_size);
            Some(DiffHint {
                x: pos.x,
                y: pos.y,
                action,
            })
        })
        .collect()
}
