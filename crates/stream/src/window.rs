use furrow_kernel::{ChunkCoord, Player};
use glam::IVec2;

/// Square neighbourhood of chunks around a viewer, in chunk space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    center: ChunkCoord,
    radius: i32,
}

impl ChunkWindow {
    /// A negative radius is treated as zero: just the centre chunk.
    pub fn new(center: ChunkCoord, radius: i32) -> Self {
        Self {
            center,
            radius: radius.max(0),
        }
    }

    /// Window centred on the chunk containing `pos`.
    pub fn around(pos: IVec2, chunk_size: i32, radius: i32) -> Self {
        Self::new(ChunkCoord::of(pos, chunk_size), radius)
    }

    pub fn center(&self) -> ChunkCoord {
        self.center
    }

    pub fn radius(&self) -> i32 {
        self.radius
    }

    /// Whether `coord` lies within Chebyshev distance `radius` of the centre.
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.center.chebyshev(coord) <= self.radius
    }

    /// Every chunk coordinate in the window, row by row.
    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        (-self.radius..=self.radius).flat_map(move |dy| {
            (-self.radius..=self.radius)
                .map(move |dx| ChunkCoord::new(self.center.x + dx, self.center.y + dy))
        })
    }

    /// Number of chunks in the window.
    pub fn chunk_count(&self) -> usize {
        let side = (2 * self.radius + 1) as usize;
        side * side
    }

    /// Players other than `viewer` whose chunk lies inside the window.
    pub fn visible_players<'a>(
        &self,
        viewer: &Player,
        players: impl Iterator<Item = &'a Player>,
        chunk_size: i32,
    ) -> Vec<&'a Player> {
        players
            .filter(|p| p.id() != viewer.id())
            .filter(|p| self.contains(ChunkCoord::of(p.position(), chunk_size)))
            .collect()
    }
}
