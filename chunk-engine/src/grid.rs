use chunk_types::{ChunkSpec, SimulationParams, VolumeShape};
use serde::{Deserialize, Serialize};

/// Regular partition of a volume into chunks. The last chunk along an axis is
/// shorter when the chunk size does not divide the volume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkGrid {
    shape: [usize; 3],
    chunk: [usize; 3],
    counts: [usize; 3],
}

impl ChunkGrid {
    pub fn new(shape: VolumeShape, chunk: ChunkSpec) -> Self {
        let shape = shape.0;
        let chunk = chunk.0;
        let counts = [0, 1, 2].map(|a| shape[a].div_ceil(chunk[a]));
        Self { shape, chunk, counts }
    }

    pub fn from_params(params: &SimulationParams) -> Self {
        Self::new(params.shape, params.chunk)
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn chunk(&self) -> [usize; 3] {
        self.chunk
    }

    /// Chunks along each axis.
    pub fn counts(&self) -> [usize; 3] {
        self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn linear(&self, coord: [usize; 3]) -> usize {
        (coord[0] * self.counts[1] + coord[1]) * self.counts[2] + coord[2]
    }

    pub fn coord(&self, id: usize) -> [usize; 3] {
        let x = id % self.counts[2];
        let rest = id / self.counts[2];
        [rest / self.counts[1], rest % self.counts[1], x]
    }

    pub fn origin(&self, id: usize) -> [usize; 3] {
        let c = self.coord(id);
        [0, 1, 2].map(|a| c[a] * self.chunk[a])
    }

    pub fn extent(&self, id: usize) -> [usize; 3] {
        let c = self.coord(id);
        [0, 1, 2].map(|a| self.chunk[a].min(self.shape[a] - c[a] * self.chunk[a]))
    }

    /// Chunk coordinate along `axis` owning global index `g`.
    pub fn owner_along(&self, axis: usize, g: usize) -> usize {
        g / self.chunk[axis]
    }

    /// Chunk coordinates along `axis` touched by the periodic range
    /// `[start - reach, start + len + reach)`, without duplicates.
    pub fn covering_along(&self, axis: usize, start: usize, len: usize, reach: usize) -> Vec<usize> {
        let n = self.shape[axis] as isize;
        let mut owners = Vec::new();
        for offset in -(reach as isize)..(len + reach) as isize {
            let g = (start as isize + offset).rem_euclid(n) as usize;
            let owner = self.owner_along(axis, g);
            if !owners.contains(&owner) {
                owners.push(owner);
            }
        }
        owners.sort_unstable();
        owners
    }

    /// Linear ids of every chunk intersecting chunk `id` grown by `reach`
    /// cells on each side, including `id` itself.
    pub fn neighbourhood(&self, id: usize, reach: usize) -> Vec<usize> {
        let origin = self.origin(id);
        let extent = self.extent(id);
        let along: Vec<Vec<usize>> = (0..3)
            .map(|a| self.covering_along(a, origin[a], extent[a], reach))
            .collect();

        let mut ids = Vec::with_capacity(along[0].len() * along[1].len() * along[2].len());
        for &z in &along[0] {
            for &y in &along[1] {
                for &x in &along[2] {
                    ids.push(self.linear([z, y, x]));
                }
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_extents() {
        let grid = ChunkGrid::new(VolumeShape([5, 4, 4]), ChunkSpec([2, 4, 3]));
        assert_eq!(grid.counts(), [3, 1, 2]);
        assert_eq!(grid.extent(grid.linear([2, 0, 1])), [1, 4, 1]);
        assert_eq!(grid.origin(grid.linear([2, 0, 1])), [4, 0, 3]);
    }

    #[test]
    fn covering_wraps_periodically() {
        let grid = ChunkGrid::new(VolumeShape([8, 4, 4]), ChunkSpec([1, 4, 4]));
        assert_eq!(grid.covering_along(0, 0, 1, 2), vec![0, 1, 2, 6, 7]);
        assert_eq!(grid.covering_along(1, 0, 4, 2), vec![0]);
    }
}
