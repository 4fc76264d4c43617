//! Splitting a field into chunk blocks and merging them back.

use chunk_types::Block;
use ndarray::{s, Array3};

use crate::grid::ChunkGrid;
use crate::Error;

/// Cut `field` into one block per chunk of `grid`, in chunk id order.
pub fn partition(field: &Array3<f64>, grid: &ChunkGrid) -> Result<Vec<Block>, Error> {
    let (d, h, w) = field.dim();
    if [d, h, w] != grid.shape() {
        return Err(Error::Configuration(format!(
            "field {:?} does not match grid shape {:?}",
            [d, h, w],
            grid.shape()
        )));
    }

    Ok((0..grid.len())
        .map(|id| {
            let o = grid.origin(id);
            let e = grid.extent(id);
            Block {
                origin: o,
                data: field
                    .slice(s![o[0]..o[0] + e[0], o[1]..o[1] + e[1], o[2]..o[2] + e[2]])
                    .to_owned(),
            }
        })
        .collect())
}

/// Write every block into a zeroed field of `shape`.
pub fn assemble<'a>(
    shape: [usize; 3],
    blocks: impl IntoIterator<Item = &'a Block>,
) -> Result<Array3<f64>, Error> {
    let mut field = Array3::zeros((shape[0], shape[1], shape[2]));
    for block in blocks {
        let o = block.origin;
        let e = block.extent();
        if (0..3).any(|a| o[a] + e[a] > shape[a]) {
            return Err(Error::Execution(format!(
                "block at {:?} with extent {:?} falls outside {:?}",
                o, e, shape
            )));
        }
        field
            .slice_mut(s![o[0]..o[0] + e[0], o[1]..o[1] + e[1], o[2]..o[2] + e[2]])
            .assign(&block.data);
    }
    Ok(field)
}
