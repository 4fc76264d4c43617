use chunk_types::SimulationParams;
use crate::Error;

const AXES: [&str; 3] = ["depth", "height", "width"];

pub(crate) fn validate(params: &SimulationParams) -> Result<(), Error> {
    if params.n_steps < 1 {
        return Err(Error::Configuration("n_steps must be at least 1".into()));
    }

    for (axis, name) in AXES.iter().enumerate() {
        let size = params.shape.0[axis];
        let chunk = params.chunk.0[axis];
        if size == 0 {
            return Err(Error::Configuration(format!("volume {} must be positive", name)));
        }
        if chunk == 0 {
            return Err(Error::Configuration(format!("chunk {} must be positive", name)));
        }
        // Remainders are tiled by a shorter final chunk, so only oversize chunks are rejected.
        if chunk > size {
            return Err(Error::Configuration(format!(
                "chunk {} {} exceeds volume {} {}",
                name, chunk, name, size
            )));
        }
    }

    let chunks: usize = (0..3)
        .map(|a| params.shape.0[a].div_ceil(params.chunk.0[a]))
        .product();
    let nodes = chunks
        .checked_mul(params.n_steps as usize + 1)
        .and_then(|n| n.checked_add(3));
    if !matches!(nodes, Some(n) if n <= u32::MAX as usize) {
        return Err(Error::Configuration(format!(
            "{} chunks over {} steps exceed the addressable node count",
            chunks, params.n_steps
        )));
    }

    Ok(())
}
