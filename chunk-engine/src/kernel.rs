use chunk_types::{Block, CahnHilliard, Halo, Kernel, VolumeShape, STENCIL_REACH};
use ndarray::Array3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct StepFailure(pub String);

/// Advances one chunk by one step from a read-only padded snapshot of the
/// previous step.
pub trait StepUpdate {
    fn update(&self, step: u32, state: &Block, halo: &Halo) -> Result<Block, StepFailure>;
}

impl StepUpdate for Kernel {
    fn update(&self, step: u32, state: &Block, halo: &Halo) -> Result<Block, StepFailure> {
        match self {
            Kernel::CahnHilliard(ch) => ch.update(step, state, halo),
            Kernel::FailAtStep { step: failing, inner } => {
                if step == *failing {
                    Err(StepFailure(format!("injected failure at step {}", step)))
                } else {
                    inner.update(step, state, halo)
                }
            }
        }
    }
}

#[inline]
fn laplacian(a: &Array3<f64>, z: usize, y: usize, x: usize, inv_h2: f64) -> f64 {
    (a[[z - 1, y, x]]
        + a[[z + 1, y, x]]
        + a[[z, y - 1, x]]
        + a[[z, y + 1, x]]
        + a[[z, y, x - 1]]
        + a[[z, y, x + 1]]
        - 6.0 * a[[z, y, x]])
        * inv_h2
}

/// Explicit update `φ' = φ + Δt ∇²(φ³ − φ − γ∇²φ)`.
impl StepUpdate for CahnHilliard {
    fn update(&self, _step: u32, state: &Block, halo: &Halo) -> Result<Block, StepFailure> {
        let w = halo.width;
        if w < STENCIL_REACH {
            return Err(StepFailure(format!(
                "halo width {} is narrower than the stencil reach {}",
                w, STENCIL_REACH
            )));
        }
        let [n0, n1, n2] = state.extent();
        let (p0, p1, p2) = halo.data.dim();
        if [p0, p1, p2] != [n0 + 2 * w, n1 + 2 * w, n2 + 2 * w] {
            return Err(StepFailure(format!(
                "halo {:?} does not pad a chunk of {:?} by {}",
                [p0, p1, p2],
                [n0, n1, n2],
                w
            )));
        }

        let phi = &halo.data;
        let inv_h2 = 1.0 / (self.spacing * self.spacing);
        let gamma = self.gamma();

        // Chemical potential on the chunk grown by one cell; mu[m] sits at padded index w - 1 + m.
        let mu = Array3::from_shape_fn((n0 + 2, n1 + 2, n2 + 2), |(z, y, x)| {
            let (pz, py, px) = (z + w - 1, y + w - 1, x + w - 1);
            let v = phi[[pz, py, px]];
            v * v * v - v - gamma * laplacian(phi, pz, py, px, inv_h2)
        });

        let data = Array3::from_shape_fn((n0, n1, n2), |(z, y, x)| {
            phi[[z + w, y + w, x + w]] + self.delta_t * laplacian(&mu, z + 1, y + 1, x + 1, inv_h2)
        });

        if data.iter().any(|v| !v.is_finite()) {
            return Err(StepFailure(format!(
                "non-finite concentration in chunk at {:?}",
                state.origin
            )));
        }

        Ok(Block {
            origin: state.origin,
            data,
        })
    }
}

const GOLDEN: u64 = 0x9E37_79B9_7F4A_7C15;

/// Initial concentration in `[-1, 1)`. Each cell is seeded from its global
/// index so the field does not depend on how the volume is chunked.
pub fn microstructure(origin: [usize; 3], extent: [usize; 3], shape: VolumeShape, seed: u64) -> Block {
    let [_, h, w] = shape.0;
    let data = Array3::from_shape_fn((extent[0], extent[1], extent[2]), |(z, y, x)| {
        let g = ((origin[0] + z) * h + origin[1] + y) * w + origin[2] + x;
        let mut rng = SmallRng::seed_from_u64(seed ^ (g as u64).wrapping_mul(GOLDEN));
        rng.gen_range(-1.0..1.0)
    });
    Block { origin, data }
}
