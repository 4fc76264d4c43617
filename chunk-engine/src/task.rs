//! Turning a graph node plus its realized inputs into a result.

use std::sync::Arc;

use chunk_types::{Block, Halo, Job, Kernel, NodeId, Task, STENCIL_REACH};
use ndarray::{s, Array3};

use crate::blocks;
use crate::graph::ComputationGraph;
use crate::grid::ChunkGrid;
use crate::kernel::{microstructure, StepFailure, StepUpdate};
use crate::Error;

/// The realized outputs of a graph: the initial field and the field after the last step.
#[derive(Clone, Debug, PartialEq)]
pub struct Realized {
    pub microstructure: Array3<f64>,
    pub response: Array3<f64>,
}

#[derive(Debug)]
pub(crate) enum Value {
    Block(Block),
    Field(Array3<f64>),
    Output(Realized),
}

impl Value {
    fn as_block(&self) -> Result<&Block, Error> {
        match self {
            Value::Block(b) => Ok(b),
            _ => Err(Error::Execution("expected a chunk block input".into())),
        }
    }

    fn as_field(&self) -> Result<&Array3<f64>, Error> {
        match self {
            Value::Field(f) => Ok(f),
            _ => Err(Error::Execution("expected an assembled field input".into())),
        }
    }
}

/// Run a self-contained job. This is all a worker process ever does.
pub fn run_job(job: Job, kernel: &Kernel) -> Result<Block, StepFailure> {
    match job {
        Job::Init {
            origin,
            extent,
            shape,
            seed,
        } => Ok(microstructure(origin, extent, shape, seed)),
        Job::Step { step, origin, halo } => {
            let state = interior(origin, &halo)?;
            kernel.update(step, &state, &halo)
        }
    }
}

/// The unpadded chunk inside a halo.
fn interior(origin: [usize; 3], halo: &Halo) -> Result<Block, StepFailure> {
    let w = halo.width;
    let (p0, p1, p2) = halo.data.dim();
    if [p0, p1, p2].iter().any(|&p| p <= 2 * w) {
        return Err(StepFailure(format!(
            "halo {:?} leaves no interior at width {}",
            [p0, p1, p2],
            w
        )));
    }
    Ok(Block {
        origin,
        data: halo.data.slice(s![w..p0 - w, w..p1 - w, w..p2 - w]).to_owned(),
    })
}

/// The job for `Init` and `Step` nodes, or `None` for the reductions.
pub(crate) fn job_for(
    graph: &ComputationGraph,
    id: NodeId,
    inputs: &[Arc<Value>],
) -> Result<Option<Job>, Error> {
    let grid = graph.grid();
    match graph.node(id).task {
        Task::Init { chunk } => Ok(Some(Job::Init {
            origin: grid.origin(chunk as usize),
            extent: grid.extent(chunk as usize),
            shape: graph.params().shape,
            seed: graph.params().seed,
        })),
        Task::Step { chunk, step } => {
            let halo = gather_halo(graph, id, chunk as usize, inputs)?;
            Ok(Some(Job::Step {
                step,
                origin: grid.origin(chunk as usize),
                halo,
            }))
        }
        Task::Assemble { .. } | Task::Collect => Ok(None),
    }
}

pub(crate) fn is_reduction(task: Task) -> bool {
    matches!(task, Task::Assemble { .. } | Task::Collect)
}

/// Merge chunk blocks or collect the two assembled fields.
pub(crate) fn reduce(graph: &ComputationGraph, id: NodeId, inputs: &[Arc<Value>]) -> Result<Value, Error> {
    match graph.node(id).task {
        Task::Assemble { .. } => {
            let blocks = inputs.iter().map(|v| v.as_block()).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Field(blocks::assemble(graph.grid().shape(), blocks)?))
        }
        Task::Collect => match inputs {
            [micro, response] => Ok(Value::Output(Realized {
                microstructure: micro.as_field()?.clone(),
                response: response.as_field()?.clone(),
            })),
            _ => Err(Error::Execution("collect expects two inputs".into())),
        },
        task => Err(Error::Execution(format!("{} is not a reduction", task))),
    }
}

pub(crate) fn evaluate(
    graph: &ComputationGraph,
    id: NodeId,
    inputs: &[Arc<Value>],
    kernel: &Kernel,
) -> Result<Value, Error> {
    match job_for(graph, id, inputs)? {
        Some(job) => run_job(job, kernel)
            .map(Value::Block)
            .map_err(|e| Error::worker_failure(graph, id, e.to_string())),
        None => reduce(graph, id, inputs),
    }
}

/// Where each padded index along one axis reads from.
struct AxisMap {
    owners: Vec<usize>,
    slot: Vec<usize>,
    local: Vec<usize>,
}

impl AxisMap {
    fn new(grid: &ChunkGrid, axis: usize, origin: usize, extent: usize, reach: usize) -> Self {
        let owners = grid.covering_along(axis, origin, extent, reach);
        let size = grid.shape()[axis] as isize;
        let chunk = grid.chunk()[axis];
        let mut slot = Vec::with_capacity(extent + 2 * reach);
        let mut local = Vec::with_capacity(extent + 2 * reach);
        for p in 0..extent + 2 * reach {
            let g = (origin as isize + p as isize - reach as isize).rem_euclid(size) as usize;
            let owner = grid.owner_along(axis, g);
            slot.push(owners.binary_search(&owner).unwrap_or(0));
            local.push(g - owner * chunk);
        }
        Self { owners, slot, local }
    }
}

/// Copy the previous-step neighbourhood of `chunk` into one padded array.
fn gather_halo(
    graph: &ComputationGraph,
    id: NodeId,
    chunk: usize,
    inputs: &[Arc<Value>],
) -> Result<Halo, Error> {
    let grid = graph.grid();
    let node = graph.node(id);
    let origin = grid.origin(chunk);
    let extent = grid.extent(chunk);
    let maps: Vec<AxisMap> = (0..3)
        .map(|a| AxisMap::new(grid, a, origin[a], extent[a], STENCIL_REACH))
        .collect();
    let dims = [maps[0].owners.len(), maps[1].owners.len(), maps[2].owners.len()];

    let mut table: Vec<Option<&Block>> = vec![None; dims[0] * dims[1] * dims[2]];
    for (dep, value) in node.deps.iter().zip(inputs) {
        let source = match graph.node(*dep).task {
            Task::Init { chunk } | Task::Step { chunk, .. } => chunk as usize,
            task => return Err(Error::Execution(format!("{} cannot feed a step", task))),
        };
        let coord = grid.coord(source);
        let mut slots = [0usize; 3];
        for a in 0..3 {
            slots[a] = maps[a].owners.binary_search(&coord[a]).map_err(|_| {
                Error::Execution(format!("chunk {} lies outside the halo of chunk {}", source, chunk))
            })?;
        }
        table[(slots[0] * dims[1] + slots[1]) * dims[2] + slots[2]] = Some(value.as_block()?);
    }
    let table: Vec<&Block> = table
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| Error::Execution(format!("{} is missing a neighbour input", id)))?;

    let padded = (
        maps[0].slot.len(),
        maps[1].slot.len(),
        maps[2].slot.len(),
    );
    let data = Array3::from_shape_fn(padded, |(z, y, x)| {
        let block = table[(maps[0].slot[z] * dims[1] + maps[1].slot[y]) * dims[2] + maps[2].slot[x]];
        block.data[[maps[0].local[z], maps[1].local[y], maps[2].local[x]]]
    });

    Ok(Halo {
        width: STENCIL_REACH,
        data,
    })
}
