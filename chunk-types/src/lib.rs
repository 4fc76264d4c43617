use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cells a step update may read beyond its own chunk on each side.
///
/// The fourth-order term of the Cahn–Hilliard operator is a Laplacian of a
/// Laplacian, so every cell needs neighbours two cells away.
pub const STENCIL_REACH: usize = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeShape(pub [usize; 3]);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkSpec(pub [usize; 3]);

impl VolumeShape {
    pub fn cells(&self) -> usize {
        self.0.iter().product()
    }
}

impl fmt::Display for VolumeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.0[0], self.0[1], self.0[2])
    }
}

impl fmt::Display for ChunkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.0[0], self.0[1], self.0[2])
    }
}

fn default_seed() -> u64 {
    99
}

/// Everything that determines a computation graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub shape: VolumeShape,
    pub chunk: ChunkSpec,
    pub n_steps: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl SimulationParams {
    pub fn new(shape: [usize; 3], chunk: [usize; 3], n_steps: u32) -> Self {
        Self {
            shape: VolumeShape(shape),
            chunk: ChunkSpec(chunk),
            n_steps,
            seed: default_seed(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    Threaded,
    Multiprocess,
}

impl SchedulerKind {
    pub const ALL: [SchedulerKind; 2] = [SchedulerKind::Threaded, SchedulerKind::Multiprocess];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerKind::Threaded => "threaded",
            SchedulerKind::Multiprocess => "multiprocess",
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "threaded" => Ok(SchedulerKind::Threaded),
            "multiprocess" => Ok(SchedulerKind::Multiprocess),
            other => Err(format!("unknown scheduler kind '{}'", other)),
        }
    }
}

/// Explicit finite-difference Cahn–Hilliard parameters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CahnHilliard {
    pub spacing: f64,
    pub delta_t: f64,
    /// Interface width between phases; the gradient energy coefficient is its square.
    pub width: f64,
}

impl CahnHilliard {
    pub fn gamma(&self) -> f64 {
        self.width * self.width
    }
}

impl Default for CahnHilliard {
    fn default() -> Self {
        Self {
            spacing: 1.0,
            delta_t: 0.005,
            width: 1.0,
        }
    }
}

/// The step-update function, as data so it can be shipped to worker processes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    CahnHilliard(CahnHilliard),
    /// Delegates to `inner` but fails every update of step `step`.
    FailAtStep { step: u32, inner: Box<Kernel> },
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::CahnHilliard(CahnHilliard::default())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Microstructure,
    Response,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Init { chunk: u32 },
    Step { chunk: u32, step: u32 },
    Assemble { field: Field },
    Collect,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Init { chunk } => write!(f, "init(chunk {})", chunk),
            Task::Step { chunk, step } => write!(f, "step {}(chunk {})", step, chunk),
            Task::Assemble { field: Field::Microstructure } => f.write_str("assemble(microstructure)"),
            Task::Assemble { field: Field::Response } => f.write_str("assemble(response)"),
            Task::Collect => f.write_str("collect"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub task: Task,
    pub deps: Vec<NodeId>,
}

/// One chunk of a field, positioned by the global index of its first cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub origin: [usize; 3],
    pub data: Array3<f64>,
}

impl Block {
    pub fn extent(&self) -> [usize; 3] {
        let (d, h, w) = self.data.dim();
        [d, h, w]
    }
}

/// A chunk's previous-step values padded by `width` cells of neighbour data on
/// every side. Index `[width, width, width]` is the chunk's first cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Halo {
    pub width: usize,
    pub data: Array3<f64>,
}

/// Work that can run without access to the rest of the graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Job {
    Init {
        origin: [usize; 3],
        extent: [usize; 3],
        shape: VolumeShape,
        seed: u64,
    },
    /// The chunk's own previous values are the interior of `halo`.
    Step {
        step: u32,
        origin: [usize; 3],
        halo: Halo,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WorkerRequest {
    Configure(Kernel),
    Run { node: NodeId, job: Job },
    Shutdown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WorkerReply {
    Done { node: NodeId, block: Block },
    Failed { node: NodeId, message: String },
}
