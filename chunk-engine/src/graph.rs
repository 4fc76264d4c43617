//! Lazy chunk-partitioned task graph for a Cahn–Hilliard run.
//!
//! Nodes live in one arena and refer to each other by [`NodeId`]. For `C`
//! chunks and `T` steps the layout is:
//!
//! - `0..C`: `Init` of each chunk;
//! - `t*C..(t+1)*C` for `t` in `1..=T`: `Step` `t` of each chunk;
//! - `C*(T+1)`: assembly of the microstructure;
//! - `C*(T+1) + 1`: assembly of the response;
//! - `C*(T+1) + 2`: the `Collect` root.

use chunk_types::{Field, Node, NodeId, SimulationParams, Task, STENCIL_REACH};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grid::ChunkGrid;
use crate::validation::validate;
use crate::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComputationGraph {
    params: SimulationParams,
    grid: ChunkGrid,
    nodes: Vec<Node>,
}

impl ComputationGraph {
    /// Build the dependency structure without evaluating anything.
    pub fn build(params: &SimulationParams) -> Result<Self, Error> {
        validate(params)?;

        let grid = ChunkGrid::from_params(params);
        let chunks = grid.len();
        let steps = params.n_steps as usize;
        let mut nodes = Vec::with_capacity(chunks * (steps + 1) + 3);

        for chunk in 0..chunks {
            nodes.push(Node {
                task: Task::Init { chunk: chunk as u32 },
                deps: vec![],
            });
        }

        // The neighbourhood of a chunk is the same at every step.
        let neighbourhoods: Vec<Vec<usize>> = (0..chunks)
            .map(|c| grid.neighbourhood(c, STENCIL_REACH))
            .collect();

        for step in 1..=steps {
            let prev = (step - 1) * chunks;
            for (chunk, around) in neighbourhoods.iter().enumerate() {
                let mut deps = Vec::with_capacity(around.len());
                deps.push(NodeId((prev + chunk) as u32));
                deps.extend(
                    around
                        .iter()
                        .filter(|&&n| n != chunk)
                        .map(|&n| NodeId((prev + n) as u32)),
                );
                nodes.push(Node {
                    task: Task::Step {
                        chunk: chunk as u32,
                        step: step as u32,
                    },
                    deps,
                });
            }
        }

        let last = steps * chunks;
        let microstructure = nodes.len();
        nodes.push(Node {
            task: Task::Assemble { field: Field::Microstructure },
            deps: (0..chunks).map(|c| NodeId(c as u32)).collect(),
        });
        nodes.push(Node {
            task: Task::Assemble { field: Field::Response },
            deps: (last..last + chunks).map(|n| NodeId(n as u32)).collect(),
        });
        nodes.push(Node {
            task: Task::Collect,
            deps: vec![NodeId(microstructure as u32), NodeId(microstructure as u32 + 1)],
        });

        debug!(
            chunks,
            steps,
            nodes = nodes.len(),
            edges = nodes.iter().map(|n| n.deps.len()).sum::<usize>(),
            "graph_built"
        );

        Ok(Self {
            params: params.clone(),
            grid,
            nodes,
        })
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.grid.len()
    }

    pub fn microstructure(&self) -> NodeId {
        NodeId((self.nodes.len() - 3) as u32)
    }

    pub fn response(&self) -> NodeId {
        NodeId((self.nodes.len() - 2) as u32)
    }

    pub fn root(&self) -> NodeId {
        NodeId((self.nodes.len() - 1) as u32)
    }

    /// Node computing step `step` of `chunk`; step 0 is the `Init` node.
    pub fn step_node(&self, chunk: usize, step: usize) -> NodeId {
        NodeId((step * self.grid.len() + chunk) as u32)
    }

    pub fn final_step_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        let last = self.params.n_steps as usize;
        (0..self.grid.len()).map(move |c| self.step_node(c, last))
    }

    /// Reverse adjacency: for every node, the nodes that consume it.
    pub fn dependents(&self) -> Vec<Vec<NodeId>> {
        let mut out = vec![Vec::new(); self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            for dep in &node.deps {
                out[dep.index()].push(NodeId(id as u32));
            }
        }
        out
    }
}
