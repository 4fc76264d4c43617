use std::collections::VecDeque;
use std::sync::Arc;

use chunk_types::NodeId;
use tracing::trace;

use crate::graph::ComputationGraph;
use crate::task::{Realized, Value};

/// Dependency bookkeeping shared by both backends. A node becomes ready once
/// all of its dependencies have completed; a value is dropped once every node
/// consuming it has completed.
pub(crate) struct Frontier<'g> {
    graph: &'g ComputationGraph,
    dependents: Vec<Vec<NodeId>>,
    waiting_on: Vec<usize>,
    consumers_left: Vec<usize>,
    values: Vec<Option<Arc<Value>>>,
    ready: VecDeque<NodeId>,
    completed: usize,
}

impl<'g> Frontier<'g> {
    pub fn new(graph: &'g ComputationGraph) -> Self {
        let dependents = graph.dependents();
        let waiting_on: Vec<usize> = graph.nodes().iter().map(|n| n.deps.len()).collect();
        let consumers_left = dependents.iter().map(|d| d.len()).collect();
        let ready = waiting_on
            .iter()
            .enumerate()
            .filter(|(_, &w)| w == 0)
            .map(|(i, _)| NodeId(i as u32))
            .collect();
        Self {
            graph,
            dependents,
            waiting_on,
            consumers_left,
            values: vec![None; graph.node_count()],
            ready,
            completed: 0,
        }
    }

    pub fn next_ready(&mut self) -> Option<NodeId> {
        self.ready.pop_front()
    }

    /// Put back a node that could not be dispatched yet.
    pub fn requeue(&mut self, id: NodeId) {
        self.ready.push_front(id);
    }

    /// Read-only snapshots of `id`'s inputs, in dependency order.
    pub fn inputs(&self, id: NodeId) -> Vec<Arc<Value>> {
        self.graph
            .node(id)
            .deps
            .iter()
            .filter_map(|d| self.values[d.index()].clone())
            .collect()
    }

    pub fn complete(&mut self, id: NodeId, value: Value) {
        trace!(node = id.0, "node_complete");
        self.values[id.index()] = Some(Arc::new(value));
        self.completed += 1;

        for &dep in &self.graph.node(id).deps {
            let left = &mut self.consumers_left[dep.index()];
            *left -= 1;
            if *left == 0 {
                self.values[dep.index()] = None;
            }
        }
        for &next in &self.dependents[id.index()] {
            let waiting = &mut self.waiting_on[next.index()];
            *waiting -= 1;
            if *waiting == 0 {
                self.ready.push_back(next);
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed == self.graph.node_count()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn take_output(&mut self) -> Option<Realized> {
        let value = self.values[self.graph.root().index()].take()?;
        match Arc::try_unwrap(value) {
            Ok(Value::Output(realized)) => Some(realized),
            Ok(_) => None,
            Err(shared) => match &*shared {
                Value::Output(realized) => Some(realized.clone()),
                _ => None,
            },
        }
    }
}
