//! Page dependency graph: network and CPU nodes in an arena, linked by
//! dependency edges and rooted at the requested document.

pub mod builder;
pub mod node;

pub use builder::PageDependencyGraph;
pub use node::{CpuTask, NetworkNode, Node, NodeId, NodeKind};

use crate::error::{LanternError, Result};
use lantern_abstract::NetworkRequest;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Dependents,
    Dependencies,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    root: NodeId,
}

impl DependencyGraph {
    /// A graph holding only `root`.
    pub fn new(root: Node) -> Self {
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub(crate) fn from_parts(nodes: Vec<Node>, root: NodeId) -> Self {
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn set_is_main_document(&mut self, id: NodeId, value: bool) {
        self.nodes[id.0].is_main_document = value;
    }

    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.id == id).map(NodeId)
    }

    /// Records that `node` waits on `dependency`. Repeated edges are ignored.
    pub fn add_dependency(&mut self, node: NodeId, dependency: NodeId) -> Result<()> {
        if node == dependency {
            return Err(LanternError::SelfDependency {
                node: self.nodes[node.0].id.clone(),
            });
        }
        if self.nodes[node.0].dependencies.contains(&dependency) {
            return Ok(());
        }
        self.nodes[dependency.0].dependents.push(node);
        self.nodes[node.0].dependencies.push(dependency);
        Ok(())
    }

    pub fn add_dependent(&mut self, node: NodeId, dependent: NodeId) -> Result<()> {
        self.add_dependency(dependent, node)
    }

    pub fn remove_dependency(&mut self, node: NodeId, dependency: NodeId) {
        self.nodes[node.0].dependencies.retain(|d| *d != dependency);
        self.nodes[dependency.0].dependents.retain(|d| *d != node);
    }

    /// Breadth-first walk from `start`, `start` included.
    pub fn traverse(&self, start: NodeId, direction: Direction) -> Vec<NodeId> {
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut order = Vec::new();
        while let Some(id) = queue.pop_front() {
            order.push(id);
            let next = match direction {
                Direction::Dependents => &self.nodes[id.0].dependents,
                Direction::Dependencies => &self.nodes[id.0].dependencies,
            };
            for n in next {
                if visited.insert(*n) {
                    queue.push_back(*n);
                }
            }
        }
        order
    }

    /// Every node reachable from the root.
    pub fn reachable(&self) -> Vec<NodeId> {
        self.traverse(self.root, Direction::Dependents)
    }

    /// Whether `node` transitively depends on `other`. A node depends on itself.
    pub fn is_dependent_on(&self, node: NodeId, other: NodeId) -> bool {
        self.traverse(node, Direction::Dependencies)
            .into_iter()
            .any(|id| id == other)
    }

    pub fn has_cycle(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }
        let mut marks = vec![Mark::New; self.nodes.len()];

        for start in 0..self.nodes.len() {
            if marks[start] != Mark::New {
                continue;
            }
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::Active;
            while let Some((id, child)) = stack.pop() {
                let dependents = &self.nodes[id].dependents;
                if child >= dependents.len() {
                    marks[id] = Mark::Done;
                    continue;
                }
                stack.push((id, child + 1));
                let next = dependents[child].0;
                match marks[next] {
                    Mark::Active => return true,
                    Mark::New => {
                        marks[next] = Mark::Active;
                        stack.push((next, 0));
                    }
                    Mark::Done => {}
                }
            }
        }
        false
    }

    /// A new graph with every node matching `predicate`, all of their transitive
    /// dependencies and the root. Edges between kept nodes are preserved.
    pub fn clone_with_relationships<F>(&self, predicate: F) -> DependencyGraph
    where
        F: Fn(&Node) -> bool,
    {
        let mut keep: HashSet<NodeId> = HashSet::from([self.root]);
        for id in self.reachable() {
            if keep.contains(&id) && id != self.root {
                continue;
            }
            if predicate(&self.nodes[id.0]) {
                keep.extend(self.traverse(id, Direction::Dependencies));
            }
        }

        let mut remap: HashMap<NodeId, NodeId> = HashMap::new();
        let mut nodes = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if keep.contains(&NodeId(index)) {
                remap.insert(NodeId(index), NodeId(nodes.len()));
                nodes.push(node.without_relationships());
            }
        }
        for (old, new) in &remap {
            let original = &self.nodes[old.0];
            nodes[new.0].dependencies = original
                .dependencies
                .iter()
                .filter_map(|d| remap.get(d).copied())
                .collect();
            nodes[new.0].dependents = original
                .dependents
                .iter()
                .filter_map(|d| remap.get(d).copied())
                .collect();
        }

        let root = remap.get(&self.root).copied().unwrap_or(NodeId(0));
        DependencyGraph::from_parts(nodes, root)
    }

    /// Requests of every network node reachable from the root.
    pub fn network_requests(&self) -> Vec<&NetworkRequest> {
        self.reachable()
            .into_iter()
            .filter_map(|id| self.nodes[id.0].as_network())
            .map(|n| n.request.as_ref())
            .collect()
    }
}
