use lantern_abstract::{InitiatorType, NetworkRequest, Priority, ResourceType, TraceEvent};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Index of a node inside its graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkNode {
    pub request: Arc<NetworkRequest>,
}

impl NetworkNode {
    /// Requests that never wait on a connection.
    pub fn is_connectionless(&self) -> bool {
        self.request.from_disk_cache || self.request.is_non_network()
    }

    pub fn has_render_blocking_priority(&self) -> bool {
        let priority = self.request.priority;
        let is_script = self.request.is_resource_type(ResourceType::Script);
        let is_document = self.request.is_resource_type(ResourceType::Document);
        priority == Priority::VeryHigh || (priority == Priority::High && (is_script || is_document))
    }

    pub fn initiator_type(&self) -> InitiatorType {
        self.request
            .initiator
            .as_ref()
            .map(|i| i.kind)
            .unwrap_or_default()
    }
}

/// A top-level main thread task together with every event nested inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuTask {
    pub event: TraceEvent,
    pub child_events: Vec<TraceEvent>,
    /// Set when the next task started before this one reported ending.
    pub corrected_end_ts: Option<f64>,
}

impl CpuTask {
    pub fn did_perform_layout(&self) -> bool {
        self.has_child("Layout")
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.child_events.iter().any(|e| e.name == name)
    }

    pub fn evaluate_script_urls(&self) -> BTreeSet<String> {
        self.child_events
            .iter()
            .filter(|e| e.name == "EvaluateScript")
            .filter_map(|e| e.data().and_then(|d| d.url.clone()))
            .collect()
    }

    /// Microseconds on the trace clock, after any overlap correction.
    pub fn end_ts(&self) -> f64 {
        self.corrected_end_ts
            .unwrap_or(self.event.ts + self.event.dur.unwrap_or(0.0))
    }

    /// Microseconds, measured to the corrected end.
    pub fn duration(&self) -> f64 {
        self.end_ts() - self.event.ts
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Network(NetworkNode),
    Cpu(Arc<CpuTask>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub(crate) dependencies: Vec<NodeId>,
    pub(crate) dependents: Vec<NodeId>,
    pub(crate) is_main_document: bool,
}

impl Node {
    pub fn network(request: Arc<NetworkRequest>) -> Self {
        Self {
            id: request.request_id.clone(),
            kind: NodeKind::Network(NetworkNode { request }),
            dependencies: Vec::new(),
            dependents: Vec::new(),
            is_main_document: false,
        }
    }

    pub fn cpu(task: CpuTask) -> Self {
        Self {
            id: format!("{}.{}", task.event.tid, task.event.ts),
            kind: NodeKind::Cpu(Arc::new(task)),
            dependencies: Vec::new(),
            dependents: Vec::new(),
            is_main_document: false,
        }
    }

    /// Copy of the node with its edges dropped.
    pub fn without_relationships(&self) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind.clone(),
            dependencies: Vec::new(),
            dependents: Vec::new(),
            is_main_document: self.is_main_document,
        }
    }

    /// Microseconds on the trace clock.
    pub fn start_time(&self) -> f64 {
        match &self.kind {
            NodeKind::Network(n) => n.request.renderer_start_time * 1000.0,
            NodeKind::Cpu(c) => c.event.ts,
        }
    }

    pub fn end_time(&self) -> f64 {
        match &self.kind {
            NodeKind::Network(n) => n.request.network_end_time * 1000.0,
            NodeKind::Cpu(c) => c.end_ts(),
        }
    }

    pub fn as_network(&self) -> Option<&NetworkNode> {
        match &self.kind {
            NodeKind::Network(n) => Some(n),
            NodeKind::Cpu(_) => None,
        }
    }

    pub fn as_cpu(&self) -> Option<&CpuTask> {
        match &self.kind {
            NodeKind::Cpu(c) => Some(c.as_ref()),
            NodeKind::Network(_) => None,
        }
    }

    pub fn is_network(&self) -> bool {
        self.as_network().is_some()
    }

    pub fn is_cpu(&self) -> bool {
        self.as_cpu().is_some()
    }

    pub fn is_main_document(&self) -> bool {
        self.is_main_document
    }

    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    pub fn dependents(&self) -> &[NodeId] {
        &self.dependents
    }

    /// A node may only depend on nodes that started no later than itself.
    pub fn can_depend_on(&self, other: &Node) -> bool {
        other.start_time() <= self.start_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_abstract::TraceEventData;

    #[test]
    fn test_network_node_times_in_microseconds() {
        let mut request = NetworkRequest::new("1", "https://a.com/");
        request.renderer_start_time = 10.0;
        request.network_end_time = 25.5;
        let node = Node::network(Arc::new(request));
        assert_eq!(node.start_time(), 10_000.0);
        assert_eq!(node.end_time(), 25_500.0);
    }

    #[test]
    fn test_render_blocking_priority() {
        let mut request = NetworkRequest::new("1", "https://a.com/app.js");
        request.priority = Priority::High;
        request.resource_type = Some(ResourceType::Script);
        let node = NetworkNode {
            request: Arc::new(request.clone()),
        };
        assert!(node.has_render_blocking_priority());

        request.resource_type = Some(ResourceType::Image);
        let image = NetworkNode {
            request: Arc::new(request),
        };
        assert!(!image.has_render_blocking_priority());
    }

    #[test]
    fn test_cpu_task_corrected_end_and_scripts() {
        let task = CpuTask {
            event: TraceEvent::complete("RunTask", 1000.0, 500.0, 1, 1),
            child_events: vec![
                TraceEvent::complete("EvaluateScript", 1010.0, 30.0, 1, 1).with_data(
                    TraceEventData {
                        url: Some("https://a.com/app.js".into()),
                        ..Default::default()
                    },
                ),
                TraceEvent::complete("Layout", 1100.0, 30.0, 1, 1),
            ],
            corrected_end_ts: Some(1299.0),
        };
        assert!(task.did_perform_layout());
        assert_eq!(
            task.evaluate_script_urls().into_iter().collect::<Vec<_>>(),
            vec!["https://a.com/app.js".to_string()]
        );
        assert_eq!(task.duration(), 299.0);
        let node = Node::cpu(task);
        assert_eq!(node.end_time(), 1299.0);
        assert_eq!(node.id, "1.1000");
    }
}
