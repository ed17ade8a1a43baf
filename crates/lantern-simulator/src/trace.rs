use serde::Serialize;
use std::collections::BTreeMap;

use crate::graph::{DependencyGraph, NodeId, NodeKind};
use crate::tcp_connection::ConnectionTiming;

/// Simulated timing of one node, in milliseconds from the start of the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTiming {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub queued_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_timing: Option<ConnectionTiming>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub time_in_ms: f64,
    pub node_timings: BTreeMap<NodeId, NodeTiming>,
}

impl SimulationResult {
    /// Timings ordered by simulated start time.
    pub fn sorted_by_start_time(&self) -> Vec<(NodeId, NodeTiming)> {
        let mut entries: Vec<(NodeId, NodeTiming)> =
            self.node_timings.iter().map(|(id, t)| (*id, *t)).collect();
        entries.sort_by(|a, b| a.1.start_time.total_cmp(&b.1.start_time));
        entries
    }

    pub fn export_report(&self, graph: &DependencyGraph) -> SimulationReport {
        let nodes = self
            .sorted_by_start_time()
            .into_iter()
            .map(|(id, timing)| {
                let node = graph.node(id);
                let (kind, url) = match &node.kind {
                    NodeKind::Network(n) => ("network", Some(n.request.url.clone())),
                    NodeKind::Cpu(_) => ("cpu", None),
                };
                NodeTimingReport {
                    id: node.id.clone(),
                    kind,
                    url,
                    timing,
                }
            })
            .collect();
        SimulationReport {
            time_in_ms: self.time_in_ms,
            nodes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTimingReport {
    pub id: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub timing: NodeTiming,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub time_in_ms: f64,
    pub nodes: Vec<NodeTimingReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use lantern_abstract::NetworkRequest;
    use std::sync::Arc;

    #[test]
    fn test_report_is_ordered_by_start_time() {
        let mut graph = DependencyGraph::new(Node::network(Arc::new(NetworkRequest::new(
            "1",
            "https://a.com/",
        ))));
        let late = graph.add_node(Node::network(Arc::new(NetworkRequest::new(
            "2",
            "https://a.com/app.js",
        ))));
        let timing = |start: f64| NodeTiming {
            start_time: start,
            end_time: start + 10.0,
            duration: 10.0,
            queued_time: start,
            connection_timing: None,
        };
        let result = SimulationResult {
            time_in_ms: 60.0,
            node_timings: BTreeMap::from([(graph.root(), timing(50.0)), (late, timing(0.0))]),
        };

        let report = result.export_report(&graph);
        assert_eq!(report.nodes[0].id, "2");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["nodes"][1]["startTime"], 50.0);
        assert_eq!(json["nodes"][1]["kind"], "network");
        assert!(json["nodes"][1].get("connectionTiming").is_none());
    }
}
