use super::{LanternMetric, LanternMetricResult};
use crate::cache::ComputedCache;
use crate::computed::MetricInputs;
use crate::error::Result;
use crate::trace_processor::ProcessedNavigation;
use lantern_abstract::{InitiatorType, MetricKind, ResourceType};
use lantern_simulator::{CpuTask, DependencyGraph, NetworkNode, NodeId, NodeKind};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

/// How a first-paint based graph decides which nodes blocked the paint.
pub struct FirstPaintOptions<'a> {
    /// Microseconds on the trace clock.
    pub cutoff_timestamp: f64,
    pub treat_node_as_render_blocking: &'a dyn Fn(&NetworkNode) -> bool,
    pub additional_cpu_nodes_to_treat_as_render_blocking: Option<&'a dyn Fn(&CpuTask) -> bool>,
}

struct RenderBlockingNodeData {
    definitely_not_render_blocking_script_urls: HashSet<String>,
    render_blocking_cpu_node_ids: HashSet<String>,
}

pub struct LanternFirstContentfulPaint;

impl LanternFirstContentfulPaint {
    pub fn request(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<Rc<LanternMetricResult>> {
        super::request::<Self, _>(inputs, cache, |_, _| Ok(()))
    }

    /// URLs of script requests passing `filter`.
    pub fn script_urls<F>(graph: &DependencyGraph, filter: F) -> BTreeSet<String>
    where
        F: Fn(&NetworkNode) -> bool,
    {
        graph
            .reachable()
            .into_iter()
            .filter_map(|id| graph.node(id).as_network())
            .filter(|n| n.request.is_resource_type(ResourceType::Script))
            .filter(|n| filter(n))
            .map(|n| n.request.url.clone())
            .collect()
    }

    fn render_blocking_node_data(
        graph: &DependencyGraph,
        options: &FirstPaintOptions<'_>,
    ) -> RenderBlockingNodeData {
        let mut cpu_nodes: Vec<NodeId> = Vec::new();
        let mut script_url_to_node: HashMap<String, NodeId> = HashMap::new();
        for id in graph.reachable() {
            let node = graph.node(id);
            let Some(task) = node.as_cpu() else {
                continue;
            };
            if node.start_time() <= options.cutoff_timestamp {
                cpu_nodes.push(id);
            }
            for url in task.evaluate_script_urls() {
                let earliest = script_url_to_node.entry(url).or_insert(id);
                if node.start_time() < graph.node(*earliest).start_time() {
                    *earliest = id;
                }
            }
        }
        cpu_nodes.sort_by(|a, b| graph.node(*a).start_time().total_cmp(&graph.node(*b).start_time()));

        let possibly_render_blocking = Self::script_urls(graph, |n| {
            n.request.network_end_time * 1000.0 <= options.cutoff_timestamp
                && (options.treat_node_as_render_blocking)(n)
        });

        let mut definitely_not_render_blocking_script_urls = HashSet::new();
        let mut blocking: HashSet<NodeId> = HashSet::new();
        for url in possibly_render_blocking {
            let Some(evaluation) = script_url_to_node.get(&url) else {
                continue;
            };
            if cpu_nodes.contains(evaluation) {
                blocking.insert(*evaluation);
            } else {
                // Evaluated after the paint.
                definitely_not_render_blocking_script_urls.insert(url);
            }
        }

        let first_matching = |predicate: &dyn Fn(&CpuTask) -> bool| {
            cpu_nodes
                .iter()
                .copied()
                .find(|id| graph.node(*id).as_cpu().is_some_and(predicate))
        };
        blocking.extend(first_matching(&|t: &CpuTask| t.did_perform_layout()));
        blocking.extend(first_matching(&|t: &CpuTask| t.has_child("Paint")));
        blocking.extend(first_matching(&|t: &CpuTask| t.has_child("ParseHTML")));

        if let Some(additional) = options.additional_cpu_nodes_to_treat_as_render_blocking {
            blocking.extend(
                cpu_nodes
                    .iter()
                    .copied()
                    .filter(|id| graph.node(*id).as_cpu().is_some_and(additional)),
            );
        }

        RenderBlockingNodeData {
            definitely_not_render_blocking_script_urls,
            render_blocking_cpu_node_ids: blocking
                .into_iter()
                .map(|id| graph.node(id).id.clone())
                .collect(),
        }
    }

    /// The subgraph of nodes that had to finish before the paint at the cutoff.
    pub fn first_paint_based_graph(
        graph: &DependencyGraph,
        options: &FirstPaintOptions<'_>,
    ) -> DependencyGraph {
        let data = Self::render_blocking_node_data(graph, options);
        let cutoff = options.cutoff_timestamp;

        graph.clone_with_relationships(|node| match &node.kind {
            NodeKind::Network(network) => {
                // Unfinished requests have a negative end time.
                let ended_after_paint = node.end_time() > cutoff || node.start_time() > cutoff;
                if ended_after_paint && !node.is_main_document() {
                    return false;
                }
                if data
                    .definitely_not_render_blocking_script_urls
                    .contains(&network.request.url)
                {
                    return false;
                }
                (options.treat_node_as_render_blocking)(network)
            }
            NodeKind::Cpu(_) => data.render_blocking_cpu_node_ids.contains(&node.id),
        })
    }
}

impl LanternMetric for LanternFirstContentfulPaint {
    const KIND: MetricKind = MetricKind::FirstContentfulPaint;
    type Extras = ();

    fn optimistic_graph(graph: &DependencyGraph, navigation: &ProcessedNavigation) -> Result<DependencyGraph> {
        // Script-initiated requests look render blocking but never are.
        Ok(Self::first_paint_based_graph(
            graph,
            &FirstPaintOptions {
                cutoff_timestamp: navigation.timestamps.first_contentful_paint,
                treat_node_as_render_blocking: &|n: &NetworkNode| {
                    n.has_render_blocking_priority() && n.initiator_type() != InitiatorType::Script
                },
                additional_cpu_nodes_to_treat_as_render_blocking: None,
            },
        ))
    }

    fn pessimistic_graph(graph: &DependencyGraph, navigation: &ProcessedNavigation) -> Result<DependencyGraph> {
        Ok(Self::first_paint_based_graph(
            graph,
            &FirstPaintOptions {
                cutoff_timestamp: navigation.timestamps.first_contentful_paint,
                treat_node_as_render_blocking: &|n: &NetworkNode| n.has_render_blocking_priority(),
                additional_cpu_nodes_to_treat_as_render_blocking: None,
            },
        ))
    }
}
