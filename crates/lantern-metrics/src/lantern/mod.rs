//! Simulated metric estimates. Each metric simulates an optimistic and a
//! pessimistic subgraph of the page and blends the two estimates.

pub mod fcp;
pub mod fmp;
pub mod interactive;
pub mod lcp;
pub mod max_potential_fid;
pub mod speed_index;
pub mod tbt;

pub use fcp::LanternFirstContentfulPaint;
pub use fmp::LanternFirstMeaningfulPaint;
pub use interactive::LanternInteractive;
pub use lcp::LanternLargestContentfulPaint;
pub use max_potential_fid::LanternMaxPotentialFid;
pub use speed_index::LanternSpeedIndex;
pub use tbt::LanternTotalBlockingTime;

use crate::cache::{ArtifactKey, ComputedCache};
use crate::computed::{self, MetricInputs};
use crate::error::Result;
use crate::trace_processor::ProcessedNavigation;
use lantern_abstract::MetricKind;
use lantern_simulator::{DependencyGraph, NodeKind, SimulationResult, Simulator};
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub intercept: f64,
    pub optimistic: f64,
    pub pessimistic: f64,
}

impl Coefficients {
    pub const EVEN: Coefficients = Coefficients {
        intercept: 0.0,
        optimistic: 0.5,
        pessimistic: 0.5,
    };
}

#[derive(Debug, Clone)]
pub struct LanternMetricResult {
    pub timing: f64,
    /// Simulation of the optimistic graph, `time_in_ms` replaced by the metric estimate.
    pub optimistic_estimate: SimulationResult,
    pub pessimistic_estimate: SimulationResult,
    pub optimistic_graph: DependencyGraph,
    pub pessimistic_graph: DependencyGraph,
}

pub struct LanternInputs<'a> {
    pub graph: &'a DependencyGraph,
    pub simulator: &'a Simulator,
    pub navigation: &'a ProcessedNavigation,
}

pub trait LanternMetric {
    const KIND: MetricKind;
    /// Results of other metrics this estimate depends on.
    type Extras;

    fn coefficients(_rtt: f64) -> Coefficients {
        Coefficients::EVEN
    }

    fn optimistic_graph(graph: &DependencyGraph, navigation: &ProcessedNavigation) -> Result<DependencyGraph>;

    fn pessimistic_graph(graph: &DependencyGraph, navigation: &ProcessedNavigation) -> Result<DependencyGraph>;

    /// Turns a simulation of `graph` into the metric's estimate.
    fn estimate(
        simulation: SimulationResult,
        _graph: &DependencyGraph,
        _extras: &Self::Extras,
        _optimistic: bool,
    ) -> Result<SimulationResult> {
        Ok(simulation)
    }

    /// Final correction of the blended timing, e.g. never earlier than FCP.
    fn adjust_timing(timing: f64, _extras: &Self::Extras) -> f64 {
        timing
    }

    fn compute(inputs: &LanternInputs, extras: &Self::Extras) -> Result<LanternMetricResult> {
        let optimistic_graph = Self::optimistic_graph(inputs.graph, inputs.navigation)?;
        let pessimistic_graph = Self::pessimistic_graph(inputs.graph, inputs.navigation)?;

        let optimistic_simulation = inputs.simulator.simulate(&optimistic_graph)?;
        let pessimistic_simulation = inputs.simulator.simulate(&pessimistic_graph)?;

        let optimistic_estimate =
            Self::estimate(optimistic_simulation, &optimistic_graph, extras, true)?;
        let pessimistic_estimate =
            Self::estimate(pessimistic_simulation, &pessimistic_graph, extras, false)?;

        let coefficients = Self::coefficients(inputs.simulator.rtt());
        // Sub-second estimates don't follow the fitted curve.
        let intercept_multiplier = if coefficients.intercept > 0.0 {
            f64::min(1.0, optimistic_estimate.time_in_ms / 1000.0)
        } else {
            1.0
        };
        let timing = coefficients.intercept * intercept_multiplier
            + coefficients.optimistic * optimistic_estimate.time_in_ms
            + coefficients.pessimistic * pessimistic_estimate.time_in_ms;
        let timing = Self::adjust_timing(timing, extras);

        debug!(
            "Lantern {}: optimistic {:.1}ms, pessimistic {:.1}ms, blended {:.1}ms",
            Self::KIND,
            optimistic_estimate.time_in_ms,
            pessimistic_estimate.time_in_ms,
            timing
        );
        Ok(LanternMetricResult {
            timing,
            optimistic_estimate,
            pessimistic_estimate,
            optimistic_graph,
            pessimistic_graph,
        })
    }
}

/// Resolves the graph, simulator and navigation, then computes `M` once per run.
pub(crate) fn request<M, F>(
    inputs: &MetricInputs,
    cache: &mut ComputedCache,
    extras: F,
) -> Result<Rc<LanternMetricResult>>
where
    M: LanternMetric,
    F: FnOnce(&MetricInputs, &mut ComputedCache) -> Result<M::Extras>,
{
    cache.get_or_compute(ArtifactKey::LanternMetric(M::KIND), |cache| {
        let graph = computed::dependency_graph(inputs, cache)?;
        let simulator = computed::load_simulator(inputs, cache)?;
        let navigation = computed::processed_navigation(inputs, cache)?;
        let extras = extras(inputs, cache)?;
        M::compute(
            &LanternInputs {
                graph: &graph,
                simulator: &simulator,
                navigation: &navigation,
            },
            &extras,
        )
    })
}

/// Simulated timings of CPU nodes in `graph`.
pub(crate) fn cpu_timings<'a>(
    simulation: &'a SimulationResult,
    graph: &'a DependencyGraph,
) -> impl Iterator<Item = (&'a lantern_simulator::CpuTask, &'a lantern_simulator::NodeTiming)> + 'a {
    simulation
        .node_timings
        .iter()
        .filter_map(move |(id, timing)| match &graph.node(*id).kind {
            NodeKind::Cpu(task) => Some((task.as_ref(), timing)),
            NodeKind::Network(_) => None,
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use lantern_abstract::{NetworkRequest, Priority, ResourceType, TraceEvent, TraceEventData};
    use lantern_simulator::{CpuTask, DependencyGraph, Node, NodeId, Simulator, SimulatorOptions};
    use std::sync::Arc;

    use crate::trace_processor::{NavigationTimestamps, NavigationTimings, ProcessedNavigation};

    /// Fast link, 100ms RTT, no CPU slowdown.
    pub(crate) fn simulator() -> Simulator {
        Simulator::new(SimulatorOptions {
            rtt: 100.0,
            throughput: 1_000_000_000.0,
            cpu_slowdown_multiplier: 1.0,
            ..Default::default()
        })
        .unwrap()
    }

    pub(crate) fn request(
        id: &str,
        url: &str,
        kind: ResourceType,
        priority: Priority,
        start_ms: f64,
        end_ms: f64,
    ) -> NetworkRequest {
        let mut request = NetworkRequest::new(id, url);
        request.resource_type = Some(kind);
        request.priority = priority;
        request.renderer_start_time = start_ms;
        request.network_request_time = start_ms;
        request.network_end_time = end_ms;
        request.transfer_size = 20_000.0;
        request
    }

    pub(crate) fn task(ts_ms: f64, dur_ms: f64, children: Vec<TraceEvent>) -> Node {
        Node::cpu(CpuTask {
            event: TraceEvent::complete("RunTask", ts_ms * 1000.0, dur_ms * 1000.0, 1, 1),
            child_events: children,
            corrected_end_ts: None,
        })
    }

    pub(crate) fn child(name: &str, ts_ms: f64) -> TraceEvent {
        TraceEvent::complete(name, ts_ms * 1000.0, 1000.0, 1, 1)
    }

    pub(crate) fn evaluate(url: &str, ts_ms: f64) -> TraceEvent {
        child("EvaluateScript", ts_ms).with_data(TraceEventData {
            url: Some(url.into()),
            ..Default::default()
        })
    }

    pub(crate) struct PageGraph {
        pub graph: DependencyGraph,
        pub document: NodeId,
        pub script: NodeId,
        pub async_image: NodeId,
        pub late_script: NodeId,
        pub parse: NodeId,
        pub long_task: NodeId,
    }

    /// document -> parse task -> {blocking script, image}; blocking script ->
    /// evaluation -> late script -> long task.
    pub(crate) fn page_graph() -> PageGraph {
        let mut doc = request("doc", "https://a.com/", ResourceType::Document, Priority::VeryHigh, 0.0, 100.0);
        doc.transfer_size = 10_000.0;
        let mut graph = DependencyGraph::new(Node::network(Arc::new(doc)));
        let document = graph.root();
        graph.set_is_main_document(document, true);

        let parse = graph.add_node(task(110.0, 20.0, vec![child("ParseHTML", 111.0)]));
        let script = graph.add_node(Node::network(Arc::new(request(
            "app",
            "https://a.com/app.js",
            ResourceType::Script,
            Priority::High,
            120.0,
            300.0,
        ))));
        let async_image = graph.add_node(Node::network(Arc::new(request(
            "img",
            "https://a.com/hero.png",
            ResourceType::Image,
            Priority::Low,
            125.0,
            400.0,
        ))));
        let eval = graph.add_node(task(
            310.0,
            30.0,
            vec![evaluate("https://a.com/app.js", 311.0), child("Layout", 330.0), child("Paint", 335.0)],
        ));
        let late_script = graph.add_node(Node::network(Arc::new(request(
            "late",
            "https://a.com/late.js",
            ResourceType::Script,
            Priority::Low,
            350.0,
            900.0,
        ))));
        let long_task = graph.add_node(task(
            950.0,
            120.0,
            vec![evaluate("https://a.com/late.js", 951.0), child("Layout", 1000.0)],
        ));

        graph.add_dependent(document, parse).unwrap();
        graph.add_dependent(parse, script).unwrap();
        graph.add_dependent(parse, async_image).unwrap();
        graph.add_dependent(script, eval).unwrap();
        graph.add_dependent(eval, late_script).unwrap();
        graph.add_dependent(late_script, long_task).unwrap();

        PageGraph {
            graph,
            document,
            script,
            async_image,
            late_script,
            parse,
            long_task,
        }
    }

    /// FCP at 400ms, LCP at 1100ms, on the graph clock (µs).
    pub(crate) fn navigation() -> ProcessedNavigation {
        ProcessedNavigation {
            timestamps: NavigationTimestamps {
                time_origin: 0.0,
                first_contentful_paint: 400_000.0,
                first_meaningful_paint: Some(400_000.0),
                largest_contentful_paint: Some(1_100_000.0),
                trace_end: 2_000_000.0,
                ..Default::default()
            },
            timings: NavigationTimings {
                first_contentful_paint: 400.0,
                first_meaningful_paint: Some(400.0),
                largest_contentful_paint: Some(1100.0),
                trace_end: 2000.0,
                ..Default::default()
            },
            lcp_invalidated: false,
        }
    }

    pub(crate) fn ids(graph: &DependencyGraph) -> Vec<String> {
        let mut ids: Vec<String> = graph
            .reachable()
            .into_iter()
            .map(|id| graph.node(id).id.clone())
            .collect();
        ids.sort();
        ids
    }
}
