use super::fcp::{FirstPaintOptions, LanternFirstContentfulPaint};
use super::{LanternMetric, LanternMetricResult};
use crate::cache::ComputedCache;
use crate::computed::MetricInputs;
use crate::error::{MetricError, Result};
use crate::trace_processor::ProcessedNavigation;
use lantern_abstract::{ErrorCode, MetricKind, Priority, ResourceType};
use lantern_simulator::{CpuTask, DependencyGraph, NetworkNode, Node, SimulationResult};
use std::rc::Rc;

pub struct LanternLargestContentfulPaint;

impl LanternLargestContentfulPaint {
    pub fn request(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<Rc<LanternMetricResult>> {
        super::request::<Self, _>(inputs, cache, LanternFirstContentfulPaint::request)
    }

    /// Low priority images are usually offscreen and rarely the LCP element.
    pub fn is_not_low_priority_image(node: &NetworkNode) -> bool {
        let is_image = node.request.is_resource_type(ResourceType::Image);
        let is_low_priority = matches!(node.request.priority, Priority::Low | Priority::VeryLow);
        !is_image || !is_low_priority
    }

    fn cutoff(navigation: &ProcessedNavigation) -> Result<f64> {
        navigation
            .timestamps
            .largest_contentful_paint
            .ok_or(MetricError::Code(ErrorCode::NoLcp))
    }
}

impl LanternMetric for LanternLargestContentfulPaint {
    const KIND: MetricKind = MetricKind::LargestContentfulPaint;
    type Extras = Rc<LanternMetricResult>;

    fn optimistic_graph(graph: &DependencyGraph, navigation: &ProcessedNavigation) -> Result<DependencyGraph> {
        Ok(LanternFirstContentfulPaint::first_paint_based_graph(
            graph,
            &FirstPaintOptions {
                cutoff_timestamp: Self::cutoff(navigation)?,
                treat_node_as_render_blocking: &Self::is_not_low_priority_image,
                additional_cpu_nodes_to_treat_as_render_blocking: None,
            },
        ))
    }

    fn pessimistic_graph(graph: &DependencyGraph, navigation: &ProcessedNavigation) -> Result<DependencyGraph> {
        Ok(LanternFirstContentfulPaint::first_paint_based_graph(
            graph,
            &FirstPaintOptions {
                cutoff_timestamp: Self::cutoff(navigation)?,
                treat_node_as_render_blocking: &|_: &NetworkNode| true,
                additional_cpu_nodes_to_treat_as_render_blocking: Some(&|t: &CpuTask| {
                    t.did_perform_layout()
                }),
            },
        ))
    }

    fn estimate(
        mut simulation: SimulationResult,
        graph: &DependencyGraph,
        _fcp: &Self::Extras,
        _optimistic: bool,
    ) -> Result<SimulationResult> {
        let counts = |node: &Node| node.as_network().is_none_or(Self::is_not_low_priority_image);
        simulation.time_in_ms = simulation
            .node_timings
            .iter()
            .filter(|(id, _)| counts(graph.node(**id)))
            .map(|(_, timing)| timing.end_time)
            .fold(f64::NEG_INFINITY, f64::max);
        Ok(simulation)
    }

    fn adjust_timing(timing: f64, fcp: &Self::Extras) -> f64 {
        timing.max(fcp.timing)
    }
}
