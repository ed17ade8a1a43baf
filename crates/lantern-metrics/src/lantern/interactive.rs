use super::lcp::LanternLargestContentfulPaint;
use super::{LanternMetric, LanternMetricResult, cpu_timings};
use crate::cache::ComputedCache;
use crate::computed::MetricInputs;
use crate::error::Result;
use crate::trace_processor::ProcessedNavigation;
use lantern_abstract::{MetricKind, Priority, ResourceType};
use lantern_simulator::{DependencyGraph, NodeKind, SimulationResult};
use std::rc::Rc;

/// CPU tasks longer than this (ms) may end up as long tasks once slowed down.
const CRITICAL_LONG_TASK_THRESHOLD: f64 = 20.0;
const LONG_TASK_DURATION: f64 = 50.0;

pub struct LanternInteractive;

impl LanternInteractive {
    pub fn request(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<Rc<LanternMetricResult>> {
        super::request::<Self, _>(inputs, cache, LanternLargestContentfulPaint::request)
    }

    /// End of the last simulated CPU task longer than `duration` ms, or 0.
    pub fn last_long_task_end_time(
        simulation: &SimulationResult,
        graph: &DependencyGraph,
        duration: f64,
    ) -> f64 {
        cpu_timings(simulation, graph)
            .filter(|(_, timing)| timing.duration > duration)
            .map(|(_, timing)| timing.end_time)
            .fold(0.0, f64::max)
    }
}

impl LanternMetric for LanternInteractive {
    const KIND: MetricKind = MetricKind::Interactive;
    type Extras = Rc<LanternMetricResult>;

    fn coefficients(_rtt: f64) -> super::Coefficients {
        super::Coefficients {
            intercept: 0.0,
            optimistic: 0.45,
            pessimistic: 0.55,
        }
    }

    fn optimistic_graph(graph: &DependencyGraph, _navigation: &ProcessedNavigation) -> Result<DependencyGraph> {
        let minimum_cpu_task_duration = CRITICAL_LONG_TASK_THRESHOLD * 1000.0;
        Ok(graph.clone_with_relationships(|node| match &node.kind {
            NodeKind::Cpu(task) => task.duration() > minimum_cpu_task_duration,
            NodeKind::Network(network) => {
                let request = &network.request;
                let is_image = request.is_resource_type(ResourceType::Image);
                let is_script = request.is_resource_type(ResourceType::Script);
                !is_image
                    && (is_script || matches!(request.priority, Priority::High | Priority::VeryHigh))
            }
        }))
    }

    fn pessimistic_graph(graph: &DependencyGraph, _navigation: &ProcessedNavigation) -> Result<DependencyGraph> {
        Ok(graph.clone())
    }

    fn estimate(
        mut simulation: SimulationResult,
        graph: &DependencyGraph,
        lcp: &Self::Extras,
        optimistic: bool,
    ) -> Result<SimulationResult> {
        let last_task_at = Self::last_long_task_end_time(&simulation, graph, LONG_TASK_DURATION);
        let minimum = if optimistic {
            lcp.optimistic_estimate.time_in_ms
        } else {
            lcp.pessimistic_estimate.time_in_ms
        };
        simulation.time_in_ms = minimum.max(last_task_at);
        Ok(simulation)
    }

    fn adjust_timing(timing: f64, lcp: &Self::Extras) -> f64 {
        timing.max(lcp.timing)
    }
}
