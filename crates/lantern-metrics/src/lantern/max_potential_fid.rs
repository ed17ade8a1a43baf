use super::fcp::LanternFirstContentfulPaint;
use super::{LanternMetric, LanternMetricResult, cpu_timings};
use crate::cache::ComputedCache;
use crate::computed::MetricInputs;
use crate::error::Result;
use crate::trace_processor::ProcessedNavigation;
use lantern_abstract::MetricKind;
use lantern_simulator::{DependencyGraph, NodeTiming, SimulationResult};
use std::rc::Rc;

/// One frame at 60fps; the smallest delay reported.
pub const MINIMUM_FID: f64 = 16.0;

pub struct LanternMaxPotentialFid;

impl LanternMaxPotentialFid {
    pub fn request(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<Rc<LanternMetricResult>> {
        super::request::<Self, _>(inputs, cache, LanternFirstContentfulPaint::request)
    }

    pub fn timings_after_fcp(
        simulation: &SimulationResult,
        graph: &DependencyGraph,
        fcp: f64,
    ) -> Vec<NodeTiming> {
        cpu_timings(simulation, graph)
            .filter(|(_, timing)| timing.end_time > fcp)
            .map(|(_, timing)| *timing)
            .collect()
    }
}

impl LanternMetric for LanternMaxPotentialFid {
    const KIND: MetricKind = MetricKind::MaxPotentialFid;
    type Extras = Rc<LanternMetricResult>;

    fn optimistic_graph(graph: &DependencyGraph, _navigation: &ProcessedNavigation) -> Result<DependencyGraph> {
        Ok(graph.clone())
    }

    fn pessimistic_graph(graph: &DependencyGraph, _navigation: &ProcessedNavigation) -> Result<DependencyGraph> {
        Ok(graph.clone())
    }

    fn estimate(
        mut simulation: SimulationResult,
        graph: &DependencyGraph,
        fcp: &Self::Extras,
        optimistic: bool,
    ) -> Result<SimulationResult> {
        // A later FCP excludes more tasks, so the estimates swap FCPs.
        let fcp_time = if optimistic {
            fcp.pessimistic_estimate.time_in_ms
        } else {
            fcp.optimistic_estimate.time_in_ms
        };
        simulation.time_in_ms = Self::timings_after_fcp(&simulation, graph, fcp_time)
            .iter()
            .map(|timing| timing.duration)
            .fold(MINIMUM_FID, f64::max);
        Ok(simulation)
    }
}
