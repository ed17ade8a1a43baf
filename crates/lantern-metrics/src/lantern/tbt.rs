use super::fcp::LanternFirstContentfulPaint;
use super::interactive::LanternInteractive;
use super::{LanternMetric, LanternMetricResult, cpu_timings};
use crate::cache::ComputedCache;
use crate::computed::MetricInputs;
use crate::error::Result;
use crate::tbt_utils::{BLOCKING_TIME_THRESHOLD, sum_of_blocking_time};
use crate::trace_processor::{ProcessedNavigation, TaskTiming};
use lantern_abstract::MetricKind;
use lantern_simulator::{DependencyGraph, SimulationResult};
use std::rc::Rc;

pub struct TbtExtras {
    pub fcp: Rc<LanternMetricResult>,
    pub interactive: Rc<LanternMetricResult>,
}

pub struct LanternTotalBlockingTime;

impl LanternTotalBlockingTime {
    pub fn request(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<Rc<LanternMetricResult>> {
        super::request::<Self, _>(inputs, cache, |inputs, cache| {
            Ok(TbtExtras {
                fcp: LanternFirstContentfulPaint::request(inputs, cache)?,
                interactive: LanternInteractive::request(inputs, cache)?,
            })
        })
    }

    /// Simulated CPU tasks lasting at least `min_duration` ms.
    pub fn top_level_events(
        simulation: &SimulationResult,
        graph: &DependencyGraph,
        min_duration: f64,
    ) -> Vec<TaskTiming> {
        cpu_timings(simulation, graph)
            .filter(|(_, timing)| timing.duration >= min_duration)
            .map(|(_, timing)| TaskTiming {
                start: timing.start_time,
                end: timing.end_time,
                duration: timing.duration,
            })
            .collect()
    }
}

impl LanternMetric for LanternTotalBlockingTime {
    const KIND: MetricKind = MetricKind::TotalBlockingTime;
    type Extras = TbtExtras;

    fn optimistic_graph(graph: &DependencyGraph, _navigation: &ProcessedNavigation) -> Result<DependencyGraph> {
        Ok(graph.clone())
    }

    fn pessimistic_graph(graph: &DependencyGraph, _navigation: &ProcessedNavigation) -> Result<DependencyGraph> {
        Ok(graph.clone())
    }

    fn estimate(
        mut simulation: SimulationResult,
        graph: &DependencyGraph,
        extras: &Self::Extras,
        optimistic: bool,
    ) -> Result<SimulationResult> {
        // A later FCP and an earlier TTI both shrink the window, so the optimistic
        // estimate pairs the pessimistic FCP with the optimistic TTI.
        let (fcp, interactive) = if optimistic {
            (
                extras.fcp.pessimistic_estimate.time_in_ms,
                extras.interactive.optimistic_estimate.time_in_ms,
            )
        } else {
            (
                extras.fcp.optimistic_estimate.time_in_ms,
                extras.interactive.pessimistic_estimate.time_in_ms,
            )
        };
        let events = Self::top_level_events(&simulation, graph, BLOCKING_TIME_THRESHOLD);
        simulation.time_in_ms = sum_of_blocking_time(&events, fcp, interactive);
        Ok(simulation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lantern::lcp::LanternLargestContentfulPaint;
    use crate::lantern::tests::{navigation, page_graph, simulator};
    use crate::lantern::LanternInputs;

    #[test]
    fn test_blocking_time_of_simulated_long_task() {
        let page = page_graph();
        let nav = navigation();
        let simulator = simulator();
        let inputs = LanternInputs {
            graph: &page.graph,
            simulator: &simulator,
            navigation: &nav,
        };
        let fcp = Rc::new(LanternFirstContentfulPaint::compute(&inputs, &()).unwrap());
        let lcp = Rc::new(LanternLargestContentfulPaint::compute(&inputs, &fcp).unwrap());
        let interactive = Rc::new(LanternInteractive::compute(&inputs, &lcp).unwrap());
        let tbt = LanternTotalBlockingTime::compute(&inputs, &TbtExtras { fcp, interactive }).unwrap();

        // Only the 60ms long task blocks, by 10ms.
        assert_eq!(tbt.optimistic_estimate.time_in_ms, 10.0);
        assert_eq!(tbt.timing, 10.0);
    }
}
