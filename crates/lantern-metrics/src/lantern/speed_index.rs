use super::fcp::LanternFirstContentfulPaint;
use super::{Coefficients, LanternMetric, LanternMetricResult, cpu_timings};
use crate::cache::ComputedCache;
use crate::computed::MetricInputs;
use crate::error::{MetricError, Result};
use crate::trace_processor::ProcessedNavigation;
use lantern_abstract::{ErrorCode, MetricKind, SpeedlineSummary, ThrottlingSettings};
use lantern_simulator::{DependencyGraph, SimulationResult};
use std::rc::Rc;

const COEFFICIENTS: Coefficients = Coefficients {
    intercept: -250.0,
    optimistic: 1.4,
    pessimistic: 0.65,
};

pub struct SpeedIndexExtras {
    pub fcp: Rc<LanternMetricResult>,
    pub speedline: SpeedlineSummary,
}

pub struct LanternSpeedIndex;

impl LanternSpeedIndex {
    pub fn request(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<Rc<LanternMetricResult>> {
        super::request::<Self, _>(inputs, cache, |inputs, cache| {
            let speedline = inputs
                .artifacts
                .speedline
                .ok_or(MetricError::Code(ErrorCode::NoSpeedlineFrames))?;
            Ok(SpeedIndexExtras {
                fcp: LanternFirstContentfulPaint::request(inputs, cache)?,
                speedline,
            })
        })
    }

    /// Layout-weighted paint progress: each layout task weighs log2 of its
    /// duration. Falls back to `fcp` when nothing laid out.
    pub fn layout_based_speed_index(
        simulation: &SimulationResult,
        graph: &DependencyGraph,
        fcp: f64,
    ) -> f64 {
        let (weighted_time, total_weight) = cpu_timings(simulation, graph)
            .filter(|(task, _)| task.did_perform_layout())
            .map(|(_, timing)| {
                let weight = f64::max((timing.end_time - timing.start_time).log2(), 0.0);
                (weight * timing.end_time.max(fcp), weight)
            })
            .fold((0.0, 0.0), |(t, w), (dt, dw)| (t + dt, w + dw));
        if total_weight == 0.0 {
            return fcp;
        }
        weighted_time / total_weight
    }
}

impl LanternMetric for LanternSpeedIndex {
    const KIND: MetricKind = MetricKind::SpeedIndex;
    type Extras = SpeedIndexExtras;

    /// The fit was made at the mobile preset; other RTTs pull it toward an even blend.
    fn coefficients(rtt: f64) -> Coefficients {
        let default_rtt_excess = ThrottlingSettings::mobile_slow_4g().rtt_ms - 30.0;
        let multiplier = f64::max((rtt - 30.0) / default_rtt_excess, 0.0);
        Coefficients {
            intercept: COEFFICIENTS.intercept * multiplier,
            optimistic: 0.5 + (COEFFICIENTS.optimistic - 0.5) * multiplier,
            pessimistic: 0.5 + (COEFFICIENTS.pessimistic - 0.5) * multiplier,
        }
    }

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
        simulation.time_in_ms = if optimistic {
            extras.speedline.speed_index
        } else {
            let fcp = extras.fcp.pessimistic_estimate.time_in_ms;
            Self::layout_based_speed_index(&simulation, graph, fcp)
        };
        Ok(simulation)
    }

    fn adjust_timing(timing: f64, extras: &Self::Extras) -> f64 {
        timing.max(extras.fcp.timing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lantern::tests::{navigation, page_graph, simulator};
    use crate::lantern::LanternInputs;

    fn assert_close(a: Coefficients, b: Coefficients) {
        assert!((a.intercept - b.intercept).abs() < 1e-9, "{a:?} != {b:?}");
        assert!((a.optimistic - b.optimistic).abs() < 1e-9, "{a:?} != {b:?}");
        assert!((a.pessimistic - b.pessimistic).abs() < 1e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn test_coefficients_scale_with_rtt() {
        assert_close(LanternSpeedIndex::coefficients(150.0), COEFFICIENTS);
        assert_close(LanternSpeedIndex::coefficients(30.0), Coefficients::EVEN);
        assert_close(LanternSpeedIndex::coefficients(10.0), Coefficients::EVEN);
    }

    #[test]
    fn test_layout_based_speed_index() {
        let page = page_graph();
        let simulation = simulator().simulate(&page.graph).unwrap();
        // Layout tasks: 780..795 and 925..985.
        let expected = (15f64.log2() * 795.0 + 60f64.log2() * 985.0) / (15f64.log2() + 60f64.log2());
        let actual = LanternSpeedIndex::layout_based_speed_index(&simulation, &page.graph, 795.0);
        assert!((actual - expected).abs() < 1e-9);
        let late_fcp = LanternSpeedIndex::layout_based_speed_index(&simulation, &page.graph, 2000.0);
        assert!((late_fcp - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_speed_index_blend() {
        let page = page_graph();
        let nav = navigation();
        let simulator = simulator();
        let inputs = LanternInputs {
            graph: &page.graph,
            simulator: &simulator,
            navigation: &nav,
        };
        let fcp = Rc::new(LanternFirstContentfulPaint::compute(&inputs, &()).unwrap());
        let speedline = SpeedlineSummary {
            speed_index: 1200.0,
            begining_ts: 0.0,
            frame_count: 10,
        };
        let si = LanternSpeedIndex::compute(
            &inputs,
            &SpeedIndexExtras {
                fcp: Rc::clone(&fcp),
                speedline,
            },
        )
        .unwrap();
        assert_eq!(si.optimistic_estimate.time_in_ms, 1200.0);
        let c = LanternSpeedIndex::coefficients(100.0);
        let expected = c.intercept
            + c.optimistic * 1200.0
            + c.pessimistic * si.pessimistic_estimate.time_in_ms;
        assert!((si.timing - expected.max(fcp.timing)).abs() < 1e-9);
    }
}
