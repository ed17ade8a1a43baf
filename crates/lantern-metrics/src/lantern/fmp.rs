use super::fcp::{FirstPaintOptions, LanternFirstContentfulPaint};
use super::{LanternMetric, LanternMetricResult};
use crate::cache::ComputedCache;
use crate::computed::MetricInputs;
use crate::error::{MetricError, Result};
use crate::trace_processor::ProcessedNavigation;
use lantern_abstract::{ErrorCode, InitiatorType, MetricKind};
use lantern_simulator::{CpuTask, DependencyGraph, NetworkNode};
use std::rc::Rc;

pub struct LanternFirstMeaningfulPaint;

impl LanternFirstMeaningfulPaint {
    pub fn request(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<Rc<LanternMetricResult>> {
        super::request::<Self, _>(inputs, cache, LanternFirstContentfulPaint::request)
    }

    fn cutoff(navigation: &ProcessedNavigation) -> Result<f64> {
        navigation
            .timestamps
            .first_meaningful_paint
            .ok_or(MetricError::Code(ErrorCode::NoFmp))
    }
}

impl LanternMetric for LanternFirstMeaningfulPaint {
    const KIND: MetricKind = MetricKind::FirstMeaningfulPaint;
    type Extras = Rc<LanternMetricResult>;

    fn optimistic_graph(graph: &DependencyGraph, navigation: &ProcessedNavigation) -> Result<DependencyGraph> {
        Ok(LanternFirstContentfulPaint::first_paint_based_graph(
            graph,
            &FirstPaintOptions {
                cutoff_timestamp: Self::cutoff(navigation)?,
                treat_node_as_render_blocking: &|n: &NetworkNode| {
                    n.has_render_blocking_priority() && n.initiator_type() != InitiatorType::Script
                },
                additional_cpu_nodes_to_treat_as_render_blocking: None,
            },
        ))
    }

    fn pessimistic_graph(graph: &DependencyGraph, navigation: &ProcessedNavigation) -> Result<DependencyGraph> {
        Ok(LanternFirstContentfulPaint::first_paint_based_graph(
            graph,
            &FirstPaintOptions {
                cutoff_timestamp: Self::cutoff(navigation)?,
                treat_node_as_render_blocking: &|n: &NetworkNode| n.has_render_blocking_priority(),
                additional_cpu_nodes_to_treat_as_render_blocking: Some(&|t: &CpuTask| {
                    t.did_perform_layout()
                }),
            },
        ))
    }

    fn adjust_timing(timing: f64, fcp: &Self::Extras) -> f64 {
        timing.max(fcp.timing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lantern::LanternInputs;
    use crate::lantern::tests::{ids, navigation, page_graph, simulator};

    #[test]
    fn test_missing_fmp() {
        let page = page_graph();
        let mut nav = navigation();
        nav.timestamps.first_meaningful_paint = None;
        let err = LanternFirstMeaningfulPaint::optimistic_graph(&page.graph, &nav).unwrap_err();
        assert_eq!(err, MetricError::Code(ErrorCode::NoFmp));
    }

    #[test]
    fn test_fmp_is_never_before_fcp() {
        let page = page_graph();
        let mut nav = navigation();
        // Only the document and the parse task precede this paint.
        nav.timestamps.first_meaningful_paint = Some(115_000.0);
        let simulator = simulator();
        let inputs = LanternInputs {
            graph: &page.graph,
            simulator: &simulator,
            navigation: &nav,
        };
        let optimistic = LanternFirstMeaningfulPaint::optimistic_graph(&page.graph, &nav).unwrap();
        assert_eq!(ids(&optimistic), vec!["1.110000", "doc"]);

        let fcp = LanternFirstContentfulPaint::compute(&inputs, &()).unwrap();
        let fmp = LanternFirstMeaningfulPaint::compute(&inputs, &Rc::new(fcp.clone())).unwrap();
        assert_eq!(fmp.optimistic_estimate.time_in_ms, 550.0);
        assert_eq!(fmp.timing, fcp.timing);
    }
}
