use super::{Metric, MetricResult};
use crate::cache::ComputedCache;
use crate::computed::{self, MetricInputs};
use crate::error::Result;
use crate::lantern::LanternMaxPotentialFid;
use crate::lantern::max_potential_fid::MINIMUM_FID;
use crate::trace_processor::TraceProcessor;
use lantern_abstract::MetricKind;

pub struct MaxPotentialFid;

impl Metric for MaxPotentialFid {
    const KIND: MetricKind = MetricKind::MaxPotentialFid;

    fn compute_simulated(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult> {
        Ok(MetricResult::simulated(LanternMaxPotentialFid::request(inputs, cache)?))
    }

    fn compute_observed(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult> {
        let trace = computed::processed_trace(inputs, cache)?;
        let navigation = computed::processed_navigation(inputs, cache)?;
        let fcp = navigation.timings.first_contentful_paint;

        let longest = TraceProcessor::main_thread_top_level_events(&trace, fcp, f64::INFINITY)
            .iter()
            .filter(|task| task.duration >= 1.0)
            .map(|task| task.duration)
            .fold(MINIMUM_FID, f64::max);
        Ok(MetricResult::timing_only(longest))
    }
}
