use super::{Interactive, Metric, MetricResult};
use crate::cache::ComputedCache;
use crate::computed::{self, MetricInputs};
use crate::error::Result;
use crate::lantern::LanternTotalBlockingTime;
use crate::tbt_utils::sum_of_blocking_time;
use crate::trace_processor::TraceProcessor;
use lantern_abstract::MetricKind;

pub struct TotalBlockingTime;

impl Metric for TotalBlockingTime {
    const KIND: MetricKind = MetricKind::TotalBlockingTime;

    fn compute_simulated(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult> {
        Ok(MetricResult::simulated(LanternTotalBlockingTime::request(inputs, cache)?))
    }

    /// Blocking time of main thread tasks between FCP and Time to Interactive.
    fn compute_observed(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult> {
        let trace = computed::processed_trace(inputs, cache)?;
        let navigation = computed::processed_navigation(inputs, cache)?;
        let interactive = Interactive::request(inputs, cache)?;

        let events = TraceProcessor::main_thread_top_level_events(&trace, 0.0, f64::INFINITY);
        Ok(MetricResult::timing_only(sum_of_blocking_time(
            &events,
            navigation.timings.first_contentful_paint,
            interactive.timing,
        )))
    }
}
