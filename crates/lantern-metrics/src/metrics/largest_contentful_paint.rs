use super::{Metric, MetricResult};
use crate::cache::ComputedCache;
use crate::computed::{self, MetricInputs};
use crate::error::{MetricError, Result};
use crate::lantern::LanternLargestContentfulPaint;
use lantern_abstract::{ErrorCode, MetricKind};

pub struct LargestContentfulPaint;

impl Metric for LargestContentfulPaint {
    const KIND: MetricKind = MetricKind::LargestContentfulPaint;

    fn compute_simulated(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult> {
        Ok(MetricResult::simulated(LanternLargestContentfulPaint::request(inputs, cache)?))
    }

    fn compute_observed(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult> {
        let navigation = computed::processed_navigation(inputs, cache)?;
        match (
            navigation.timings.largest_contentful_paint,
            navigation.timestamps.largest_contentful_paint,
        ) {
            (Some(timing), Some(timestamp)) => Ok(MetricResult::observed(timing, timestamp)),
            _ => Err(MetricError::Code(ErrorCode::NoLcp)),
        }
    }
}
