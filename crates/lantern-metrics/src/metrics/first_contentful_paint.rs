use super::{Metric, MetricResult};
use crate::cache::ComputedCache;
use crate::computed::{self, MetricInputs};
use crate::error::Result;
use crate::lantern::LanternFirstContentfulPaint;
use lantern_abstract::MetricKind;

pub struct FirstContentfulPaint;

impl Metric for FirstContentfulPaint {
    const KIND: MetricKind = MetricKind::FirstContentfulPaint;

    fn compute_simulated(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult> {
        Ok(MetricResult::simulated(LanternFirstContentfulPaint::request(inputs, cache)?))
    }

    fn compute_observed(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult> {
        let navigation = computed::processed_navigation(inputs, cache)?;
        Ok(MetricResult::observed(
            navigation.timings.first_contentful_paint,
            navigation.timestamps.first_contentful_paint,
        ))
    }
}
