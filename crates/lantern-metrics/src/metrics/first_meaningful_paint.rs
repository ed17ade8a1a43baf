use super::{Metric, MetricResult};
use crate::cache::ComputedCache;
use crate::computed::{self, MetricInputs};
use crate::error::{MetricError, Result};
use crate::lantern::LanternFirstMeaningfulPaint;
use lantern_abstract::{ErrorCode, MetricKind};

pub struct FirstMeaningfulPaint;

impl Metric for FirstMeaningfulPaint {
    const KIND: MetricKind = MetricKind::FirstMeaningfulPaint;

    fn compute_simulated(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult> {
        Ok(MetricResult::simulated(LanternFirstMeaningfulPaint::request(inputs, cache)?))
    }

    fn compute_observed(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult> {
        let navigation = computed::processed_navigation(inputs, cache)?;
        match (
            navigation.timings.first_meaningful_paint,
            navigation.timestamps.first_meaningful_paint,
        ) {
            (Some(timing), Some(timestamp)) => Ok(MetricResult::observed(timing, timestamp)),
            _ => Err(MetricError::Code(ErrorCode::NoFmp)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::{artifacts, observed_settings, with_marker};
    use crate::trace_processor::tests::sample_trace;

    #[test]
    fn test_observed_fmp_falls_back_to_last_candidate() {
        let events = sample_trace(&[(100.0, 20.0)]);
        let events = with_marker(events, "firstMeaningfulPaintCandidate", 600.0);
        let events = with_marker(events, "firstMeaningfulPaintCandidate", 700.0);
        let artifacts = artifacts(events);
        let settings = observed_settings();
        let inputs = MetricInputs::new(&artifacts, &settings);

        let fmp = FirstMeaningfulPaint::request(&inputs, &mut ComputedCache::new()).unwrap();
        assert_eq!(fmp.timing, 700.0);
        assert_eq!(fmp.timestamp, Some(1_700_000.0));
    }

    #[test]
    fn test_observed_fmp_missing() {
        let artifacts = artifacts(sample_trace(&[(100.0, 20.0)]));
        let settings = observed_settings();
        let inputs = MetricInputs::new(&artifacts, &settings);
        let err = FirstMeaningfulPaint::request(&inputs, &mut ComputedCache::new()).unwrap_err();
        assert_eq!(err, MetricError::Code(ErrorCode::NoFmp));
    }
}
