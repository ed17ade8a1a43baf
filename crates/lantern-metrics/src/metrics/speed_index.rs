use super::{Metric, MetricResult};
use crate::cache::ComputedCache;
use crate::computed::MetricInputs;
use crate::error::{MetricError, Result};
use crate::lantern::LanternSpeedIndex;
use lantern_abstract::{ErrorCode, MetricKind};

pub struct SpeedIndex;

impl Metric for SpeedIndex {
    const KIND: MetricKind = MetricKind::SpeedIndex;

    fn compute_simulated(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult> {
        Ok(MetricResult::simulated(LanternSpeedIndex::request(inputs, cache)?))
    }

    fn compute_observed(inputs: &MetricInputs, _cache: &mut ComputedCache) -> Result<MetricResult> {
        let speedline = inputs
            .artifacts
            .speedline
            .filter(|s| s.frame_count > 0)
            .ok_or(MetricError::Code(ErrorCode::NoSpeedlineFrames))?;
        if speedline.speed_index == 0.0 {
            return Err(MetricError::Code(ErrorCode::SpeedindexOfZero));
        }

        let timing = speedline.speed_index.round();
        Ok(MetricResult::observed(timing, timing * 1000.0 + speedline.begining_ts))
    }
}
