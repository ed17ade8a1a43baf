//! Page metrics with two strategies: read them off the recorded trace, or
//! estimate them with the Lantern simulation.

pub mod first_contentful_paint;
pub mod first_meaningful_paint;
pub mod interactive;
pub mod largest_contentful_paint;
pub mod max_potential_fid;
pub mod speed_index;
pub mod total_blocking_time;

pub use first_contentful_paint::FirstContentfulPaint;
pub use first_meaningful_paint::FirstMeaningfulPaint;
pub use interactive::Interactive;
pub use largest_contentful_paint::LargestContentfulPaint;
pub use max_potential_fid::MaxPotentialFid;
pub use speed_index::SpeedIndex;
pub use total_blocking_time::TotalBlockingTime;

use crate::cache::{ArtifactKey, ComputedCache};
use crate::computed::{self, MetricInputs};
use crate::error::Result;
use crate::lantern::LanternMetricResult;
use crate::trace_processor::TraceProcessor;
use lantern_abstract::{MetricKind, ThrottlingMethod};
use serde::Serialize;
use std::rc::Rc;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricResult {
    /// Milliseconds relative to the time origin.
    pub timing: f64,
    /// Absolute trace timestamp in microseconds, only for observed metrics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip)]
    pub simulated: Option<Rc<LanternMetricResult>>,
}

impl MetricResult {
    pub fn observed(timing: f64, timestamp: f64) -> Self {
        Self {
            timing,
            timestamp: Some(timestamp),
            simulated: None,
        }
    }

    /// An observed duration with no single point in time.
    pub fn timing_only(timing: f64) -> Self {
        Self {
            timing,
            timestamp: None,
            simulated: None,
        }
    }

    pub fn simulated(result: Rc<LanternMetricResult>) -> Self {
        Self {
            timing: result.timing,
            timestamp: None,
            simulated: Some(result),
        }
    }
}

pub trait Metric {
    const KIND: MetricKind;

    fn compute_simulated(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult>;

    fn compute_observed(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult>;

    fn compute(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult> {
        let trace = computed::processed_trace(inputs, cache)?;
        TraceProcessor::assert_has_top_level_events(&trace.main_thread_events)?;

        match inputs.settings.throttling_method {
            ThrottlingMethod::Simulate => Self::compute_simulated(inputs, cache),
            ThrottlingMethod::Devtools | ThrottlingMethod::Provided => {
                Self::compute_observed(inputs, cache)
            }
        }
    }

    fn request(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<Rc<MetricResult>> {
        cache.get_or_compute(ArtifactKey::Metric(Self::KIND), |cache| {
            Self::compute(inputs, cache)
        })
    }
}

pub fn compute_metric(
    kind: MetricKind,
    inputs: &MetricInputs,
    cache: &mut ComputedCache,
) -> Result<Rc<MetricResult>> {
    match kind {
        MetricKind::FirstContentfulPaint => FirstContentfulPaint::request(inputs, cache),
        MetricKind::FirstMeaningfulPaint => FirstMeaningfulPaint::request(inputs, cache),
        MetricKind::LargestContentfulPaint => LargestContentfulPaint::request(inputs, cache),
        MetricKind::Interactive => Interactive::request(inputs, cache),
        MetricKind::TotalBlockingTime => TotalBlockingTime::request(inputs, cache),
        MetricKind::MaxPotentialFid => MaxPotentialFid::request(inputs, cache),
        MetricKind::SpeedIndex => SpeedIndex::request(inputs, cache),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::trace_processor::tests::{FRAME, sample_trace};
    use lantern_abstract::{ErrorCode, PageArtifacts, Settings, TraceEvent};

    pub(crate) fn artifacts(trace_events: Vec<TraceEvent>) -> PageArtifacts {
        PageArtifacts {
            requested_url: "https://a.com/".into(),
            main_document_url: "https://a.com/".into(),
            trace_events,
            network_requests: Vec::new(),
            speedline: None,
        }
    }

    pub(crate) fn observed_settings() -> Settings {
        Settings {
            throttling_method: ThrottlingMethod::Devtools,
            ..Default::default()
        }
    }

    /// `sample_trace` plus a frame event at `ms` after the time origin.
    pub(crate) fn with_marker(mut events: Vec<TraceEvent>, name: &str, ms: f64) -> Vec<TraceEvent> {
        let (pid, tid) = (events[2].pid, events[2].tid);
        events.push(TraceEvent::instant(name, 1_000_000.0 + ms * 1000.0, pid, tid, FRAME));
        events
    }

    #[test]
    fn test_observed_results_are_cached() {
        let artifacts = artifacts(sample_trace(&[(100.0, 20.0)]));
        let settings = observed_settings();
        let inputs = MetricInputs::new(&artifacts, &settings);
        let mut cache = ComputedCache::new();

        let first = compute_metric(MetricKind::FirstContentfulPaint, &inputs, &mut cache).unwrap();
        let second = FirstContentfulPaint::request(&inputs, &mut cache).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.timing, 500.0);
        assert_eq!(first.timestamp, Some(1_500_000.0));
        assert!(first.simulated.is_none());
    }

    #[test]
    fn test_trace_without_tasks_fails_every_metric() {
        let artifacts = artifacts(sample_trace(&[]));
        let settings = observed_settings();
        let inputs = MetricInputs::new(&artifacts, &settings);
        let mut cache = ComputedCache::new();
        for kind in MetricKind::ALL {
            let err = compute_metric(kind, &inputs, &mut cache).unwrap_err();
            assert_eq!(err.code(), Some(ErrorCode::NoTopLevelEvents), "{kind}");
        }
        assert!(!cache.contains(ArtifactKey::Metric(MetricKind::FirstContentfulPaint)));
    }
}
