//! Every metric of one run plus the milestones observed in the trace.

use crate::cache::ComputedCache;
use crate::computed::{self, MetricInputs};
use crate::error::Result;
use crate::metrics::{MetricResult, compute_metric};
use lantern_abstract::MetricKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{info, warn};

/// Metric timings in ms, timestamps (`*_ts`) in µs on the trace clock. A metric
/// that could not be computed is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingSummary {
    pub first_contentful_paint: Option<f64>,
    pub first_contentful_paint_ts: Option<f64>,
    pub first_meaningful_paint: Option<f64>,
    pub first_meaningful_paint_ts: Option<f64>,
    pub largest_contentful_paint: Option<f64>,
    pub largest_contentful_paint_ts: Option<f64>,
    pub interactive: Option<f64>,
    pub interactive_ts: Option<f64>,
    pub speed_index: Option<f64>,
    pub speed_index_ts: Option<f64>,
    pub total_blocking_time: Option<f64>,
    pub max_potential_fid: Option<f64>,

    pub observed_time_origin: f64,
    pub observed_time_origin_ts: f64,
    pub observed_first_paint: Option<f64>,
    pub observed_first_paint_ts: Option<f64>,
    pub observed_first_contentful_paint: f64,
    pub observed_first_contentful_paint_ts: f64,
    pub observed_first_meaningful_paint: Option<f64>,
    pub observed_first_meaningful_paint_ts: Option<f64>,
    pub observed_largest_contentful_paint: Option<f64>,
    pub observed_largest_contentful_paint_ts: Option<f64>,
    pub observed_trace_end: f64,
    pub observed_trace_end_ts: f64,
    pub observed_load: Option<f64>,
    pub observed_load_ts: Option<f64>,
    pub observed_dom_content_loaded: Option<f64>,
    pub observed_dom_content_loaded_ts: Option<f64>,
    pub observed_speed_index: Option<f64>,
    pub observed_speed_index_ts: Option<f64>,
}

impl TimingSummary {
    /// Fails only when the trace itself can't be processed; metric failures
    /// are logged and leave their fields empty.
    pub fn summarize(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<TimingSummary> {
        let mut metrics: BTreeMap<MetricKind, Rc<MetricResult>> = BTreeMap::new();
        for kind in MetricKind::ALL {
            match compute_metric(kind, inputs, cache) {
                Ok(result) => {
                    metrics.insert(kind, result);
                }
                Err(err) => warn!("{kind} could not be computed: {err}"),
            }
        }
        info!(
            "Computed {}/{} metrics ({} cache hits, {} misses)",
            metrics.len(),
            MetricKind::ALL.len(),
            cache.hits(),
            cache.misses()
        );

        let timing = |kind: MetricKind| metrics.get(&kind).map(|r| r.timing);
        let timestamp = |kind: MetricKind| metrics.get(&kind).and_then(|r| r.timestamp);

        let navigation = computed::processed_navigation(inputs, cache)?;
        let ts = navigation.timestamps;
        let timings = navigation.timings;
        let speedline = inputs.artifacts.speedline;

        Ok(TimingSummary {
            first_contentful_paint: timing(MetricKind::FirstContentfulPaint),
            first_contentful_paint_ts: timestamp(MetricKind::FirstContentfulPaint),
            first_meaningful_paint: timing(MetricKind::FirstMeaningfulPaint),
            first_meaningful_paint_ts: timestamp(MetricKind::FirstMeaningfulPaint),
            largest_contentful_paint: timing(MetricKind::LargestContentfulPaint),
            largest_contentful_paint_ts: timestamp(MetricKind::LargestContentfulPaint),
            interactive: timing(MetricKind::Interactive),
            interactive_ts: timestamp(MetricKind::Interactive),
            speed_index: timing(MetricKind::SpeedIndex),
            speed_index_ts: timestamp(MetricKind::SpeedIndex),
            total_blocking_time: timing(MetricKind::TotalBlockingTime),
            max_potential_fid: timing(MetricKind::MaxPotentialFid),

            observed_time_origin: timings.time_origin,
            observed_time_origin_ts: ts.time_origin,
            observed_first_paint: timings.first_paint,
            observed_first_paint_ts: ts.first_paint,
            observed_first_contentful_paint: timings.first_contentful_paint,
            observed_first_contentful_paint_ts: ts.first_contentful_paint,
            observed_first_meaningful_paint: timings.first_meaningful_paint,
            observed_first_meaningful_paint_ts: ts.first_meaningful_paint,
            observed_largest_contentful_paint: timings.largest_contentful_paint,
            observed_largest_contentful_paint_ts: ts.largest_contentful_paint,
            observed_trace_end: timings.trace_end,
            observed_trace_end_ts: ts.trace_end,
            observed_load: timings.load,
            observed_load_ts: ts.load,
            observed_dom_content_loaded: timings.dom_content_loaded,
            observed_dom_content_loaded_ts: ts.dom_content_loaded,
            observed_speed_index: speedline.map(|s| s.speed_index),
            observed_speed_index_ts: speedline.map(|s| s.speed_index * 1000.0 + s.begining_ts),
        })
    }
}
