//! Extracts the main frame, the renderer main thread and the navigation
//! milestones from a raw trace.

use crate::error::{MetricError, Result};
use lantern_abstract::{ErrorCode, TraceEvent};
use lantern_simulator::graph::builder::is_schedulable_task;
use serde::Serialize;
use tracing::debug;

const RENDERER_MAIN_THREAD: &str = "CrRendererMain";

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedTrace {
    pub pid: u64,
    pub tid: u64,
    pub main_frame_id: String,
    /// All events, sorted by timestamp.
    pub trace_events: Vec<TraceEvent>,
    pub main_thread_events: Vec<TraceEvent>,
    /// Events bound to the main frame.
    pub frame_events: Vec<TraceEvent>,
    pub time_origin_ts: f64,
    pub trace_end_ts: f64,
}

/// Milestone timestamps in microseconds on the trace clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationTimestamps {
    pub time_origin: f64,
    pub first_paint: Option<f64>,
    pub first_contentful_paint: f64,
    pub first_meaningful_paint: Option<f64>,
    pub largest_contentful_paint: Option<f64>,
    pub dom_content_loaded: Option<f64>,
    pub load: Option<f64>,
    pub trace_end: f64,
}

/// Milestones in milliseconds relative to the time origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationTimings {
    pub time_origin: f64,
    pub first_paint: Option<f64>,
    pub first_contentful_paint: f64,
    pub first_meaningful_paint: Option<f64>,
    pub largest_contentful_paint: Option<f64>,
    pub dom_content_loaded: Option<f64>,
    pub load: Option<f64>,
    pub trace_end: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedNavigation {
    pub timestamps: NavigationTimestamps,
    pub timings: NavigationTimings,
    /// The last LCP candidate was invalidated by a later event.
    pub lcp_invalidated: bool,
}

/// A top-level main thread task, in milliseconds relative to the time origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TaskTiming {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

pub struct TraceProcessor;

impl TraceProcessor {
    pub fn process_trace(events: &[TraceEvent]) -> Result<ProcessedTrace> {
        let mut trace_events = events.to_vec();
        trace_events.sort_by(|a, b| a.ts.total_cmp(&b.ts));

        let (pid, tid, main_frame_id) = Self::find_main_frame_ids(&trace_events)?;
        debug!("Main frame {main_frame_id} on pid {pid} tid {tid}");

        let main_thread_events: Vec<TraceEvent> = trace_events
            .iter()
            .filter(|e| e.pid == pid && e.tid == tid)
            .cloned()
            .collect();
        let frame_events: Vec<TraceEvent> = trace_events
            .iter()
            .filter(|e| e.frame() == Some(main_frame_id.as_str()))
            .cloned()
            .collect();

        let time_origin_ts = frame_events
            .iter()
            .filter(|e| e.name == "navigationStart")
            .filter(|e| {
                e.data()
                    .and_then(|d| d.is_loading_main_frame)
                    .unwrap_or(true)
            })
            .last()
            .map(|e| e.ts)
            .ok_or(MetricError::Code(ErrorCode::NoNavstart))?;

        let trace_end_ts = trace_events
            .iter()
            .map(TraceEvent::end_ts)
            .fold(time_origin_ts, f64::max);

        Ok(ProcessedTrace {
            pid,
            tid,
            main_frame_id,
            trace_events,
            main_thread_events,
            frame_events,
            time_origin_ts,
            trace_end_ts,
        })
    }

    fn find_main_frame_ids(events: &[TraceEvent]) -> Result<(u64, u64, String)> {
        let started_in_browser = events
            .iter()
            .find(|e| e.name == "TracingStartedInBrowser")
            .and_then(|e| e.data())
            .and_then(|d| d.frames.as_ref());
        if let Some(frames) = started_in_browser {
            if let Some(main) = frames.iter().find(|f| f.parent.is_none()) {
                let pid = main.process_id;
                let tid = events
                    .iter()
                    .find(|e| {
                        Some(e.pid) == pid
                            && e.ph == "M"
                            && e.name == "thread_name"
                            && e.args.name.as_deref() == Some(RENDERER_MAIN_THREAD)
                    })
                    .map(|e| e.tid);
                if let (Some(pid), Some(tid), false) = (pid, tid, main.frame.is_empty()) {
                    return Ok((pid, tid, main.frame.clone()));
                }
            }
        }

        let started_in_page = events
            .iter()
            .find(|e| e.name == "TracingStartedInPage")
            .and_then(|e| {
                let page = e.data()?.page.clone()?;
                Some((e.pid, e.tid, page))
            });
        started_in_page.ok_or(MetricError::Code(ErrorCode::NoTracingStarted))
    }

    pub fn process_navigation(trace: &ProcessedTrace) -> Result<ProcessedNavigation> {
        let origin = trace.time_origin_ts;
        let after_origin = || trace.frame_events.iter().filter(move |e| e.ts >= origin);
        let first_named = |name: &str| after_origin().find(|e| e.name == name).map(|e| e.ts);

        let first_paint = first_named("firstPaint");
        let first_contentful_paint =
            first_named("firstContentfulPaint").ok_or(MetricError::Code(ErrorCode::NoFcp))?;

        let first_meaningful_paint = first_named("firstMeaningfulPaint").or_else(|| {
            after_origin()
                .filter(|e| e.name == "firstMeaningfulPaintCandidate")
                .last()
                .map(|e| e.ts)
        });

        let last_lcp_event = after_origin()
            .filter(|e| {
                e.name == "largestContentfulPaint::Candidate"
                    || e.name == "largestContentfulPaint::Invalidate"
            })
            .last();
        let lcp_invalidated =
            last_lcp_event.is_some_and(|e| e.name == "largestContentfulPaint::Invalidate");
        let largest_contentful_paint = last_lcp_event
            .filter(|_| !lcp_invalidated)
            .map(|e| e.ts);

        let dom_content_loaded = first_named("domContentLoadedEventEnd");
        let load = first_named("loadEventEnd");

        let timestamps = NavigationTimestamps {
            time_origin: origin,
            first_paint,
            first_contentful_paint,
            first_meaningful_paint,
            largest_contentful_paint,
            dom_content_loaded,
            load,
            trace_end: trace.trace_end_ts,
        };
        let to_ms = |ts: f64| (ts - origin) / 1000.0;
        let timings = NavigationTimings {
            time_origin: 0.0,
            first_paint: first_paint.map(to_ms),
            first_contentful_paint: to_ms(first_contentful_paint),
            first_meaningful_paint: first_meaningful_paint.map(to_ms),
            largest_contentful_paint: largest_contentful_paint.map(to_ms),
            dom_content_loaded: dom_content_loaded.map(to_ms),
            load: load.map(to_ms),
            trace_end: to_ms(trace.trace_end_ts),
        };

        Ok(ProcessedNavigation {
            timestamps,
            timings,
            lcp_invalidated,
        })
    }

    pub fn assert_has_top_level_events(main_thread_events: &[TraceEvent]) -> Result<()> {
        if main_thread_events.iter().any(is_schedulable_task) {
            Ok(())
        } else {
            Err(MetricError::Code(ErrorCode::NoTopLevelEvents))
        }
    }

    /// Non-overlapping top-level tasks within `[start, end]` (ms from the time origin).
    pub fn main_thread_top_level_events(
        trace: &ProcessedTrace,
        start: f64,
        end: f64,
    ) -> Vec<TaskTiming> {
        let mut tasks: Vec<TaskTiming> = Vec::new();
        for event in &trace.main_thread_events {
            let Some(dur) = event.dur.filter(|d| *d > 0.0) else {
                continue;
            };
            if !is_schedulable_task(event) {
                continue;
            }
            let task_start = (event.ts - trace.time_origin_ts) / 1000.0;
            let task_end = (event.ts + dur - trace.time_origin_ts) / 1000.0;
            if task_start > end || task_end < start {
                continue;
            }
            if let Some(prev) = tasks.last_mut().filter(|prev| task_start < prev.end) {
                prev.end = task_start - 0.001;
                prev.duration = prev.end - prev.start;
            }
            tasks.push(TaskTiming {
                start: task_start,
                end: task_end,
                duration: dur / 1000.0,
            });
        }
        tasks
    }
}
