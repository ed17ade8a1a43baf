use super::{Metric, MetricResult};
use crate::cache::ComputedCache;
use crate::computed::{self, MetricInputs};
use crate::error::{MetricError, Result};
use crate::lantern::LanternInteractive;
use crate::network_monitor::{self, Period};
use crate::trace_processor::{ProcessedNavigation, TaskTiming, TraceProcessor};
use lantern_abstract::{ErrorCode, MetricKind, NetworkRequest};
use tracing::debug;

const REQUIRED_QUIET_WINDOW: f64 = 5000.0;
const ALLOWED_CONCURRENT_REQUESTS: usize = 2;
const LONG_TASK_DURATION: f64 = 50.0;

/// The first CPU and network quiet windows that overlap by a full quiet window.
/// All periods are in milliseconds on the trace clock.
#[derive(Debug, Clone, PartialEq)]
pub struct QuietPeriodInfo {
    pub cpu_quiet_period: Period,
    pub network_quiet_period: Period,
    pub cpu_quiet_periods: Vec<Period>,
    pub network_quiet_periods: Vec<Period>,
}

pub struct Interactive;

impl Interactive {
    /// Gaps between `long_tasks` (relative ms), shifted to the trace clock.
    pub fn find_cpu_quiet_periods(
        long_tasks: &[TaskTiming],
        time_origin: f64,
        trace_end: f64,
    ) -> Vec<Period> {
        let mut sorted = long_tasks.to_vec();
        sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

        let Some(first) = sorted.first() else {
            return vec![Period {
                start: 0.0,
                end: trace_end,
            }];
        };

        let mut periods = vec![Period {
            start: 0.0,
            end: first.start + time_origin,
        }];
        for pair in sorted.windows(2) {
            periods.push(Period {
                start: pair[0].end + time_origin,
                end: pair[1].start + time_origin,
            });
        }
        if let Some(last) = sorted.last() {
            periods.push(Period {
                start: last.end + time_origin,
                end: trace_end,
            });
        }
        periods
    }

    pub fn find_overlapping_quiet_periods(
        long_tasks: &[TaskTiming],
        network_records: &[&NetworkRequest],
        navigation: &ProcessedNavigation,
    ) -> Result<QuietPeriodInfo> {
        let time_origin = navigation.timestamps.time_origin / 1000.0;
        let trace_end = navigation.timestamps.trace_end / 1000.0;
        let fcp = navigation.timestamps.first_contentful_paint / 1000.0;

        let long_enough = |period: &Period| {
            period.end > fcp + REQUIRED_QUIET_WINDOW && period.duration() >= REQUIRED_QUIET_WINDOW
        };
        let mut network_quiet_periods = network_monitor::find_network_quiet_periods(
            network_records,
            ALLOWED_CONCURRENT_REQUESTS,
            trace_end,
        );
        network_quiet_periods.retain(long_enough);
        let mut cpu_quiet_periods = Self::find_cpu_quiet_periods(long_tasks, time_origin, trace_end);
        cpu_quiet_periods.retain(long_enough);

        let mut cpu_queue = cpu_quiet_periods.iter().copied();
        let mut network_queue = network_quiet_periods.iter().copied();
        let mut cpu_candidate = cpu_queue.next();
        let mut network_candidate = network_queue.next();

        while let (Some(cpu), Some(network)) = (cpu_candidate, network_candidate) {
            let overlaps = if cpu.start >= network.start {
                network.end >= cpu.start + REQUIRED_QUIET_WINDOW
            } else {
                cpu.end >= network.start + REQUIRED_QUIET_WINDOW
            };
            if overlaps {
                return Ok(QuietPeriodInfo {
                    cpu_quiet_period: cpu,
                    network_quiet_period: network,
                    cpu_quiet_periods,
                    network_quiet_periods,
                });
            }
            if cpu.start >= network.start {
                network_candidate = network_queue.next();
            } else {
                cpu_candidate = cpu_queue.next();
            }
        }

        Err(MetricError::Code(if cpu_candidate.is_some() {
            ErrorCode::NoTtiNetworkIdlePeriod
        } else {
            ErrorCode::NoTtiCpuIdlePeriod
        }))
    }
}

impl Metric for Interactive {
    const KIND: MetricKind = MetricKind::Interactive;

    fn compute_simulated(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult> {
        Ok(MetricResult::simulated(LanternInteractive::request(inputs, cache)?))
    }

    fn compute_observed(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<MetricResult> {
        let trace = computed::processed_trace(inputs, cache)?;
        let navigation = computed::processed_navigation(inputs, cache)?;
        let dom_content_loaded = navigation
            .timestamps
            .dom_content_loaded
            .ok_or(MetricError::Code(ErrorCode::NoDcl))?;

        let long_tasks: Vec<TaskTiming> =
            TraceProcessor::main_thread_top_level_events(&trace, 0.0, f64::INFINITY)
                .into_iter()
                .filter(|task| task.duration >= LONG_TASK_DURATION)
                .collect();
        let network_records: Vec<&NetworkRequest> = inputs
            .network_records()
            .into_iter()
            .filter(|r| r.finished && r.request_method == "GET" && !r.failed && r.status_code < 400)
            .collect();

        let quiet = Self::find_overlapping_quiet_periods(&long_tasks, &network_records, &navigation)?;
        debug!(
            "CPU quiet from {:.1}ms, network quiet from {:.1}ms",
            quiet.cpu_quiet_period.start, quiet.network_quiet_period.start
        );

        let timestamp = quiet
            .cpu_quiet_period
            .start
            .max(navigation.timestamps.first_contentful_paint / 1000.0)
            .max(dom_content_loaded / 1000.0)
            * 1000.0;
        let timing = (timestamp - navigation.timestamps.time_origin) / 1000.0;
        Ok(MetricResult::observed(timing, timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::{artifacts, observed_settings, with_marker};
    use crate::trace_processor::tests::sample_trace;
    use lantern_abstract::PageArtifacts;

    /// Trace ending at 10.01s with DCL at +800ms.
    fn page(tasks: &[(f64, f64)]) -> PageArtifacts {
        let mut tasks = tasks.to_vec();
        tasks.push((9000.0, 10.0));
        artifacts(with_marker(sample_trace(&tasks), "domContentLoadedEventEnd", 800.0))
    }

    fn observed(artifacts: &PageArtifacts) -> Result<MetricResult> {
        let settings = observed_settings();
        let inputs = MetricInputs::new(artifacts, &settings);
        Interactive::request(&inputs, &mut ComputedCache::new()).map(|r| (*r).clone())
    }

    #[test]
    fn test_no_long_tasks_is_bounded_by_dcl() {
        let tti = observed(&page(&[(100.0, 20.0)])).unwrap();
        assert_eq!(tti.timing, 800.0);
        assert_eq!(tti.timestamp, Some(1_800_000.0));
    }

    #[test]
    fn test_long_task_delays_interactive() {
        let tti = observed(&page(&[(2000.0, 100.0)])).unwrap();
        assert_eq!(tti.timing, 2100.0);
    }

    #[test]
    fn test_cpu_quiet_periods() {
        let tasks = [
            TaskTiming {
                start: 300.0,
                end: 400.0,
                duration: 100.0,
            },
            TaskTiming {
                start: 100.0,
                end: 200.0,
                duration: 100.0,
            },
        ];
        let periods = Interactive::find_cpu_quiet_periods(&tasks, 1000.0, 5000.0);
        let bounds: Vec<(f64, f64)> = periods.iter().map(|p| (p.start, p.end)).collect();
        assert_eq!(bounds, vec![(0.0, 1100.0), (1200.0, 1300.0), (1400.0, 5000.0)]);
    }

    #[test]
    fn test_busy_network_has_no_idle_period() {
        let mut artifacts = page(&[(100.0, 20.0)]);
        for id in ["a", "b", "c"] {
            let mut request = NetworkRequest::new(id, format!("https://a.com/{id}"));
            request.network_request_time = 1000.0;
            request.network_end_time = 9000.0;
            artifacts.network_requests.push(request);
        }
        let err = observed(&artifacts).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NoTtiNetworkIdlePeriod));

        // Failed requests are ignored.
        for request in &mut artifacts.network_requests {
            request.status_code = 404;
        }
        assert_eq!(observed(&artifacts).unwrap().timing, 800.0);
    }

    #[test]
    fn test_missing_dcl_and_short_trace() {
        let artifacts = artifacts(sample_trace(&[(100.0, 20.0), (9000.0, 10.0)]));
        assert_eq!(observed(&artifacts).unwrap_err().code(), Some(ErrorCode::NoDcl));

        let short = artifacts_with_dcl(sample_trace(&[(100.0, 20.0)]));
        assert_eq!(observed(&short).unwrap_err().code(), Some(ErrorCode::NoTtiCpuIdlePeriod));
    }

    fn artifacts_with_dcl(events: Vec<lantern_abstract::TraceEvent>) -> PageArtifacts {
        artifacts(with_marker(events, "domContentLoadedEventEnd", 800.0))
    }
}
