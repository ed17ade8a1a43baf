use crate::error::{LanternError, Result};
use lantern_abstract::request::equal_with_excluded_fragments;
use lantern_abstract::{NetworkRequest, ResourceTiming, ResourceType};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Key under which estimates across every origin are aggregated.
pub const SUMMARY: &str = "__SUMMARY__";

/// Initial congestion window in bytes.
pub const INITIAL_CWD: f64 = 14.0 * 1024.0;

const DEFAULT_SERVER_RESPONSE_PERCENTAGE: f64 = 0.4;
const DYNAMIC_SERVER_RESPONSE_PERCENTAGE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: f64,
    pub median: Option<f64>,
}

pub type SummaryByOrigin = BTreeMap<String, Summary>;

#[derive(Debug, Clone, Copy)]
pub struct RttEstimateOptions {
    /// Skip the connection-timing method even when it would produce samples.
    pub force_coarse_estimates: bool,
    pub coarse_estimate_multiplier: f64,
    pub use_download_estimates: bool,
    pub use_send_start_estimates: bool,
    pub use_headers_end_estimates: bool,
}

impl Default for RttEstimateOptions {
    fn default() -> Self {
        Self {
            force_coarse_estimates: false,
            coarse_estimate_multiplier: 0.3,
            use_download_estimates: true,
            use_send_start_estimates: true,
            use_headers_end_estimates: true,
        }
    }
}

/// Observed network characteristics of a page load.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAnalysis {
    pub rtt: f64,
    pub additional_rtt_by_origin: BTreeMap<String, f64>,
    pub server_response_time_by_origin: BTreeMap<String, f64>,
    /// Bits per second.
    pub throughput: f64,
}

struct EstimateContext<'a> {
    record: &'a NetworkRequest,
    timing: &'a ResourceTiming,
    connection_reused: bool,
}

pub struct NetworkAnalyzer;

impl NetworkAnalyzer {
    pub fn group_by_origin<'a>(
        records: &[&'a NetworkRequest],
    ) -> BTreeMap<String, Vec<&'a NetworkRequest>> {
        let mut grouped: BTreeMap<String, Vec<&'a NetworkRequest>> = BTreeMap::new();
        for record in records {
            grouped
                .entry(record.origin().to_string())
                .or_default()
                .push(*record);
        }
        grouped
    }

    pub fn get_summary(values: &[f64]) -> Summary {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let median = match sorted.len() {
            0 => None,
            n if n % 2 == 0 => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
            n => Some(sorted[n / 2]),
        };

        Summary {
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            avg: sorted.iter().sum::<f64>() / sorted.len() as f64,
            median,
        }
    }

    /// Summarizes each key and adds the `__SUMMARY__` entry over every value.
    pub fn summarize(values: &BTreeMap<String, Vec<f64>>) -> SummaryByOrigin {
        let mut summaries = SummaryByOrigin::new();
        let mut all = Vec::new();
        for (key, estimates) in values {
            summaries.insert(key.clone(), Self::get_summary(estimates));
            all.extend_from_slice(estimates);
        }
        summaries.insert(SUMMARY.to_string(), Self::get_summary(&all));
        summaries
    }

    /// Connection ids can be trusted when there is more than one and each was
    /// opened fresh at least once.
    pub fn can_trust_connection_information(records: &[&NetworkRequest]) -> bool {
        let mut started: HashMap<u64, bool> = HashMap::new();
        for record in records {
            let entry = started.entry(record.connection_id).or_insert(false);
            *entry = *entry || !record.connection_reused;
        }
        if started.len() <= 1 {
            return false;
        }
        started.values().all(|s| *s)
    }

    /// Returns request id → whether the request went over an already open connection.
    pub fn estimate_if_connection_was_reused(
        records: &[&NetworkRequest],
        force_coarse_estimates: bool,
    ) -> HashMap<String, bool> {
        if !force_coarse_estimates && Self::can_trust_connection_information(records) {
            return records
                .iter()
                .map(|r| (r.request_id.clone(), r.connection_reused))
                .collect();
        }

        let mut reused = HashMap::new();
        for origin_records in Self::group_by_origin(records).values() {
            let Some(earliest) = origin_records.iter().copied().reduce(|a, b| {
                if b.network_request_time < a.network_request_time {
                    b
                } else {
                    a
                }
            }) else {
                continue;
            };
            let earliest_end = origin_records
                .iter()
                .map(|r| r.network_end_time)
                .fold(f64::INFINITY, f64::min);

            for record in origin_records {
                let was_reused =
                    record.network_request_time >= earliest_end || record.protocol == "h2";
                reused.insert(record.request_id.clone(), was_reused);
            }
            reused.insert(earliest.request_id.clone(), false);
        }
        reused
    }

    fn estimate_rtt_via_connection_timing(ctx: &EstimateContext<'_>) -> Vec<f64> {
        if ctx.connection_reused {
            return Vec::new();
        }
        let t = ctx.timing;
        if t.connect_end >= 0.0 && t.connect_start >= 0.0 && ctx.record.is_h3() {
            vec![t.connect_end - t.connect_start]
        } else if t.ssl_start >= 0.0 && t.ssl_end >= 0.0 && t.ssl_start != t.connect_start {
            vec![t.connect_end - t.ssl_start, t.ssl_start - t.connect_start]
        } else if t.connect_start >= 0.0 && t.connect_end >= 0.0 {
            vec![t.connect_end - t.connect_start]
        } else {
            Vec::new()
        }
    }

    fn estimate_rtt_via_download_timing(ctx: &EstimateContext<'_>) -> Vec<f64> {
        let record = ctx.record;
        if ctx.connection_reused || record.transfer_size <= INITIAL_CWD {
            return Vec::new();
        }
        let headers_end = ctx.timing.receive_headers_end;
        if !headers_end.is_finite() || headers_end < 0.0 {
            return Vec::new();
        }
        let total_time = record.network_end_time - record.network_request_time;
        let download_time = total_time - headers_end;
        let round_trips = (record.transfer_size / INITIAL_CWD).log2();
        if round_trips > 5.0 {
            return Vec::new();
        }
        vec![download_time / round_trips]
    }

    fn estimate_rtt_via_send_start_timing(ctx: &EstimateContext<'_>) -> Vec<f64> {
        let send_start = ctx.timing.send_start;
        if ctx.connection_reused || !send_start.is_finite() || send_start < 0.0 {
            return Vec::new();
        }
        // DNS, then TCP unless QUIC, then TLS.
        let mut round_trips = 1.0;
        if !ctx.record.is_h3() {
            round_trips += 1.0;
        }
        if ctx.record.is_secure() {
            round_trips += 1.0;
        }
        vec![send_start / round_trips]
    }

    fn estimate_rtt_via_headers_end_timing(ctx: &EstimateContext<'_>) -> Vec<f64> {
        let headers_end = ctx.timing.receive_headers_end;
        if !headers_end.is_finite() || headers_end < 0.0 {
            return Vec::new();
        }
        let Some(resource_type) = ctx.record.resource_type else {
            return Vec::new();
        };
        let server_share = if resource_type.is_dynamic() {
            DYNAMIC_SERVER_RESPONSE_PERCENTAGE
        } else {
            DEFAULT_SERVER_RESPONSE_PERCENTAGE
        };
        let estimated_server_time = headers_end * server_share;

        let mut round_trips = 1.0;
        if !ctx.connection_reused {
            round_trips += 1.0;
            if !ctx.record.is_h3() {
                round_trips += 1.0;
            }
            if ctx.record.is_secure() {
                round_trips += 1.0;
            }
        }
        vec![f64::max((headers_end - estimated_server_time) / round_trips, 3.0)]
    }

    fn collect_estimates(
        origin_records: &[&NetworkRequest],
        reused: &HashMap<String, bool>,
        estimator: fn(&EstimateContext<'_>) -> Vec<f64>,
        multiplier: f64,
        out: &mut Vec<f64>,
    ) {
        for record in origin_records {
            let Some(timing) = record.timing.as_ref() else {
                continue;
            };
            let ctx = EstimateContext {
                record,
                timing,
                connection_reused: reused.get(&record.request_id).copied().unwrap_or(false),
            };
            out.extend(estimator(&ctx).into_iter().map(|e| e * multiplier));
        }
    }

    /// Per-origin RTT summaries. Coarse methods only run for origins where the
    /// connection timing produced nothing.
    pub fn estimate_rtt_by_origin(
        records: &[&NetworkRequest],
        options: &RttEstimateOptions,
    ) -> Result<SummaryByOrigin> {
        let reused = Self::estimate_if_connection_was_reused(records, false);
        let mut estimates_by_origin: BTreeMap<String, Vec<f64>> = BTreeMap::new();

        for (origin, origin_records) in Self::group_by_origin(records) {
            let mut estimates = Vec::new();
            if !options.force_coarse_estimates {
                Self::collect_estimates(
                    &origin_records,
                    &reused,
                    Self::estimate_rtt_via_connection_timing,
                    1.0,
                    &mut estimates,
                );
            }

            if estimates.is_empty() {
                let multiplier = options.coarse_estimate_multiplier;
                if options.use_download_estimates {
                    Self::collect_estimates(
                        &origin_records,
                        &reused,
                        Self::estimate_rtt_via_download_timing,
                        multiplier,
                        &mut estimates,
                    );
                }
                if options.use_send_start_estimates {
                    Self::collect_estimates(
                        &origin_records,
                        &reused,
                        Self::estimate_rtt_via_send_start_timing,
                        multiplier,
                        &mut estimates,
                    );
                }
                if options.use_headers_end_estimates {
                    Self::collect_estimates(
                        &origin_records,
                        &reused,
                        Self::estimate_rtt_via_headers_end_timing,
                        multiplier,
                        &mut estimates,
                    );
                }
            }

            if !estimates.is_empty() {
                estimates_by_origin.insert(origin, estimates);
            }
        }

        if estimates_by_origin.is_empty() {
            return Err(LanternError::NoTimingInformation);
        }
        Ok(Self::summarize(&estimates_by_origin))
    }

    /// Server response time per origin given each origin's RTT. Missing origins
    /// fall back to the `__SUMMARY__` RTT.
    pub fn estimate_server_response_time_by_origin(
        records: &[&NetworkRequest],
        rtt_by_origin: &BTreeMap<String, f64>,
    ) -> SummaryByOrigin {
        let mut estimates_by_origin: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (origin, origin_records) in Self::group_by_origin(records) {
            let mut estimates = Vec::new();
            for record in &origin_records {
                if let Some(explicit) = record.server_response_time {
                    estimates.push(explicit);
                    continue;
                }
                let Some(timing) = record.timing.as_ref() else {
                    continue;
                };
                let headers_end = timing.receive_headers_end;
                let send_end = timing.send_end;
                if !headers_end.is_finite() || headers_end < 0.0 {
                    continue;
                }
                if !send_end.is_finite() || send_end < 0.0 {
                    continue;
                }
                let ttfb = headers_end - send_end;
                let rtt = rtt_by_origin
                    .get(&origin)
                    .or_else(|| rtt_by_origin.get(SUMMARY))
                    .copied()
                    .unwrap_or(0.0);
                estimates.push(f64::max(ttfb - rtt, 0.0));
            }
            if !estimates.is_empty() {
                estimates_by_origin.insert(origin, estimates);
            }
        }
        Self::summarize(&estimates_by_origin)
    }

    /// Bits per second while at least one networked request was downloading.
    pub fn estimate_throughput(records: &[&NetworkRequest]) -> f64 {
        let mut total_bytes = 0.0;
        let mut boundaries: Vec<(f64, bool)> = Vec::new();
        for record in records {
            if record.parsed_url.scheme == "data"
                || record.failed
                || !record.finished
                || record.status_code > 300
                || record.transfer_size == 0.0
            {
                continue;
            }
            total_bytes += record.transfer_size;
            boundaries.push((record.response_headers_end_time / 1000.0, true));
            boundaries.push((record.network_end_time / 1000.0, false));
        }
        if boundaries.is_empty() {
            return f64::INFINITY;
        }
        boundaries.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut inflight = 0usize;
        let mut current_start = 0.0;
        let mut total_duration = 0.0;
        for (time, is_start) in boundaries {
            if is_start {
                if inflight == 0 {
                    current_start = time;
                }
                inflight += 1;
            } else {
                inflight = inflight.saturating_sub(1);
                if inflight == 0 {
                    total_duration += time - current_start;
                }
            }
        }
        total_bytes * 8.0 / total_duration
    }

    pub fn compute_rtt_and_server_response_time(
        records: &[&NetworkRequest],
    ) -> Result<NetworkAnalysis> {
        let rtt_summaries = Self::estimate_rtt_by_origin(records, &RttEstimateOptions::default())?;
        let rtt_by_origin: BTreeMap<String, f64> = rtt_summaries
            .iter()
            .filter_map(|(origin, summary)| summary.min.map(|min| (origin.clone(), min)))
            .collect();
        let minimum_rtt = rtt_by_origin
            .values()
            .copied()
            .fold(f64::INFINITY, f64::min);

        let response_summaries =
            Self::estimate_server_response_time_by_origin(records, &rtt_by_origin);

        let mut additional_rtt_by_origin = BTreeMap::new();
        let mut server_response_time_by_origin = BTreeMap::new();
        for (origin, summary) in response_summaries {
            let rtt = rtt_by_origin.get(&origin).copied().unwrap_or(minimum_rtt);
            additional_rtt_by_origin.insert(origin.clone(), rtt - minimum_rtt);
            if let Some(median) = summary.median {
                server_response_time_by_origin.insert(origin, median);
            }
        }

        Ok(NetworkAnalysis {
            rtt: minimum_rtt,
            additional_rtt_by_origin,
            server_response_time_by_origin,
            throughput: 0.0,
        })
    }

    pub fn analyze(records: &[&NetworkRequest]) -> Result<NetworkAnalysis> {
        let throughput = Self::estimate_throughput(records);
        let analysis = Self::compute_rtt_and_server_response_time(records)?;
        Ok(NetworkAnalysis {
            throughput,
            ..analysis
        })
    }

    /// First record whose URL equals `url` ignoring the fragment.
    pub fn find_resource_for_url<'a>(
        records: &[&'a NetworkRequest],
        url: &str,
    ) -> Option<&'a NetworkRequest> {
        records
            .iter()
            .copied()
            .find(|r| url.starts_with(r.url.as_str()) && equal_with_excluded_fragments(&r.url, url))
    }

    /// Last non-failed document request for `url`, the one that ended the redirect chain.
    pub fn find_last_document_for_url<'a>(
        records: &[&'a NetworkRequest],
        url: &str,
    ) -> Option<&'a NetworkRequest> {
        records
            .iter()
            .copied()
            .filter(|r| {
                r.is_resource_type(ResourceType::Document)
                    && !r.failed
                    && url.starts_with(r.url.as_str())
                    && equal_with_excluded_fragments(&r.url, url)
            })
            .last()
    }

    /// Follows `redirectDestination` ids to the final hop.
    pub fn resolve_redirects<'a>(
        records: &[&'a NetworkRequest],
        request: &'a NetworkRequest,
    ) -> &'a NetworkRequest {
        let by_id: HashMap<&str, &'a NetworkRequest> = records
            .iter()
            .map(|r| (r.request_id.as_str(), *r))
            .collect();
        let mut seen = HashSet::new();
        let mut current = request;
        while let Some(next_id) = current.redirect_destination.as_deref() {
            if !seen.insert(current.request_id.as_str()) {
                break;
            }
            match by_id.get(next_id) {
                Some(next) => current = *next,
                None => break,
            }
        }
        current
    }
}
