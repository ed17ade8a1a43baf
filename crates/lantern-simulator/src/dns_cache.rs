use lantern_abstract::NetworkRequest;
use std::collections::HashMap;

pub const DNS_RESOLUTION_RTT_MULTIPLIER: f64 = 2.0;

/// Tracks when each host name resolved during a simulation run.
#[derive(Debug, Default)]
pub struct DnsCache {
    rtt: f64,
    resolved_at_by_host: HashMap<String, f64>,
}

impl DnsCache {
    pub fn new(rtt: f64) -> Self {
        Self {
            rtt,
            resolved_at_by_host: HashMap::new(),
        }
    }

    /// Milliseconds from `requested_at` until the request's host is resolved.
    /// A pending or finished earlier resolution of the same host shortens the wait.
    pub fn time_until_resolution(
        &mut self,
        request: &NetworkRequest,
        requested_at: f64,
        update_cache: bool,
    ) -> f64 {
        let host = &request.parsed_url.host;
        let mut time_until_resolved = self.rtt * DNS_RESOLUTION_RTT_MULTIPLIER;
        if let Some(&resolved_at) = self.resolved_at_by_host.get(host) {
            let until_cached = f64::max(resolved_at - requested_at, 0.0);
            time_until_resolved = f64::min(until_cached, time_until_resolved);
        }

        if update_cache {
            let resolved_at = requested_at + time_until_resolved;
            self.resolved_at_by_host
                .entry(host.clone())
                .and_modify(|existing| *existing = existing.min(resolved_at))
                .or_insert(resolved_at);
        }
        time_until_resolved
    }
}
