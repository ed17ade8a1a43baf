use crate::error::{LanternError, Result};
use crate::network_analyzer::NetworkAnalyzer;
use crate::tcp_connection::TcpConnection;
use lantern_abstract::NetworkRequest;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

pub const DEFAULT_SERVER_RESPONSE_TIME: f64 = 30.0;
pub const CONNECTIONS_PER_ORIGIN: usize = 6;
const TLS_SCHEMES: [&str; 2] = ["https", "wss"];

/// Index of a connection inside its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(usize);

#[derive(Debug, Clone, Copy)]
pub struct ConnectionPoolOptions<'a> {
    pub rtt: f64,
    pub throughput: f64,
    pub additional_rtt_by_origin: &'a BTreeMap<String, f64>,
    pub server_response_time_by_origin: &'a BTreeMap<String, f64>,
}

#[derive(Debug)]
pub struct ConnectionPool {
    connections: Vec<TcpConnection>,
    by_origin: BTreeMap<String, Vec<ConnectionId>>,
    by_request: HashMap<String, ConnectionId>,
    in_use: BTreeSet<ConnectionId>,
}

impl ConnectionPool {
    pub fn new(records: &[&NetworkRequest], options: ConnectionPoolOptions<'_>) -> Result<Self> {
        let reused = NetworkAnalyzer::estimate_if_connection_was_reused(records, true);
        let mut connections = Vec::new();
        let mut by_origin = BTreeMap::new();

        for (origin, requests) in NetworkAnalyzer::group_by_origin(records) {
            let additional_rtt = options
                .additional_rtt_by_origin
                .get(&origin)
                .copied()
                .unwrap_or(0.0);
            let response_time = options
                .server_response_time_by_origin
                .get(&origin)
                .copied()
                .unwrap_or(DEFAULT_SERVER_RESPONSE_TIME);

            let mut origin_connections: Vec<TcpConnection> = requests
                .iter()
                .filter(|r| !reused.get(&r.request_id).copied().unwrap_or(false))
                .map(|r| {
                    TcpConnection::new(
                        options.rtt + additional_rtt,
                        options.throughput,
                        response_time,
                        TLS_SCHEMES.contains(&r.parsed_url.scheme.as_str()),
                        r.is_h2(),
                    )
                })
                .collect();

            let Some(first) = origin_connections.first() else {
                return Err(LanternError::NoConnectionForOrigin { origin });
            };
            let min_connections = if first.is_h2() {
                1
            } else {
                CONNECTIONS_PER_ORIGIN
            };
            while origin_connections.len() < min_connections {
                let copy = origin_connections[0].fresh_copy();
                origin_connections.push(copy);
            }

            debug!(
                "{} connections for origin {}",
                origin_connections.len(),
                origin
            );
            let ids: Vec<ConnectionId> = origin_connections
                .into_iter()
                .map(|connection| {
                    connections.push(connection);
                    ConnectionId(connections.len() - 1)
                })
                .collect();
            by_origin.insert(origin, ids);
        }

        Ok(Self {
            connections,
            by_origin,
            by_request: HashMap::new(),
            in_use: BTreeSet::new(),
        })
    }

    pub fn connection(&self, id: ConnectionId) -> &TcpConnection {
        &self.connections[id.0]
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> &mut TcpConnection {
        &mut self.connections[id.0]
    }

    pub fn connections_for_origin(&self, origin: &str) -> &[ConnectionId] {
        self.by_origin.get(origin).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn connections_in_use(&self) -> Vec<ConnectionId> {
        self.in_use.iter().copied().collect()
    }

    /// Hands out the idle connection with the largest congestion window for the
    /// request's origin, or `None` when every one is busy.
    pub fn acquire(&mut self, request: &NetworkRequest) -> Result<Option<ConnectionId>> {
        if self.by_request.contains_key(&request.request_id) {
            return Err(LanternError::ConnectionAlreadyHeld {
                request_id: request.request_id.clone(),
            });
        }

        let mut best: Option<ConnectionId> = None;
        for &id in self.connections_for_origin(request.origin()) {
            if self.in_use.contains(&id) {
                continue;
            }
            let current_max = best
                .map(|b| self.connections[b.0].congestion_window())
                .unwrap_or(f64::NEG_INFINITY);
            if self.connections[id.0].congestion_window() > current_max {
                best = Some(id);
            }
        }

        if let Some(id) = best {
            self.in_use.insert(id);
            self.by_request.insert(request.request_id.clone(), id);
        }
        Ok(best)
    }

    pub fn acquire_active_connection_from_request(
        &self,
        request: &NetworkRequest,
    ) -> Result<ConnectionId> {
        self.by_request
            .get(&request.request_id)
            .copied()
            .ok_or_else(|| LanternError::NoActiveConnection {
                request_id: request.request_id.clone(),
            })
    }

    pub fn release(&mut self, request: &NetworkRequest) {
        if let Some(id) = self.by_request.remove(&request.request_id) {
            self.in_use.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str, url: &str, protocol: &str, start: f64, end: f64) -> NetworkRequest {
        let mut r = NetworkRequest::new(id, url);
        r.protocol = protocol.to_string();
        r.network_request_time = start;
        r.network_end_time = end;
        r
    }

    fn pool(records: &[&NetworkRequest]) -> Result<ConnectionPool> {
        let empty = BTreeMap::new();
        ConnectionPool::new(
            records,
            ConnectionPoolOptions {
                rtt: 100.0,
                throughput: 10_000_000.0,
                additional_rtt_by_origin: &empty,
                server_response_time_by_origin: &empty,
            },
        )
    }

    #[test]
    fn test_http1_origin_is_padded_to_six() {
        let a = request("1", "https://a.com/", "http/1.1", 0.0, 100.0);
        let pool = pool(&[&a]).unwrap();
        assert_eq!(pool.connections_for_origin("https://a.com").len(), 6);
        let first = pool.connections_for_origin("https://a.com")[0];
        assert!(pool.connection(first).is_ssl());
        assert_eq!(
            pool.connection(first).server_latency(),
            DEFAULT_SERVER_RESPONSE_TIME
        );
    }

    #[test]
    fn test_h2_origin_keeps_single_connection() {
        let a = request("1", "https://a.com/", "h2", 0.0, 100.0);
        let b = request("2", "https://a.com/b.js", "h2", 10.0, 200.0);
        let pool = pool(&[&a, &b]).unwrap();
        assert_eq!(pool.connections_for_origin("https://a.com").len(), 1);
    }

    #[test]
    fn test_double_acquire_fails() {
        let a = request("1", "https://a.com/", "http/1.1", 0.0, 100.0);
        let mut pool = pool(&[&a]).unwrap();
        assert!(pool.acquire(&a).unwrap().is_some());
        assert!(matches!(
            pool.acquire(&a),
            Err(LanternError::ConnectionAlreadyHeld { .. })
        ));
    }

    #[test]
    fn test_active_connection_lookup_and_release() {
        let a = request("1", "https://a.com/", "http/1.1", 0.0, 100.0);
        let mut pool = pool(&[&a]).unwrap();
        assert!(matches!(
            pool.acquire_active_connection_from_request(&a),
            Err(LanternError::NoActiveConnection { .. })
        ));
        // Releasing without a connection is a no-op.
        pool.release(&a);

        let id = pool.acquire(&a).unwrap().unwrap();
        assert_eq!(pool.acquire_active_connection_from_request(&a).unwrap(), id);
        assert_eq!(pool.connections_in_use(), vec![id]);
        pool.release(&a);
        assert!(pool.connections_in_use().is_empty());
    }

    #[test]
    fn test_acquire_prefers_largest_congestion_window() {
        let a = request("1", "https://a.com/", "http/1.1", 0.0, 100.0);
        let b = request("2", "https://a.com/b", "http/1.1", 200.0, 300.0);
        let mut pool = pool(&[&a, &b]).unwrap();
        let warm = pool.connections_for_origin("https://a.com")[3];
        pool.connection_mut(warm).set_congestion_window(40.0);
        assert_eq!(pool.acquire(&b).unwrap(), Some(warm));
    }

    #[test]
    fn test_exhausted_origin_returns_none() {
        let a = request("1", "https://a.com/", "h2", 0.0, 100.0);
        let b = request("2", "https://a.com/b", "h2", 200.0, 300.0);
        let mut pool = pool(&[&a, &b]).unwrap();
        assert!(pool.acquire(&a).unwrap().is_some());
        assert!(pool.acquire(&b).unwrap().is_none());
    }
}
