use serde::Serialize;

pub const INITIAL_CONGESTION_WINDOW: f64 = 10.0;
pub const TCP_SEGMENT_SIZE: f64 = 1460.0;

#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    pub time_already_elapsed: f64,
    pub maximum_time_to_elapse: f64,
    pub dns_resolution_time: f64,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            time_already_elapsed: 0.0,
            maximum_time_to_elapse: f64::INFINITY,
            dns_resolution_time: 0.0,
        }
    }
}

/// Phase breakdown of a download. Handshake phases are only present on cold connections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTiming {
    pub dns_resolution_time: Option<f64>,
    pub connection_time: Option<f64>,
    pub ssl_time: Option<f64>,
    pub time_to_first_byte: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadResult {
    pub round_trips: u32,
    pub time_elapsed: f64,
    pub bytes_downloaded: f64,
    pub extra_bytes_downloaded: f64,
    pub congestion_window: f64,
    pub connection_timing: ConnectionTiming,
}

/// A TCP (optionally TLS, optionally H2) connection modelled by round trips and
/// slow start. Throughput is in bits per second, times in milliseconds.
#[derive(Debug, PartialEq)]
pub struct TcpConnection {
    rtt: f64,
    throughput: f64,
    server_latency: f64,
    ssl: bool,
    h2: bool,
    warmed: bool,
    congestion_window: f64,
    h2_overflow_bytes_downloaded: f64,
}

impl TcpConnection {
    pub fn new(rtt: f64, throughput: f64, server_latency: f64, ssl: bool, h2: bool) -> Self {
        Self {
            rtt,
            throughput,
            server_latency,
            ssl,
            h2,
            warmed: false,
            congestion_window: INITIAL_CONGESTION_WINDOW,
            h2_overflow_bytes_downloaded: 0.0,
        }
    }

    /// How many connections can each sustain one segment per round trip.
    pub fn maximum_saturated_connections(rtt: f64, available_throughput: f64) -> f64 {
        let round_trips_per_second = 1000.0 / rtt;
        let bytes_per_second = round_trips_per_second * TCP_SEGMENT_SIZE;
        let minimum_throughput_per_request = bytes_per_second * 8.0;
        (available_throughput / minimum_throughput_per_request).floor()
    }

    fn maximum_congestion_window_in_segments(&self) -> f64 {
        let bytes_per_second = self.throughput / 8.0;
        let bytes_per_round_trip = bytes_per_second * (self.rtt / 1000.0);
        (bytes_per_round_trip / TCP_SEGMENT_SIZE).floor()
    }

    /// A new cold connection with the same link parameters.
    pub fn fresh_copy(&self) -> Self {
        Self::new(
            self.rtt,
            self.throughput,
            self.server_latency,
            self.ssl,
            self.h2,
        )
    }

    pub fn set_throughput(&mut self, throughput: f64) {
        self.throughput = throughput;
    }

    pub fn set_congestion_window(&mut self, congestion_window: f64) {
        self.congestion_window = congestion_window;
    }

    pub fn set_h2_overflow_bytes_downloaded(&mut self, bytes: f64) {
        self.h2_overflow_bytes_downloaded = bytes;
    }

    pub fn set_warmed(&mut self, warmed: bool) {
        self.warmed = warmed;
    }

    pub fn is_warm(&self) -> bool {
        self.warmed
    }

    pub fn is_h2(&self) -> bool {
        self.h2
    }

    pub fn is_ssl(&self) -> bool {
        self.ssl
    }

    pub fn rtt(&self) -> f64 {
        self.rtt
    }

    pub fn server_latency(&self) -> f64 {
        self.server_latency
    }

    pub fn congestion_window(&self) -> f64 {
        self.congestion_window
    }

    /// Simulates downloading `bytes` until done or until `maximum_time_to_elapse`
    /// has passed, whichever comes first.
    pub fn simulate_download_until(&self, bytes: f64, options: DownloadOptions) -> DownloadResult {
        let mut bytes_to_download = bytes;
        if self.warmed && self.h2 {
            bytes_to_download -= self.h2_overflow_bytes_downloaded;
        }

        let two_way_latency = self.rtt;
        let one_way_latency = two_way_latency / 2.0;
        let maximum_congestion_window = self.maximum_congestion_window_in_segments();

        let handshake_and_request = if self.warmed {
            one_way_latency
        } else {
            // SYN, SYN/ACK, ACK + request, then one round trip for TLS False Start.
            let tls = if self.ssl { two_way_latency } else { 0.0 };
            options.dns_resolution_time + 3.0 * one_way_latency + tls
        };

        let mut round_trips = (handshake_and_request / two_way_latency).ceil() as u32;
        let time_to_first_byte = if self.warmed && self.h2 {
            0.0
        } else {
            handshake_and_request + self.server_latency + one_way_latency
        };

        let time_elapsed_for_ttfb = f64::max(time_to_first_byte - options.time_already_elapsed, 0.0);
        let maximum_download_time = options.maximum_time_to_elapse - time_elapsed_for_ttfb;

        let mut congestion_window = f64::min(self.congestion_window, maximum_congestion_window);
        let mut total_bytes_downloaded = 0.0;
        if time_elapsed_for_ttfb > 0.0 {
            total_bytes_downloaded = congestion_window * TCP_SEGMENT_SIZE;
        } else {
            round_trips = 0;
        }

        let mut download_time_elapsed = 0.0;
        let mut bytes_remaining = bytes_to_download - total_bytes_downloaded;
        while bytes_remaining > 0.0 && download_time_elapsed <= maximum_download_time {
            round_trips += 1;
            download_time_elapsed += two_way_latency;
            congestion_window =
                f64::max(f64::min(maximum_congestion_window, congestion_window * 2.0), 1.0);

            let window_bytes = congestion_window * TCP_SEGMENT_SIZE;
            total_bytes_downloaded += window_bytes;
            bytes_remaining -= window_bytes;
        }

        let extra_bytes_downloaded = if self.h2 {
            f64::max(total_bytes_downloaded - bytes_to_download, 0.0)
        } else {
            0.0
        };
        let bytes_downloaded = f64::max(f64::min(total_bytes_downloaded, bytes_to_download), 0.0);

        let connection_timing = if self.warmed {
            ConnectionTiming {
                dns_resolution_time: None,
                connection_time: None,
                ssl_time: None,
                time_to_first_byte,
            }
        } else {
            ConnectionTiming {
                dns_resolution_time: Some(options.dns_resolution_time),
                connection_time: Some(handshake_and_request - options.dns_resolution_time),
                ssl_time: self.ssl.then_some(two_way_latency),
                time_to_first_byte,
            }
        };

        DownloadResult {
            round_trips,
            time_elapsed: time_elapsed_for_ttfb + download_time_elapsed,
            bytes_downloaded,
            extra_bytes_downloaded,
            congestion_window,
            connection_timing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maximum_saturated_connections() {
        assert_eq!(TcpConnection::maximum_saturated_connections(100.0, 1_168_000.0), 10.0);
        assert_eq!(
            TcpConnection::maximum_saturated_connections(100.0, 1_168_000.0 * 2.0 - 1.0),
            19.0
        );
    }

    #[test]
    fn test_cold_tls_download_within_first_window() {
        let connection = TcpConnection::new(100.0, f64::INFINITY, 0.0, true, false);
        let result = connection.simulate_download_until(7.0 * 1460.0, DownloadOptions::default());
        assert_eq!(result.time_elapsed, 300.0);
        assert_eq!(result.round_trips, 3);
        assert_eq!(result.bytes_downloaded, 7.0 * 1460.0);
        assert_eq!(result.connection_timing.connection_time, Some(250.0));
        assert_eq!(result.connection_timing.ssl_time, Some(100.0));
        assert_eq!(result.connection_timing.time_to_first_byte, 300.0);
    }

    #[test]
    fn test_cold_plain_download_pays_server_latency() {
        let connection = TcpConnection::new(100.0, f64::INFINITY, 25.0, false, false);
        let result = connection.simulate_download_until(1000.0, DownloadOptions::default());
        // SYN, SYN/ACK, request, server, response.
        assert_eq!(result.time_elapsed, 225.0);
        assert_eq!(result.round_trips, 2);
        assert_eq!(result.connection_timing.ssl_time, None);
    }

    #[test]
    fn test_warm_connection_doubles_window() {
        let mut connection = TcpConnection::new(100.0, f64::INFINITY, 0.0, true, false);
        connection.set_warmed(true);
        let result = connection.simulate_download_until(100_000.0, DownloadOptions::default());
        assert_eq!(result.time_elapsed, 300.0);
        assert_eq!(result.round_trips, 3);
        assert_eq!(result.congestion_window, 40.0);
        assert_eq!(result.connection_timing.dns_resolution_time, None);
    }

    #[test]
    fn test_throughput_caps_congestion_window() {
        let mut connection = TcpConnection::new(100.0, 1_168_000.0, 0.0, true, false);
        connection.set_warmed(true);
        let result = connection.simulate_download_until(100_000.0, DownloadOptions::default());
        assert_eq!(result.time_elapsed, 700.0);
        assert_eq!(result.round_trips, 7);
        assert_eq!(result.congestion_window, 10.0);
    }

    #[test]
    fn test_maximum_time_limits_progress() {
        let mut connection = TcpConnection::new(100.0, f64::INFINITY, 0.0, true, false);
        connection.set_warmed(true);
        let result = connection.simulate_download_until(
            1_000_000.0,
            DownloadOptions {
                maximum_time_to_elapse: 250.0,
                ..Default::default()
            },
        );
        assert_eq!(result.time_elapsed, 300.0);
        assert_eq!(result.bytes_downloaded, (10.0 + 20.0 + 40.0) * 1460.0);
    }

    #[test]
    fn test_warm_h2_skips_ttfb_and_tracks_overflow() {
        let mut connection = TcpConnection::new(100.0, f64::INFINITY, 0.0, true, true);
        connection.set_warmed(true);
        connection.set_h2_overflow_bytes_downloaded(1000.0);
        let result = connection.simulate_download_until(3000.0, DownloadOptions::default());
        assert_eq!(result.connection_timing.time_to_first_byte, 0.0);
        assert_eq!(result.round_trips, 1);
        assert_eq!(result.time_elapsed, 100.0);
        assert_eq!(result.bytes_downloaded, 2000.0);
        assert_eq!(result.extra_bytes_downloaded, 20.0 * 1460.0 - 2000.0);
    }

    #[test]
    fn test_fresh_copy_resets_state() {
        let mut connection = TcpConnection::new(80.0, 1e6, 10.0, true, true);
        connection.set_warmed(true);
        connection.set_congestion_window(40.0);
        let copy = connection.fresh_copy();
        assert!(!copy.is_warm());
        assert_eq!(copy.congestion_window(), INITIAL_CONGESTION_WINDOW);
        assert!(copy.is_h2());
        assert_eq!(copy.rtt(), 80.0);
    }
}
