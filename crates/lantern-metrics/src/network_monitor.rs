use lantern_abstract::NetworkRequest;
use serde::Serialize;

const IGNORED_SCHEMES: [&str; 2] = ["ws", "wss"];

/// A time window in milliseconds on the trace clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Period {
    pub start: f64,
    pub end: f64,
}

impl Period {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Windows during which at most `allowed_concurrent_requests` requests were in
/// flight, up to `end_time`. Empty windows are dropped.
pub fn find_network_quiet_periods(
    records: &[&NetworkRequest],
    allowed_concurrent_requests: usize,
    end_time: f64,
) -> Vec<Period> {
    let mut boundaries: Vec<(f64, bool)> = Vec::new();
    for record in records {
        if record.is_non_network() || IGNORED_SCHEMES.contains(&record.parsed_url.scheme.as_str()) {
            continue;
        }
        boundaries.push((record.network_request_time, true));
        if record.finished {
            boundaries.push((record.network_end_time, false));
        }
    }
    boundaries.retain(|(time, _)| *time <= end_time);
    boundaries.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut in_flight = 0usize;
    let mut quiet_start = 0.0;
    let mut periods = Vec::new();
    for (time, is_start) in boundaries {
        if is_start {
            if in_flight == allowed_concurrent_requests {
                periods.push(Period {
                    start: quiet_start,
                    end: time,
                });
            }
            in_flight += 1;
        } else {
            in_flight = in_flight.saturating_sub(1);
            if in_flight == allowed_concurrent_requests {
                quiet_start = time;
            }
        }
    }
    if in_flight <= allowed_concurrent_requests {
        periods.push(Period {
            start: quiet_start,
            end: end_time,
        });
    }

    periods.retain(|p| p.start != p.end);
    periods
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, start: f64, end: f64) -> NetworkRequest {
        let mut request = NetworkRequest::new(id, format!("https://a.com/{id}"));
        request.network_request_time = start;
        request.network_end_time = end;
        request
    }

    #[test]
    fn test_quiet_periods_with_two_allowed() {
        let records = [
            record("1", 0.0, 1000.0),
            record("2", 100.0, 900.0),
            record("3", 200.0, 600.0),
            record("4", 3000.0, 4000.0),
        ];
        let refs: Vec<&NetworkRequest> = records.iter().collect();
        let periods = find_network_quiet_periods(&refs, 2, 10_000.0);
        assert_eq!(
            periods,
            vec![
                Period {
                    start: 0.0,
                    end: 200.0
                },
                Period {
                    start: 600.0,
                    end: 10_000.0
                },
            ]
        );
    }

    #[test]
    fn test_unfinished_and_websocket_requests() {
        let mut pending = record("1", 100.0, 0.0);
        pending.finished = false;
        let mut socket = NetworkRequest::new("ws", "wss://a.com/socket");
        socket.network_request_time = 50.0;
        socket.finished = false;
        let records = [pending, socket];
        let refs: Vec<&NetworkRequest> = records.iter().collect();

        let periods = find_network_quiet_periods(&refs, 0, 500.0);
        assert_eq!(
            periods,
            vec![Period {
                start: 0.0,
                end: 100.0
            }]
        );
    }
}
