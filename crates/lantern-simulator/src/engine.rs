use crate::connection_pool::{ConnectionPool, ConnectionPoolOptions};
use crate::dns_cache::DnsCache;
use crate::error::{LanternError, Result};
use crate::graph::{DependencyGraph, Node, NodeId, NodeKind};
use crate::network_analyzer::NetworkAnalysis;
use crate::tcp_connection::{ConnectionTiming, DownloadOptions, TcpConnection};
use crate::trace::{NodeTiming, SimulationResult};
use lantern_abstract::config::{
    DEVTOOLS_RTT_ADJUSTMENT_FACTOR, DEVTOOLS_THROUGHPUT_ADJUSTMENT_FACTOR,
};
use lantern_abstract::{Settings, ThrottlingMethod, ThrottlingSettings};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

pub const DEFAULT_MAXIMUM_CONCURRENT_REQUESTS: usize = 10;
pub const DEFAULT_LAYOUT_TASK_MULTIPLIER: f64 = 0.5;
/// Upper bound (ms) on the simulated duration of a single CPU task.
pub const DEFAULT_MAXIMUM_CPU_TASK_DURATION: f64 = 10_000.0;
const MAX_ITERATIONS: usize = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorOptions {
    pub rtt: f64,
    /// Bits per second.
    pub throughput: f64,
    pub maximum_concurrent_requests: usize,
    pub cpu_slowdown_multiplier: f64,
    pub layout_task_multiplier: f64,
    pub additional_rtt_by_origin: BTreeMap<String, f64>,
    pub server_response_time_by_origin: BTreeMap<String, f64>,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        let mobile = ThrottlingSettings::mobile_slow_4g();
        Self {
            rtt: mobile.rtt_ms,
            throughput: mobile.throughput_kbps * 1024.0,
            maximum_concurrent_requests: DEFAULT_MAXIMUM_CONCURRENT_REQUESTS,
            cpu_slowdown_multiplier: mobile.cpu_slowdown_multiplier,
            layout_task_multiplier: DEFAULT_LAYOUT_TASK_MULTIPLIER,
            additional_rtt_by_origin: BTreeMap::new(),
            server_response_time_by_origin: BTreeMap::new(),
        }
    }
}

/// Predicts how long a dependency graph takes to execute under given network
/// and CPU conditions. Each call to [`Simulator::simulate`] is independent.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulator {
    options: SimulatorOptions,
    maximum_concurrent_requests: usize,
    layout_task_multiplier: f64,
}

impl Simulator {
    pub fn new(options: SimulatorOptions) -> Result<Self> {
        if !options.rtt.is_finite() {
            return Err(LanternError::InvalidParameter {
                name: "rtt",
                value: options.rtt,
            });
        }
        if !options.throughput.is_finite() {
            return Err(LanternError::InvalidParameter {
                name: "throughput",
                value: options.throughput,
            });
        }

        let saturated = TcpConnection::maximum_saturated_connections(options.rtt, options.throughput);
        let maximum_concurrent_requests =
            (saturated.min(options.maximum_concurrent_requests as f64).max(1.0)) as usize;
        let layout_task_multiplier = options.cpu_slowdown_multiplier * options.layout_task_multiplier;

        Ok(Self {
            options,
            maximum_concurrent_requests,
            layout_task_multiplier,
        })
    }

    /// Chooses network and CPU parameters for the throttling method in `settings`.
    pub fn from_settings(settings: &Settings, analysis: &NetworkAnalysis) -> Result<Self> {
        let mut options = SimulatorOptions {
            additional_rtt_by_origin: analysis.additional_rtt_by_origin.clone(),
            server_response_time_by_origin: analysis.server_response_time_by_origin.clone(),
            ..Default::default()
        };
        if let Some(precomputed) = &settings.precomputed_lantern_data {
            options.additional_rtt_by_origin = precomputed.additional_rtt_by_origin.clone();
            options.server_response_time_by_origin =
                precomputed.server_response_time_by_origin.clone();
        }

        let throttling = &settings.throttling;
        match settings.throttling_method {
            ThrottlingMethod::Provided => {
                options.rtt = analysis.rtt;
                options.throughput = analysis.throughput;
                options.cpu_slowdown_multiplier = 1.0;
                options.layout_task_multiplier = 1.0;
            }
            ThrottlingMethod::Devtools => {
                options.rtt = throttling.request_latency_ms / DEVTOOLS_RTT_ADJUSTMENT_FACTOR;
                options.throughput = throttling.download_throughput_kbps * 1024.0
                    / DEVTOOLS_THROUGHPUT_ADJUSTMENT_FACTOR;
                options.cpu_slowdown_multiplier = 1.0;
                options.layout_task_multiplier = 1.0;
            }
            ThrottlingMethod::Simulate => {
                options.rtt = throttling.rtt_ms;
                options.throughput = throttling.throughput_kbps * 1024.0;
                options.cpu_slowdown_multiplier = throttling.cpu_slowdown_multiplier;
            }
        }
        Self::new(options)
    }

    pub fn options(&self) -> &SimulatorOptions {
        &self.options
    }

    pub fn rtt(&self) -> f64 {
        self.options.rtt
    }

    pub fn throughput(&self) -> f64 {
        self.options.throughput
    }

    pub fn maximum_concurrent_requests(&self) -> usize {
        self.maximum_concurrent_requests
    }

    pub fn simulate(&self, graph: &DependencyGraph) -> Result<SimulationResult> {
        if graph.has_cycle() {
            return Err(LanternError::CycleDetected);
        }
        let mut run = SimulationRun::new(self, graph)?;
        run.run_until_complete()?;
        let result = run.into_result();
        info!(
            "Simulated {} nodes in {:.1}ms (rtt={}ms, throughput={:.0}bps)",
            result.node_timings.len(),
            result.time_in_ms,
            self.options.rtt,
            self.options.throughput
        );
        Ok(result)
    }

    /// Where a ready node sorts in the start queue. Lower priority requests are
    /// pushed back so higher priority ones grab connections first.
    fn start_position(node: &Node) -> f64 {
        match &node.kind {
            NodeKind::Cpu(_) => node.start_time(),
            NodeKind::Network(n) => {
                node.start_time() + n.request.priority.start_time_penalty_secs() * 1000.0 * 1000.0
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    NotReadyToStart,
    ReadyToStart,
    InProgress,
    Complete,
}

#[derive(Debug, Clone, Copy)]
struct NodeProgress {
    state: NodeState,
    queued_time: f64,
    start_time: f64,
    end_time: f64,
    time_elapsed: f64,
    time_elapsed_overshoot: f64,
    bytes_downloaded: f64,
    estimated_time_elapsed: f64,
    connection_timing: Option<ConnectionTiming>,
}

impl Default for NodeProgress {
    fn default() -> Self {
        Self {
            state: NodeState::NotReadyToStart,
            queued_time: 0.0,
            start_time: 0.0,
            end_time: 0.0,
            time_elapsed: 0.0,
            time_elapsed_overshoot: 0.0,
            bytes_downloaded: 0.0,
            estimated_time_elapsed: 0.0,
            connection_timing: None,
        }
    }
}

/// Mutable state of one `simulate` call.
struct SimulationRun<'a> {
    simulator: &'a Simulator,
    graph: &'a DependencyGraph,
    pool: ConnectionPool,
    dns: DnsCache,
    progress: Vec<NodeProgress>,
    not_ready: HashSet<NodeId>,
    ready_by_start_position: Vec<NodeId>,
    in_progress: Vec<NodeId>,
    cpu_in_progress: usize,
    network_in_progress: usize,
    flexible_ordering: bool,
    total_elapsed_time: f64,
    iteration: usize,
}

impl<'a> SimulationRun<'a> {
    fn new(simulator: &'a Simulator, graph: &'a DependencyGraph) -> Result<Self> {
        let options = &simulator.options;
        let pool = ConnectionPool::new(
            &graph.network_requests(),
            ConnectionPoolOptions {
                rtt: options.rtt,
                throughput: options.throughput,
                additional_rtt_by_origin: &options.additional_rtt_by_origin,
                server_response_time_by_origin: &options.server_response_time_by_origin,
            },
        )?;

        let mut run = Self {
            simulator,
            graph,
            pool,
            dns: DnsCache::new(options.rtt),
            progress: vec![NodeProgress::default(); graph.len()],
            not_ready: graph.reachable().into_iter().collect(),
            ready_by_start_position: Vec::new(),
            in_progress: Vec::new(),
            cpu_in_progress: 0,
            network_in_progress: 0,
            flexible_ordering: false,
            total_elapsed_time: 0.0,
            iteration: 0,
        };
        run.mark_ready_to_start(graph.root(), 0.0);
        Ok(run)
    }

    fn run_until_complete(&mut self) -> Result<()> {
        while self.step()? {}
        if !self.not_ready.is_empty() {
            debug!("{} nodes were never started", self.not_ready.len());
            return Err(LanternError::CycleDetected);
        }
        Ok(())
    }

    /// Advances the virtual clock to the next node completion. Returns false once
    /// nothing is ready or in progress.
    fn step(&mut self) -> Result<bool> {
        if self.ready_by_start_position.is_empty() && self.in_progress.is_empty() {
            return Ok(false);
        }

        for id in self.ready_by_start_position.clone() {
            self.start_node_if_possible(id)?;
        }

        if self.in_progress.is_empty() {
            if self.flexible_ordering {
                return Err(LanternError::SchedulerDeadlock {
                    pending: self.ready_by_start_position.len(),
                });
            }
            debug!("No node could start, retrying with flexible ordering");
            self.flexible_ordering = true;
            return Ok(true);
        }

        self.update_network_capacity();
        let minimum_time = self.find_next_node_completion_time()?;
        self.total_elapsed_time += minimum_time;
        if !minimum_time.is_finite() || self.iteration > MAX_ITERATIONS {
            return Err(LanternError::DepthExceeded {
                iterations: self.iteration,
            });
        }
        self.iteration += 1;

        for id in self.in_progress.clone() {
            self.update_progress_made_in_time_period(id, minimum_time)?;
        }
        debug!(
            "Step {}: t={:.1}ms, {} in progress, {} ready",
            self.iteration,
            self.total_elapsed_time,
            self.in_progress.len(),
            self.ready_by_start_position.len()
        );
        Ok(true)
    }

    fn mark_ready_to_start(&mut self, id: NodeId, queued_time: f64) {
        let position = Simulator::start_position(self.graph.node(id));
        let insertion_index = self
            .ready_by_start_position
            .iter()
            .position(|c| Simulator::start_position(self.graph.node(*c)) > position)
            .unwrap_or(self.ready_by_start_position.len());
        self.ready_by_start_position.insert(insertion_index, id);
        self.not_ready.remove(&id);

        let progress = &mut self.progress[id.index()];
        progress.state = NodeState::ReadyToStart;
        progress.queued_time = queued_time;
    }

    fn mark_in_progress(&mut self, id: NodeId) {
        self.ready_by_start_position.retain(|c| *c != id);
        self.in_progress.push(id);
        if self.graph.node(id).is_cpu() {
            self.cpu_in_progress += 1;
        } else {
            self.network_in_progress += 1;
        }

        let progress = &mut self.progress[id.index()];
        progress.state = NodeState::InProgress;
        progress.start_time = self.total_elapsed_time;
    }

    fn mark_complete(&mut self, id: NodeId, connection_timing: Option<ConnectionTiming>) {
        self.in_progress.retain(|c| *c != id);
        if self.graph.node(id).is_cpu() {
            self.cpu_in_progress -= 1;
        } else {
            self.network_in_progress -= 1;
        }

        let end_time = self.total_elapsed_time;
        let progress = &mut self.progress[id.index()];
        progress.state = NodeState::Complete;
        progress.end_time = end_time;
        progress.connection_timing = connection_timing;

        let graph = self.graph;
        for &dependent in graph.node(id).dependents() {
            if self.progress[dependent.index()].state != NodeState::NotReadyToStart {
                continue;
            }
            let all_complete = graph
                .node(dependent)
                .dependencies()
                .iter()
                .all(|d| self.progress[d.index()].state == NodeState::Complete);
            if all_complete {
                self.mark_ready_to_start(dependent, end_time);
            }
        }
    }

    fn start_node_if_possible(&mut self, id: NodeId) -> Result<()> {
        let node = self.graph.node(id);
        match &node.kind {
            NodeKind::Cpu(_) => {
                if self.cpu_in_progress == 0 {
                    self.mark_in_progress(id);
                }
            }
            NodeKind::Network(network) => {
                if !network.is_connectionless() {
                    if !self.flexible_ordering
                        && self.network_in_progress >= self.simulator.maximum_concurrent_requests
                    {
                        return Ok(());
                    }
                    if self.pool.acquire(&network.request)?.is_none() {
                        return Ok(());
                    }
                }
                self.mark_in_progress(id);
            }
        }
        Ok(())
    }

    /// Splits the link evenly across every in-flight request.
    fn update_network_capacity(&mut self) {
        if self.network_in_progress == 0 {
            return;
        }
        let share = self.simulator.options.throughput / self.network_in_progress as f64;
        for connection in self.pool.connections_in_use() {
            self.pool.connection_mut(connection).set_throughput(share);
        }
    }

    fn find_next_node_completion_time(&mut self) -> Result<f64> {
        let mut minimum = f64::INFINITY;
        for id in self.in_progress.clone() {
            minimum = minimum.min(self.estimate_time_remaining(id)?);
        }
        Ok(minimum)
    }

    fn estimate_time_remaining(&mut self, id: NodeId) -> Result<f64> {
        let graph = self.graph;
        let estimate = match &graph.node(id).kind {
            NodeKind::Cpu(task) => {
                let multiplier = if task.did_perform_layout() {
                    self.simulator.layout_task_multiplier
                } else {
                    self.simulator.options.cpu_slowdown_multiplier
                };
                let total = (task.duration() / 1000.0 * multiplier)
                    .round()
                    .min(DEFAULT_MAXIMUM_CPU_TASK_DURATION);
                total - self.progress[id.index()].time_elapsed
            }
            NodeKind::Network(network) => {
                let progress = self.progress[id.index()];
                let request = &network.request;
                let size_in_mb = request.resource_size / 1024.0 / 1024.0;
                let time_elapsed = if request.from_disk_cache {
                    8.0 + 20.0 * size_in_mb - progress.time_elapsed
                } else if request.is_non_network() {
                    2.0 + 10.0 * size_in_mb - progress.time_elapsed
                } else {
                    let connection = self.pool.acquire_active_connection_from_request(request)?;
                    let dns_resolution_time =
                        self.dns
                            .time_until_resolution(request, progress.start_time, true);
                    self.pool
                        .connection(connection)
                        .simulate_download_until(
                            request.transfer_size - progress.bytes_downloaded,
                            DownloadOptions {
                                time_already_elapsed: progress.time_elapsed,
                                dns_resolution_time,
                                maximum_time_to_elapse: f64::INFINITY,
                            },
                        )
                        .time_elapsed
                };
                time_elapsed + progress.time_elapsed_overshoot
            }
        };
        self.progress[id.index()].estimated_time_elapsed = estimate;
        Ok(estimate)
    }

    fn update_progress_made_in_time_period(&mut self, id: NodeId, period: f64) -> Result<()> {
        let graph = self.graph;
        let progress = self.progress[id.index()];
        let is_finished = progress.estimated_time_elapsed == period;

        let network = match &graph.node(id).kind {
            NodeKind::Network(network) if !network.is_connectionless() => network,
            _ => {
                if is_finished {
                    self.mark_complete(id, None);
                } else {
                    self.progress[id.index()].time_elapsed += period;
                }
                return Ok(());
            }
        };

        let request = &network.request;
        let connection_id = self.pool.acquire_active_connection_from_request(request)?;
        let dns_resolution_time = self
            .dns
            .time_until_resolution(request, progress.start_time, true);
        let calculation = self.pool.connection(connection_id).simulate_download_until(
            request.transfer_size - progress.bytes_downloaded,
            DownloadOptions {
                time_already_elapsed: progress.time_elapsed,
                dns_resolution_time,
                maximum_time_to_elapse: period - progress.time_elapsed_overshoot,
            },
        );

        let connection = self.pool.connection_mut(connection_id);
        connection.set_congestion_window(calculation.congestion_window);
        connection.set_h2_overflow_bytes_downloaded(calculation.extra_bytes_downloaded);

        if is_finished {
            connection.set_warmed(true);
            self.pool.release(request);
            self.mark_complete(id, Some(calculation.connection_timing));
        } else {
            let progress = &mut self.progress[id.index()];
            progress.time_elapsed += calculation.time_elapsed;
            progress.time_elapsed_overshoot += calculation.time_elapsed - period;
            progress.bytes_downloaded += calculation.bytes_downloaded;
        }
        Ok(())
    }

    fn into_result(self) -> SimulationResult {
        let node_timings = self
            .progress
            .iter()
            .enumerate()
            .filter(|(_, p)| p.state == NodeState::Complete)
            .map(|(index, p)| {
                let id = NodeId(index);
                (
                    id,
                    NodeTiming {
                        start_time: p.start_time,
                        end_time: p.end_time,
                        duration: p.end_time - p.start_time,
                        queued_time: p.queued_time,
                        connection_timing: p.connection_timing,
                    },
                )
            })
            .collect();
        SimulationResult {
            time_in_ms: self.total_elapsed_time,
            node_timings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CpuTask, PageDependencyGraph};
    use lantern_abstract::{NetworkRequest, PrecomputedLanternData, TraceEvent};
    use std::sync::Arc;

    fn options(rtt: f64) -> SimulatorOptions {
        SimulatorOptions {
            rtt,
            throughput: 1_000_000_000.0,
            ..Default::default()
        }
    }

    fn document() -> Node {
        let mut request = NetworkRequest::new("root", "https://a.com/");
        request.transfer_size = 1000.0;
        Node::network(Arc::new(request))
    }

    fn cpu(ts: f64, dur: f64, layout: bool) -> Node {
        let mut child_events = Vec::new();
        if layout {
            child_events.push(TraceEvent::complete("Layout", ts + 1.0, 10.0, 1, 1));
        }
        Node::cpu(CpuTask {
            event: TraceEvent::complete("RunTask", ts, dur, 1, 1),
            child_events,
            corrected_end_ts: None,
        })
    }

    #[test]
    fn test_cold_document_download() {
        let graph = DependencyGraph::new(document());
        let simulator = Simulator::new(options(100.0)).unwrap();
        let result = simulator.simulate(&graph).unwrap();
        // DNS 200 + handshake 150 + TLS 100 + server 30 + response 50.
        assert_eq!(result.time_in_ms, 530.0);
        let timing = result.node_timings[&graph.root()];
        assert_eq!(timing.start_time, 0.0);
        assert_eq!(timing.end_time, 530.0);
        assert_eq!(
            timing.connection_timing.map(|t| t.time_to_first_byte),
            Some(530.0)
        );
    }

    #[test]
    fn test_cpu_tasks_scaled_by_slowdown() {
        let mut graph = DependencyGraph::new(document());
        let root = graph.root();
        let task = graph.add_node(cpu(1_000_000.0, 50_000.0, false));
        let layout = graph.add_node(cpu(2_000_000.0, 50_000.0, true));
        graph.add_dependent(root, task).unwrap();
        graph.add_dependent(task, layout).unwrap();

        let simulator = Simulator::new(options(100.0)).unwrap();
        let result = simulator.simulate(&graph).unwrap();
        assert_eq!(result.node_timings[&task].start_time, 530.0);
        assert_eq!(result.node_timings[&task].duration, 200.0);
        // Layout tasks use half the slowdown.
        assert_eq!(result.node_timings[&layout].duration, 100.0);
        assert_eq!(result.time_in_ms, 830.0);
    }

    #[test]
    fn test_overlapped_task_runs_until_the_next_one_starts() {
        let events = vec![
            TraceEvent::complete("RunTask", 1_000_000.0, 5_000_000.0, 1, 1),
            TraceEvent::complete("RunTask", 1_020_000.0, 10_000.0, 1, 1),
        ];
        let mut tasks = PageDependencyGraph::cpu_tasks(&events).unwrap().into_iter();
        let first = tasks.next().unwrap();
        assert_eq!(first.duration(), 19_999.0);

        let mut graph = DependencyGraph::new(document());
        let root = graph.root();
        let first = graph.add_node(Node::cpu(first));
        let second = graph.add_node(Node::cpu(tasks.next().unwrap()));
        graph.add_dependent(root, first).unwrap();
        graph.add_dependent(first, second).unwrap();

        let simulator = Simulator::new(SimulatorOptions {
            cpu_slowdown_multiplier: 1.0,
            ..options(100.0)
        })
        .unwrap();
        let result = simulator.simulate(&graph).unwrap();
        assert_eq!(result.node_timings[&first].duration, 20.0);
        assert_eq!(result.node_timings[&second].start_time, 550.0);
        assert_eq!(result.time_in_ms, 560.0);
    }

    #[test]
    fn test_cpu_tasks_run_one_at_a_time() {
        let mut graph = DependencyGraph::new(document());
        let root = graph.root();
        let a = graph.add_node(cpu(1_000_000.0, 10_000.0, false));
        let b = graph.add_node(cpu(1_500_000.0, 10_000.0, false));
        graph.add_dependent(root, a).unwrap();
        graph.add_dependent(root, b).unwrap();

        let result = Simulator::new(options(100.0)).unwrap().simulate(&graph).unwrap();
        assert_eq!(result.node_timings[&a].end_time, 570.0);
        assert_eq!(result.node_timings[&b].start_time, 570.0);
        assert_eq!(result.time_in_ms, 610.0);
    }

    #[test]
    fn test_connectionless_request_cost() {
        let mut graph = DependencyGraph::new(document());
        let root = graph.root();
        let mut data = NetworkRequest::new("data", "data:image/png;base64,AAAA");
        data.protocol = "data".into();
        let data = graph.add_node(Node::network(Arc::new(data)));
        graph.add_dependent(root, data).unwrap();

        let result = Simulator::new(options(100.0)).unwrap().simulate(&graph).unwrap();
        assert_eq!(result.node_timings[&data].duration, 2.0);
        assert_eq!(result.time_in_ms, 532.0);
    }

    #[test]
    fn test_simulation_is_deterministic() {
        let mut graph = DependencyGraph::new(document());
        let root = graph.root();
        for i in 0..8 {
            let mut request = NetworkRequest::new(format!("r{i}"), format!("https://a.com/{i}.js"));
            request.transfer_size = 40_000.0 + i as f64 * 1000.0;
            request.renderer_start_time = 10.0 + i as f64;
            let id = graph.add_node(Node::network(Arc::new(request)));
            graph.add_dependent(root, id).unwrap();
        }
        let simulator = Simulator::new(SimulatorOptions::default()).unwrap();
        let first = simulator.simulate(&graph).unwrap();
        let second = simulator.simulate(&graph).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.node_timings.len(), 9);
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let err = Simulator::new(SimulatorOptions {
            rtt: f64::NAN,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, LanternError::InvalidParameter { name: "rtt", .. }));
        assert!(Simulator::new(options(100.0)).is_ok());
        assert!(
            Simulator::new(SimulatorOptions {
                throughput: f64::INFINITY,
                ..Default::default()
            })
            .is_err()
        );
    }

    #[test]
    fn test_concurrency_limited_by_saturation() {
        let simulator = Simulator::new(SimulatorOptions {
            rtt: 100.0,
            throughput: 116_800.0 * 3.0,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(simulator.maximum_concurrent_requests(), 3);

        let tiny = Simulator::new(SimulatorOptions {
            rtt: 100.0,
            throughput: 1000.0,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(tiny.maximum_concurrent_requests(), 1);
    }

    #[test]
    fn test_from_settings_by_throttling_method() {
        let analysis = NetworkAnalysis {
            rtt: 42.0,
            additional_rtt_by_origin: BTreeMap::from([("https://a.com".to_string(), 5.0)]),
            server_response_time_by_origin: BTreeMap::new(),
            throughput: 5_000_000.0,
        };

        let mut settings = Settings::default();
        let simulated = Simulator::from_settings(&settings, &analysis).unwrap();
        assert_eq!(simulated.rtt(), 150.0);
        assert_eq!(simulated.throughput(), 1.6 * 1024.0 * 1024.0);
        assert_eq!(simulated.options().cpu_slowdown_multiplier, 4.0);
        assert_eq!(simulated.options().additional_rtt_by_origin["https://a.com"], 5.0);

        settings.throttling_method = ThrottlingMethod::Devtools;
        let devtools = Simulator::from_settings(&settings, &analysis).unwrap();
        assert!((devtools.rtt() - 150.0).abs() < 1e-9);
        assert!((devtools.throughput() - 1.6 * 1024.0 * 1024.0).abs() < 1e-6);
        assert_eq!(devtools.options().cpu_slowdown_multiplier, 1.0);

        settings.throttling_method = ThrottlingMethod::Provided;
        settings.precomputed_lantern_data = Some(PrecomputedLanternData {
            additional_rtt_by_origin: BTreeMap::new(),
            server_response_time_by_origin: BTreeMap::from([("https://a.com".to_string(), 7.0)]),
        });
        let provided = Simulator::from_settings(&settings, &analysis).unwrap();
        assert_eq!(provided.rtt(), 42.0);
        assert_eq!(provided.throughput(), 5_000_000.0);
        assert!(provided.options().additional_rtt_by_origin.is_empty());
        assert_eq!(
            provided.options().server_response_time_by_origin["https://a.com"],
            7.0
        );
    }
}
