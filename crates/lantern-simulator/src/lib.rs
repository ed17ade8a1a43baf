pub mod connection_pool;
pub mod dns_cache;
pub mod engine;
pub mod error;
pub mod graph;
pub mod network_analyzer;
pub mod tcp_connection;
pub mod trace;

pub use engine::{Simulator, SimulatorOptions};
pub use error::{LanternError, Result};
pub use graph::{
    CpuTask, DependencyGraph, Direction, NetworkNode, Node, NodeId, NodeKind, PageDependencyGraph,
};
pub use network_analyzer::{NetworkAnalysis, NetworkAnalyzer};
pub use tcp_connection::{ConnectionTiming, TcpConnection};
pub use trace::{NodeTiming, SimulationReport, SimulationResult};
