pub mod cache;
pub mod computed;
pub mod error;
pub mod lantern;
pub mod metrics;
pub mod network_monitor;
pub mod tbt_utils;
pub mod timing_summary;
pub mod trace_processor;

pub use cache::{ArtifactKey, ComputedCache};
pub use computed::MetricInputs;
pub use error::{MetricError, Result};
pub use lantern::{LanternMetric, LanternMetricResult};
pub use metrics::{Metric, MetricResult, compute_metric};
pub use timing_summary::TimingSummary;
pub use trace_processor::{ProcessedNavigation, ProcessedTrace, TraceProcessor};
