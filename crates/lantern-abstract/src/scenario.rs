use crate::config::SettingsOverride;
use crate::error_code::ErrorCode;
use crate::request::NetworkRequest;
use crate::trace_event::TraceEvent;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    FirstContentfulPaint,
    FirstMeaningfulPaint,
    LargestContentfulPaint,
    Interactive,
    TotalBlockingTime,
    MaxPotentialFid,
    SpeedIndex,
}

impl MetricKind {
    pub const ALL: [MetricKind; 7] = [
        MetricKind::FirstContentfulPaint,
        MetricKind::FirstMeaningfulPaint,
        MetricKind::LargestContentfulPaint,
        MetricKind::Interactive,
        MetricKind::TotalBlockingTime,
        MetricKind::MaxPotentialFid,
        MetricKind::SpeedIndex,
    ];

    pub fn acronym(&self) -> &'static str {
        match self {
            MetricKind::FirstContentfulPaint => "FCP",
            MetricKind::FirstMeaningfulPaint => "FMP",
            MetricKind::LargestContentfulPaint => "LCP",
            MetricKind::Interactive => "TTI",
            MetricKind::TotalBlockingTime => "TBT",
            MetricKind::MaxPotentialFid => "MPFID",
            MetricKind::SpeedIndex => "SI",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.acronym())
    }
}

/// Visual progress summary computed from screenshots by an external collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedlineSummary {
    /// Milliseconds relative to the time origin.
    pub speed_index: f64,
    /// Microseconds, absolute.
    pub begining_ts: f64,
    #[serde(default)]
    pub frame_count: usize,
}

/// Everything the engine consumes about one page load.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageArtifacts {
    pub requested_url: String,
    pub main_document_url: String,
    pub trace_events: Vec<TraceEvent>,
    pub network_requests: Vec<NetworkRequest>,
    #[serde(default)]
    pub speedline: Option<SpeedlineSummary>,
}

impl PageArtifacts {
    /// Fills derived request fields that inputs commonly omit.
    pub fn normalize(&mut self) {
        for request in &mut self.network_requests {
            request.normalize();
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PageScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub settings: SettingsOverride,
    pub artifacts: PageArtifacts,
    #[serde(default)]
    pub assertions: Vec<ScenarioAssertion>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScenarioAssertion {
    /// Assert that a metric resolved to a value no larger than `ms`
    MetricAtMost { metric: MetricKind, ms: f64 },
    /// Assert that a metric resolved to a value no smaller than `ms`
    MetricAtLeast { metric: MetricKind, ms: f64 },
    /// Assert that a metric failed with the given code
    MetricFails { metric: MetricKind, code: ErrorCode },
}
