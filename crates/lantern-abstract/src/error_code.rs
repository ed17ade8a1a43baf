use serde::{Deserialize, Serialize};
use std::fmt;

/// User-facing failure codes. The string form is fixed; report layers key their
/// warnings on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoFcp,
    NoFmp,
    NoLcp,
    NoDcl,
    NoNavstart,
    NoTracingStarted,
    NoTopLevelEvents,
    NoTtiCpuIdlePeriod,
    NoTtiNetworkIdlePeriod,
    NoSpeedlineFrames,
    SpeedindexOfZero,
    NoResourceRequest,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoFcp => "NO_FCP",
            ErrorCode::NoFmp => "NO_FMP",
            ErrorCode::NoLcp => "NO_LCP",
            ErrorCode::NoDcl => "NO_DCL",
            ErrorCode::NoNavstart => "NO_NAVSTART",
            ErrorCode::NoTracingStarted => "NO_TRACING_STARTED",
            ErrorCode::NoTopLevelEvents => "NO_TOP_LEVEL_EVENTS",
            ErrorCode::NoTtiCpuIdlePeriod => "NO_TTI_CPU_IDLE_PERIOD",
            ErrorCode::NoTtiNetworkIdlePeriod => "NO_TTI_NETWORK_IDLE_PERIOD",
            ErrorCode::NoSpeedlineFrames => "NO_SPEEDLINE_FRAMES",
            ErrorCode::SpeedindexOfZero => "SPEEDINDEX_OF_ZERO",
            ErrorCode::NoResourceRequest => "NO_RESOURCE_REQUEST",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::NoFcp => "The page did not paint any content.",
            ErrorCode::NoFmp => "The page did not produce a first meaningful paint.",
            ErrorCode::NoLcp => "The page did not display content that qualifies as a Largest Contentful Paint.",
            ErrorCode::NoDcl => "The trace did not contain a DomContentLoaded event.",
            ErrorCode::NoNavstart => "The trace did not contain a navigationStart event.",
            ErrorCode::NoTracingStarted => "No TracingStartedInPage or TracingStartedInBrowser event found.",
            ErrorCode::NoTopLevelEvents => "The main thread did not run any top-level tasks.",
            ErrorCode::NoTtiCpuIdlePeriod => "The main thread never went quiet long enough.",
            ErrorCode::NoTtiNetworkIdlePeriod => "The network never went quiet long enough.",
            ErrorCode::NoSpeedlineFrames => "No visual progress frames were captured.",
            ErrorCode::SpeedindexOfZero => "Visual progress was empty, so Speed Index is zero.",
            ErrorCode::NoResourceRequest => "The requested or main document URL had no matching request.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;

    #[test]
    fn test_serde_matches_display() {
        for code in [
            ErrorCode::NoFcp,
            ErrorCode::NoTtiCpuIdlePeriod,
            ErrorCode::SpeedindexOfZero,
            ErrorCode::NoNavstart,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{code}\""));
        }
    }
}
