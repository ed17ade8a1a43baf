pub mod config;
pub mod error_code;
pub mod request;
pub mod scenario;
pub mod trace_event;

pub use config::{
    PrecomputedLanternData, Settings, SettingsOverride, ThrottlingMethod, ThrottlingSettings,
};
pub use error_code::ErrorCode;
pub use request::{
    CallFrame, CallStack, Initiator, InitiatorType, NetworkRequest, ParsedUrl, Priority,
    ResourceTiming, ResourceType,
};
pub use scenario::{MetricKind, PageArtifacts, PageScenario, ScenarioAssertion, SpeedlineSummary};
pub use trace_event::{TraceEvent, TraceEventArgs, TraceEventData, TraceFrame};
