use lantern_abstract::ErrorCode;

/// Failures raised while analyzing network records, building graphs or simulating.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LanternError {
    #[error("No timing information available")]
    NoTimingInformation,

    #[error("Could not find a connection for origin {origin}")]
    NoConnectionForOrigin { origin: String },

    #[error("Request {request_id} already has a connection")]
    ConnectionAlreadyHeld { request_id: String },

    #[error("Request {request_id} does not have an active connection")]
    NoActiveConnection { request_id: String },

    #[error("Invalid simulator parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Graph construction failed: {reason}")]
    GraphConstruction { reason: String },

    #[error("A node cannot depend on itself: {node}")]
    SelfDependency { node: String },

    #[error("Cycle detected in dependency graph")]
    CycleDetected,

    #[error("Simulation deadlocked with {pending} nodes pending")]
    SchedulerDeadlock { pending: usize },

    #[error("Simulation exceeded depth limit after {iterations} iterations")]
    DepthExceeded { iterations: usize },

    /// A trace marker the computation relies on was missing.
    #[error("{0}")]
    MissingMarker(ErrorCode),
}

pub type Result<T> = std::result::Result<T, LanternError>;
