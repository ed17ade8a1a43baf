use lantern_abstract::ErrorCode;
use lantern_simulator::LanternError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricError {
    /// A user-facing failure with a fixed code.
    #[error("{0}: {desc}", desc = .0.description())]
    Code(ErrorCode),

    #[error(transparent)]
    Lantern(LanternError),

    #[error("Missing computed dependency: {name}")]
    MissingDependency { name: &'static str },
}

impl MetricError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            MetricError::Code(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<ErrorCode> for MetricError {
    fn from(code: ErrorCode) -> Self {
        MetricError::Code(code)
    }
}

/// Marker failures surface as their code; every other engine error passes through.
impl From<LanternError> for MetricError {
    fn from(err: LanternError) -> Self {
        match err {
            LanternError::MissingMarker(code) => MetricError::Code(code),
            other => MetricError::Lantern(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, MetricError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_errors_map_to_codes() {
        let err: MetricError = LanternError::MissingMarker(ErrorCode::NoTopLevelEvents).into();
        assert_eq!(err, MetricError::Code(ErrorCode::NoTopLevelEvents));
        assert_eq!(err.code(), Some(ErrorCode::NoTopLevelEvents));

        let err: MetricError = LanternError::CycleDetected.into();
        assert_eq!(err, MetricError::Lantern(LanternError::CycleDetected));
        assert_eq!(err.to_string(), "Cycle detected in dependency graph");
        assert_eq!(err.code(), None);
    }
}
