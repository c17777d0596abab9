use thiserror::Error;

/// Failure classification for a perspective correction request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CorrectionError {
    /// Region has (near) zero area after clipping, or the derived output
    /// rectangle rounds to less than one pixel.
    #[error("degenerate region: zero area or empty output rectangle")]
    DegenerateRegion,

    /// The four corner correspondences admit no projective solution.
    #[error("singular transform: corners do not define a valid projection")]
    SingularTransform,

    #[error("output of {requested} pixels exceeds the limit of {limit}")]
    OutputTooLarge { requested: u64, limit: u64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Fieldless view of [`CorrectionError`], for callers that only branch on the
/// classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DegenerateRegion,
    SingularTransform,
    OutputTooLarge,
    InvalidInput,
}

impl CorrectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DegenerateRegion => ErrorKind::DegenerateRegion,
            Self::SingularTransform => ErrorKind::SingularTransform,
            Self::OutputTooLarge { .. } => ErrorKind::OutputTooLarge,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CorrectionError>;
