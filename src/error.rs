use thiserror::Error;

/// Failures of the spectrogram computation.
///
/// Parameter problems and allocation failures are kept apart so the caller
/// can tell a misconfigured run from one that ran out of memory.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StftError {
    #[error("frame size {0} is not a power of two")]
    NotPowerOfTwo(usize),

    #[error("frame size {0} is too short for a window (need at least 2)")]
    FrameTooShort(usize),

    #[error("hop size must be greater than zero")]
    ZeroHop,

    #[error("sample rate must be greater than zero")]
    InvalidSampleRate,

    #[error("invalid BPM range [{min}, {max}]")]
    InvalidBpmRange { min: f64, max: f64 },

    #[error("failed to allocate {elements} elements for {what}")]
    Allocation { what: &'static str, elements: usize },
}

impl StftError {
    /// True for the "bad parameters" class, false for resource exhaustion.
    pub fn is_bad_parameters(&self) -> bool {
        !matches!(self, StftError::Allocation { .. })
    }
}

/// Failures of the broadcast/gather transport between workers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectiveError {
    #[error("rank {rank}: peer disconnected during {during}")]
    Disconnected { rank: usize, during: &'static str },

    #[error("rank {rank} aborted the run: {reason}")]
    Aborted { rank: usize, reason: String },

    #[error("rank {rank} contributed {actual} elements, expected {expected}")]
    SizeMismatch {
        rank: usize,
        expected: usize,
        actual: usize,
    },

    #[error("contribution from unknown rank {rank} (group size {size})")]
    UnexpectedRank { rank: usize, size: usize },

    #[error("rank {0} contributed more than once")]
    DuplicateRank(usize),

    #[error("gather buffer holds {actual} elements, layout expects {expected}")]
    GatherLength { expected: usize, actual: usize },

    #[error("broadcast called on rank 0 without data")]
    MissingRootData,

    #[error(transparent)]
    Local(#[from] StftError),
}

/// Reserve a zero-filled buffer, reporting allocation failure instead of aborting.
pub fn try_zeroed<T: Copy + Default>(
    what: &'static str,
    elements: usize,
) -> Result<Vec<T>, StftError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(elements)
        .map_err(|_| StftError::Allocation { what, elements })?;
    buf.resize(elements, T::default());
    Ok(buf)
}
