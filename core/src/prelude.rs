/// Common error type for stage execution.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type StageResult<T> = Result<T, StageError>;

/// Trait describing the per-frame signal-processing stages.
///
/// Stages are built once from a validated configuration and then driven
/// frame by frame. Input shapes are fixed at construction; a mismatch is a
/// contract violation reported as [`StageError::InvalidInput`].
pub trait ProcessingStage {
    type Input: ?Sized;
    type Output;

    fn execute(&mut self, input: &Self::Input) -> StageResult<Self::Output>;

    /// Drops any per-frame state accumulated so far. Stateless stages keep
    /// the default no-op.
    fn cleanup(&mut self) {}
}

/// Fails with [`StageError::InvalidInput`] when `actual` differs from `expected`.
pub(crate) fn ensure_shape(what: &str, expected: &[usize], actual: &[usize]) -> StageResult<()> {
    if expected != actual {
        return Err(StageError::InvalidInput(format!(
            "{} shape {:?} does not match configured {:?}",
            what, actual, expected
        )));
    }
    Ok(())
}
