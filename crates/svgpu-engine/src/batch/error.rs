use thiserror::Error;

/// Out-of-sequence use of a renderer. Not recoverable by retrying the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UsageError {
    #[error("draw called outside begin_batch/end_batch")]
    DrawOutsideBatch,

    #[error("begin_batch called while a batch is in progress")]
    NestedBatch,

    #[error("end_batch called without a matching begin_batch")]
    EndOutsideBatch,

    #[error("images cannot be released while a batch is in progress")]
    ReleaseInBatch,

    #[error("invalid batch viewport {width}x{height} at pixel ratio {pixel_ratio}")]
    InvalidViewport {
        width: f32,
        height: f32,
        pixel_ratio: f32,
    },

    #[error("renderer used after dispose")]
    Disposed,
}
