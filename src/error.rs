// Pipeline error taxonomy. Store/cache/runtime adapters return anyhow; the loops
// classify failures here so each one is handled by kind.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Cache, store or runtime unreachable. Retried after backoff, never surfaced past logs.
    #[error("{component} unavailable: {source}")]
    TransientIo {
        component: &'static str,
        #[source]
        source: BoxError,
    },

    /// Malformed or absent cache payload. Consumers treat it as "no data".
    #[error("malformed payload under `{key}`: {reason}")]
    DataFormat { key: String, reason: String },

    /// Commit of a record batch failed; the transaction was rolled back as a whole.
    #[error("batch of {size} records rolled back: {source}")]
    PartialBatch {
        size: usize,
        #[source]
        source: BoxError,
    },
}

impl PipelineError {
    pub fn transient(component: &'static str, err: anyhow::Error) -> Self {
        PipelineError::TransientIo {
            component,
            source: err.into(),
        }
    }

    pub fn partial_batch(size: usize, err: anyhow::Error) -> Self {
        PipelineError::PartialBatch {
            size,
            source: err.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::TransientIo { .. } => "transient_io",
            PipelineError::DataFormat { .. } => "data_format",
            PipelineError::PartialBatch { .. } => "partial_batch",
        }
    }
}
