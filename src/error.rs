use thiserror::Error;

use crate::processor::sniffer::ImageKind;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every way a batch, object or single variant can fail.
///
/// Only the configuration errors are fatal for an invocation; everything
/// else is logged and contained at the object or variant it belongs to.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid variant spec {entry:?}: {reason}")]
    InvalidVariantSpec { entry: String, reason: &'static str },

    #[error("no target sizes configured")]
    NoVariantsConfigured,

    #[error("failed to fetch source object: {source}")]
    Fetch { source: BoxError },

    #[error("object is not a supported image format")]
    UnrecognizedFormat,

    #[error("object looks like {kind} but could not be decoded: {source}")]
    CorruptImage {
        kind: ImageKind,
        source: image::ImageError,
    },

    #[error("failed to encode variant: {source}")]
    Encode { source: BoxError },

    #[error("failed to store variant: {source}")]
    Store { source: BoxError },

    #[error("deadline expired while {stage}")]
    Timeout { stage: &'static str },
}

impl PipelineError {
    pub(crate) fn invalid_spec(entry: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidVariantSpec {
            entry: entry.into(),
            reason,
        }
    }

    /// Fatal errors abort the whole invocation before any object is touched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidVariantSpec { .. } | Self::NoVariantsConfigured
        )
    }
}
