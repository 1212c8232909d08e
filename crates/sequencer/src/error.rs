//! Sequencer error types.

use contracts::ContractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SequencerError {
    /// The sequencer was closed
    #[error("sequencer closed")]
    Closed,

    /// The motion source is closed
    #[error("motion closed")]
    MotionClosed,

    /// Subscription to an unknown notification channel
    #[error("unsupported event kind: {kind}")]
    UnsupportedEvent { kind: String },

    /// Rejected motion update
    #[error("invalid motion update: {message}")]
    InvalidMotion { message: String },

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl SequencerError {
    pub fn invalid_motion(message: impl Into<String>) -> Self {
        Self::InvalidMotion {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SequencerError>;
