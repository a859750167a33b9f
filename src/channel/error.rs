//! Channel errors.
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`ChannelError::Closed`] | `CHANNEL_CLOSED` | No |
//! | [`ChannelError::EndOfStream`] | `CHANNEL_END_OF_STREAM` | No |
//! | [`ChannelError::Timeout`] | `CHANNEL_TIMEOUT` | Yes |
//! | [`ChannelError::SentinelAlreadySent`] | `CHANNEL_SENTINEL_SENT` | No |
//!
//! `EndOfStream` is the normal way a receiver learns the sender is gone;
//! callers match on it rather than treat it as a failure.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The endpoint used for the operation, or its peer, has been closed.
    #[error("channel closed")]
    Closed,

    /// The sender closed and every buffered message has been drained.
    #[error("end of stream")]
    EndOfStream,

    /// A bounded receive elapsed without a message.
    #[error("no message received within {0:?}")]
    Timeout(Duration),

    /// A value or second sentinel was sent after the sentinel.
    #[error("sentinel already sent on this channel")]
    SentinelAlreadySent,
}

impl ChannelError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ChannelError::Closed => "CHANNEL_CLOSED",
            ChannelError::EndOfStream => "CHANNEL_END_OF_STREAM",
            ChannelError::Timeout(_) => "CHANNEL_TIMEOUT",
            ChannelError::SentinelAlreadySent => "CHANNEL_SENTINEL_SENT",
        }
    }

    /// Whether retrying the same receive may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ChannelError::Timeout(_))
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, ChannelError::EndOfStream)
    }
}
