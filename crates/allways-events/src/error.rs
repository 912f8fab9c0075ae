//! Error types for the status channel.

/// Errors returned by non-blocking subscription reads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// Every publisher handle was dropped.
    #[error("status channel closed")]
    Closed,
}
