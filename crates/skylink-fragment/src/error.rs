use crate::header::HeaderFormat;

/// Errors raised on the sending side and by the handoff queue.
#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    /// A frame with no bytes cannot be announced with a chunk count.
    #[error("cannot fragment an empty frame")]
    EmptyFrame,

    /// The configured chunk payload leaves no room for data.
    #[error("chunk payload size must be greater than zero")]
    ChunkSizeTooSmall,

    /// The frame needs more chunks than the header can count.
    #[error("frame needs {required} chunks, header allows {max}")]
    TooManyChunks { required: usize, max: usize },

    /// A datagram is shorter than the header of the selected format.
    #[error("datagram too short for {format:?} header ({len} bytes, need {need})")]
    HeaderTooShort {
        format: HeaderFormat,
        len: usize,
        need: usize,
    },

    /// The handoff queue is full; the item was dropped.
    #[error("handoff queue full")]
    QueueFull,

    /// The other end of the handoff queue is gone.
    #[error("handoff queue closed")]
    QueueClosed,

    #[error("fragment I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FragmentError>;
