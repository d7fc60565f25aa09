use thiserror::Error;

/// Matches the spec's codec error taxonomy: transient errors are worth
/// retrying, `StreamEnd`/`FormatMismatch` tell the caller what happened,
/// everything else is `Fatal` and should tear the pipeline node down.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("transient decode/encode error: {0}")]
    Transient(String),

    #[error("end of stream")]
    StreamEnd,

    #[error("format mismatch: expected {expected}, got {actual}")]
    FormatMismatch { expected: String, actual: String },

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("fatal codec error: {0}")]
    Fatal(String),
}
