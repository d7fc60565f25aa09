use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source I/O error: {0}")]
    SourceIo(#[from] std::io::Error),

    #[error("source HTTP error: {0}")]
    SourceHttp(#[from] reqwest::Error),

    #[error("audio device error: {0}")]
    Device(String),

    #[error(transparent)]
    Codec(#[from] codec::CodecError),

    #[error(transparent)]
    Jitter(#[from] jitter::JitterError),

    #[error(transparent)]
    Rtp(#[from] rtp::RtpError),

    #[error("end of stream")]
    EndOfStream,
}
