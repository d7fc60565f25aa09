use thiserror::Error;

#[derive(Debug, Error)]
pub enum RtpError {
    #[error("packet too short: {0} bytes")]
    TooShort(usize),

    #[error("unsupported RTP version {0}")]
    UnsupportedVersion(u8),

    #[error("extension header truncated")]
    TruncatedExtension,

    #[error("no elementary stream attached for ssrc={ssrc:08x} pt={pt}")]
    UnknownSession { ssrc: u32, pt: u8 },

    #[error("control command block malformed: {0}")]
    MalformedControl(String),

    #[error(transparent)]
    Jitter(#[from] jitter::JitterError),
}
