//! RTP packetization/depacketization: header codec, the control
//! extension used to carry transport commands in-band, and the
//! mux/demux pair that bridge RTP sessions to [`jitter`] buffers.

pub mod control;
pub mod demux;
mod error;
pub mod header;
pub mod mux;

pub use control::{ControlBlock, ControlCommand};
pub use demux::{Demux, IngestOutcome, SessionKey};
pub use error::RtpError;
pub use header::{RtpExtension, RtpHeader, RtpPacket, CONTROL_PAYLOAD_TYPE, CONTROL_PROFILE_ID};
pub use mux::{Mux, MuxedStream};

/// Generates a fresh random SSRC, matching the "pick a random 32-bit id
/// on session start" behaviour used throughout the original transport.
pub fn random_ssrc() -> u32 {
    rand::random()
}
