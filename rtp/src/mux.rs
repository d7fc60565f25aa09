//! Packetizes elementary streams into RTP. Each attached ES gets its own
//! SSRC/payload-type pair and a dedicated jitter buffer that a decoder or
//! encoder thread feeds; [`Mux::encode_next`] pulls exactly one ready
//! block from that ES and wraps it in an RTP header. Running one such
//! call per ES on its own OS thread, all writing to a shared transport,
//! reproduces the round-robin interleaving of the original multiplexer
//! without the mux itself having to poll every attached stream.

use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use jitter::sg::ScatterGatherJitter;

use crate::control::ControlBlock;
use crate::error::RtpError;
use crate::header::{RtpExtension, RtpHeader, RtpPacket, CONTROL_PROFILE_ID};

/// One elementary stream attached to a [`Mux`].
pub struct MuxedStream {
    pub ssrc: u32,
    pub payload_type: u8,
    pub jitter: Arc<ScatterGatherJitter>,
    /// Duplicate every packet under a second SSRC, for redundant unicast
    /// fan-out to two receivers sharing one session.
    pub double_ssrc: Option<u32>,
    seq: AtomicU16,
    timestamp: AtomicU32,
    clock_rate: u32,
}

impl MuxedStream {
    pub fn new(
        ssrc: u32,
        payload_type: u8,
        jitter: Arc<ScatterGatherJitter>,
        clock_rate: u32,
    ) -> Self {
        Self {
            ssrc,
            payload_type,
            jitter,
            double_ssrc: None,
            seq: AtomicU16::new(0),
            timestamp: AtomicU32::new(0),
            clock_rate,
        }
    }
}

pub struct Mux {
    streams: Vec<Arc<MuxedStream>>,
}

impl Mux {
    pub fn new() -> Self {
        Self { streams: Vec::new() }
    }

    pub fn attach(&mut self, stream: Arc<MuxedStream>) {
        self.streams.push(stream);
    }

    pub fn stream(&self, index: usize) -> Option<Arc<MuxedStream>> {
        self.streams.get(index).cloned()
    }

    pub fn streams(&self) -> &[Arc<MuxedStream>] {
        &self.streams
    }

    /// Blocks until `stream` has a ready block, then encodes it as one
    /// RTP packet (or two, under `double_ssrc`, differing only in SSRC).
    pub fn encode_next(&self, stream: &MuxedStream, samples_per_block: u32) -> Result<Vec<BytesMut>, RtpError> {
        let block = stream.jitter.peer()?;
        let payload = block.as_slice();
        let seq = stream.seq.fetch_add(1, Ordering::SeqCst);
        let ts = stream
            .timestamp
            .fetch_add(samples_per_block, Ordering::SeqCst);

        let mut packets = Vec::with_capacity(2);
        let mut header = RtpHeader::new(stream.payload_type, stream.ssrc);
        header.sequence_number = seq;
        header.timestamp = ts;
        header.marker = seq == 0;
        packets.push(RtpPacket::encode(&header, None, payload));

        if let Some(dup_ssrc) = stream.double_ssrc {
            let mut dup = header.clone();
            dup.ssrc = dup_ssrc;
            packets.push(RtpPacket::encode(&dup, None, payload));
        }
        block.pop();
        let _ = stream.clock_rate;
        Ok(packets)
    }

    /// Encode a control command as a standalone RTP packet using the
    /// payload-type-99 extension, addressed to `ssrc`.
    pub fn encode_control(&self, ssrc: u32, seq: u16, block: &ControlBlock) -> BytesMut {
        let mut header = RtpHeader::new(crate::header::CONTROL_PAYLOAD_TYPE, ssrc);
        header.sequence_number = seq;
        let ext = RtpExtension {
            profile_id: CONTROL_PROFILE_ID,
            data: block.encode(),
        };
        RtpPacket::encode(&header, Some(&ext), &[])
    }
}

impl Default for Mux {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jitter::JitterFormat;

    #[test]
    fn encode_next_consumes_one_ready_block() {
        let j = Arc::new(ScatterGatherJitter::new(JitterFormat::Mpeg4Aac, 4, 16, 1).unwrap());
        let g = j.pull().unwrap();
        g.push(4, false, None).unwrap();

        let mut mux = Mux::new();
        let stream = Arc::new(MuxedStream::new(0x1234, 96, j, 48_000));
        mux.attach(stream.clone());

        let packets = mux.encode_next(&stream, 1024).unwrap();
        assert_eq!(packets.len(), 1);
        let pkt = RtpPacket::parse(&packets[0]).unwrap();
        assert_eq!(pkt.header.ssrc, 0x1234);
        assert_eq!(pkt.header.sequence_number, 0);
    }

    #[test]
    fn double_ssrc_duplicates_the_payload() {
        let j = Arc::new(ScatterGatherJitter::new(JitterFormat::Mpeg4Aac, 4, 16, 1).unwrap());
        let g = j.pull().unwrap();
        g.push(4, false, None).unwrap();

        let mut stream = MuxedStream::new(1, 96, j, 48_000);
        stream.double_ssrc = Some(2);
        let stream = Arc::new(stream);
        let mut mux = Mux::new();
        mux.attach(stream.clone());

        let packets = mux.encode_next(&stream, 1024).unwrap();
        assert_eq!(packets.len(), 2);
        let a = RtpPacket::parse(&packets[0]).unwrap();
        let b = RtpPacket::parse(&packets[1]).unwrap();
        assert_eq!(a.header.ssrc, 1);
        assert_eq!(b.header.ssrc, 2);
        assert_eq!(a.payload, b.payload);
    }
}
