//! Reassembles RTP packets back into per-session elementary streams.
//!
//! Missing-packet accounting is anchored per `(ssrc, payload_type)`
//! session rather than on a single buffer-wide counter: two sessions
//! sharing one socket (e.g. a stream and its control channel, or two
//! unrelated SSRCs after a source restart) must not have one session's
//! gaps inflate another's loss count.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use jitter::sg::ScatterGatherJitter;
use tracing::{debug, warn};

use crate::control::ControlBlock;
use crate::error::RtpError;
use crate::header::{RtpPacket, CONTROL_PAYLOAD_TYPE, CONTROL_PROFILE_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub ssrc: u32,
    pub payload_type: u8,
}

struct Session {
    jitter: Arc<ScatterGatherJitter>,
    last_seq: Option<u16>,
    missing: u64,
    received: u64,
}

/// What happened to one ingested packet, for callers that want to drive
/// metrics or auto-attach new sessions off unexpected SSRCs.
#[derive(Debug)]
pub enum IngestOutcome {
    Delivered { key: SessionKey, missing_delta: u64 },
    Control(ControlBlock),
    UnknownSession(SessionKey),
}

pub struct Demux {
    sessions: Mutex<HashMap<SessionKey, Session>>,
}

impl Demux {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn attach(&self, key: SessionKey, jitter: Arc<ScatterGatherJitter>) {
        self.sessions.lock().unwrap().insert(
            key,
            Session {
                jitter,
                last_seq: None,
                missing: 0,
                received: 0,
            },
        );
    }

    pub fn detach(&self, key: &SessionKey) {
        self.sessions.lock().unwrap().remove(key);
    }

    pub fn missing_count(&self, key: &SessionKey) -> Option<u64> {
        self.sessions.lock().unwrap().get(key).map(|s| s.missing)
    }

    /// Parse one datagram and route it: control commands are returned
    /// directly, media payloads are pushed into the matching session's
    /// jitter buffer (blocking on `pull` if it is momentarily full).
    pub fn ingest(&self, buf: &[u8]) -> Result<IngestOutcome, RtpError> {
        let pkt = RtpPacket::parse(buf)?;

        if let Some(ext) = &pkt.extension {
            if ext.profile_id == CONTROL_PROFILE_ID || pkt.header.payload_type == CONTROL_PAYLOAD_TYPE {
                let block = ControlBlock::parse(&ext.data)?;
                return Ok(IngestOutcome::Control(block));
            }
        }

        let key = SessionKey {
            ssrc: pkt.header.ssrc,
            payload_type: pkt.header.payload_type,
        };

        let mut sessions = self.sessions.lock().unwrap();
        let Some(session) = sessions.get_mut(&key) else {
            return Ok(IngestOutcome::UnknownSession(key));
        };

        let missing_delta = match session.last_seq {
            Some(prev) => {
                let expected = prev.wrapping_add(1);
                if pkt.header.sequence_number == expected {
                    0
                } else {
                    let gap = pkt.header.sequence_number.wrapping_sub(expected);
                    // A large "gap" going backwards (reordered/duplicate
                    // packet) should not be counted as loss.
                    if gap < 0x8000 {
                        gap as u64
                    } else {
                        0
                    }
                }
            }
            None => 0,
        };
        session.missing += missing_delta;
        session.received += 1;
        session.last_seq = Some(pkt.header.sequence_number);

        if missing_delta > 0 {
            warn!(ssrc = key.ssrc, pt = key.payload_type, missing_delta, "rtp sequence gap");
        }

        let jitter = session.jitter.clone();
        drop(sessions);

        // A payload larger than one jitter block is split across as many
        // blocks as it takes; the marker bit is RTP framing (talkspurt
        // start in many audio profiles), not an end-of-stream signal, so
        // it never reaches the jitter's `eos`.
        let mut offset = 0;
        loop {
            let mut guard = jitter.pull()?;
            let len = (pkt.payload.len() - offset).min(guard.capacity());
            guard.as_mut_slice()[..len].copy_from_slice(&pkt.payload[offset..offset + len]);
            guard.push(len, false, None)?;
            offset += len;
            if offset >= pkt.payload.len() {
                break;
            }
        }

        debug!(ssrc = key.ssrc, pt = key.payload_type, len = pkt.payload.len(), "rtp payload delivered");
        Ok(IngestOutcome::Delivered { key, missing_delta })
    }
}

impl Default for Demux {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlCommand;
    use crate::header::{RtpHeader, RtpPacket};
    use jitter::JitterFormat;

    fn session_jitter() -> Arc<ScatterGatherJitter> {
        Arc::new(ScatterGatherJitter::new(JitterFormat::Mpeg4Aac, 4, 32, 1).unwrap())
    }

    #[test]
    fn delivers_in_order_packets_with_no_missing() {
        let demux = Demux::new();
        let key = SessionKey { ssrc: 7, payload_type: 96 };
        let j = session_jitter();
        demux.attach(key, j.clone());

        let mut h = RtpHeader::new(96, 7);
        h.sequence_number = 0;
        let pkt = RtpPacket::encode(&h, None, b"abc");
        let outcome = demux.ingest(&pkt).unwrap();
        match outcome {
            IngestOutcome::Delivered { missing_delta, .. } => assert_eq!(missing_delta, 0),
            _ => panic!("expected Delivered"),
        }
        assert_eq!(demux.missing_count(&key), Some(0));

        let g = j.peer().unwrap();
        assert_eq!(g.as_slice(), b"abc");
    }

    #[test]
    fn counts_gaps_per_session_independently() {
        let demux = Demux::new();
        let key_a = SessionKey { ssrc: 1, payload_type: 96 };
        let key_b = SessionKey { ssrc: 2, payload_type: 96 };
        demux.attach(key_a, session_jitter());
        demux.attach(key_b, session_jitter());

        let mut h = RtpHeader::new(96, 1);
        h.sequence_number = 0;
        demux.ingest(&RtpPacket::encode(&h, None, b"a")).unwrap();
        h.sequence_number = 5; // 4 packets lost on session A
        demux.ingest(&RtpPacket::encode(&h, None, b"a")).unwrap();

        let mut hb = RtpHeader::new(96, 2);
        hb.sequence_number = 0;
        demux.ingest(&RtpPacket::encode(&hb, None, b"b")).unwrap();
        hb.sequence_number = 1;
        demux.ingest(&RtpPacket::encode(&hb, None, b"b")).unwrap();

        assert_eq!(demux.missing_count(&key_a), Some(4));
        assert_eq!(demux.missing_count(&key_b), Some(0));
    }

    #[test]
    fn unknown_session_is_reported_not_dropped_silently() {
        let demux = Demux::new();
        let mut h = RtpHeader::new(96, 99);
        h.sequence_number = 0;
        let outcome = demux.ingest(&RtpPacket::encode(&h, None, b"x")).unwrap();
        assert!(matches!(outcome, IngestOutcome::UnknownSession(_)));
    }

    #[test]
    fn control_extension_is_routed_separately_from_media() {
        let demux = Demux::new();
        let block = ControlBlock::new(vec![ControlCommand::Pause]);
        let pkt = crate::mux::Mux::new().encode_control(5, 0, &block);
        let outcome = demux.ingest(&pkt).unwrap();
        match outcome {
            IngestOutcome::Control(b) => assert_eq!(b, block),
            _ => panic!("expected Control"),
        }
    }
}
