use std::net::UdpSocket;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use rtp::{ControlBlock, Demux, IngestOutcome};
use tracing::{debug, warn};

/// Reads datagrams off `socket` and routes them through `demux`: media
/// payloads land in the session's jitter buffer, control commands are
/// forwarded on `control_tx`, and unknown SSRCs are logged so an
/// operator can decide whether to attach a new session.
pub fn spawn(demux: Arc<Demux>, socket: UdpSocket, control_tx: Sender<ControlBlock>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("rtp-demux".to_string())
        .spawn(move || {
            let mut buf = vec![0u8; 65_536];
            loop {
                let n = match socket.recv(&mut buf) {
                    Ok(n) => n,
                    Err(e) => {
                        warn!(%e, "rtp recv failed, stopping demux thread");
                        break;
                    }
                };
                match demux.ingest(&buf[..n]) {
                    Ok(IngestOutcome::Delivered { key, missing_delta }) => {
                        if missing_delta > 0 {
                            debug!(ssrc = key.ssrc, missing_delta, "rtp loss detected");
                        }
                    }
                    Ok(IngestOutcome::Control(block)) => {
                        let _ = control_tx.send(block);
                    }
                    Ok(IngestOutcome::UnknownSession(key)) => {
                        warn!(ssrc = key.ssrc, pt = key.payload_type, "rtp packet for unknown session");
                    }
                    Err(e) => warn!(%e, "failed to parse rtp packet"),
                }
            }
        })
        .expect("failed to spawn rtp demux thread")
}
