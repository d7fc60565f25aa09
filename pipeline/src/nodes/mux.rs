use std::net::UdpSocket;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rtp::{Mux, MuxedStream};
use tracing::{debug, warn};

/// Drains `stream`'s jitter buffer one ready block at a time, wraps
/// each in an RTP packet via `mux`, and sends it to `dest` over `socket`.
pub fn spawn(
    mux: Arc<Mux>,
    stream: Arc<MuxedStream>,
    samples_per_block: u32,
    socket: UdpSocket,
    dest: std::net::SocketAddr,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("rtp-mux-{:08x}", stream.ssrc))
        .spawn(move || loop {
            match mux.encode_next(&stream, samples_per_block) {
                Ok(packets) => {
                    for pkt in packets {
                        if let Err(e) = socket.send_to(&pkt, dest) {
                            warn!(%e, "rtp send failed");
                        }
                    }
                }
                Err(_) => {
                    debug!(ssrc = stream.ssrc, "mux stream ended");
                    break;
                }
            }
        })
        .expect("failed to spawn rtp mux thread")
}
