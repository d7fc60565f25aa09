//! The player state machine: owns the current media catalog position,
//! dispatches `Stop`/`Play`/`Change`/`Error` transitions from a single
//! main-loop thread, and builds the `pipeline` stages a transition
//! needs. `request_state` can be called from any thread (notably the
//! `rpc` server), matching `player_change`/`player_media` being callable
//! from outside the main loop in the original implementation.

mod error;
mod state;

pub use error::PlayerError;
pub use state::PlayerState;

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use codec::passthrough::PassthroughDecoder;
use jitter::JitterFormat;
use media::{MediaCatalog, MediaEntry};
use pipeline::nodes::{decoder, sink};
use pipeline::source;
use pipeline::{EventBus, Pipeline, PipelineEvent};
use tracing::{debug, info, warn};

struct Shared {
    state: Mutex<PlayerState>,
    paused: Mutex<bool>,
    current_media_id: Mutex<Option<String>>,
    volume: Mutex<u8>,
    options: Mutex<PlayerOptions>,
    pending: Mutex<Option<PlayerState>>,
    cv: Condvar,
    running: Mutex<bool>,
}

/// Playback-wide toggles set via the `options` RPC method.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerOptions {
    pub random: bool,
    pub loop_enabled: bool,
}

/// Partial update applied by `Player::set_options`: only `Some` fields
/// are written.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionsPatch {
    pub random: Option<bool>,
    pub loop_enabled: Option<bool>,
}

/// Owns the media catalog and drives playback transitions. `sink_uri`
/// is where decoded PCM is written for the default (non-RTP) playback
/// path, e.g. `"alsa://default"` or `"file:///tmp/out.pcm"`.
pub struct Player {
    shared: Arc<Shared>,
    catalog: Arc<dyn MediaCatalog>,
    events: Arc<EventBus>,
    sink_uri: String,
}

impl Player {
    pub fn new(catalog: Arc<dyn MediaCatalog>, sink_uri: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PlayerState::Stop),
                paused: Mutex::new(false),
                current_media_id: Mutex::new(None),
                volume: Mutex::new(100),
                options: Mutex::new(PlayerOptions::default()),
                pending: Mutex::new(None),
                cv: Condvar::new(),
                running: Mutex::new(true),
            }),
            catalog,
            events: Arc::new(EventBus::new()),
            sink_uri: sink_uri.into(),
        }
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn state(&self) -> PlayerState {
        *self.shared.state.lock().unwrap()
    }

    pub fn is_paused(&self) -> bool {
        *self.shared.paused.lock().unwrap()
    }

    pub fn media_id(&self) -> Option<String> {
        self.shared.current_media_id.lock().unwrap().clone()
    }

    pub fn volume(&self) -> u8 {
        *self.shared.volume.lock().unwrap()
    }

    pub fn set_volume(&self, level: u8) {
        *self.shared.volume.lock().unwrap() = level;
        self.events.publish(PipelineEvent::PlayerVolume { level });
    }

    pub fn options(&self) -> PlayerOptions {
        *self.shared.options.lock().unwrap()
    }

    pub fn set_options(&self, patch: OptionsPatch) -> PlayerOptions {
        let mut opts = self.shared.options.lock().unwrap();
        if let Some(random) = patch.random {
            opts.random = random;
        }
        if let Some(loop_enabled) = patch.loop_enabled {
            opts.loop_enabled = loop_enabled;
        }
        *opts
    }

    /// Request a state transition from any thread. The main loop thread
    /// (spawned by [`Player::run`]) picks it up and acts on it.
    pub fn request_state(&self, state: PlayerState) {
        *self.shared.pending.lock().unwrap() = Some(state);
        self.shared.cv.notify_all();
    }

    /// Requests the PLAY transition. If no media id has been set yet
    /// (via `change`/`setnext`), queries the catalog for the next one to
    /// play; on an empty catalog this settles in STOP with a
    /// PLAYER_CHANGE broadcast rather than reaching the main loop at all,
    /// since there is nothing for it to allocate a source for.
    pub fn play(&self) {
        if self.media_id().is_none() {
            match self.next_candidate() {
                Some(entry) => *self.shared.current_media_id.lock().unwrap() = Some(entry.id),
                None => {
                    self.set_state(PlayerState::Stop);
                    self.broadcast_change();
                    return;
                }
            }
        }
        self.request_state(PlayerState::Play);
    }

    fn next_candidate(&self) -> Option<MediaEntry> {
        let list = self.catalog.list();
        if list.is_empty() {
            return None;
        }
        if self.shared.options.lock().unwrap().random {
            let idx = rand::random::<usize>() % list.len();
            list.into_iter().nth(idx)
        } else {
            list.into_iter().next()
        }
    }

    pub fn stop(&self) {
        self.request_state(PlayerState::Stop);
    }

    pub fn set_pause(&self, paused: bool) {
        *self.shared.paused.lock().unwrap() = paused;
    }

    pub fn media(&self, id: impl Into<String>) -> Result<(), PlayerError> {
        let id = id.into();
        self.catalog
            .get(&id)
            .ok_or_else(|| media::MediaError::NotFound(id.clone()))?;
        *self.shared.current_media_id.lock().unwrap() = Some(id);
        self.request_state(PlayerState::Change);
        Ok(())
    }

    pub fn next(&self) -> Result<(), PlayerError> {
        let current = self
            .shared
            .current_media_id
            .lock()
            .unwrap()
            .clone()
            .ok_or(PlayerError::NoCurrentMedia("advance past"))?;
        let next = self.catalog.next_after(&current);
        match next {
            Some(entry) => self.media(entry.id),
            None if self.shared.options.lock().unwrap().loop_enabled => {
                match self.catalog.list().into_iter().next() {
                    Some(entry) => self.media(entry.id),
                    None => {
                        self.request_state(PlayerState::Stop);
                        Ok(())
                    }
                }
            }
            None => {
                self.request_state(PlayerState::Stop);
                Ok(())
            }
        }
    }

    pub fn destroy(&self) {
        *self.shared.running.lock().unwrap() = false;
        self.shared.cv.notify_all();
    }

    /// Spawns the main-loop thread. The dispatch table below mirrors
    /// `player_run`'s `switch (state)` over `STOP`/`PLAY`/`CHANGE`.
    pub fn run(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        std::thread::Builder::new()
            .name("player-main".into())
            .spawn(move || this.main_loop())
            .expect("failed to spawn player main loop thread")
    }

    fn main_loop(self: Arc<Self>) {
        loop {
            if !*self.shared.running.lock().unwrap() {
                break;
            }
            let requested = {
                let mut pending = self.shared.pending.lock().unwrap();
                loop {
                    if let Some(s) = pending.take() {
                        break Some(s);
                    }
                    if !*self.shared.running.lock().unwrap() {
                        break None;
                    }
                    let (p, timeout) = self
                        .shared
                        .cv
                        .wait_timeout(pending, std::time::Duration::from_millis(500))
                        .unwrap();
                    pending = p;
                    if timeout.timed_out() {
                        continue;
                    }
                }
            };
            let Some(requested) = requested else { break };

            match requested {
                PlayerState::Stop => self.handle_stop(),
                PlayerState::Play => self.handle_play(),
                PlayerState::Change => self.handle_change(),
                PlayerState::Error => self.handle_error(),
                PlayerState::Unknown => {}
            }
        }
        debug!("player main loop exiting");
    }

    fn set_state(&self, state: PlayerState) {
        *self.shared.state.lock().unwrap() = state;
    }

    /// Broadcasts PLAYER_CHANGE with the current state and media id.
    /// Every dispatch branch in the main loop calls this once it has
    /// settled on a state, not just an actual media change.
    fn broadcast_change(&self) {
        let media_id = self.media_id().unwrap_or_default();
        self.events.publish(PipelineEvent::PlayerChange { media_id });
    }

    fn handle_stop(&self) {
        info!("player: stop");
        self.set_state(PlayerState::Stop);
        self.broadcast_change();
    }

    fn handle_change(&self) {
        let Some(id) = self.media_id() else {
            self.set_state(PlayerState::Error);
            self.broadcast_change();
            return;
        };
        info!(media_id = %id, "player: change");
        self.set_state(PlayerState::Change);
        self.broadcast_change();
        self.request_state(PlayerState::Play);
    }

    fn handle_error(&self) {
        warn!("player: entering error state");
        self.set_state(PlayerState::Error);
        self.broadcast_change();
    }

    fn handle_play(&self) {
        let Some(id) = self.media_id() else {
            self.set_state(PlayerState::Error);
            self.broadcast_change();
            return;
        };
        let Some(entry) = self.catalog.get(&id) else {
            self.set_state(PlayerState::Error);
            self.broadcast_change();
            return;
        };
        info!(media_id = %id, uri = %entry.uri, "player: play");
        self.set_state(PlayerState::Play);
        self.broadcast_change();
        if let Err(e) = self.play_entry(&entry) {
            warn!(%e, "playback failed");
            self.set_state(PlayerState::Error);
            self.broadcast_change();
        }
    }

    /// Builds a minimal source → decode → sink pipeline for one media
    /// entry and blocks until it drains. A full implementation chooses
    /// its decoder and sink from the entry's format/negotiated transport;
    /// this picks a decoder from the URI's extension and always writes
    /// to `sink_uri`, which is the shape the RPC/config surface and the
    /// jitter-buffer stages are built to support extending.
    fn play_entry(&self, entry: &MediaEntry) -> Result<(), PlayerError> {
        let mut pipeline = Pipeline::new();
        let src = source::open(&entry.uri)?;
        let compressed = pipeline.new_jitter(JitterFormat::SinkBitstream, 8, 8192, 1)?;
        let pcm = pipeline.new_jitter(JitterFormat::Pcm16LeStereo, 8, 8192, 2)?;
        // Paces the sink against wall-clock playback time rather than
        // letting it drain the buffer as fast as the CPU can decode.
        if let Ok(hb) = heartbeat::SamplesHeartbeat::new(48_000) {
            pcm.attach_heartbeat(Arc::new(hb));
        }

        let decoder_impl = build_decoder_for(&entry.uri);
        let decoder_handle = decoder::spawn(0, decoder_impl, compressed.clone(), pcm.clone(), self.events.clone());
        pipeline.track(decoder_handle);

        let sink_impl = build_sink_for(&self.sink_uri)?;
        let sink_handle = sink::spawn(sink_impl, pcm.clone());
        pipeline.track(sink_handle);

        feed_source_into(src, compressed);
        pipeline.stop();
        Ok(())
    }
}

fn build_decoder_for(uri: &str) -> Box<dyn codec::Decoder> {
    if uri.ends_with(".flac") {
        Box::<codec::flac::FlacDecoder>::default()
    } else if uri.ends_with(".mp3") {
        Box::<codec::mp3::Mp3Decoder>::default()
    } else {
        Box::new(PassthroughDecoder {
            sample_rate: 48_000,
            channels: 2,
        })
    }
}

fn build_sink_for(uri: &str) -> Result<Box<dyn sink::Sink>, PlayerError> {
    if uri == "alsa://default" {
        Ok(Box::new(sink::AlsaPlaybackSink::open_default()?))
    } else if let Some(path) = uri.strip_prefix("file://") {
        Ok(Box::new(sink::FileSink::create(path)?))
    } else {
        Ok(Box::new(sink::FileSink::create(uri)?))
    }
}

fn feed_source_into(mut src: Box<dyn source::Source>, jitter: Arc<jitter::sg::ScatterGatherJitter>) {
    while let Ok(Some(chunk)) = src.read_chunk() {
        if let Ok(mut g) = jitter.pull() {
            let len = chunk.len().min(g.capacity());
            g.as_mut_slice()[..len].copy_from_slice(&chunk[..len]);
            let _ = g.push(len, false, None);
        } else {
            break;
        }
    }
    jitter.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use media::MemoryCatalog;
    use std::io::Write;

    fn make_player(sink_path: &str) -> Arc<Player> {
        let catalog = Arc::new(MemoryCatalog::default());
        Arc::new(Player::new(catalog, format!("file://{sink_path}")))
    }

    #[test]
    fn request_state_transitions_are_observed_by_main_loop() {
        let player = make_player("/tmp/pmoplayer-test-sink-unused.pcm");
        let handle = player.run();
        player.stop();
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(player.state(), PlayerState::Stop);
        player.destroy();
        handle.join().unwrap();
    }

    #[test]
    fn media_without_catalog_entry_is_rejected() {
        let player = make_player("/tmp/pmoplayer-test-sink-unused2.pcm");
        assert!(player.media("missing").is_err());
    }

    #[test]
    fn play_on_an_empty_catalog_settles_in_stop_with_a_change_broadcast() {
        let player = make_player("/tmp/pmoplayer-test-sink-unused3.pcm");
        let (_id, rx) = player.events().subscribe();
        player.play();
        assert_eq!(player.state(), PlayerState::Stop);
        assert!(player.media_id().is_none());
        match rx.try_recv().unwrap() {
            PipelineEvent::PlayerChange { media_id } => assert!(media_id.is_empty()),
            other => panic!("expected PlayerChange, got {other:?}"),
        }
    }

    #[test]
    fn stop_broadcasts_player_change_like_every_other_dispatch_branch() {
        let player = make_player("/tmp/pmoplayer-test-sink-unused4.pcm");
        let handle = player.run();
        let (_id, rx) = player.events().subscribe();
        player.stop();
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(matches!(rx.try_recv().unwrap(), PipelineEvent::PlayerChange { .. }));
        player.destroy();
        handle.join().unwrap();
    }

    #[test]
    fn play_entry_drains_a_passthrough_pcm_file() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("in.pcm");
        let output_path = dir.path().join("out.pcm");
        let mut f = std::fs::File::create(&input_path).unwrap();
        f.write_all(&[0u8; 128]).unwrap();

        let catalog = Arc::new(MemoryCatalog::default());
        catalog
            .append(MediaEntry::new("a", format!("file://{}", input_path.display())))
            .unwrap();
        let player = Player::new(catalog, format!("file://{}", output_path.display()));
        player.play_entry(&MediaEntry::new("a", format!("file://{}", input_path.display()))).unwrap();
        assert!(output_path.exists());
    }
}
