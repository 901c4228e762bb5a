//! One connection to one remote production instance.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use restream_obs::{CreateSource, MonitoringMode, ObsConnect, ObsEvent, ObsRpc};
use restream_types::{FeedTag, InstanceConfig, SidechainSettings, TransitionSettings};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::error::{ControlError, ControlResult};
use crate::names;
use crate::sequencer::{Phase, Sequencer, TransitionConfig};

/// Drives one remote production-tool session: scene and source provisioning,
/// audio levels, streaming control, and the media insertion sequencer.
///
/// All RPC calls are blocking. Public methods may be called from the
/// request-handling thread while the sequencer's timer thread runs its own
/// calls; per-controller state is serialized inside the sequencer's lock and
/// nothing is shared across controllers.
pub struct InstanceController {
    feed: FeedTag,
    sequencer: Arc<Sequencer>,
    event_thread: Option<JoinHandle<()>>,
    should_stop: Arc<AtomicBool>,
}

impl InstanceController {
    /// Open the RPC session for one feed and start its event loop.
    #[instrument(name = "instance_connect", skip(connector, config))]
    pub fn connect(
        feed: &str,
        connector: &dyn ObsConnect,
        config: &InstanceConfig,
    ) -> ControlResult<Self> {
        info!(
            host = %config.obs_host,
            port = config.websocket_port,
            "Connecting to production tool"
        );
        let rpc: Arc<dyn ObsRpc> = Arc::from(connector.connect(
            &config.obs_host,
            config.websocket_port,
            config.password.as_deref(),
        )?);

        let events = rpc.events();
        let sequencer = Arc::new(Sequencer::new(feed.to_string(), rpc));
        let should_stop = Arc::new(AtomicBool::new(false));
        let event_thread = spawn_event_loop(
            feed.to_string(),
            Arc::clone(&sequencer),
            events,
            Arc::clone(&should_stop),
        );

        Ok(Self {
            feed: feed.to_string(),
            sequencer,
            event_thread: Some(event_thread),
            should_stop,
        })
    }

    /// Feed tag this controller serves.
    pub fn feed(&self) -> &str {
        &self.feed
    }

    /// Current sequence phase.
    pub fn phase(&self) -> Phase {
        self.sequencer.phase()
    }

    fn rpc(&self) -> &Arc<dyn ObsRpc> {
        self.sequencer.rpc()
    }

    /// Create or replace the always-on `original` live source. Local audio
    /// monitoring stays off; the source's audio goes to the stream mix only.
    pub fn set_live_source(&self, scene: &str, url: &str) -> ControlResult<()> {
        let rpc = self.rpc();
        let _ = rpc.delete_source(names::ORIGINAL);
        rpc.create_source(&CreateSource {
            name: names::ORIGINAL.to_string(),
            kind: "ffmpeg_source".to_string(),
            scene: scene.to_string(),
            settings: json!({
                "input": url,
                "is_local_file": false,
            }),
        })?;
        rpc.set_audio_monitoring(names::ORIGINAL, MonitoringMode::None)?;
        Ok(())
    }

    /// Idempotent scene provisioning: create the scene if absent, otherwise
    /// empty it; optionally make it the active scene.
    pub fn setup_scene(&self, name: &str, switch_active: bool) -> ControlResult<()> {
        let rpc = self.rpc();
        if rpc.list_scenes()?.iter().any(|scene| scene == name) {
            self.clear_scene(name)?;
        } else {
            rpc.create_scene(name)?;
        }
        if switch_active {
            rpc.set_current_scene(name)?;
        }
        Ok(())
    }

    /// Empty every scene known to the tool.
    pub fn clear_all_scenes(&self) -> ControlResult<()> {
        for scene in self.rpc().list_scenes()? {
            self.clear_scene(&scene)?;
        }
        Ok(())
    }

    fn clear_scene(&self, scene: &str) -> ControlResult<()> {
        let rpc = self.rpc();
        for item in rpc.list_scene_items(scene)? {
            rpc.remove_scene_item(scene, &item)?;
        }
        Ok(())
    }

    /// Validate and store the transition configuration. Memory only; nothing
    /// is sent to the tool.
    pub fn configure_transition(&self, settings: &TransitionSettings) -> ControlResult<()> {
        let transition = TransitionConfig::from_settings(settings)?;
        debug!(feed = %self.feed, ?transition, "Transition configured");
        self.sequencer.set_transition(transition);
        Ok(())
    }

    /// (Re)create the reserved teamspeak capture source.
    pub fn set_teamspeak_audio_input(&self) -> ControlResult<()> {
        let rpc = self.rpc();
        let _ = rpc.delete_source(names::TEAMSPEAK);
        rpc.create_source(&CreateSource {
            name: names::TEAMSPEAK.to_string(),
            kind: "audio_input_capture".to_string(),
            scene: names::MAIN_SCENE.to_string(),
            settings: json!({ "device_id": "default" }),
        })?;
        Ok(())
    }

    /// Run the insertion sequence for an already-resolved media file.
    pub fn play_media(&self, path: &Path) -> ControlResult<()> {
        Sequencer::play(&self.sequencer, path)
    }

    /// Teamspeak input audio sync offset, milliseconds.
    pub fn ts_sync_offset_ms(&self) -> ControlResult<i64> {
        Ok(self.rpc().sync_offset_ms(names::TEAMSPEAK)?)
    }

    /// Set the teamspeak input audio sync offset.
    pub fn set_ts_sync_offset_ms(&self, offset_ms: i64) -> ControlResult<()> {
        Ok(self.rpc().set_sync_offset_ms(names::TEAMSPEAK, offset_ms)?)
    }

    /// Teamspeak input volume, dB.
    pub fn ts_volume_db(&self) -> ControlResult<f64> {
        Ok(self.rpc().volume_db(names::TEAMSPEAK)?)
    }

    /// Set the teamspeak input volume.
    pub fn set_ts_volume_db(&self, db: f64) -> ControlResult<()> {
        Ok(self.rpc().set_volume_db(names::TEAMSPEAK, db)?)
    }

    /// Live source volume, dB.
    pub fn source_volume_db(&self) -> ControlResult<f64> {
        Ok(self.rpc().volume_db(names::ORIGINAL)?)
    }

    /// Set the live source volume.
    pub fn set_source_volume_db(&self, db: f64) -> ControlResult<()> {
        Ok(self.rpc().set_volume_db(names::ORIGINAL, db)?)
    }

    /// Add the sidechain compressor to the live source, or update its
    /// settings if it is already attached. Gain reduction is keyed off the
    /// teamspeak input.
    pub fn configure_sidechain(&self, settings: &SidechainSettings) -> ControlResult<()> {
        let rpc = self.rpc();
        let mut payload = serde_json::Map::new();
        payload.insert(
            "sidechain_source".to_string(),
            json!(names::TEAMSPEAK),
        );
        if let Some(ratio) = settings.ratio {
            payload.insert("ratio".to_string(), json!(ratio));
        }
        if let Some(release_time) = settings.release_time {
            payload.insert("release_time".to_string(), json!(release_time));
        }
        if let Some(threshold) = settings.threshold {
            payload.insert("threshold".to_string(), json!(threshold));
        }
        let payload = serde_json::Value::Object(payload);

        let attached = rpc
            .list_filters(names::ORIGINAL)?
            .iter()
            .any(|filter| filter == names::SIDECHAIN_FILTER);
        if attached {
            rpc.set_filter_settings(names::ORIGINAL, names::SIDECHAIN_FILTER, payload)?;
        } else {
            rpc.add_filter(
                names::ORIGINAL,
                names::SIDECHAIN_FILTER,
                "compressor_filter",
                payload,
            )?;
        }
        Ok(())
    }

    /// Set the stream server and key.
    pub fn set_stream_target(&self, server: &str, key: &str) -> ControlResult<()> {
        if server.is_empty() {
            return Err(ControlError::Validation(
                "stream server must not be empty".to_string(),
            ));
        }
        if key.is_empty() {
            return Err(ControlError::Validation(
                "stream key must not be empty".to_string(),
            ));
        }
        Ok(self.rpc().set_stream_settings(server, key)?)
    }

    /// Start streaming.
    pub fn start_streaming(&self) -> ControlResult<()> {
        Ok(self.rpc().start_streaming()?)
    }

    /// Stop streaming.
    pub fn stop_streaming(&self) -> ControlResult<()> {
        Ok(self.rpc().stop_streaming()?)
    }

    /// Abort any in-flight sequence, leaving both inputs unmuted.
    pub fn reset_sequence(&self) {
        if self.sequencer.phase() != Phase::Idle {
            self.sequencer.reset();
        }
    }
}

impl Drop for InstanceController {
    fn drop(&mut self) {
        self.should_stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.event_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Consume out-of-band tool events on a dedicated thread.
fn spawn_event_loop(
    feed: FeedTag,
    sequencer: Arc<Sequencer>,
    events: Receiver<ObsEvent>,
    should_stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        loop {
            if should_stop.load(Ordering::SeqCst) {
                break;
            }
            match events.recv_timeout(Duration::from_millis(100)) {
                Ok(ObsEvent::MediaEnded { source }) => {
                    sequencer.handle_media_ended(&source);
                }
                Ok(ObsEvent::Disconnected) => {
                    warn!(feed = %feed, "Event channel reported disconnect");
                    break;
                }
                Ok(event) => {
                    debug!(feed = %feed, ?event, "Ignoring tool event");
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!(feed = %feed, "Event channel closed");
                    break;
                }
            }
        }
    })
}
