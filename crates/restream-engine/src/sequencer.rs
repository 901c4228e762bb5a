//! Timer-driven media insertion over a continuously running live source.
//!
//! The sequence overlays a pre-roll stinger, the requested media and a
//! post-roll stinger on top of the `original` live source, muting and
//! un-muting the audio inputs at precise offsets. The live source itself is
//! never stopped; whatever happens, the sequence must not leave it muted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use restream_obs::{CreateSource, ObsRpc};
use restream_types::{FeedTag, TransitionSettings};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{ControlError, ControlResult};
use crate::names;
use crate::scheduler::Scheduler;

/// Default stinger transition point, milliseconds into the clip.
pub const DEFAULT_TRANSITION_POINT_MS: u64 = 3000;

/// In-memory transition configuration. Never touches the remote tool.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionConfig {
    /// Instant swap, no bridging clip.
    Cut,

    /// A short clip bridges into and out of the inserted media.
    Stinger {
        /// Path of the stinger clip on the instance host.
        clip_path: String,

        /// Milliseconds into the clip at which the content swap fires.
        transition_point_ms: u64,
    },
}

impl TransitionConfig {
    /// Validate wire settings and fill defaults.
    pub fn from_settings(settings: &TransitionSettings) -> ControlResult<Self> {
        match settings.transition_name.as_str() {
            "cut" => Ok(Self::Cut),
            "stinger" => {
                let clip_path = settings.path.clone().ok_or_else(|| {
                    ControlError::Validation(
                        "stinger transition requires a clip `path`".to_string(),
                    )
                })?;
                Ok(Self::Stinger {
                    clip_path,
                    transition_point_ms: settings
                        .transition_point
                        .unwrap_or(DEFAULT_TRANSITION_POINT_MS),
                })
            }
            other => Err(ControlError::Validation(format!(
                "unknown transition style '{}'",
                other
            ))),
        }
    }
}

/// Sequence phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PreRoll,
    Main,
    PostRoll,
}

pub(crate) struct SequenceState {
    pub phase: Phase,
    pub transition: TransitionConfig,
    /// Both audio inputs are currently muted by an in-flight sequence.
    pub muted: bool,
    /// Scene the current `media` source was placed in, while it is tracked.
    pub tracked_media_scene: Option<String>,
    /// Bumped by preemption and rollback. A step that was already pulled off
    /// the scheduler (or is blocked inside an RPC call) when a new sequence
    /// started sees the mismatch and stands down.
    pub epoch: u64,
}

/// One controller's sequencer: the scheduler plus the sequence state.
pub(crate) struct Sequencer {
    feed: FeedTag,
    rpc: Arc<dyn ObsRpc>,
    scheduler: Scheduler,
    state: Mutex<SequenceState>,
}

impl Sequencer {
    pub fn new(feed: FeedTag, rpc: Arc<dyn ObsRpc>) -> Self {
        Self {
            feed,
            rpc,
            scheduler: Scheduler::start(),
            state: Mutex::new(SequenceState {
                phase: Phase::Idle,
                transition: TransitionConfig::Cut,
                muted: false,
                tracked_media_scene: None,
                epoch: 0,
            }),
        }
    }

    pub fn rpc(&self) -> &Arc<dyn ObsRpc> {
        &self.rpc
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn set_transition(&self, transition: TransitionConfig) {
        self.state.lock().transition = transition;
    }

    /// Start a new insertion sequence, preempting any sequence in flight.
    pub fn play(this: &Arc<Self>, path: &Path) -> ControlResult<()> {
        info!(feed = %this.feed, path = %path.display(), "Starting media sequence");
        let epoch = this.preempt();

        let result = Self::begin_pre_roll(this, path.to_path_buf(), epoch);
        if result.is_err() {
            this.abort(epoch);
        }
        result
    }

    /// Cancel everything an in-flight sequence scheduled or created and open
    /// a new epoch. `clean()` only covers actions still in the pending list;
    /// a step the scheduler already pulled out (or that is blocked inside an
    /// RPC call) is cancelled by the epoch bump instead: it re-checks the
    /// epoch and stands down rather than touching the new sequence.
    fn preempt(&self) -> u64 {
        let epoch = {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.tracked_media_scene = None;
            state.epoch
        };
        self.scheduler.clean();
        let _ = self.rpc.delete_source(names::MEDIA);
        let _ = self.rpc.delete_source(names::TRANSITION);
        epoch
    }

    /// Whether `epoch` is still the live sequence.
    fn still_current(&self, epoch: u64) -> bool {
        self.state.lock().epoch == epoch
    }

    fn begin_pre_roll(this: &Arc<Self>, path: PathBuf, epoch: u64) -> ControlResult<()> {
        let transition = this.state.lock().transition.clone();
        this.set_phase(Phase::PreRoll);

        match transition {
            TransitionConfig::Stinger {
                ref clip_path,
                transition_point_ms,
            } => {
                this.create_media_source(names::TRANSITION, clip_path)?;
                this.rpc.restart_media(names::TRANSITION)?;
                this.mute_inputs()?;

                let sequencer = Arc::clone(this);
                this.scheduler.schedule(
                    Duration::from_millis(transition_point_ms),
                    Box::new(move || {
                        Self::step(&sequencer, epoch, |s| Self::enter_main(s, &path, epoch))
                    }),
                );
                Ok(())
            }
            TransitionConfig::Cut => {
                this.mute_inputs()?;
                Self::enter_main(this, &path, epoch)
            }
        }
    }

    fn enter_main(this: &Arc<Self>, path: &Path, epoch: u64) -> ControlResult<()> {
        let transition = this.state.lock().transition.clone();
        if matches!(transition, TransitionConfig::Stinger { .. }) {
            this.rpc.delete_source(names::TRANSITION)?;
        }

        this.create_media_source(names::MEDIA, &path.to_string_lossy())?;
        // Re-assert: the sidecar stays silent for the whole insertion.
        this.rpc.set_mute(names::TEAMSPEAK, true)?;
        let duration_ms = this.rpc.media_duration_ms(names::MEDIA)?;

        // The calls above block; a preemption may have landed meanwhile.
        if !this.still_current(epoch) {
            return Ok(());
        }
        this.state.lock().tracked_media_scene = Some(names::MAIN_SCENE.to_string());
        this.set_phase(Phase::Main);
        debug!(feed = %this.feed, duration_ms, "Media playing");

        let sequencer = Arc::clone(this);
        this.scheduler.schedule(
            Duration::from_millis(duration_ms),
            Box::new(move || Self::step(&sequencer, epoch, |s| Self::enter_post_roll(s, epoch))),
        );
        Ok(())
    }

    fn enter_post_roll(this: &Arc<Self>, epoch: u64) -> ControlResult<()> {
        this.rpc.delete_source(names::MEDIA)?;
        if !this.still_current(epoch) {
            return Ok(());
        }
        this.state.lock().tracked_media_scene = None;
        this.set_phase(Phase::PostRoll);

        let transition = this.state.lock().transition.clone();
        match transition {
            TransitionConfig::Stinger {
                ref clip_path,
                transition_point_ms,
            } => {
                this.create_media_source(names::TRANSITION, clip_path)?;
                this.rpc.restart_media(names::TRANSITION)?;

                let sequencer = Arc::clone(this);
                this.scheduler.schedule(
                    Duration::from_millis(transition_point_ms),
                    Box::new(move || Self::step(&sequencer, epoch, |s| Self::enter_idle(s, epoch))),
                );
                Ok(())
            }
            TransitionConfig::Cut => Self::enter_idle(this, epoch),
        }
    }

    fn enter_idle(this: &Arc<Self>, epoch: u64) -> ControlResult<()> {
        let _ = this.rpc.delete_source(names::TRANSITION);
        if !this.still_current(epoch) {
            return Ok(());
        }
        this.unmute_inputs()?;
        this.scheduler.clean();
        this.set_phase(Phase::Idle);
        info!(feed = %this.feed, "Media sequence finished");
        Ok(())
    }

    /// Run one scheduled step of the sequence `epoch` belongs to. A stale
    /// step is skipped; a failing current step rolls the sequence back.
    fn step(
        this: &Arc<Self>,
        epoch: u64,
        f: impl FnOnce(&Arc<Self>) -> ControlResult<()>,
    ) -> ControlResult<()> {
        if !this.still_current(epoch) {
            debug!(feed = %this.feed, "Skipping step of a superseded sequence");
            return Ok(());
        }
        let result = f(this);
        if result.is_err() {
            this.abort(epoch);
        }
        result
    }

    /// Roll back, unless a newer sequence has already taken over; a stale
    /// step's failure must not tear down its successor.
    fn abort(&self, epoch: u64) {
        if !self.still_current(epoch) {
            return;
        }
        self.rollback();
    }

    /// Unconditional rollback, for teardown paths outside any sequence.
    pub fn reset(&self) {
        self.rollback();
    }

    /// Failure rollback: remove whatever this attempt created and force both
    /// inputs back to unmuted. The live feed must never stay muted because an
    /// insertion went wrong.
    fn rollback(&self) {
        warn!(feed = %self.feed, "Aborting media sequence");
        {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.muted = false;
            state.phase = Phase::Idle;
            state.tracked_media_scene = None;
        }
        self.scheduler.clean();
        let _ = self.rpc.delete_source(names::MEDIA);
        let _ = self.rpc.delete_source(names::TRANSITION);
        let _ = self.rpc.set_mute(names::ORIGINAL, false);
        let _ = self.rpc.set_mute(names::TEAMSPEAK, false);
    }

    /// Safety net for out-of-band "media finished" notifications. Acts only
    /// when the source is still tracked and the active scene, queried at fire
    /// time, matches the one the media was placed in.
    pub fn handle_media_ended(&self, source: &str) {
        if source != names::MEDIA {
            return;
        }
        let expected = match self.state.lock().tracked_media_scene.clone() {
            Some(scene) => scene,
            None => return,
        };
        match self.rpc.current_scene() {
            Ok(current) if current == expected => {
                debug!(feed = %self.feed, %source, "Media ended out-of-band, switching back");
                let _ = self.rpc.set_current_scene(names::MAIN_SCENE);
            }
            Ok(_) => {}
            Err(e) => warn!(feed = %self.feed, "Scene query failed: {}", e),
        }
    }

    fn mute_inputs(&self) -> ControlResult<()> {
        // Live source first, to keep its floor noise out of the gap.
        self.rpc.set_mute(names::ORIGINAL, true)?;
        self.rpc.set_mute(names::TEAMSPEAK, true)?;
        self.state.lock().muted = true;
        Ok(())
    }

    fn unmute_inputs(&self) -> ControlResult<()> {
        self.rpc.set_mute(names::ORIGINAL, false)?;
        self.rpc.set_mute(names::TEAMSPEAK, false)?;
        self.state.lock().muted = false;
        Ok(())
    }

    /// Recreate a reserved media source, dropping any stale holder of the
    /// name first.
    fn create_media_source(&self, name: &str, file: &str) -> ControlResult<()> {
        let _ = self.rpc.delete_source(name);
        self.rpc.create_source(&CreateSource {
            name: name.to_string(),
            kind: "ffmpeg_source".to_string(),
            scene: names::MAIN_SCENE.to_string(),
            settings: json!({
                "local_file": file,
                "is_local_file": true,
            }),
        })?;
        Ok(())
    }

    fn set_phase(&self, phase: Phase) {
        let previous = {
            let mut state = self.state.lock();
            let prev = state.phase;
            state.phase = phase;
            prev
        };
        debug!(feed = %self.feed, ?previous, current = ?phase, "Sequence phase");
    }
}
