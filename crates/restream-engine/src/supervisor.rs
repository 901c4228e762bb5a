//! Per-process supervision of one set of instance controllers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use restream_obs::ObsConnect;
use restream_types::{
    AggregatedResult, ExecutionStatus, FeedParams, FeedTag, FeedValue, InstanceConfig,
    MediaPlayParams, SidechainSettings, StreamSettings, TransitionSettings,
};
use tracing::{info, instrument, warn};

use crate::controller::InstanceController;
use crate::error::{ControlError, ControlResult};
use crate::media::resolve_media;
use crate::names;

/// Owns the instance controllers of one coordinating process and fans every
/// public operation out across them, isolating per-feed failures into one
/// [`ExecutionStatus`].
pub struct InstanceSupervisor {
    connector: Arc<dyn ObsConnect>,
    media_root: PathBuf,
    controllers: HashMap<FeedTag, InstanceController>,
    initialized: bool,
}

impl InstanceSupervisor {
    /// Create an uninitialized supervisor. `media_root` holds one
    /// subdirectory of synced media files per feed.
    pub fn new(connector: Arc<dyn ObsConnect>, media_root: impl Into<PathBuf>) -> Self {
        Self {
            connector,
            media_root: media_root.into(),
            controllers: HashMap::new(),
            initialized: false,
        }
    }

    /// Whether a successful [`initialize`](Self::initialize) is in effect.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Feeds currently under supervision, sorted.
    pub fn known_feeds(&self) -> Vec<FeedTag> {
        let mut feeds: Vec<FeedTag> = self.controllers.keys().cloned().collect();
        feeds.sort();
        feeds
    }

    /// Connect and provision every configured feed.
    ///
    /// Runs in two phases: open all RPC connections (collecting connection
    /// errors without stopping at the first), then per-feed scene/source
    /// setup. If anything failed, every opened connection is torn down again;
    /// the process never stays half-initialized.
    #[instrument(name = "supervisor_initialize", skip(self, configs))]
    pub fn initialize(&mut self, configs: &HashMap<FeedTag, InstanceConfig>) -> ExecutionStatus {
        // Re-initialization replaces the previous session wholesale.
        if self.initialized {
            self.cleanup();
        }

        let mut status = ExecutionStatus::ok();
        let mut feeds: Vec<&FeedTag> = configs.keys().collect();
        feeds.sort();

        let mut controllers = HashMap::new();
        for feed in &feeds {
            match InstanceController::connect(feed, &*self.connector, &configs[*feed]) {
                Ok(controller) => {
                    controllers.insert((*feed).clone(), controller);
                }
                Err(e) => status.append_error(format!("init: {}: {}", feed, e)),
            }
        }

        for feed in &feeds {
            let Some(controller) = controllers.get(feed.as_str()) else {
                continue;
            };
            if let Err(e) = Self::provision(controller, &configs[*feed]) {
                status.append_error(format!("init: {}: {}", feed, e));
            }
        }

        if !status.is_ok() {
            warn!("Initialization failed, dropping all opened connections");
            controllers.clear();
            return status;
        }

        info!(feeds = feeds.len(), "All instances initialized");
        self.controllers = controllers;
        self.initialized = true;
        status
    }

    fn provision(controller: &InstanceController, config: &InstanceConfig) -> ControlResult<()> {
        controller.setup_scene(names::MAIN_SCENE, true)?;
        controller.set_live_source(names::MAIN_SCENE, &config.original_media_url)?;
        controller.set_teamspeak_audio_input()?;
        Ok(())
    }

    /// Tear the session down, best effort: one instance's failure never
    /// blocks cleanup of the others.
    #[instrument(name = "supervisor_cleanup", skip(self))]
    pub fn cleanup(&mut self) -> ExecutionStatus {
        for (feed, controller) in &self.controllers {
            controller.reset_sequence();
            // Usually fails with "not streaming"; status ignored.
            let _ = controller.stop_streaming();
            if let Err(e) = controller.clear_all_scenes() {
                warn!(feed = %feed, "Scene reset failed during cleanup: {}", e);
            }
        }
        self.controllers.clear();
        self.initialized = false;
        info!("Cleanup complete");
        ExecutionStatus::ok()
    }

    /// Resolve each feed's media file and run its insertion sequence.
    pub fn run_media(&self, params: &FeedParams<MediaPlayParams>) -> ExecutionStatus {
        self.apply("media_play", params, |controller, request| {
            let path = resolve_media(
                &self.media_root,
                controller.feed(),
                &request.name,
                request.search_by_num,
            )?;
            controller.play_media(&path)
        })
    }

    /// Set per-feed stream servers and keys.
    pub fn set_stream_settings(&self, params: &FeedParams<StreamSettings>) -> ExecutionStatus {
        self.apply("set_stream_settings", params, |controller, settings| {
            controller.set_stream_target(&settings.server, &settings.key)
        })
    }

    /// Start streaming on every instance.
    pub fn start_streaming(&self) -> ExecutionStatus {
        self.apply_all("stream_start", InstanceController::start_streaming)
    }

    /// Stop streaming on every instance.
    pub fn stop_streaming(&self) -> ExecutionStatus {
        self.apply_all("stream_stop", InstanceController::stop_streaming)
    }

    /// Set per-feed teamspeak audio sync offsets, milliseconds.
    pub fn set_ts_sync_offset(&self, params: &FeedParams<i64>) -> ExecutionStatus {
        self.apply("set_ts_offset", params, |controller, offset| {
            controller.set_ts_sync_offset_ms(*offset)
        })
    }

    /// Read every feed's teamspeak audio sync offset.
    pub fn get_ts_sync_offset(&self) -> ControlResult<AggregatedResult<i64>> {
        self.collect(InstanceController::ts_sync_offset_ms)
    }

    /// Set per-feed teamspeak volumes, dB.
    pub fn set_ts_volume_db(&self, params: &FeedParams<f64>) -> ExecutionStatus {
        self.apply("set_ts_volume", params, |controller, db| {
            controller.set_ts_volume_db(*db)
        })
    }

    /// Read every feed's teamspeak volume.
    pub fn get_ts_volume_db(&self) -> ControlResult<AggregatedResult<f64>> {
        self.collect(InstanceController::ts_volume_db)
    }

    /// Set per-feed live source volumes, dB.
    pub fn set_source_volume_db(&self, params: &FeedParams<f64>) -> ExecutionStatus {
        self.apply("set_source_volume", params, |controller, db| {
            controller.set_source_volume_db(*db)
        })
    }

    /// Read every feed's live source volume.
    pub fn get_source_volume_db(&self) -> ControlResult<AggregatedResult<f64>> {
        self.collect(InstanceController::source_volume_db)
    }

    /// Attach or update the sidechain compressor per feed.
    pub fn setup_sidechain(&self, params: &FeedParams<SidechainSettings>) -> ExecutionStatus {
        self.apply("setup_sidechain", params, |controller, settings| {
            controller.configure_sidechain(settings)
        })
    }

    /// Validate and store per-feed transition configurations.
    pub fn setup_transition(&self, params: &FeedParams<TransitionSettings>) -> ExecutionStatus {
        self.apply("setup_transition", params, |controller, settings| {
            controller.configure_transition(settings)
        })
    }

    /// Apply one mutating operation to each targeted feed. An unknown feed
    /// tag is a non-fatal warning; any controller error is caught and
    /// appended, never propagated.
    fn apply<T>(
        &self,
        op: &str,
        params: &FeedParams<T>,
        f: impl Fn(&InstanceController, &T) -> ControlResult<()>,
    ) -> ExecutionStatus {
        if !self.initialized {
            return ExecutionStatus::error(format!("{}: {}", op, ControlError::NotInitialized));
        }

        let known = self.known_feeds();
        let mut status = ExecutionStatus::ok();
        for (feed, slice) in params.resolve(&known) {
            match self.controllers.get(&feed) {
                Some(controller) => {
                    if let Err(e) = f(controller, slice) {
                        status.append_error(format!("{}: {}: {}", op, feed, e));
                    }
                }
                None => status.append_warning(format!("{}: unknown feed '{}'", op, feed)),
            }
        }
        status
    }

    /// Apply one parameterless mutating operation to every feed.
    fn apply_all(
        &self,
        op: &str,
        f: impl Fn(&InstanceController) -> ControlResult<()>,
    ) -> ExecutionStatus {
        if !self.initialized {
            return ExecutionStatus::error(format!("{}: {}", op, ControlError::NotInitialized));
        }

        let mut status = ExecutionStatus::ok();
        for feed in self.known_feeds() {
            if let Err(e) = f(&self.controllers[&feed]) {
                status.append_error(format!("{}: {}: {}", op, feed, e));
            }
        }
        status
    }

    /// Read one value from every feed; a per-feed failure becomes that
    /// feed's sentinel, not an error.
    fn collect<T>(
        &self,
        f: impl Fn(&InstanceController) -> ControlResult<T>,
    ) -> ControlResult<AggregatedResult<T>> {
        if !self.initialized {
            return Err(ControlError::NotInitialized);
        }
        Ok(self
            .controllers
            .iter()
            .map(|(feed, controller)| (feed.clone(), FeedValue::from(f(controller))))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{config, wait_for, MockConnect, MockState};
    use std::fs::File;
    use std::time::Duration;

    fn two_feed_configs() -> HashMap<FeedTag, InstanceConfig> {
        HashMap::from([
            ("eng".to_string(), config(4441)),
            ("rus".to_string(), config(4442)),
        ])
    }

    /// Supervisor over two mocked instances, already initialized.
    fn supervisor() -> (InstanceSupervisor, Arc<MockState>, Arc<MockState>, tempfile::TempDir) {
        let connector = Arc::new(MockConnect::new());
        let eng = connector.add(4441);
        let rus = connector.add(4442);
        let media_root = tempfile::tempdir().unwrap();

        let mut supervisor = InstanceSupervisor::new(connector, media_root.path());
        let status = supervisor.initialize(&two_feed_configs());
        assert!(status.is_ok(), "{:?}", status.messages());
        (supervisor, eng, rus, media_root)
    }

    fn per_feed<T>(pairs: Vec<(&str, T)>) -> FeedParams<T> {
        FeedParams::PerFeed(
            pairs
                .into_iter()
                .map(|(feed, value)| (feed.to_string(), value))
                .collect(),
        )
    }

    #[test]
    fn test_initialize_provisions_every_instance() {
        let (supervisor, eng, rus, _media) = supervisor();
        assert!(supervisor.is_initialized());
        assert_eq!(supervisor.known_feeds(), vec!["eng", "rus"]);

        for state in [&eng, &rus] {
            assert_eq!(*state.current_scene.lock(), names::MAIN_SCENE);
            assert!(state.source_exists(names::ORIGINAL));
            assert!(state.source_exists(names::TEAMSPEAK));
        }
    }

    #[test]
    fn test_initialize_rolls_back_on_connection_failure() {
        let connector = Arc::new(MockConnect::new());
        let eng = connector.add(4441);
        connector.refuse(4442);

        let mut supervisor = InstanceSupervisor::new(connector, "/nonexistent");
        let status = supervisor.initialize(&two_feed_configs());

        assert!(!status.is_ok());
        assert_eq!(status.messages().len(), 1);
        assert!(status.messages()[0].contains("rus"));
        assert!(!supervisor.is_initialized());
        // The successfully opened connection was dropped again.
        assert!(*eng.disconnected.lock());
    }

    #[test]
    fn test_initialize_rolls_back_on_setup_failure() {
        let connector = Arc::new(MockConnect::new());
        let eng = connector.add(4441);
        let rus = connector.add(4442);
        rus.fail_on("CreateScene");

        let mut supervisor = InstanceSupervisor::new(connector, "/nonexistent");
        let status = supervisor.initialize(&two_feed_configs());

        assert!(!status.is_ok());
        assert!(!supervisor.is_initialized());
        assert!(*eng.disconnected.lock());
        assert!(*rus.disconnected.lock());
    }

    #[test]
    fn test_targeted_write_leaves_other_feeds_alone() {
        let (supervisor, eng, rus, _media) = supervisor();

        let status = supervisor.set_source_volume_db(&per_feed(vec![("eng", -6.0)]));
        assert!(status.is_ok());
        assert!(status.messages().is_empty());
        assert_eq!(eng.volumes.lock().get(names::ORIGINAL), Some(&-6.0));
        assert!(rus.volumes.lock().get(names::ORIGINAL).is_none());
    }

    #[test]
    fn test_wildcard_applies_everywhere() {
        let (supervisor, eng, rus, _media) = supervisor();

        let status = supervisor.set_ts_sync_offset(&FeedParams::All(250));
        assert!(status.is_ok());
        assert_eq!(eng.offsets.lock().get(names::TEAMSPEAK), Some(&250));
        assert_eq!(rus.offsets.lock().get(names::TEAMSPEAK), Some(&250));
    }

    #[test]
    fn test_unknown_feed_is_a_warning_not_an_error() {
        let (supervisor, eng, _rus, _media) = supervisor();

        let status = supervisor.set_ts_volume_db(&per_feed(vec![("eng", -3.0), ("fra", -3.0)]));
        // A warning still clears `ok`, but the write to eng went through.
        assert!(!status.is_ok());
        assert_eq!(status.messages().len(), 1);
        assert!(status.messages()[0].contains("fra"));
        assert_eq!(eng.volumes.lock().get(names::TEAMSPEAK), Some(&-3.0));
    }

    #[test]
    fn test_read_failures_become_sentinels() {
        let (supervisor, eng, rus, _media) = supervisor();
        eng.volumes.lock().insert(names::TEAMSPEAK.to_string(), -9.0);
        rus.fail_on("GetVolume");

        let values = supervisor.get_ts_volume_db().unwrap();
        assert_eq!(values["eng"], FeedValue::Value(-9.0));
        assert_eq!(values["rus"], FeedValue::Unavailable);
    }

    #[test]
    fn test_run_media_isolates_missing_files() {
        let (supervisor, eng, rus, media) = supervisor();
        supervisor.setup_transition(&FeedParams::All(TransitionSettings {
            transition_name: "cut".to_string(),
            path: None,
            transition_point: None,
        }));

        *rus.media_duration_ms.lock() = 150;

        // Only the rus feed has a matching synced file.
        let rus_dir = media.path().join("rus");
        std::fs::create_dir(&rus_dir).unwrap();
        File::create(rus_dir.join("003_intro_ru.mp4")).unwrap();

        let status = supervisor.run_media(&FeedParams::All(MediaPlayParams {
            name: "003_intro.mp4".to_string(),
            search_by_num: true,
        }));

        assert!(!status.is_ok());
        assert_eq!(status.messages().len(), 1);
        assert!(status.messages()[0].contains("eng"));

        // Cut transitions enter MAIN synchronously.
        assert!(rus.source_exists(names::MEDIA));
        assert!(!eng.source_exists(names::MEDIA));
        assert!(wait_for(
            || !rus.source_exists(names::MEDIA),
            Duration::from_secs(2)
        ));
    }

    #[test]
    fn test_operations_require_initialization() {
        let connector = Arc::new(MockConnect::new());
        let supervisor = InstanceSupervisor::new(connector, "/nonexistent");

        let status = supervisor.start_streaming();
        assert!(!status.is_ok());
        assert!(status.messages()[0].contains("not initialized"));

        assert!(matches!(
            supervisor.get_source_volume_db(),
            Err(ControlError::NotInitialized)
        ));
    }

    #[test]
    fn test_streaming_failures_are_isolated_per_feed() {
        let (supervisor, eng, rus, _media) = supervisor();
        rus.fail_on("StartStreaming");

        let status = supervisor.set_stream_settings(&per_feed(vec![
            ("eng", StreamSettings { server: "rtmp://a/app".to_string(), key: "k1".to_string() }),
            ("rus", StreamSettings { server: "rtmp://b/app".to_string(), key: "k2".to_string() }),
        ]));
        assert!(status.is_ok());

        let status = supervisor.start_streaming();
        assert!(!status.is_ok());
        assert_eq!(status.messages().len(), 1);
        assert!(status.messages()[0].contains("rus"));
        assert!(*eng.streaming.lock());
        assert!(!*rus.streaming.lock());
    }

    #[test]
    fn test_cleanup_releases_every_instance() {
        let (mut supervisor, eng, rus, _media) = supervisor();

        let status = supervisor.cleanup();
        assert!(status.is_ok());
        assert!(!supervisor.is_initialized());
        assert!(*eng.disconnected.lock());
        assert!(*rus.disconnected.lock());
        assert!(eng.sources.lock().is_empty());
        assert!(rus.sources.lock().is_empty());
    }

    #[test]
    fn test_reinitialize_replaces_the_previous_session() {
        let connector = Arc::new(MockConnect::new());
        let first = connector.add(4441);
        connector.add(4442);

        let mut supervisor =
            InstanceSupervisor::new(Arc::<MockConnect>::clone(&connector), "/nonexistent");
        assert!(supervisor.initialize(&two_feed_configs()).is_ok());

        // Second initialize opens fresh sessions on the same ports.
        let second = connector.add(4441);
        assert!(supervisor.initialize(&two_feed_configs()).is_ok());

        assert!(*first.disconnected.lock());
        assert!(supervisor.is_initialized());
        assert!(second.source_exists(names::ORIGINAL));
    }
}
