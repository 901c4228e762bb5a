//! Scripted production-tool stub shared by the engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use restream_obs::{
    event_channel, CreateSource, MonitoringMode, ObsConnect, ObsEvent, ObsRpc, RpcError,
    RpcResult, SceneItem,
};
use restream_types::InstanceConfig;
use serde_json::Value;

/// Observable state of one fake production tool. Tests keep the `Arc` and
/// inspect it after driving the controller.
pub struct MockState {
    pub calls: Mutex<Vec<String>>,
    pub scenes: Mutex<Vec<String>>,
    /// source name -> scene it lives in
    pub sources: Mutex<HashMap<String, String>>,
    pub current_scene: Mutex<String>,
    pub muted: Mutex<HashMap<String, bool>>,
    pub volumes: Mutex<HashMap<String, f64>>,
    pub offsets: Mutex<HashMap<String, i64>>,
    pub monitoring: Mutex<HashMap<String, MonitoringMode>>,
    /// source name -> filter names
    pub filters: Mutex<HashMap<String, Vec<String>>>,
    pub streaming: Mutex<bool>,
    pub stream_target: Mutex<Option<(String, String)>>,
    pub media_duration_ms: Mutex<u64>,
    /// Requests to reject, either `"Method"` or `"Method:arg"`.
    pub fail_requests: Mutex<HashSet<String>>,
    /// One-shot gates stalling the next matching request until released.
    gates: Mutex<HashMap<String, Receiver<()>>>,
    /// Set when the session handle is dropped.
    pub disconnected: Mutex<bool>,
    event_tx: Sender<ObsEvent>,
    event_rx: Receiver<ObsEvent>,
}

impl MockState {
    pub fn new() -> Arc<Self> {
        let (event_tx, event_rx) = event_channel();
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            scenes: Mutex::new(Vec::new()),
            sources: Mutex::new(HashMap::new()),
            current_scene: Mutex::new(String::new()),
            muted: Mutex::new(HashMap::new()),
            volumes: Mutex::new(HashMap::new()),
            offsets: Mutex::new(HashMap::new()),
            monitoring: Mutex::new(HashMap::new()),
            filters: Mutex::new(HashMap::new()),
            streaming: Mutex::new(false),
            stream_target: Mutex::new(None),
            media_duration_ms: Mutex::new(50),
            fail_requests: Mutex::new(HashSet::new()),
            gates: Mutex::new(HashMap::new()),
            disconnected: Mutex::new(false),
            event_tx,
            event_rx,
        })
    }

    pub fn fail_on(&self, request: impl Into<String>) {
        self.fail_requests.lock().insert(request.into());
    }

    /// Stall the next request matching `"Method"` or `"Method:arg"` until
    /// the returned sender fires (or is dropped). One-shot: later matching
    /// requests pass straight through.
    pub fn gate_on(&self, request: impl Into<String>) -> Sender<()> {
        let (release, gate) = crossbeam_channel::bounded(1);
        self.gates.lock().insert(request.into(), gate);
        release
    }

    pub fn push_event(&self, event: ObsEvent) {
        self.event_tx.send(event).unwrap();
    }

    pub fn source_exists(&self, name: &str) -> bool {
        self.sources.lock().contains_key(name)
    }

    pub fn is_muted(&self, source: &str) -> bool {
        self.muted.lock().get(source).copied().unwrap_or(false)
    }

    fn check(&self, request: &str, arg: &str) -> RpcResult<()> {
        self.calls.lock().push(format!("{}({})", request, arg));
        let gate = {
            let mut gates = self.gates.lock();
            gates
                .remove(&format!("{}:{}", request, arg))
                .or_else(|| gates.remove(request))
        };
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        let fail = self.fail_requests.lock();
        if fail.contains(request) || fail.contains(&format!("{}:{}", request, arg)) {
            return Err(RpcError::rejected(request, "scripted failure"));
        }
        Ok(())
    }
}

/// One live session on a [`MockState`].
pub struct MockHandle(pub Arc<MockState>);

impl Drop for MockHandle {
    fn drop(&mut self) {
        *self.0.disconnected.lock() = true;
    }
}

impl ObsRpc for MockHandle {
    fn list_scenes(&self) -> RpcResult<Vec<String>> {
        self.0.check("GetSceneList", "")?;
        Ok(self.0.scenes.lock().clone())
    }

    fn create_scene(&self, name: &str) -> RpcResult<()> {
        self.0.check("CreateScene", name)?;
        self.0.scenes.lock().push(name.to_string());
        Ok(())
    }

    fn set_current_scene(&self, name: &str) -> RpcResult<()> {
        self.0.check("SetCurrentScene", name)?;
        *self.0.current_scene.lock() = name.to_string();
        Ok(())
    }

    fn current_scene(&self) -> RpcResult<String> {
        self.0.check("GetCurrentScene", "")?;
        Ok(self.0.current_scene.lock().clone())
    }

    fn list_scene_items(&self, scene: &str) -> RpcResult<Vec<SceneItem>> {
        self.0.check("GetSceneItemList", scene)?;
        Ok(self
            .0
            .sources
            .lock()
            .iter()
            .filter(|(_, s)| s.as_str() == scene)
            .enumerate()
            .map(|(i, (name, _))| SceneItem {
                id: i as i64,
                source_name: name.clone(),
            })
            .collect())
    }

    fn remove_scene_item(&self, scene: &str, item: &SceneItem) -> RpcResult<()> {
        self.0.check("DeleteSceneItem", &item.source_name)?;
        let _ = scene;
        self.0.sources.lock().remove(&item.source_name);
        Ok(())
    }

    fn create_source(&self, request: &CreateSource) -> RpcResult<()> {
        self.0.check("CreateSource", &request.name)?;
        let mut sources = self.0.sources.lock();
        if sources.contains_key(&request.name) {
            return Err(RpcError::rejected("CreateSource", "name already taken"));
        }
        sources.insert(request.name.clone(), request.scene.clone());
        Ok(())
    }

    fn delete_source(&self, name: &str) -> RpcResult<()> {
        self.0.check("DeleteSource", name)?;
        if self.0.sources.lock().remove(name).is_none() {
            return Err(RpcError::rejected("DeleteSource", "no such source"));
        }
        Ok(())
    }

    fn set_mute(&self, source: &str, mute: bool) -> RpcResult<()> {
        self.0.check("SetMute", source)?;
        self.0.muted.lock().insert(source.to_string(), mute);
        Ok(())
    }

    fn set_volume_db(&self, source: &str, db: f64) -> RpcResult<()> {
        self.0.check("SetVolume", source)?;
        self.0.volumes.lock().insert(source.to_string(), db);
        Ok(())
    }

    fn volume_db(&self, source: &str) -> RpcResult<f64> {
        self.0.check("GetVolume", source)?;
        Ok(self.0.volumes.lock().get(source).copied().unwrap_or(0.0))
    }

    fn set_sync_offset_ms(&self, source: &str, offset_ms: i64) -> RpcResult<()> {
        self.0.check("SetSyncOffset", source)?;
        self.0.offsets.lock().insert(source.to_string(), offset_ms);
        Ok(())
    }

    fn sync_offset_ms(&self, source: &str) -> RpcResult<i64> {
        self.0.check("GetSyncOffset", source)?;
        Ok(self.0.offsets.lock().get(source).copied().unwrap_or(0))
    }

    fn set_audio_monitoring(&self, source: &str, mode: MonitoringMode) -> RpcResult<()> {
        self.0.check("SetAudioMonitorType", source)?;
        self.0.monitoring.lock().insert(source.to_string(), mode);
        Ok(())
    }

    fn media_duration_ms(&self, source: &str) -> RpcResult<u64> {
        self.0.check("GetMediaDuration", source)?;
        Ok(*self.0.media_duration_ms.lock())
    }

    fn restart_media(&self, source: &str) -> RpcResult<()> {
        self.0.check("RestartMedia", source)?;
        Ok(())
    }

    fn list_filters(&self, source: &str) -> RpcResult<Vec<String>> {
        self.0.check("GetSourceFilters", source)?;
        Ok(self
            .0
            .filters
            .lock()
            .get(source)
            .cloned()
            .unwrap_or_default())
    }

    fn add_filter(
        &self,
        source: &str,
        filter: &str,
        _kind: &str,
        _settings: Value,
    ) -> RpcResult<()> {
        self.0.check("AddFilterToSource", filter)?;
        self.0
            .filters
            .lock()
            .entry(source.to_string())
            .or_default()
            .push(filter.to_string());
        Ok(())
    }

    fn set_filter_settings(&self, _source: &str, filter: &str, _settings: Value) -> RpcResult<()> {
        self.0.check("SetSourceFilterSettings", filter)?;
        Ok(())
    }

    fn set_stream_settings(&self, server: &str, key: &str) -> RpcResult<()> {
        self.0.check("SetStreamSettings", server)?;
        *self.0.stream_target.lock() = Some((server.to_string(), key.to_string()));
        Ok(())
    }

    fn start_streaming(&self) -> RpcResult<()> {
        self.0.check("StartStreaming", "")?;
        *self.0.streaming.lock() = true;
        Ok(())
    }

    fn stop_streaming(&self) -> RpcResult<()> {
        self.0.check("StopStreaming", "")?;
        *self.0.streaming.lock() = false;
        Ok(())
    }

    fn events(&self) -> Receiver<ObsEvent> {
        self.0.event_rx.clone()
    }
}

/// Connector handing out sessions keyed by websocket port.
pub struct MockConnect {
    instances: Mutex<HashMap<u16, Arc<MockState>>>,
    refused: Mutex<HashSet<u16>>,
}

impl MockConnect {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            refused: Mutex::new(HashSet::new()),
        }
    }

    /// Register a fake instance listening on `port`.
    pub fn add(&self, port: u16) -> Arc<MockState> {
        let state = MockState::new();
        self.instances.lock().insert(port, Arc::clone(&state));
        state
    }

    /// Make connection attempts to `port` fail.
    pub fn refuse(&self, port: u16) {
        self.refused.lock().insert(port);
    }
}

impl ObsConnect for MockConnect {
    fn connect(
        &self,
        _host: &str,
        port: u16,
        _password: Option<&str>,
    ) -> RpcResult<Box<dyn ObsRpc>> {
        if self.refused.lock().contains(&port) {
            return Err(RpcError::Connection(format!(
                "connection refused on port {}",
                port
            )));
        }
        self.instances
            .lock()
            .get(&port)
            .map(|state| Box::new(MockHandle(Arc::clone(state))) as Box<dyn ObsRpc>)
            .ok_or_else(|| RpcError::Connection(format!("no instance on port {}", port)))
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_for(mut condition: impl FnMut() -> bool, timeout: std::time::Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    condition()
}

/// Instance config pointing at a mock port.
pub fn config(port: u16) -> InstanceConfig {
    InstanceConfig {
        obs_host: "localhost".to_string(),
        websocket_port: port,
        password: None,
        original_media_url: "srt://localhost:9000".to_string(),
    }
}
