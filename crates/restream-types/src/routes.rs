//! API route and query-parameter names shared by the dispatcher and the
//! instance-service route layer.

/// Session (re)initialization.
pub const API_INIT_ROUTE: &str = "/init";

/// Tear down all connections and scenes.
pub const API_CLEANUP_ROUTE: &str = "/cleanup";

/// Trigger the media insertion sequence.
pub const API_MEDIA_PLAY_ROUTE: &str = "/media/play";

/// Set stream server/key.
pub const API_SET_STREAM_SETTINGS_ROUTE: &str = "/stream/settings";

/// Start streaming.
pub const API_STREAM_START_ROUTE: &str = "/stream/start";

/// Stop streaming.
pub const API_STREAM_STOP_ROUTE: &str = "/stream/stop";

/// Teamspeak input audio sync offset (GET/POST).
pub const API_TS_OFFSET_ROUTE: &str = "/ts/offset";

/// Teamspeak input volume (GET/POST).
pub const API_TS_VOLUME_ROUTE: &str = "/ts/volume";

/// Live source volume (GET/POST).
pub const API_SOURCE_VOLUME_ROUTE: &str = "/source/volume";

/// Sidechain compressor settings.
pub const API_SIDECHAIN_ROUTE: &str = "/sidechain";

/// Transition configuration.
pub const API_TRANSITION_ROUTE: &str = "/transition";

/// Query-parameter name for init payloads.
pub const PARAM_SERVER_LANGS: &str = "server_langs";

/// Query-parameter name for media play payloads.
pub const PARAM_MEDIA_PLAY: &str = "params";

/// Query-parameter name for stream settings payloads.
pub const PARAM_STREAM_SETTINGS: &str = "stream_settings";

/// Query-parameter name for sync offset payloads.
pub const PARAM_OFFSET_SETTINGS: &str = "offset_settings";

/// Query-parameter name for volume payloads.
pub const PARAM_VOLUME_SETTINGS: &str = "volume_settings";

/// Query-parameter name for sidechain payloads.
pub const PARAM_SIDECHAIN_SETTINGS: &str = "sidechain_settings";

/// Query-parameter name for transition payloads.
pub const PARAM_TRANSITION_SETTINGS: &str = "transition_settings";
