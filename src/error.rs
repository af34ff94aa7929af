use std::path::PathBuf;

/// Central error type for scenefade.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("host registration failed: {0}")]
    Registration(String),

    #[error("OBS handshake failed: {0}")]
    Handshake(String),

    #[error("OBS request {request} failed ({code}): {comment}")]
    Request {
        request: String,
        code: u16,
        comment: String,
    },

    #[error("OBS request {0} timed out")]
    Timeout(String),

    #[error("not connected to OBS")]
    NotConnected,

    #[error("missing setting: {0}")]
    MissingSetting(&'static str),

    #[error("no item {item} in scene '{scene}'")]
    ItemNotFound { scene: String, item: String },

    #[error("invalid scene item id: {0}")]
    InvalidItemId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PluginError>;
