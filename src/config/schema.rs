use serde::Deserialize;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub obs: ObsConfig,
    #[serde(default)]
    pub plugin: PluginConfig,
}

/// Connection settings for the OBS websocket server.
#[derive(Debug, Clone, Deserialize)]
pub struct ObsConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Server password, if authentication is enabled in OBS.
    #[serde(default)]
    pub password: Option<String>,

    /// Milliseconds to wait for each request's response.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl ObsConfig {
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    /// The password, ignoring empty strings and unexpanded `${VAR}` references.
    pub fn password(&self) -> Option<&str> {
        self.password
            .as_deref()
            .filter(|p| !p.is_empty() && !p.starts_with("${"))
    }
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            request_timeout_ms: default_request_timeout(),
        }
    }
}

/// Plugin behaviour.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginConfig {
    /// What to do with a key press while that key's fade is still running.
    #[serde(default)]
    pub overlap: OverlapPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Ignore the new press.
    #[default]
    Drop,
    /// Run the new fade after the running one finishes.
    Queue,
}

// --- Defaults ---

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    4455
}

fn default_request_timeout() -> u64 {
    5000
}
