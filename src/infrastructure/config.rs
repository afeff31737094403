use crate::application::renderer::RenderSettings;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub data_servers: Vec<DataServerConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Default plot height for charts whose first request names none.
    #[serde(default = "default_height")]
    pub default_height: f64,
    /// Chart sessions untouched for this long are stopped.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_height() -> f64 {
    300.0
}

fn default_session_idle_secs() -> u64 {
    900
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            default_height: default_height(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DataServerConfig {
    pub id: String,
    pub url: String,
}

/// Loads `config/chartline.*`, then `CHARTLINE__SECTION__KEY` environment overrides.
pub fn load_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/chartline").required(false))
        .add_source(
            config::Environment::with_prefix("CHARTLINE")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
