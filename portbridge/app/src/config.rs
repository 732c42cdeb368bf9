use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Used as `RUST_LOG` when the environment does not set one.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_runtime_id")]
    pub runtime_id: i64,

    /// Treat the startup thread as the main context.
    #[serde(default = "default_mark_main_thread")]
    pub mark_main_thread: bool,

    /// JSON interface summary; the built-in descriptions are used when unset.
    pub summary_path: Option<PathBuf>,

    /// Extra signature keys dispatched without waiting for a result.
    pub async_methods: Vec<String>,

    #[serde(default = "default_greeting")]
    pub greeting: String,

    #[serde(default = "default_names")]
    pub names: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_runtime_id() -> i64 {
    1
}

fn default_mark_main_thread() -> bool {
    true
}

fn default_greeting() -> String {
    "Hello".to_string()
}

fn default_names() -> Vec<String> {
    vec!["Ada".to_string(), "Grace".to_string()]
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            runtime_id: default_runtime_id(),
            mark_main_thread: default_mark_main_thread(),
            summary_path: None,
            async_methods: Vec::new(),
            greeting: default_greeting(),
            names: default_names(),
        }
    }
}

/// Reads `path`, or writes the defaults there when it does not exist yet.
pub fn load_config(path: &Path) -> Result<BridgeConfig> {
    if path.exists() {
        info!("Loading config from {:?}", path);
        let file = fs::File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let reader = std::io::BufReader::new(file);
        let config = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config {:?}", path))?;
        Ok(config)
    } else {
        info!("Config not found. Creating default at {:?}", path);
        let config = BridgeConfig::default();
        let file = fs::File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &config)?;
        Ok(config)
    }
}
