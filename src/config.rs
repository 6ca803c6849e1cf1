//! Service configuration loaded from a JSON file.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

const DEFAULT_STATE_FILE: &str = "state.json";

/// Runtime configuration for the server.
///
/// The file is optional: a missing config yields defaults, which is enough to
/// run the listing endpoints against a server passed via a later update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the WebDAV endpoint (e.g. `https://cloud.example/remote.php/dav`)
    #[serde(default)]
    pub webdav_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Watch roots used when a diff request names none
    #[serde(default)]
    pub directories: Vec<String>,
    /// Path of the persisted snapshot file
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

fn default_state_file() -> String {
    DEFAULT_STATE_FILE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webdav_url: String::new(),
            username: String::new(),
            password: String::new(),
            directories: Vec::new(),
            state_file: default_state_file(),
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e),
        };

        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if config.state_file.is_empty() {
            config.state_file = default_state_file();
        }
        Ok(config)
    }

    /// Persist the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
