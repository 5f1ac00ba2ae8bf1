use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

/// Name of the optional configuration file at the project root.
pub const CONFIG_FILE: &str = "pubup.toml";

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_PUB_TOOL: &str = "dart";

/// Tool-wide configuration, loaded from `pubup.toml` when present.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PubupConfig {
    pub update: UpdateConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct UpdateConfig {
    /// Hard time budget for each external updater invocation.
    pub timeout_secs: u64,
    /// Keep processing remaining pairs when one comes back stale.
    pub continue_on_stale: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            continue_on_stale: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ToolsConfig {
    /// Which toolchain fronts pub: `dart` or `flutter`.
    pub pub_tool: String,
    /// Native patch helper binary; set to route updates through it instead
    /// of the resolver.
    pub helper_path: Option<PathBuf>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            pub_tool: DEFAULT_PUB_TOOL.to_string(),
            helper_path: None,
        }
    }
}

impl PubupConfig {
    /// Load the config next to the project root, falling back to defaults
    /// when no file exists.
    pub fn load(project_path: &Path) -> Result<Self> {
        let path = project_path.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)?;
        let config = toml::from_str(&raw)?;
        Ok(config)
    }
}
