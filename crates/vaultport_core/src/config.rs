use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Behavior switches threaded through every rewrite step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Strip one indentation level (or the top-level bullet) from every line.
    pub unindent_once: bool,
    /// Use `-` instead of `_` in journal file names and page-name keys.
    pub journal_dashes: bool,
    /// Turn a `tags`-like page property into a `taglinks` list of links.
    pub tag_prop_to_taglist: bool,
    /// Only split namespaces on `%2F` and `___`, never on `.`.
    pub ignore_dot_namespaces: bool,
    /// Render `#tag` and `#[[long tag]]` as bracket links.
    pub convert_tags_to_links: bool,
}

impl ConvertOptions {
    /// Enable every flag that is set in either `self` or `other`.
    pub fn merge(self, other: ConvertOptions) -> ConvertOptions {
        ConvertOptions {
            unindent_once: self.unindent_once || other.unindent_once,
            journal_dashes: self.journal_dashes || other.journal_dashes,
            tag_prop_to_taglist: self.tag_prop_to_taglist || other.tag_prop_to_taglist,
            ignore_dot_namespaces: self.ignore_dot_namespaces || other.ignore_dot_namespaces,
            convert_tags_to_links: self.convert_tags_to_links || other.convert_tags_to_links,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct VaultportConfig {
    #[serde(default)]
    pub convert: ConvertOptions,
}

/// Load and parse a VaultportConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<VaultportConfig> {
    if !config_path.exists() {
        return Ok(VaultportConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: VaultportConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}
