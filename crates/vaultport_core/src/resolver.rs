use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use crate::filesystem::display_path;
use crate::frontmatter::extract_properties;

/// Name and path lookups shared by every page rewrite.
///
/// Built in two passes: the copy phase registers pages, then `index_aliases`
/// reads each copied page's `alias::` property. Both finish before any content
/// is rewritten. Colliding keys are overwritten (last writer wins) and reported
/// through `warnings`.
#[derive(Debug, Default)]
pub struct PageIndex {
    new_to_old: HashMap<PathBuf, PathBuf>,
    new_to_name: HashMap<PathBuf, String>,
    name_to_path: HashMap<String, PathBuf>,
    aliases: HashMap<String, String>,
    leaves: HashMap<String, BTreeSet<PathBuf>>,
    warnings: Vec<String>,
}

impl PageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a copied page under its page-name key and, when the file name
    /// carried URL escapes, under the decoded name as well.
    pub fn register_page(&mut self, name: &str, old_path: PathBuf, new_path: PathBuf) {
        let collision = self
            .new_to_old
            .get(&new_path)
            .filter(|previous| **previous != old_path)
            .map(|previous| {
                format!(
                    "{} and {} both map to {}; the later copy overwrote the earlier one",
                    display_path(previous),
                    display_path(&old_path),
                    display_path(&new_path)
                )
            });
        if let Some(message) = collision {
            self.warn(message);
        }
        self.new_to_old.insert(new_path.clone(), old_path);
        self.new_to_name.insert(new_path.clone(), name.to_string());
        self.leaves
            .entry(leaf_name(name).to_string())
            .or_default()
            .insert(new_path.clone());

        self.insert_name(name, &new_path);
        if let Some(decoded) = decoded_name(name) {
            self.insert_name(&decoded, &new_path);
        }
    }

    /// Map `alias` to the page stored at `new_path`. Returns false when the
    /// path is not a registered page.
    pub fn register_alias(&mut self, alias: &str, new_path: &Path) -> bool {
        let Some(page_name) = self.new_to_name.get(new_path).cloned() else {
            return false;
        };
        let collision = self
            .aliases
            .get(alias)
            .filter(|previous| **previous != page_name)
            .map(|previous| {
                format!(
                    "alias `{alias}` is claimed by both `{previous}` and `{page_name}`; using `{page_name}`"
                )
            });
        if let Some(message) = collision {
            self.warn(message);
        }
        self.aliases.insert(alias.to_string(), page_name);
        self.insert_name(alias, new_path);
        true
    }

    /// Read the `alias::` property of every registered page. Must run after the
    /// copy phase and before any rewrite.
    pub fn index_aliases(&mut self) -> Result<usize> {
        let mut registered = 0usize;
        for new_path in self.new_paths() {
            let content = fs::read(&new_path)
                .with_context(|| format!("failed to read {}", new_path.display()))?;
            let content = String::from_utf8_lossy(&content);
            let lines: Vec<&str> = content.lines().collect();
            for alias in extract_properties(&lines).aliases() {
                if self.register_alias(&alias, &new_path) {
                    debug!(alias = %alias, page = %display_path(&new_path), "registered alias");
                    registered += 1;
                }
            }
        }
        Ok(registered)
    }

    /// Destination paths of every copied page, sorted.
    pub fn new_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.new_to_old.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.new_to_old.len()
    }

    pub fn is_empty(&self) -> bool {
        self.new_to_old.is_empty()
    }

    pub fn old_path_for(&self, new_path: &Path) -> Option<&Path> {
        self.new_to_old.get(new_path).map(PathBuf::as_path)
    }

    pub fn resolve_page(&self, name: &str) -> Option<&Path> {
        self.name_to_path.get(name).map(PathBuf::as_path)
    }

    /// Canonical page-name key an alias points at.
    pub fn resolve_alias(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// True when more than one page shares the final segment of `name`.
    pub fn leaf_is_ambiguous(&self, name: &str) -> bool {
        self.leaves
            .get(leaf_name(name))
            .is_some_and(|paths| paths.len() > 1)
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn insert_name(&mut self, name: &str, new_path: &Path) {
        let collision = self
            .name_to_path
            .get(name)
            .filter(|previous| previous.as_path() != new_path)
            .map(|previous| {
                format!(
                    "page name `{name}` resolves to both {} and {}; using the latter",
                    display_path(previous),
                    display_path(new_path)
                )
            });
        if let Some(message) = collision {
            self.warn(message);
        }
        self.name_to_path
            .insert(name.to_string(), new_path.to_path_buf());
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

/// Final `/` segment of a hierarchical page name.
pub fn leaf_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn decoded_name(name: &str) -> Option<String> {
    let decoded = percent_decode_str(name).decode_utf8().ok()?;
    (decoded != name).then(|| decoded.into_owned())
}
