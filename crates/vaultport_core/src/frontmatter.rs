use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::ConvertOptions;

pub const FRONT_MATTER_DELIMITER: &str = "---";
pub const ALIAS_KEY: &str = "alias";

static PROPERTY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)::\s*(.*)$").unwrap());

/// Leading `key:: value` lines of a page, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageProperties {
    entries: Vec<(String, String)>,
    /// Index of the first line after the property run.
    pub body_start: usize,
}

impl PageProperties {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Alias names declared by the page, unwrapped from any `[[...]]`.
    pub fn aliases(&self) -> Vec<String> {
        self.get(ALIAS_KEY).map(alias_entries).unwrap_or_default()
    }

    fn insert(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }
}

/// Collect the contiguous run of property lines at the top of a page. Extraction
/// stops at the first line that is not a property.
pub fn extract_properties<S: AsRef<str>>(lines: &[S]) -> PageProperties {
    let mut properties = PageProperties::default();
    for (index, line) in lines.iter().enumerate() {
        let Some(captures) = PROPERTY_LINE.captures(line.as_ref()) else {
            break;
        };
        properties.insert(
            captures[1].to_string(),
            captures[2].trim_end().to_string(),
        );
        properties.body_start = index + 1;
    }
    properties
}

/// Render the YAML front-matter block, delimiters included. Pages without
/// properties get no block at all.
pub fn render_front_matter(
    properties: &PageProperties,
    options: &ConvertOptions,
) -> Result<Vec<String>> {
    if properties.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = vec![FRONT_MATTER_DELIMITER.to_string()];
    for (key, value) in properties.iter() {
        if key == ALIAS_KEY {
            push_list(&mut out, "aliases", &alias_entries(value))?;
        } else if options.tag_prop_to_taglist && is_tags_key(key) {
            push_list(&mut out, "taglinks", &taglink_entries(value))?;
        } else {
            out.push(format!("{key}: {value}"));
        }
    }
    out.push(FRONT_MATTER_DELIMITER.to_string());
    Ok(out)
}

fn is_tags_key(key: &str) -> bool {
    key.contains("tags") || key.contains("Tags")
}

fn push_list(out: &mut Vec<String>, key: &str, items: &[String]) -> Result<()> {
    if items.is_empty() {
        out.push(format!("{key}: []"));
        return Ok(());
    }
    let rendered = serde_yaml::to_string(items)
        .with_context(|| format!("failed to render front matter list `{key}`"))?;
    out.push(format!("{key}:"));
    out.extend(rendered.lines().map(|line| format!("  {line}")));
    Ok(())
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

pub fn alias_entries(value: &str) -> Vec<String> {
    split_list(value)
        .map(|item| unwrap_link(item).to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn taglink_entries(value: &str) -> Vec<String> {
    split_list(value)
        .map(|item| unwrap_link(item.trim_start_matches('#')))
        .filter(|item| !item.is_empty())
        .map(|item| format!("[[{item}]]"))
        .collect()
}

fn unwrap_link(item: &str) -> &str {
    let item = item.trim();
    item.strip_prefix("[[")
        .and_then(|rest| rest.strip_suffix("]]"))
        .unwrap_or(item)
        .trim()
}
