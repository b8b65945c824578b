use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::filesystem::{ATTACHMENTS_DIR, display_path, normalize_pathbuf, relative_path};

static ASSET_EMBED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[(.*?)\]\((.*?)\)").unwrap());

const EMBEDDED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];
const FILE_URL_PREFIX: &str = "file:///";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssetOutcome {
    Copied { from: String, to: String },
    Missing { reference: String, resolved: String },
}

/// Source and destination of the page whose assets are being relocated.
#[derive(Debug, Clone, Copy)]
pub struct AssetContext<'a> {
    pub old_path: &'a Path,
    pub new_path: &'a Path,
}

/// Rewrite every `![alt](target)` span in `line`, copying local targets into the
/// `attachments/` folder next to the page's new location.
///
/// `http(s)` targets are left untouched and `data:` URLs pass through. A target
/// that does not exist on disk keeps its original text and is reported as
/// [`AssetOutcome::Missing`]; any other copy failure is an error.
pub fn rewrite_assets(
    line: &str,
    context: &AssetContext<'_>,
    outcomes: &mut Vec<AssetOutcome>,
) -> Result<String> {
    let mut out = String::with_capacity(line.len());
    let mut last = 0usize;
    for captures in ASSET_EMBED.captures_iter(line) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        out.push_str(&line[last..whole.start()]);
        let target = &captures[2];
        if target.starts_with("http://") || target.starts_with("https://") {
            out.push_str(whole.as_str());
        } else {
            out.push_str(&relocate_asset(&captures[1], target, context, outcomes)?);
        }
        last = whole.end();
    }
    out.push_str(&line[last..]);
    Ok(out)
}

fn relocate_asset(
    name: &str,
    target: &str,
    context: &AssetContext<'_>,
    outcomes: &mut Vec<AssetOutcome>,
) -> Result<String> {
    if target.starts_with("data:") {
        return Ok(format!("![{name}]({target})"));
    }

    let source = resolve_source(target, context.old_path);
    let link = match source.file_name() {
        Some(file_name) if source.is_file() => {
            let new_dir = context.new_path.parent().unwrap_or(Path::new(""));
            let attachments = new_dir.join(ATTACHMENTS_DIR);
            fs::create_dir_all(&attachments)
                .with_context(|| format!("failed to create {}", attachments.display()))?;
            let destination = attachments.join(file_name);
            fs::copy(&source, &destination).with_context(|| {
                format!(
                    "failed to copy asset {} to {}",
                    source.display(),
                    destination.display()
                )
            })?;
            debug!(
                from = %display_path(&source),
                to = %display_path(&destination),
                "copied asset"
            );
            outcomes.push(AssetOutcome::Copied {
                from: display_path(&source),
                to: display_path(&destination),
            });
            display_path(&relative_path(&destination, new_dir)).replace(' ', "%20")
        }
        _ => {
            warn!(
                page = %display_path(context.old_path),
                asset = %display_path(&source),
                "asset not found, keeping original reference"
            );
            outcomes.push(AssetOutcome::Missing {
                reference: target.to_string(),
                resolved: display_path(&source),
            });
            target.to_string()
        }
    };

    let bang = if is_embeddable(&source) { "!" } else { "" };
    Ok(format!("{bang}[{name}]({link})"))
}

/// Absolute location of an asset reference, relative to the page's original directory.
pub fn resolve_source(target: &str, old_page: &Path) -> PathBuf {
    let target = match target.strip_prefix(FILE_URL_PREFIX) {
        Some(rest) => format!("/{rest}"),
        None => target.to_string(),
    };
    let target = target.replace("%20", " ");
    let base = old_page.parent().unwrap_or(Path::new(""));
    normalize_pathbuf(&base.join(target))
}

fn is_embeddable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            EMBEDDED_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}
