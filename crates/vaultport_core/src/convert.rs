use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info};

use crate::assets::AssetOutcome;
use crate::config::ConvertOptions;
use crate::filesystem::{
    JOURNALS_DIR, PAGES_DIR, display_path, file_stem, is_empty_markdown_file, is_markdown_file,
    journal_file_name, list_files, namespace_hierarchy, page_name_from_hierarchy,
};
use crate::pipeline::{PageEnv, rewrite_page};
use crate::resolver::PageIndex;

#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub overwrite: bool,
    pub options: ConvertOptions,
}

/// Summary returned after a conversion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConvertReport {
    pub input: String,
    pub output: String,
    pub journals_copied: usize,
    pub pages_copied: usize,
    pub empty_pages: Vec<String>,
    pub aliases_registered: usize,
    pub files_rewritten: usize,
    pub assets_copied: usize,
    pub assets_missing: Vec<String>,
    pub assets: Vec<AssetOutcome>,
    pub warnings: Vec<String>,
}

/// Convert a whole graph: copy pages into the output tree, index aliases, then
/// rewrite every copied page in place.
///
/// Each phase completes before the next begins, since link resolution needs
/// the full page and alias maps.
pub fn convert_graph(request: &ConvertRequest) -> Result<ConvertReport> {
    let (journals_dir, pages_dir) = preflight(request)?;
    prepare_output(request)?;

    let mut report = ConvertReport {
        input: display_path(&request.input),
        output: display_path(&request.output),
        ..ConvertReport::default()
    };
    let mut index = PageIndex::new();

    info!(dir = %display_path(&journals_dir), "copying journal pages");
    copy_journals(request, &journals_dir, &mut index, &mut report)?;
    info!(dir = %display_path(&pages_dir), "copying pages");
    copy_pages(request, &pages_dir, &mut index, &mut report)?;

    info!(pages = index.len(), "indexing aliases");
    report.aliases_registered = index.index_aliases()?;

    info!(pages = index.len(), "rewriting pages");
    rewrite_all(request, &index, &mut report)?;

    report.warnings.extend(index.warnings().iter().cloned());
    Ok(report)
}

fn preflight(request: &ConvertRequest) -> Result<(PathBuf, PathBuf)> {
    if !request.input.is_dir() {
        bail!(
            "input graph directory does not exist or is not a directory: {}",
            display_path(&request.input)
        );
    }
    let journals_dir = request.input.join(JOURNALS_DIR);
    let pages_dir = request.input.join(PAGES_DIR);
    if !journals_dir.is_dir() || !pages_dir.is_dir() {
        bail!(
            "input graph is missing required folders:\n  - {}\n  - {}",
            folder_status(&journals_dir, JOURNALS_DIR),
            folder_status(&pages_dir, PAGES_DIR)
        );
    }
    if request.output.exists() && !request.overwrite {
        bail!(
            "output directory already exists: {} (use --overwrite to replace it)",
            display_path(&request.output)
        );
    }
    Ok((journals_dir, pages_dir))
}

fn folder_status(path: &Path, name: &str) -> String {
    if path.is_dir() {
        format!("{name}/ (ok)")
    } else {
        format!("{name}/ (missing)")
    }
}

fn prepare_output(request: &ConvertRequest) -> Result<()> {
    if request.output.exists() {
        info!(dir = %display_path(&request.output), "removing existing output");
        fs::remove_dir_all(&request.output)
            .with_context(|| format!("failed to remove {}", request.output.display()))?;
    }
    let journals = request.output.join(JOURNALS_DIR);
    fs::create_dir_all(&journals)
        .with_context(|| format!("failed to create {}", journals.display()))
}

fn copy_journals(
    request: &ConvertRequest,
    journals_dir: &Path,
    index: &mut PageIndex,
    report: &mut ConvertReport,
) -> Result<()> {
    for old_path in list_files(journals_dir)? {
        if !is_markdown_file(&old_path) {
            continue;
        }
        let file_name = file_name_of(&old_path);
        if is_empty_markdown_file(&old_path)? {
            report.empty_pages.push(file_name);
            continue;
        }
        let new_name = journal_file_name(&file_name, request.options.journal_dashes);
        let new_path = request.output.join(JOURNALS_DIR).join(&new_name);
        copy_page(&old_path, &new_path)?;
        index.register_page(&file_stem(&new_path), old_path, new_path);
        report.journals_copied += 1;
    }
    Ok(())
}

fn copy_pages(
    request: &ConvertRequest,
    pages_dir: &Path,
    index: &mut PageIndex,
    report: &mut ConvertReport,
) -> Result<()> {
    for old_path in list_files(pages_dir)? {
        if !is_markdown_file(&old_path) {
            continue;
        }
        let file_name = file_name_of(&old_path);
        if is_empty_markdown_file(&old_path)? {
            report.empty_pages.push(file_name);
            continue;
        }
        let hierarchy = namespace_hierarchy(&file_name, request.options.ignore_dot_namespaces);
        let new_path = hierarchy
            .iter()
            .fold(request.output.clone(), |path, segment| path.join(segment));
        copy_page(&old_path, &new_path)?;
        index.register_page(&page_name_from_hierarchy(&hierarchy), old_path, new_path);
        report.pages_copied += 1;
    }
    Ok(())
}

fn copy_page(old_path: &Path, new_path: &Path) -> Result<()> {
    if let Some(parent) = new_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::copy(old_path, new_path).with_context(|| {
        format!(
            "failed to copy {} to {}",
            old_path.display(),
            new_path.display()
        )
    })?;
    debug!(from = %display_path(old_path), to = %display_path(new_path), "copied page");
    Ok(())
}

fn rewrite_all(
    request: &ConvertRequest,
    index: &PageIndex,
    report: &mut ConvertReport,
) -> Result<()> {
    for new_path in index.new_paths() {
        let old_path = index
            .old_path_for(&new_path)
            .with_context(|| format!("no source recorded for {}", new_path.display()))?;
        let bytes =
            fs::read(&new_path).with_context(|| format!("failed to read {}", new_path.display()))?;
        let content = String::from_utf8_lossy(&bytes);

        let env = PageEnv {
            index,
            options: &request.options,
            old_path,
            new_path: &new_path,
            vault_root: &request.output,
        };
        let rewritten = rewrite_page(&content, &env)
            .with_context(|| format!("failed to rewrite {}", new_path.display()))?;
        fs::write(&new_path, rewritten.text)
            .with_context(|| format!("failed to write {}", new_path.display()))?;
        debug!(page = %display_path(&new_path), "rewrote page");

        for outcome in rewritten.assets {
            match &outcome {
                AssetOutcome::Copied { .. } => report.assets_copied += 1,
                AssetOutcome::Missing { reference, .. } => {
                    report.assets_missing.push(reference.clone())
                }
            }
            report.assets.push(outcome);
        }
        report.files_rewritten += 1;
    }
    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}
