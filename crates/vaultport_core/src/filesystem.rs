use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

pub const JOURNALS_DIR: &str = "journals";
pub const PAGES_DIR: &str = "pages";
pub const ATTACHMENTS_DIR: &str = "attachments";

const NAMESPACE_SEPARATORS: &[&str] = &["%2F", "___"];

pub fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

/// A markdown file is empty when every line is whitespace. Page property lines
/// count as content, so a properties-only page is kept.
pub fn is_empty_markdown_file(path: &Path) -> Result<bool> {
    if !is_markdown_file(path) {
        return Ok(false);
    }
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).trim().is_empty())
}

/// Split a page file name into its namespace hierarchy.
///
/// `%2F` wins over `___`, which wins over dot splitting. Dot splitting keeps the
/// extension attached to the final segment, so `A.B.md` becomes `["A", "B.md"]`.
/// A name that matches no rule is its own single segment.
pub fn namespace_hierarchy(file_name: &str, ignore_dot_namespaces: bool) -> Vec<String> {
    for separator in NAMESPACE_SEPARATORS {
        if file_name.contains(separator) {
            return file_name.split(separator).map(str::to_string).collect();
        }
    }

    if !ignore_dot_namespaces {
        let mut pieces: Vec<String> = file_name.split('.').map(str::to_string).collect();
        if pieces.len() > 2 {
            let last = pieces.pop().unwrap_or_default();
            if let Some(previous) = pieces.last_mut() {
                previous.push('.');
                previous.push_str(&last);
            }
            return pieces;
        }
    }

    vec![file_name.to_string()]
}

/// Page-name key for a hierarchy: segments joined by `/` with the extension dropped.
pub fn page_name_from_hierarchy(hierarchy: &[String]) -> String {
    strip_extension(&hierarchy.join("/")).to_string()
}

pub fn journal_file_name(file_name: &str, journal_dashes: bool) -> String {
    if journal_dashes {
        file_name.replace('_', "-")
    } else {
        file_name.to_string()
    }
}

pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(index) if index > 0 && !name[index..].contains('/') => &name[..index],
        _ => name,
    }
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Regular files directly inside `dir`, sorted by name.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Path of `target` as seen from the directory `base_dir`.
pub fn relative_path(target: &Path, base_dir: &Path) -> PathBuf {
    let target = normalize_pathbuf(target);
    let base = normalize_pathbuf(base_dir);
    let target_components: Vec<Component<'_>> = target.components().collect();
    let base_components: Vec<Component<'_>> = base.components().collect();

    let shared = target_components
        .iter()
        .zip(base_components.iter())
        .take_while(|(left, right)| left == right)
        .count();

    let mut out = PathBuf::new();
    for _ in shared..base_components.len() {
        out.push("..");
    }
    for component in &target_components[shared..] {
        out.push(component.as_os_str());
    }
    out
}

pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

pub fn display_path(path: &Path) -> String {
    normalize_separators(&path.to_string_lossy())
}

pub fn normalize_pathbuf(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Path::new(std::path::MAIN_SEPARATOR_STR)),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::{
        is_empty_markdown_file, is_markdown_file, journal_file_name, list_files,
        namespace_hierarchy, normalize_pathbuf, page_name_from_hierarchy, relative_path,
        strip_extension,
    };
    use tempfile::tempdir;

    #[test]
    fn hierarchy_prefers_percent_separator() {
        assert_eq!(
            namespace_hierarchy("A%2FB%2FC.md", false),
            vec!["A", "B", "C.md"]
        );
        assert_eq!(
            namespace_hierarchy("A%2FB___C.md", false),
            vec!["A", "B___C.md"]
        );
    }

    #[test]
    fn hierarchy_splits_on_triple_underscore() {
        assert_eq!(
            namespace_hierarchy("Projects___Home.Lab.md", false),
            vec!["Projects", "Home.Lab.md"]
        );
    }

    #[test]
    fn hierarchy_dot_splitting_respects_flag() {
        assert_eq!(namespace_hierarchy("A.B.md", false), vec!["A", "B.md"]);
        assert_eq!(namespace_hierarchy("A.B.md", true), vec!["A.B.md"]);
        assert_eq!(
            namespace_hierarchy("x.y.z.md", false),
            vec!["x", "y", "z.md"]
        );
    }

    #[test]
    fn hierarchy_falls_back_to_file_name() {
        assert_eq!(namespace_hierarchy("Plain.md", false), vec!["Plain.md"]);
        assert_eq!(namespace_hierarchy("README", false), vec!["README"]);
    }

    #[test]
    fn page_name_joins_segments_without_extension() {
        let hierarchy = namespace_hierarchy("A%2FB%2FC.md", false);
        assert_eq!(page_name_from_hierarchy(&hierarchy), "A/B/C");
        assert_eq!(strip_extension("A.B"), "A");
        assert_eq!(strip_extension("noext"), "noext");
    }

    #[test]
    fn journal_names_swap_underscores_only_when_asked() {
        assert_eq!(journal_file_name("2022_08_24.md", false), "2022_08_24.md");
        assert_eq!(journal_file_name("2022_08_24.md", true), "2022-08-24.md");
    }

    #[test]
    fn markdown_detection_is_case_insensitive() {
        assert!(is_markdown_file(Path::new("pages/Alpha.md")));
        assert!(is_markdown_file(Path::new("pages/Alpha.MD")));
        assert!(!is_markdown_file(Path::new("pages/Alpha.org")));
    }

    #[test]
    fn empty_detection_treats_properties_as_content() {
        let temp = tempdir().expect("tempdir");
        let blank = temp.path().join("blank.md");
        let props = temp.path().join("props.md");
        let other = temp.path().join("blank.txt");
        fs::write(&blank, "  \n\t\n").expect("write blank");
        fs::write(&props, "alias:: Foo\n").expect("write props");
        fs::write(&other, "").expect("write other");

        assert!(is_empty_markdown_file(&blank).expect("blank"));
        assert!(!is_empty_markdown_file(&props).expect("props"));
        assert!(!is_empty_markdown_file(&other).expect("other"));
    }

    #[test]
    fn relative_path_walks_up_and_down() {
        assert_eq!(
            relative_path(Path::new("/out/A/B/C.md"), Path::new("/out/journals")),
            PathBuf::from("../A/B/C.md")
        );
        assert_eq!(
            relative_path(Path::new("/out/A/x.md"), Path::new("/out/A")),
            PathBuf::from("x.md")
        );
    }

    #[test]
    fn normalize_collapses_parent_components() {
        assert_eq!(
            normalize_pathbuf(Path::new("/graph/pages/../assets/./img.png")),
            PathBuf::from("/graph/assets/img.png")
        );
    }

    #[test]
    fn list_files_skips_directories_and_sorts() {
        let temp = tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("nested")).expect("create nested");
        fs::write(temp.path().join("b.md"), "b").expect("write b");
        fs::write(temp.path().join("a.md"), "a").expect("write a");
        fs::write(temp.path().join("nested").join("c.md"), "c").expect("write c");

        let files = list_files(temp.path()).expect("list");
        let names: Vec<String> = files
            .iter()
            .map(|path| path.file_name().expect("name").to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.md"]);
    }
}
