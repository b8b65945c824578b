use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::config::ConvertOptions;
use crate::filesystem::{display_path, file_stem, relative_path, strip_extension};
use crate::resolver::{PageIndex, leaf_name};

static DATE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) (\d{1,2})(?:st|nd|rd|th), (\d{4})\]\]")
        .unwrap()
});
static LONG_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\[\[(.*?)\]\]").unwrap());
static SHORT_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(^|[^\w#/\[])#(\w+)").unwrap());
static BRACKET_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\[(.*?)\]\]").unwrap());

/// Everything link resolution needs to know about the page being rewritten.
#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
    pub index: &'a PageIndex,
    pub options: &'a ConvertOptions,
    /// Root of the output vault; ambiguous leaf names link by path under it.
    pub vault_root: &'a Path,
}

/// Date links first, so the comma inside them never reaches tag flattening;
/// then long tags, short tags, and finally bracket links.
pub fn rewrite_links_and_tags(line: &str, context: &LinkContext<'_>) -> String {
    let line = normalize_date_links(line);
    let line = rewrite_long_tags(&line, context.options.convert_tags_to_links);
    let line = rewrite_short_tags(&line, context.options.convert_tags_to_links);
    rewrite_bracket_links(&line, context)
}

/// `[[Aug 24th, 2022]]` becomes `[[2022-08-24]]`.
pub fn normalize_date_links(line: &str) -> String {
    DATE_LINK
        .replace_all(line, |captures: &Captures<'_>| {
            let month = month_number(&captures[1]);
            let day: u32 = captures[2].parse().unwrap_or_default();
            format!("[[{}-{month}-{day:02}]]", &captures[3])
        })
        .into_owned()
}

fn month_number(abbreviation: &str) -> &'static str {
    match abbreviation {
        "Jan" => "01",
        "Feb" => "02",
        "Mar" => "03",
        "Apr" => "04",
        "May" => "05",
        "Jun" => "06",
        "Jul" => "07",
        "Aug" => "08",
        "Sep" => "09",
        "Oct" => "10",
        "Nov" => "11",
        _ => "12",
    }
}

pub fn rewrite_long_tags(line: &str, convert_to_links: bool) -> String {
    LONG_TAG
        .replace_all(line, |captures: &Captures<'_>| {
            let text = &captures[1];
            if convert_to_links {
                format!("[[{text}]]")
            } else {
                format!("#{}", text.replace(' ', "_"))
            }
        })
        .into_owned()
}

pub fn rewrite_short_tags(line: &str, convert_to_links: bool) -> String {
    if !convert_to_links {
        return line.to_string();
    }
    SHORT_TAG.replace_all(line, "$1[[$2]]").into_owned()
}

pub fn rewrite_bracket_links(line: &str, context: &LinkContext<'_>) -> String {
    BRACKET_LINK
        .replace_all(line, |captures: &Captures<'_>| {
            rewrite_bracket_link(&captures[1], context)
        })
        .into_owned()
}

fn rewrite_bracket_link(text: &str, context: &LinkContext<'_>) -> String {
    let index = context.index;

    if let Some(canonical) = index.resolve_alias(text)
        && let Some(target) = index.resolve_page(canonical)
    {
        return page_link(canonical, target, text, context);
    }

    let Some(target) = index.resolve_page(text) else {
        if context.options.convert_tags_to_links {
            return format!("[[{}]]", text.replace(':', "."));
        }
        return format!("#{}", text.replace([' ', ','], "_"));
    };

    page_link(text, target, leaf_name(text), context)
}

/// Bracket link to the page `name` stored at `target`, shown as `label`.
///
/// A leaf shared by several pages links by vault path so the target stays
/// unambiguous; otherwise the file stem alone is enough.
fn page_link(name: &str, target: &Path, label: &str, context: &LinkContext<'_>) -> String {
    let destination = if context.index.leaf_is_ambiguous(name) {
        let relative = display_path(&relative_path(target, context.vault_root));
        strip_extension(&relative).to_string()
    } else {
        file_stem(target)
    };
    if destination == label {
        format!("[[{label}]]")
    } else {
        format!("[[{destination}|{label}]]")
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;

    fn index() -> PageIndex {
        let mut index = PageIndex::new();
        index.register_page(
            "Projects/Garden",
            PathBuf::from("/in/pages/Projects%2FGarden.md"),
            PathBuf::from("/out/Projects/Garden.md"),
        );
        index.register_page(
            "Reading List",
            PathBuf::from("/in/pages/Reading List.md"),
            PathBuf::from("/out/Reading List.md"),
        );
        index.register_page(
            "Canonical",
            PathBuf::from("/in/pages/Canonical.md"),
            PathBuf::from("/out/Canonical.md"),
        );
        index.register_alias("Nickname", Path::new("/out/Canonical.md"));
        index
    }

    fn rewrite(line: &str, options: &ConvertOptions, index: &PageIndex) -> String {
        let context = LinkContext {
            index,
            options,
            vault_root: Path::new("/out"),
        };
        rewrite_links_and_tags(line, &context)
    }

    #[test]
    fn date_links_become_iso_dates() {
        assert_eq!(normalize_date_links("[[Aug 24th, 2022]]"), "[[2022-08-24]]");
        assert_eq!(normalize_date_links("on [[Jan 3rd, 2021]]!"), "on [[2021-01-03]]!");
        assert_eq!(normalize_date_links("[[Dec 1st, 1999]]"), "[[1999-12-01]]");
        assert_eq!(normalize_date_links("[[Aug 24, 2022]]"), "[[Aug 24, 2022]]");
    }

    #[test]
    fn long_tags_flatten_or_become_links() {
        assert_eq!(rewrite_long_tags("see #[[big idea]]", false), "see #big_idea");
        assert_eq!(rewrite_long_tags("see #[[big idea]]", true), "see [[big idea]]");
    }

    #[test]
    fn short_tags_only_change_in_link_mode() {
        assert_eq!(rewrite_short_tags("#rust and #go_lang", false), "#rust and #go_lang");
        assert_eq!(
            rewrite_short_tags("#rust and #go_lang", true),
            "[[rust]] and [[go_lang]]"
        );
        assert_eq!(
            rewrite_short_tags("http://x.test/page#anchor", true),
            "http://x.test/page#anchor"
        );
    }

    #[test]
    fn known_pages_link_by_leaf_name() {
        let index = index();
        let options = ConvertOptions::default();
        assert_eq!(
            rewrite("- see [[Projects/Garden]]", &options, &index),
            "- see [[Garden]]"
        );
        assert_eq!(
            rewrite("[[Reading List]]", &options, &index),
            "[[Reading List]]"
        );
    }

    #[test]
    fn aliases_resolve_to_canonical_page() {
        let index = index();
        assert_eq!(
            rewrite("[[Nickname]]", &ConvertOptions::default(), &index),
            "[[Canonical|Nickname]]"
        );
    }

    #[test]
    fn unknown_pages_become_tags_or_links() {
        let index = index();
        assert_eq!(
            rewrite("[[no such page, really]]", &ConvertOptions::default(), &index),
            "#no_such_page__really"
        );
        let options = ConvertOptions {
            convert_tags_to_links: true,
            ..ConvertOptions::default()
        };
        assert_eq!(rewrite("[[time: now]]", &options, &index), "[[time. now]]");
    }

    #[test]
    fn dates_survive_as_links_when_journal_exists() {
        let mut index = index();
        index.register_page(
            "2022-08-24",
            PathBuf::from("/in/journals/2022_08_24.md"),
            PathBuf::from("/out/journals/2022-08-24.md"),
        );
        assert_eq!(
            rewrite("[[Aug 24th, 2022]]", &ConvertOptions::default(), &index),
            "[[2022-08-24]]"
        );
        assert_eq!(
            rewrite("[[Aug 25th, 2022]]", &ConvertOptions::default(), &index),
            "#2022-08-25"
        );
    }

    #[test]
    fn tag_link_mode_routes_long_tags_through_resolution() {
        let index = index();
        let options = ConvertOptions {
            convert_tags_to_links: true,
            ..ConvertOptions::default()
        };
        assert_eq!(
            rewrite("#[[Reading List]] #Nickname", &options, &index),
            "[[Reading List]] [[Canonical|Nickname]]"
        );
    }

    #[test]
    fn ambiguous_leaf_names_link_by_vault_path() {
        let mut index = index();
        index.register_page(
            "Archive/Garden",
            PathBuf::from("/in/pages/Archive%2FGarden.md"),
            PathBuf::from("/out/Archive/Garden.md"),
        );
        index.register_alias("Plot", Path::new("/out/Archive/Garden.md"));
        let options = ConvertOptions::default();

        assert_eq!(
            rewrite("[[Archive/Garden]] and [[Projects/Garden]]", &options, &index),
            "[[Archive/Garden|Garden]] and [[Projects/Garden|Garden]]"
        );
        assert_eq!(
            rewrite("[[Plot]]", &options, &index),
            "[[Archive/Garden|Plot]]"
        );
    }

    #[test]
    fn short_tags_inside_punctuation_become_links() {
        assert_eq!(
            rewrite_short_tags("(#rust) a,#go", true),
            "([[rust]]) a,[[go]]"
        );
        assert_eq!(rewrite_short_tags("##heading", true), "##heading");
        assert_eq!(rewrite_short_tags("a/#b", true), "a/#b");
    }

    #[test]
    fn decoded_names_link_to_the_stored_file() {
        let mut index = index();
        index.register_page(
            "What%3F",
            PathBuf::from("/in/pages/What%3F.md"),
            PathBuf::from("/out/What%3F.md"),
        );
        assert_eq!(
            rewrite("[[What?]]", &ConvertOptions::default(), &index),
            "[[What%3F|What?]]"
        );
    }
}
