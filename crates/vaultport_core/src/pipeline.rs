use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::assets::{AssetContext, AssetOutcome, rewrite_assets};
use crate::config::ConvertOptions;
use crate::frontmatter::{extract_properties, render_front_matter};
use crate::links::{LinkContext, rewrite_links_and_tags};
use crate::resolver::PageIndex;

static COLLAPSED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*collapsed:: true\s*$").unwrap());
static EMPTY_BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*-\s*$").unwrap());
static INDENT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,4}").unwrap());
static BULLET_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\t*)-[ *](```(\w*).*)$").unwrap());
static IMAGE_DIMENSIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[(.*?)\]\((.*?)\)\{:height \d*, :width (\d*)\}").unwrap()
});
static EMBED_MACRO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{embed .*?\}\}").unwrap());
static BLOCK_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\(.*?\)\)").unwrap());
static INDENTED_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\t+)(!\[.*)$").unwrap());

const CODE_FENCE: &str = "```";

/// Mutable state carried from one line to the next within a single page.
/// A fresh value is created for every page.
#[derive(Debug, Clone, Default)]
pub struct LineState {
    pub in_code_block: bool,
    pub assets: Vec<AssetOutcome>,
}

/// Read-only inputs shared by every line of a page.
#[derive(Debug, Clone, Copy)]
pub struct PageEnv<'a> {
    pub index: &'a PageIndex,
    pub options: &'a ConvertOptions,
    pub old_path: &'a Path,
    pub new_path: &'a Path,
    pub vault_root: &'a Path,
}

/// Result of applying one step to the line in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    Keep(String),
    Drop,
    /// Emit `before` as finished output and continue with `line`.
    Split { before: String, line: String },
}

type StepFn = fn(String, &mut LineState, &PageEnv<'_>) -> Result<Rewrite>;

pub struct RewriteStep {
    pub name: &'static str,
    apply: StepFn,
}

/// Line rewrites in application order. Each step sees the previous step's output.
pub const STEPS: &[RewriteStep] = &[
    RewriteStep { name: "close-code-block", apply: close_code_block },
    RewriteStep { name: "drop-collapsed", apply: drop_collapsed },
    RewriteStep { name: "empty-bullet", apply: empty_bullet },
    RewriteStep { name: "indentation", apply: remap_indentation },
    RewriteStep { name: "unindent-once", apply: unindent_once },
    RewriteStep { name: "code-block-fence", apply: open_code_block },
    RewriteStep { name: "links-and-tags", apply: links_and_tags },
    RewriteStep { name: "assets", apply: assets },
    RewriteStep { name: "image-dimensions", apply: image_dimensions },
    RewriteStep { name: "block-references", apply: block_references },
    RewriteStep { name: "trailing-hyphen", apply: trailing_hyphen },
    RewriteStep { name: "todo-done", apply: todo_done },
    RewriteStep { name: "escape-angle-brackets", apply: escape_angle_brackets },
    RewriteStep { name: "indented-image-bullet", apply: indented_image_bullet },
];

/// Run one source line through every step, returning zero or more output lines.
pub fn rewrite_line(line: &str, state: &mut LineState, env: &PageEnv<'_>) -> Result<Vec<String>> {
    let mut emitted = Vec::new();
    let mut current = line.to_string();
    for step in STEPS {
        match (step.apply)(current, state, env)? {
            Rewrite::Keep(line) => current = line,
            Rewrite::Drop => return Ok(emitted),
            Rewrite::Split { before, line } => {
                emitted.push(before);
                current = line;
            }
        }
    }
    emitted.push(current);
    Ok(emitted)
}

#[derive(Debug, Clone)]
pub struct PageRewrite {
    pub text: String,
    pub assets: Vec<AssetOutcome>,
}

/// Convert a whole page: leading properties become a front-matter block and the
/// remaining lines go through the line pipeline.
pub fn rewrite_page(content: &str, env: &PageEnv<'_>) -> Result<PageRewrite> {
    let lines: Vec<&str> = content.lines().collect();
    let properties = extract_properties(&lines);

    let mut out = render_front_matter(&properties, env.options)?;
    let mut state = LineState::default();
    for line in &lines[properties.body_start..] {
        out.extend(rewrite_line(line, &mut state, env)?);
    }

    let mut text = out.join("\n");
    if content.ends_with('\n') && !out.is_empty() {
        text.push('\n');
    }
    Ok(PageRewrite {
        text,
        assets: state.assets,
    })
}

fn close_code_block(line: String, state: &mut LineState, _env: &PageEnv<'_>) -> Result<Rewrite> {
    if state.in_code_block && line.trim() == CODE_FENCE {
        state.in_code_block = false;
    }
    Ok(Rewrite::Keep(line))
}

fn drop_collapsed(line: String, _state: &mut LineState, _env: &PageEnv<'_>) -> Result<Rewrite> {
    if COLLAPSED_MARKER.is_match(&line) {
        return Ok(Rewrite::Drop);
    }
    Ok(Rewrite::Keep(line))
}

fn empty_bullet(line: String, _state: &mut LineState, _env: &PageEnv<'_>) -> Result<Rewrite> {
    if EMPTY_BULLET.is_match(&line) {
        return Ok(Rewrite::Keep(String::new()));
    }
    Ok(Rewrite::Keep(line))
}

fn remap_indentation(line: String, _state: &mut LineState, _env: &PageEnv<'_>) -> Result<Rewrite> {
    Ok(Rewrite::Keep(INDENT_RUN.replace_all(&line, "\t").into_owned()))
}

fn unindent_once(line: String, _state: &mut LineState, env: &PageEnv<'_>) -> Result<Rewrite> {
    if !env.options.unindent_once {
        return Ok(Rewrite::Keep(line));
    }
    if let Some(rest) = line.strip_prefix('\t') {
        return Ok(Rewrite::Keep(rest.to_string()));
    }
    if let Some(rest) = line.strip_prefix("- ") {
        return Ok(Rewrite::Keep(rest.to_string()));
    }
    Ok(Rewrite::Keep(line))
}

fn open_code_block(line: String, state: &mut LineState, _env: &PageEnv<'_>) -> Result<Rewrite> {
    let Some(captures) = BULLET_FENCE.captures(&line) else {
        return Ok(Rewrite::Keep(line));
    };
    let tabs = &captures[1];
    let language = &captures[3];
    let before = if language.is_empty() {
        format!("{tabs}- code block below:")
    } else {
        format!("{tabs}- {language} code block below:")
    };
    let fence = format!("{tabs}{}", &captures[2]);
    state.in_code_block = true;
    Ok(Rewrite::Split {
        before,
        line: fence,
    })
}

fn links_and_tags(line: String, _state: &mut LineState, env: &PageEnv<'_>) -> Result<Rewrite> {
    let context = LinkContext {
        index: env.index,
        options: env.options,
        vault_root: env.vault_root,
    };
    Ok(Rewrite::Keep(rewrite_links_and_tags(&line, &context)))
}

fn assets(line: String, state: &mut LineState, env: &PageEnv<'_>) -> Result<Rewrite> {
    let context = AssetContext {
        old_path: env.old_path,
        new_path: env.new_path,
    };
    Ok(Rewrite::Keep(rewrite_assets(&line, &context, &mut state.assets)?))
}

fn image_dimensions(line: String, _state: &mut LineState, _env: &PageEnv<'_>) -> Result<Rewrite> {
    Ok(Rewrite::Keep(
        IMAGE_DIMENSIONS.replace_all(&line, "![$1|$3]($2)").into_owned(),
    ))
}

fn block_references(line: String, _state: &mut LineState, _env: &PageEnv<'_>) -> Result<Rewrite> {
    let line = EMBED_MACRO.replace_all(&line, "");
    Ok(Rewrite::Keep(BLOCK_REF.replace_all(&line, "").into_owned()))
}

fn trailing_hyphen(mut line: String, _state: &mut LineState, _env: &PageEnv<'_>) -> Result<Rewrite> {
    if line.ends_with('-') {
        line.push(' ');
    }
    Ok(Rewrite::Keep(line))
}

fn todo_done(line: String, state: &mut LineState, _env: &PageEnv<'_>) -> Result<Rewrite> {
    if state.in_code_block {
        return Ok(Rewrite::Keep(line));
    }
    if let Some(rest) = line.strip_prefix("- DONE") {
        return Ok(Rewrite::Keep(format!("- [X]{rest}")));
    }
    if let Some(rest) = line.strip_prefix("- TODO") {
        return Ok(Rewrite::Keep(format!("- [ ]{rest}")));
    }
    Ok(Rewrite::Keep(line))
}

fn escape_angle_brackets(
    line: String,
    state: &mut LineState,
    _env: &PageEnv<'_>,
) -> Result<Rewrite> {
    if state.in_code_block {
        return Ok(Rewrite::Keep(line));
    }
    let mut out = String::with_capacity(line.len());
    for (index, ch) in line.char_indices() {
        if index > 0 && (ch == '<' || ch == '>') {
            out.push('\\');
        }
        out.push(ch);
    }
    Ok(Rewrite::Keep(out))
}

fn indented_image_bullet(
    line: String,
    _state: &mut LineState,
    _env: &PageEnv<'_>,
) -> Result<Rewrite> {
    Ok(Rewrite::Keep(
        INDENTED_IMAGE.replace(&line, "$1- $2").into_owned(),
    ))
}
