use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vaultport_core::config::{ConvertOptions, load_config};
use vaultport_core::convert::{ConvertReport, ConvertRequest, convert_graph};

#[derive(Debug, Parser)]
#[command(
    name = "vaultport",
    version,
    about = "Convert a Logseq graph export into an Obsidian vault"
)]
struct Cli {
    #[arg(long, alias = "logseq", value_name = "PATH", help = "Base directory of the graph")]
    input: PathBuf,
    #[arg(long, value_name = "PATH", help = "Directory the vault is written to")]
    output: PathBuf,
    #[arg(
        long,
        alias = "overwrite-output",
        help = "Delete and recreate the output directory if it exists"
    )]
    overwrite: bool,
    #[arg(
        long,
        help = "Unindent every line once; top-level lines lose their bullet"
    )]
    unindent_once: bool,
    #[arg(long, help = "Use dashes instead of underscores in journal file names")]
    journal_dashes: bool,
    #[arg(long, help = "Turn a tags property into a taglinks list of links")]
    tag_prop_to_taglist: bool,
    #[arg(long, help = "Do not treat dots in page file names as namespace separators")]
    ignore_dot_namespaces: bool,
    #[arg(long, help = "Render #tags and #[[long tags]] as [[links]]")]
    convert_tags_to_links: bool,
    #[arg(long, value_name = "PATH", help = "TOML file with a [convert] table of defaults")]
    config: Option<PathBuf>,
    #[arg(long, help = "Print the run report as JSON")]
    json: bool,
}

impl Cli {
    fn options(&self) -> ConvertOptions {
        ConvertOptions {
            unindent_once: self.unindent_once,
            journal_dashes: self.journal_dashes,
            tag_prop_to_taglist: self.tag_prop_to_taglist,
            ignore_dot_namespaces: self.ignore_dot_namespaces,
            convert_tags_to_links: self.convert_tags_to_links,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vaultport=info,vaultport_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut options = cli.options();
    if let Some(config_path) = &cli.config {
        options = options.merge(load_config(config_path)?.convert);
    }

    let request = ConvertRequest {
        input: cli.input.clone(),
        output: cli.output.clone(),
        overwrite: cli.overwrite,
        options,
    };
    tracing::info!(
        input = %normalize_path(&request.input),
        output = %normalize_path(&request.output),
        "starting conversion"
    );
    let report = convert_graph(&request)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &request.options);
    }
    Ok(())
}

fn print_report(report: &ConvertReport, options: &ConvertOptions) {
    println!("convert");
    println!("input: {}", report.input);
    println!("output: {}", report.output);
    println!("options.unindent_once: {}", format_flag(options.unindent_once));
    println!("options.journal_dashes: {}", format_flag(options.journal_dashes));
    println!(
        "options.tag_prop_to_taglist: {}",
        format_flag(options.tag_prop_to_taglist)
    );
    println!(
        "options.ignore_dot_namespaces: {}",
        format_flag(options.ignore_dot_namespaces)
    );
    println!(
        "options.convert_tags_to_links: {}",
        format_flag(options.convert_tags_to_links)
    );
    println!("journals_copied: {}", report.journals_copied);
    println!("pages_copied: {}", report.pages_copied);
    println!("aliases_registered: {}", report.aliases_registered);
    println!("files_rewritten: {}", report.files_rewritten);
    println!("assets_copied: {}", report.assets_copied);
    println!("empty_pages.count: {}", report.empty_pages.len());
    for name in &report.empty_pages {
        println!("empty_pages.name: {name}");
    }
    println!("assets_missing.count: {}", report.assets_missing.len());
    for reference in &report.assets_missing {
        println!("assets_missing.reference: {reference}");
    }
    if !report.warnings.is_empty() {
        println!("warnings:");
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
