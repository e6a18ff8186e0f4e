use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use ucd_catalog::{fetch_catalog, resolve_source, set_config_catalog, SharedSource};
use ucd_core::{FilterController, Item, ItemCatalog, Tag};
use ucd_utils::{default_log_path, init_logging, LogSink};

#[derive(Parser)]
#[command(name = "ucd", version, about = "Search, filter and pick a use case")]
struct Cli {
    /// Catalog JSON file to load instead of the configured one.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Remember a catalog file as the default.
    Init {
        /// Path to the catalog JSON file.
        path: PathBuf,
    },
    /// List items matching a search and tag filter.
    List {
        /// Case-insensitive text to find in names and descriptions.
        #[arg(long, default_value = "")]
        search: String,
        /// Only show items carrying any of these tags.
        #[arg(long)]
        tag: Vec<String>,
        /// Print items as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List every tag in the catalog.
    Tags,
    /// Show a single item by name.
    Show { name: String },
    /// Select an item and confirm it without the dashboard.
    Select { name: String },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        let log_path = default_log_path().context("failed to locate log directory")?;
        init_logging(cli.verbose, &LogSink::File(log_path)).context("failed to set up logging")?;
        let source = resolve_source(cli.catalog).context("failed to resolve catalog")?;
        if let Some(name) = ucd_tui::run(source)? {
            println!("{name}");
        }
        return Ok(());
    };

    init_logging(cli.verbose, &LogSink::Stderr).context("failed to set up logging")?;

    if let Command::Init { path } = &command {
        let path = path
            .canonicalize()
            .with_context(|| format!("catalog not found: {}", path.display()))?;
        set_config_catalog(&path).context("failed to save config")?;
        println!("Catalog set to {}", path.display());
        return Ok(());
    }

    let source = resolve_source(cli.catalog).context("failed to resolve catalog")?;
    let catalog = load(source)?;

    match command {
        Command::List { search, tag, json } => list_items(&catalog, &search, &tag, json),
        Command::Tags => {
            for tag in catalog.tags() {
                println!("{tag}");
            }
            Ok(())
        }
        Command::Show { name } => {
            let item = catalog
                .get(&name)
                .ok_or_else(|| anyhow!("item not found: {name}"))?;
            println!("{}", render_item_details(item));
            Ok(())
        }
        Command::Select { name } => {
            let confirmed = select_and_confirm(catalog, &name)?;
            println!("{confirmed}");
            Ok(())
        }
        Command::Init { .. } => unreachable!("handled above"),
    }
}

fn load(source: SharedSource) -> Result<ItemCatalog> {
    let description = source.describe();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to initialize runtime")?;
    runtime
        .block_on(fetch_catalog(source))
        .with_context(|| format!("failed to load catalog from {description}"))
}

fn filter_catalog(catalog: ItemCatalog, search: &str, tags: &[String]) -> FilterController {
    let mut controller = FilterController::with_catalog(catalog);
    controller.set_search_text(search);
    for tag in tags {
        if !controller.is_tag_active(tag) {
            controller.toggle_tag(tag);
        }
    }
    controller
}

fn list_items(catalog: &ItemCatalog, search: &str, tags: &[String], json: bool) -> Result<()> {
    let controller = filter_catalog(catalog.clone(), search, tags);
    let items = controller.filtered_items();
    if json {
        let output = serde_json::to_string_pretty(&items).context("failed to encode items")?;
        println!("{output}");
        return Ok(());
    }
    for item in items {
        println!("{}", format_item_line(item));
    }
    Ok(())
}

fn select_and_confirm(catalog: ItemCatalog, name: &str) -> Result<String> {
    if catalog.get(name).is_none() {
        return Err(anyhow!("item not found: {name}"));
    }
    let mut controller = FilterController::with_catalog(catalog);
    controller.select_item(name);
    let confirmed = controller
        .confirm_selection()
        .ok_or_else(|| anyhow!("nothing selected"))?;
    info!(name = %confirmed, "selection confirmed");
    Ok(confirmed)
}

fn tag_list(item: &Item) -> String {
    item.tags
        .iter()
        .map(Tag::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_item_line(item: &Item) -> String {
    format!("{}\t{}\t{}", item.name, tag_list(item), item.description)
}

fn render_item_details(item: &Item) -> String {
    let mut content = String::new();
    content.push_str(&format!("# {}\n\n", item.name));
    if !item.description.is_empty() {
        content.push_str(&item.description);
        content.push_str("\n\n");
    }
    content.push_str(&format!("image: {}\n", item.image));
    content.push_str(&format!("tags: {}\n", tag_list(item)));
    if let Some(link) = &item.demo_link {
        content.push_str(&format!("demo: {link}\n"));
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn item(name: &str, description: &str, tags: &[&str]) -> Item {
        let tags = tags.iter().map(|tag| Tag::new(*tag).unwrap()).collect();
        Item::new(name, description, format!("images/{}.png", name.to_lowercase()), tags).unwrap()
    }

    fn catalog() -> ItemCatalog {
        ItemCatalog::new(vec![
            item("A", "first", &["x", "y"]),
            item("B", "second", &["y"]),
            item("C", "third", &["z"]),
        ])
    }

    fn names(controller: &FilterController) -> Vec<String> {
        controller
            .filtered_items()
            .iter()
            .map(|item| item.name.clone())
            .collect()
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_list_with_repeated_tags() {
        let cli = Cli::try_parse_from(["ucd", "list", "--search", "site", "--tag", "x", "--tag", "z", "--json"])
            .expect("parse");
        match cli.command {
            Some(Command::List { search, tag, json }) => {
                assert_eq!(search, "site");
                assert_eq!(tag, vec!["x", "z"]);
                assert!(json);
            }
            _ => panic!("expected list command"),
        }
    }

    #[test]
    fn global_flags_apply_after_subcommand() {
        let cli = Cli::try_parse_from(["ucd", "tags", "--catalog", "items.json", "-vv"]).expect("parse");
        assert_eq!(cli.catalog, Some(PathBuf::from("items.json")));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn no_subcommand_launches_dashboard() {
        let cli = Cli::try_parse_from(["ucd"]).expect("parse");
        assert!(cli.command.is_none());
    }

    #[test]
    fn filter_catalog_combines_search_and_tags() {
        let controller = filter_catalog(catalog(), "", &["y".into(), "y".into()]);
        assert_eq!(names(&controller), vec!["A", "B"]);

        let controller = filter_catalog(catalog(), "B", &["y".into()]);
        assert_eq!(names(&controller), vec!["B"]);
    }

    #[test]
    fn select_confirms_known_item() {
        assert_eq!(select_and_confirm(catalog(), "C").expect("confirm"), "C");
        assert!(select_and_confirm(catalog(), "missing").is_err());
    }

    #[test]
    fn item_line_is_tab_separated() {
        assert_eq!(format_item_line(&catalog().items()[0]), "A\tx, y\tfirst");
    }

    #[test]
    fn item_details_snapshot() {
        let item = item("Research Lab", "Publish papers and datasets.", &["education", "research"])
            .with_demo_link(Some("https://example.org/demo/research".into()));

        insta::assert_snapshot!(render_item_details(&item), @r###"
        # Research Lab

        Publish papers and datasets.

        image: images/research lab.png
        tags: education, research
        demo: https://example.org/demo/research
        "###);
    }
}
