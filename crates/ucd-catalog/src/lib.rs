//! Catalog loading and configuration for the dashboard.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ucd_core::{CatalogSource, CoreError, CoreResult, Item, ItemCatalog, Tag};
use ucd_utils::APP_DIR_NAME;

/// Environment variable that points at a catalog file.
pub const CATALOG_ENV_VAR: &str = "UCD_CATALOG";

const CONFIG_FILE_NAME: &str = "config.yaml";

const BUNDLED_CATALOG: &str = include_str!("../data/use-case.json");

/// A shareable catalog source, as handed to the async loader.
pub type SharedSource = Arc<dyn CatalogSource + Send + Sync>;

#[derive(Debug, Deserialize)]
struct ItemRecord {
    name: String,
    description: String,
    image: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, rename = "demoLink", alias = "demo_link")]
    demo_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    List(Vec<ItemRecord>),
    Wrapped { data: Vec<ItemRecord> },
}

impl CatalogDocument {
    fn into_records(self) -> Vec<ItemRecord> {
        match self {
            CatalogDocument::List(records) | CatalogDocument::Wrapped { data: records } => records,
        }
    }
}

/// Parse catalog JSON into items, in file order.
///
/// Accepts a bare array of records or an object with a `data` array.
/// Unknown fields are ignored and empty tags are dropped.
pub fn parse_items(contents: &str) -> CoreResult<Vec<Item>> {
    let document: CatalogDocument =
        serde_json::from_str(contents).map_err(|err| CoreError::Catalog(err.to_string()))?;
    document
        .into_records()
        .into_iter()
        .map(record_to_item)
        .collect()
}

fn record_to_item(record: ItemRecord) -> CoreResult<Item> {
    let mut tags = Vec::with_capacity(record.tags.len());
    for raw in record.tags {
        match Tag::new(raw) {
            Ok(tag) => tags.push(tag),
            Err(_) => warn!(item = %record.name, "dropping empty tag"),
        }
    }
    Ok(Item::new(record.name, record.description, record.image, tags)?.with_demo_link(record.demo_link))
}

/// Catalog stored in a JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CatalogSource for JsonFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> CoreResult<Vec<Item>> {
        let contents = fs::read_to_string(&self.path)
            .map_err(|err| CoreError::Catalog(format!("{}: {err}", self.path.display())))?;
        parse_items(&contents)
    }
}

/// The demo catalog compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledSource;

impl CatalogSource for BundledSource {
    fn describe(&self) -> String {
        "bundled demo catalog".into()
    }

    fn fetch(&self) -> CoreResult<Vec<Item>> {
        parse_items(BUNDLED_CATALOG)
    }
}

/// Fetch a catalog once on the blocking pool, surfacing any failure.
pub async fn fetch_catalog(source: SharedSource) -> CoreResult<ItemCatalog> {
    let description = source.describe();
    debug!(source = %description, "fetching catalog");
    let items = tokio::task::spawn_blocking(move || source.fetch())
        .await
        .map_err(|err| CoreError::Catalog(err.to_string()))??;

    let catalog = ItemCatalog::new(items);
    for name in catalog.duplicate_names() {
        warn!(%name, "duplicate item name; selection by this name is ambiguous");
    }
    info!(source = %description, items = catalog.len(), "catalog loaded");
    Ok(catalog)
}

/// Load a catalog once. Any failure is logged and yields an empty catalog.
pub async fn load_catalog(source: SharedSource) -> ItemCatalog {
    let description = source.describe();
    match fetch_catalog(source).await {
        Ok(catalog) => catalog,
        Err(err) => {
            warn!(source = %description, error = %err, "catalog load failed; continuing with an empty catalog");
            ItemCatalog::empty()
        }
    }
}

/// Persisted user settings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DashboardConfig {
    /// Path to the catalog JSON file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
}

/// Location of the config file (`<config dir>/ucd/config.yaml`).
pub fn config_path() -> CoreResult<PathBuf> {
    if let Some(dir) = dirs::config_dir() {
        return Ok(dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    Err(CoreError::Catalog(
        "unable to determine config directory".into(),
    ))
}

pub fn load_config() -> CoreResult<DashboardConfig> {
    load_config_from(&config_path()?)
}

pub fn save_config(config: &DashboardConfig) -> CoreResult<()> {
    save_config_to(&config_path()?, config)
}

/// Read a config file; a missing file is an empty config.
pub fn load_config_from(path: &Path) -> CoreResult<DashboardConfig> {
    if !path.exists() {
        return Ok(DashboardConfig::default());
    }
    let contents =
        fs::read_to_string(path).map_err(|err| CoreError::Catalog(err.to_string()))?;
    serde_yaml::from_str(&contents).map_err(|err| CoreError::Catalog(err.to_string()))
}

pub fn save_config_to(path: &Path, config: &DashboardConfig) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| CoreError::Catalog(err.to_string()))?;
    }
    let contents =
        serde_yaml::to_string(config).map_err(|err| CoreError::Catalog(err.to_string()))?;
    fs::write(path, contents).map_err(|err| CoreError::Catalog(err.to_string()))?;
    Ok(())
}

/// Remember `path` as the default catalog.
pub fn set_config_catalog(path: &Path) -> CoreResult<()> {
    let mut config = load_config()?;
    config.catalog = Some(path.to_string_lossy().to_string());
    save_config(&config)
}

/// Pick the catalog file: explicit flag, then environment, then config.
///
/// `None` means the bundled catalog should be used.
pub fn choose_catalog_path(
    flag: Option<PathBuf>,
    env_value: Option<String>,
    config: &DashboardConfig,
) -> Option<PathBuf> {
    if flag.is_some() {
        return flag;
    }
    let non_blank = |value: &String| !value.trim().is_empty();
    env_value
        .filter(non_blank)
        .or_else(|| config.catalog.clone().filter(non_blank))
        .map(PathBuf::from)
}

/// Resolve the catalog source for this run.
pub fn resolve_source(flag: Option<PathBuf>) -> CoreResult<SharedSource> {
    let config = load_config()?;
    let env_value = std::env::var(CATALOG_ENV_VAR).ok();
    Ok(match choose_catalog_path(flag, env_value, &config) {
        Some(path) => Arc::new(JsonFileSource::new(path)),
        None => Arc::new(BundledSource),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const WRAPPED: &str = r#"{
        "data": [
            {"name": "A", "description": "first", "image": "a.png", "tags": ["x", "y"], "demoLink": "https://a.example"},
            {"name": "B", "description": "second", "image": "b.png", "tags": ["y"], "rating": 5},
            {"name": "C", "description": "third", "image": "c.png", "tags": ["z", ""]}
        ]
    }"#;

    struct InlineSource(&'static str);

    impl CatalogSource for InlineSource {
        fn describe(&self) -> String {
            "inline catalog".into()
        }

        fn fetch(&self) -> CoreResult<Vec<Item>> {
            parse_items(self.0)
        }
    }

    fn parse_catalog(contents: &str) -> ItemCatalog {
        ItemCatalog::new(parse_items(contents).expect("parse"))
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("runtime")
    }

    #[test]
    fn parses_wrapped_document() {
        let catalog = parse_catalog(WRAPPED);
        let names: Vec<_> = catalog.items().iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(catalog.items()[0].demo_link.as_deref(), Some("https://a.example"));
        assert_eq!(catalog.items()[1].demo_link, None);
    }

    #[test]
    fn parses_bare_array_with_snake_case_link() {
        let json = r#"[{"name": "A", "description": "", "image": "a.png", "demo_link": "https://a.example"}]"#;
        let items = parse_items(json).expect("parse");
        assert_eq!(items.len(), 1);
        assert!(items[0].tags.is_empty());
        assert_eq!(items[0].demo_link.as_deref(), Some("https://a.example"));
    }

    #[test]
    fn drops_empty_tags() {
        let catalog = parse_catalog(WRAPPED);
        let tags: Vec<_> = catalog.items()[2].tags.iter().map(Tag::as_str).collect();
        assert_eq!(tags, vec!["z"]);
    }

    #[test]
    fn rejects_missing_fields_and_bad_json() {
        assert!(matches!(
            parse_items(r#"[{"name": "A"}]"#),
            Err(CoreError::Catalog(_))
        ));
        assert!(matches!(parse_items("not json"), Err(CoreError::Catalog(_))));
        assert!(matches!(
            parse_items(r#"[{"name": " ", "description": "", "image": ""}]"#),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn bundled_catalog_parses() {
        let items = BundledSource.fetch().expect("bundled catalog");
        assert!(!items.is_empty());
        assert!(ItemCatalog::new(items).duplicate_names().is_empty());
    }

    #[test]
    fn file_source_reads_catalog() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("use-case.json");
        fs::write(&path, WRAPPED).expect("write catalog");

        let source: SharedSource = Arc::new(JsonFileSource::new(path));
        let catalog = runtime().block_on(fetch_catalog(source)).expect("fetch");
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn failed_load_yields_empty_catalog() {
        let temp = TempDir::new().expect("temp dir");
        let missing: SharedSource = Arc::new(JsonFileSource::new(temp.path().join("missing.json")));
        let malformed: SharedSource = Arc::new(InlineSource("{\"data\": 3}"));

        let rt = runtime();
        assert!(rt.block_on(load_catalog(missing)).is_empty());
        assert!(rt.block_on(load_catalog(malformed)).is_empty());
    }

    #[test]
    fn config_round_trip() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("nested").join(CONFIG_FILE_NAME);
        assert_eq!(load_config_from(&path).expect("missing config"), DashboardConfig::default());

        let config = DashboardConfig {
            catalog: Some("/srv/catalog.json".into()),
        };
        save_config_to(&path, &config).expect("save");
        assert_eq!(load_config_from(&path).expect("load"), config);
    }

    #[test]
    fn catalog_path_precedence() {
        let config = DashboardConfig {
            catalog: Some("from-config.json".into()),
        };

        assert_eq!(
            choose_catalog_path(Some("flag.json".into()), Some("env.json".into()), &config),
            Some(PathBuf::from("flag.json"))
        );
        assert_eq!(
            choose_catalog_path(None, Some("env.json".into()), &config),
            Some(PathBuf::from("env.json"))
        );
        assert_eq!(
            choose_catalog_path(None, Some("  ".into()), &config),
            Some(PathBuf::from("from-config.json"))
        );
        assert_eq!(
            choose_catalog_path(None, None, &DashboardConfig::default()),
            None
        );
    }
}
