//! Core domain entities and the filter/selection controller for the dashboard.
//!
//! Nothing here renders anything. A view layer reads state from
//! [`FilterController`], calls its operations in response to input, and
//! subscribes to [`ControllerEvent`]s to learn about changes.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use thiserror::Error;
use ucd_utils::{contains_folded, fold_case};

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors returned by core validation and catalog sources.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Returned when a validation rule is violated.
    #[error("validation error: {0}")]
    Validation(String),
    /// Returned when a catalog cannot be read or parsed.
    #[error("catalog error: {0}")]
    Catalog(String),
}

/// A label used to group and filter items.
#[derive(Clone, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Tag {
    value: String,
}

impl Tag {
    /// Create a new tag, rejecting empty or whitespace-only values.
    pub fn new(value: impl Into<String>) -> CoreResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(CoreError::Validation("tag cannot be empty".into()));
        }
        Ok(Self { value })
    }

    /// Access the tag value.
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

/// A single selectable entry in the catalog.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Item {
    /// Display name, also the identity used for selection.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Image path or URL shown on the card.
    pub image: String,
    /// Tags used by the sidebar filter.
    pub tags: Vec<Tag>,
    /// Optional link to a live demo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_link: Option<String>,
}

impl Item {
    /// Create a new item, validating the name and removing duplicate tags.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        image: impl Into<String>,
        tags: Vec<Tag>,
    ) -> CoreResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::Validation("item name cannot be empty".into()));
        }

        let mut seen = HashSet::new();
        let tags = tags
            .into_iter()
            .filter(|tag| seen.insert(tag.clone()))
            .collect();

        Ok(Self {
            name,
            description: description.into(),
            image: image.into(),
            tags,
            demo_link: None,
        })
    }

    /// Attach a demo link. Blank links are treated as absent.
    #[must_use]
    pub fn with_demo_link(mut self, link: Option<String>) -> Self {
        self.demo_link = link.filter(|link| !link.trim().is_empty());
        self
    }

    /// True when `query` (already lower-cased) occurs in the name or description.
    pub fn matches_search(&self, query: &str) -> bool {
        contains_folded(&self.name, query) || contains_folded(&self.description, query)
    }

    /// True when no tags are required, or the item carries at least one of them.
    pub fn matches_tags(&self, active: &BTreeSet<String>) -> bool {
        active.is_empty() || self.tags.iter().any(|tag| active.contains(tag.as_str()))
    }

    /// The dashboard filter: search and tags must both match.
    pub fn matches_filters(&self, search: &str, active: &BTreeSet<String>) -> bool {
        self.matches_search(search) && self.matches_tags(active)
    }
}

/// The full, unfiltered list of items. Never mutated after construction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemCatalog {
    items: Vec<Item>,
}

impl ItemCatalog {
    /// Wrap a list of items, keeping their order.
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    /// A catalog with no items, used until a load completes or after it fails.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up the first item with the given name.
    pub fn get(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Union of tags across every item, deduplicated and sorted.
    pub fn tags(&self) -> BTreeSet<String> {
        self.items
            .iter()
            .flat_map(|item| item.tags.iter())
            .map(|tag| tag.as_str().to_string())
            .collect()
    }

    /// Names shared by more than one item, in first-seen order.
    pub fn duplicate_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        let mut duplicates = Vec::new();
        for item in &self.items {
            if !seen.insert(item.name.as_str()) && reported.insert(item.name.as_str()) {
                duplicates.push(item.name.clone());
            }
        }
        duplicates
    }
}

/// Provider of catalog items, read once at startup.
pub trait CatalogSource {
    /// Human-readable description of where items come from.
    fn describe(&self) -> String;
    /// Read and parse the items.
    fn fetch(&self) -> CoreResult<Vec<Item>>;
}

/// Single-item selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    /// Nothing chosen; the continue action is disabled.
    #[default]
    Unselected,
    /// The named item is chosen.
    Selected(String),
}

impl Selection {
    /// Apply a select event: same name clears, any other name replaces.
    pub fn toggle(&mut self, name: &str) {
        *self = match self {
            Selection::Selected(current) if current == name => Selection::Unselected,
            _ => Selection::Selected(name.to_string()),
        };
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Selection::Unselected => None,
            Selection::Selected(name) => Some(name),
        }
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.name() == Some(name)
    }
}

/// Search text, required tags and the current selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    search_text: String,
    active_tags: BTreeSet<String>,
    selection: Selection,
}

impl FilterState {
    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn active_tags(&self) -> &BTreeSet<String> {
        &self.active_tags
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }
}

/// Items of `catalog` matching both the search text and the tag filter, in catalog order.
///
/// `search` must already be lower-cased. An empty search and an empty tag set
/// each match everything.
pub fn filter_items<'a>(
    catalog: &'a ItemCatalog,
    search: &str,
    tags: &BTreeSet<String>,
) -> Vec<&'a Item> {
    catalog
        .items()
        .iter()
        .filter(|item| item.matches_filters(search, tags))
        .collect()
}

/// Notifications delivered to subscribers after a state change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControllerEvent {
    /// A freshly loaded catalog replaced the previous one.
    CatalogReplaced { items: usize },
    /// Search text or tag filters changed.
    FiltersChanged { results: usize },
    /// The selection changed; `None` means nothing is selected.
    SelectionChanged { selected: Option<String> },
    /// The user confirmed the selected item.
    SelectionConfirmed { name: String },
}

/// Receiver of [`ControllerEvent`]s.
pub trait ControllerListener {
    fn on_event(&mut self, event: &ControllerEvent);
}

impl<F> ControllerListener for F
where
    F: FnMut(&ControllerEvent),
{
    fn on_event(&mut self, event: &ControllerEvent) {
        self(event);
    }
}

/// Handle returned by [`FilterController::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Owns the catalog, the filter state and the derived filtered view.
///
/// All mutation goes through `&mut self`, so callers that share a controller
/// across threads must wrap it in a lock.
pub struct FilterController {
    catalog: ItemCatalog,
    state: FilterState,
    filtered: Vec<usize>,
    listeners: Vec<(SubscriptionId, Box<dyn ControllerListener>)>,
    next_subscription: u64,
}

impl Default for FilterController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FilterController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterController")
            .field("catalog", &self.catalog.len())
            .field("state", &self.state)
            .field("filtered", &self.filtered.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl FilterController {
    /// A controller over an empty catalog with empty filters.
    pub fn new() -> Self {
        Self::with_catalog(ItemCatalog::empty())
    }

    pub fn with_catalog(catalog: ItemCatalog) -> Self {
        let mut controller = Self {
            catalog,
            state: FilterState::default(),
            filtered: Vec::new(),
            listeners: Vec::new(),
            next_subscription: 0,
        };
        controller.recompute();
        controller
    }

    /// Register a listener for state changes.
    pub fn subscribe(&mut self, listener: impl ControllerListener + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Swap in a newly loaded catalog and recompute the view once.
    ///
    /// A selection naming an item that no longer exists is cleared.
    pub fn replace_catalog(&mut self, catalog: ItemCatalog) {
        self.catalog = catalog;
        let stale = self
            .state
            .selection
            .name()
            .is_some_and(|name| self.catalog.get(name).is_none());
        self.recompute();
        self.emit(&ControllerEvent::CatalogReplaced {
            items: self.catalog.len(),
        });
        if stale {
            self.state.selection = Selection::Unselected;
            self.emit(&ControllerEvent::SelectionChanged { selected: None });
        }
    }

    pub fn set_search_text(&mut self, text: &str) {
        self.state.search_text = fold_case(text);
        self.filters_changed();
    }

    /// Add the tag to the active set, or remove it if already present.
    pub fn toggle_tag(&mut self, tag: &str) {
        if !self.state.active_tags.remove(tag) {
            self.state.active_tags.insert(tag.to_string());
        }
        self.filters_changed();
    }

    /// Clear the tag filters. The search text is kept.
    pub fn reset_filters(&mut self) {
        self.state.active_tags.clear();
        self.filters_changed();
    }

    /// Toggle the selection of `name`.
    pub fn select_item(&mut self, name: &str) {
        self.state.selection.toggle(name);
        let selected = self.state.selection.name().map(str::to_string);
        self.emit(&ControllerEvent::SelectionChanged { selected });
    }

    /// Signal the selected item to subscribers and return its name.
    ///
    /// Does nothing and returns `None` when no item is selected.
    pub fn confirm_selection(&mut self) -> Option<String> {
        let name = self.state.selection.name()?.to_string();
        self.emit(&ControllerEvent::SelectionConfirmed { name: name.clone() });
        Some(name)
    }

    /// Whether the continue action is enabled.
    pub fn can_confirm(&self) -> bool {
        self.state.selection.name().is_some()
    }

    /// The filtered view, in catalog order.
    pub fn filtered_items(&self) -> Vec<&Item> {
        self.filtered
            .iter()
            .filter_map(|&index| self.catalog.items().get(index))
            .collect()
    }

    pub fn result_count(&self) -> usize {
        self.filtered.len()
    }

    /// Every tag in the catalog, regardless of the current filters.
    pub fn available_tags(&self) -> BTreeSet<String> {
        self.catalog.tags()
    }

    /// Tags to list in the filter sidebar.
    ///
    /// A tag is listed when it contains the search text, or when it is active
    /// so that it can still be unticked.
    pub fn visible_tags(&self) -> Vec<String> {
        self.available_tags()
            .into_iter()
            .filter(|tag| {
                self.state.active_tags.contains(tag)
                    || contains_folded(tag, &self.state.search_text)
            })
            .collect()
    }

    pub fn is_tag_active(&self, tag: &str) -> bool {
        self.state.active_tags.contains(tag)
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.state.selection.is_selected(name)
    }

    pub fn search_text(&self) -> &str {
        self.state.search_text()
    }

    pub fn active_tags(&self) -> &BTreeSet<String> {
        self.state.active_tags()
    }

    pub fn selection(&self) -> &Selection {
        self.state.selection()
    }

    pub fn catalog(&self) -> &ItemCatalog {
        &self.catalog
    }

    fn filters_changed(&mut self) {
        self.recompute();
        self.emit(&ControllerEvent::FiltersChanged {
            results: self.filtered.len(),
        });
    }

    fn recompute(&mut self) {
        let search = self.state.search_text.as_str();
        let tags = &self.state.active_tags;
        self.filtered = self
            .catalog
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| item.matches_filters(search, tags))
            .map(|(index, _)| index)
            .collect();
    }

    fn emit(&mut self, event: &ControllerEvent) {
        for (_, listener) in &mut self.listeners {
            listener.on_event(event);
        }
    }
}
