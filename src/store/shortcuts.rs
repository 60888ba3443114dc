//! In-memory shortcut collection with JSON persistence

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::record::{
    fresh_id, Category, NewShortcut, ShortcutDocument, ShortcutDocumentRef, ShortcutPatch,
    ShortcutRecord, ALL_CATEGORIES,
};
use super::writer::{PersistQueue, SaveTicket};

/// Default document compiled into the binary
const EMBEDDED_DOCUMENT: &str = include_str!("../../resources/shortcuts.json");

/// Errors reading a shortcut document
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed shortcut document {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where the loaded collection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    /// The user's own document
    User,
    /// The document shipped next to the executable
    Bundled,
    /// The document compiled into the binary
    Embedded,
    /// Nothing usable was found
    Empty,
}

/// Owns the shortcut records and categories
pub struct ShortcutStore {
    path: PathBuf,
    records: Vec<ShortcutRecord>,
    categories: Vec<Category>,
    source: LoadSource,
    queue: PersistQueue,
}

impl ShortcutStore {
    /// Load the collection, falling back through bundled and embedded defaults
    ///
    /// Missing or malformed documents are skipped, never returned as errors.
    pub async fn load(path: PathBuf, bundled: Option<&Path>, queue: PersistQueue) -> Self {
        let mut candidates: Vec<(LoadSource, &Path)> = vec![(LoadSource::User, path.as_path())];
        if let Some(bundled) = bundled {
            candidates.push((LoadSource::Bundled, bundled));
        }

        let mut loaded = None;
        for (source, candidate) in candidates {
            match read_document(candidate).await {
                Ok(Some(document)) => {
                    loaded = Some((source, document));
                    break;
                }
                Ok(None) => debug!(path = %candidate.display(), "no shortcut document"),
                Err(e) => warn!(error = %e, "ignoring unreadable shortcut document"),
            }
        }

        let (source, document) = match loaded {
            Some(found) => found,
            None => match serde_json::from_str::<ShortcutDocument>(EMBEDDED_DOCUMENT) {
                Ok(document) => (LoadSource::Embedded, document),
                Err(e) => {
                    warn!(error = %e, "embedded shortcut document is malformed");
                    (LoadSource::Empty, ShortcutDocument::Bare(Vec::new()))
                }
            },
        };

        let (records, categories) = document.into_parts();
        Self::from_parts(path, records, categories, source, queue)
    }

    /// Build a store from records already in memory
    pub fn from_parts(
        path: PathBuf,
        mut records: Vec<ShortcutRecord>,
        categories: Vec<Category>,
        source: LoadSource,
        queue: PersistQueue,
    ) -> Self {
        assign_missing_ids(&mut records);

        info!(
            ?source,
            shortcuts = records.len(),
            categories = categories.len(),
            "shortcut collection loaded"
        );

        Self {
            path,
            records,
            categories,
            source,
            queue,
        }
    }

    /// Where the current collection was loaded from
    pub fn source(&self) -> LoadSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persisted categories, in document order
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&ShortcutRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Category names for a picker: `All`, then every distinct name sorted
    pub fn category_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names: Vec<String> = self
            .categories
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.records.iter().map(|r| r.category.as_str()))
            .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case(ALL_CATEGORIES))
            .filter(|name| seen.insert(name.to_lowercase()))
            .map(str::to_string)
            .collect();
        names.sort_by_key(|name| name.to_lowercase());

        let mut all = Vec::with_capacity(names.len() + 1);
        all.push(ALL_CATEGORIES.to_string());
        all.extend(names);
        all
    }

    /// Records matching a category and a search term, in insertion order
    ///
    /// An unset, empty or `All` category matches everything, as does a
    /// blank search term. Both filters must pass.
    pub fn query(&self, category: Option<&str>, search: Option<&str>) -> Vec<ShortcutRecord> {
        let category = category
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(ALL_CATEGORIES));
        let needle = search
            .filter(|s| !s.trim().is_empty())
            .map(str::to_lowercase);

        self.records
            .iter()
            .filter(|r| category.map_or(true, |c| r.in_category(c)))
            .filter(|r| needle.as_deref().map_or(true, |n| r.matches_search(n)))
            .cloned()
            .collect()
    }

    /// Append a new record and persist
    pub fn add(&mut self, new: NewShortcut) -> (ShortcutRecord, SaveTicket) {
        let record = ShortcutRecord::from_new(new);
        info!(id = %record.id, keys = %record.keys, "shortcut added");
        self.records.push(record.clone());
        (record, self.save())
    }

    /// Patch the record with `id` and persist; unknown ids are a no-op
    pub fn update(&mut self, id: &str, patch: ShortcutPatch) -> Option<(ShortcutRecord, SaveTicket)> {
        let Some(record) = self.records.iter_mut().find(|r| r.id == id) else {
            debug!(id, "update for unknown shortcut ignored");
            return None;
        };
        record.apply(patch);
        let updated = record.clone();
        info!(id, "shortcut updated");
        Some((updated, self.save()))
    }

    /// Drop the record with `id` and persist
    pub fn remove(&mut self, id: &str) -> (bool, SaveTicket) {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        let removed = self.records.len() != before;
        if removed {
            info!(id, "shortcut removed");
        }
        (removed, self.save())
    }

    /// Queue the full document for writing
    pub fn save(&self) -> SaveTicket {
        let document = ShortcutDocumentRef {
            categories: &self.categories,
            shortcuts: &self.records,
        };
        self.queue.write_json(&self.path, &document)
    }
}

/// Read and parse one document; `Ok(None)` when the file does not exist
async fn read_document(path: &Path) -> Result<Option<ShortcutDocument>, StoreError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_owned(),
                source,
            })
        }
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StoreError::Parse {
            path: path.to_owned(),
            source,
        })
}

/// Give every record without an id, or with a repeated one, a fresh id
fn assign_missing_ids(records: &mut [ShortcutRecord]) {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records.iter_mut() {
        if record.id.is_empty() || !seen.insert(record.id.clone()) {
            if !record.id.is_empty() {
                warn!(id = %record.id, "duplicate shortcut id replaced");
            }
            record.id = fresh_id();
            seen.insert(record.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(category: &str, application: &str, keys: &str, description: &str) -> ShortcutRecord {
        ShortcutRecord {
            id: String::new(),
            application: application.into(),
            category: category.into(),
            keys: keys.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    fn sample_store(path: PathBuf, queue: PersistQueue) -> ShortcutStore {
        let records = vec![
            record("Browser", "Chrome/Edge", "Ctrl + T", "New Tab"),
            record("Office", "Word/Excel", "Ctrl + B", "Bold"),
            record("Browser", "Chrome/Edge", "Ctrl + W", "Close Tab"),
            record("VS Code", "Visual Studio Code", "Ctrl + P", "Quick Open"),
        ];
        ShortcutStore::from_parts(path, records, Vec::new(), LoadSource::User, queue)
    }

    fn ids(records: &[ShortcutRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_unfiltered_query_keeps_load_order() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _task) = PersistQueue::spawn();
        let store = sample_store(dir.path().join("shortcuts.json"), queue);

        let all = store.query(None, None);
        let keys: Vec<&str> = all.iter().map(|r| r.keys.as_str()).collect();
        assert_eq!(keys, ["Ctrl + T", "Ctrl + B", "Ctrl + W", "Ctrl + P"]);

        assert_eq!(ids(&store.query(Some("All"), None)), ids(&all));
        assert_eq!(ids(&store.query(Some("all"), Some("  "))), ids(&all));
        assert_eq!(ids(&store.query(Some(""), Some(""))), ids(&all));
    }

    #[tokio::test]
    async fn test_category_and_search_compose() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _task) = PersistQueue::spawn();
        let store = sample_store(dir.path().join("shortcuts.json"), queue);

        let browser = store.query(Some("browser"), None);
        assert_eq!(browser.len(), 2);

        let closing = store.query(Some("Browser"), Some("CLOSE"));
        assert_eq!(closing.len(), 1);
        assert_eq!(closing[0].description, "Close Tab");

        // Matches the application field, but not within the category
        assert!(store.query(Some("Office"), Some("visual")).is_empty());
        assert_eq!(store.query(None, Some("visual")).len(), 1);
        // Category text is searchable too
        assert_eq!(store.query(None, Some("vs code")).len(), 1);
    }

    #[tokio::test]
    async fn test_category_names_are_synthetic_all_then_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _task) = PersistQueue::spawn();
        let mut store = sample_store(dir.path().join("shortcuts.json"), queue);
        store.categories.push(Category {
            name: "browser".into(),
            ..Default::default()
        });

        assert_eq!(store.category_names(), ["All", "browser", "Office", "VS Code"]);
    }

    #[tokio::test]
    async fn test_missing_files_fall_back_to_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _task) = PersistQueue::spawn();
        let bundled = dir.path().join("Resources").join("shortcuts.json");

        let store = ShortcutStore::load(dir.path().join("shortcuts.json"), Some(&bundled), queue).await;

        assert_eq!(store.source(), LoadSource::Embedded);
        assert!(!store.is_empty());
        assert!(store.categories().iter().any(|c| c.name == "Windows System"));
        let unique: HashSet<&str> = store.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(unique.len(), store.len());
    }

    #[tokio::test]
    async fn test_malformed_user_document_falls_through_to_bundled() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _task) = PersistQueue::spawn();
        let user = dir.path().join("shortcuts.json");
        let bundled = dir.path().join("bundled.json");
        std::fs::write(&user, "{ not json").unwrap();
        std::fs::write(&bundled, r#"[{"keys":"Win + L","category":"Windows System"}]"#).unwrap();

        let store = ShortcutStore::load(user, Some(&bundled), queue).await;

        assert_eq!(store.source(), LoadSource::Bundled);
        assert_eq!(store.len(), 1);
        assert_eq!(store.query(None, None)[0].keys, "Win + L");
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_replaced_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _task) = PersistQueue::spawn();
        let user = dir.path().join("shortcuts.json");
        std::fs::write(
            &user,
            r#"{"shortcuts":[{"id":"same","keys":"A"},{"id":"same","keys":"B"},{"keys":"C"}]}"#,
        )
        .unwrap();

        let store = ShortcutStore::load(user, None, queue).await;

        let all = store.query(None, None);
        assert_eq!(all[0].id, "same");
        assert_ne!(all[1].id, "same");
        assert!(!all[2].id.is_empty());
    }

    #[tokio::test]
    async fn test_legacy_pascal_case_document_keeps_its_data() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _task) = PersistQueue::spawn();
        let user = dir.path().join("shortcuts.json");
        std::fs::write(
            &user,
            r##"{"Categories":[{"Name":"Browser","Color":"#fff"}],
                "Shortcuts":[{"Id":"abc","Application":"Chrome","Category":"Browser",
                "Keys":"Ctrl + T","Description":"New Tab","CreatedDate":"2024-01-02T03:04:05"}]}"##,
        )
        .unwrap();

        let store = ShortcutStore::load(user.clone(), None, queue).await;

        assert_eq!(store.source(), LoadSource::User);
        assert_eq!(store.categories()[0].name, "Browser");
        let browser = store.query(Some("Browser"), None);
        assert_eq!(browser.len(), 1);
        assert_eq!(browser[0].id, "abc");
        assert_eq!(browser[0].keys, "Ctrl + T");

        // Written back in the current layout without losing anything
        store.save().wait().await.unwrap();
        let raw = std::fs::read_to_string(&user).unwrap();
        assert!(raw.contains("\"keys\": \"Ctrl + T\""));
        assert!(raw.contains("\"id\": \"abc\""));
    }

    #[tokio::test]
    async fn test_update_changes_fields_and_advances_modified_at() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _task) = PersistQueue::spawn();
        let mut store = sample_store(dir.path().join("shortcuts.json"), queue);

        for original in store.query(None, None) {
            let patch = ShortcutPatch {
                description: Some("X".into()),
                ..Default::default()
            };
            let (_, ticket) = store.update(&original.id, patch).unwrap();
            ticket.detach();

            let current = store.get(&original.id).unwrap();
            assert_eq!(current.description, "X");
            assert_eq!(current.keys, original.keys);
            assert!(current.modified_at > original.modified_at);
        }
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shortcuts.json");
        let (queue, _task) = PersistQueue::spawn();
        let mut store = sample_store(path.clone(), queue.clone());

        assert!(store.update("missing", ShortcutPatch::default()).is_none());
        queue.flush().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_add_and_remove_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shortcuts.json");
        let (queue, _task) = PersistQueue::spawn();
        let mut store = sample_store(path.clone(), queue.clone());

        let (added, ticket) = store.add(NewShortcut {
            application: "Terminal".into(),
            category: "Shell".into(),
            keys: "Ctrl + R".into(),
            description: "Reverse search".into(),
            is_visible: true,
        });
        ticket.wait().await.unwrap();
        assert!(added.is_custom);

        let reloaded = ShortcutStore::load(path.clone(), None, queue.clone()).await;
        assert_eq!(reloaded.source(), LoadSource::User);
        assert_eq!(reloaded.get(&added.id), Some(&added));
        assert_eq!(reloaded.query(None, None).last().unwrap().id, added.id);

        let (removed, ticket) = store.remove(&added.id);
        assert!(removed);
        ticket.wait().await.unwrap();
        assert!(store.query(None, None).iter().all(|r| r.id != added.id));

        let reloaded = ShortcutStore::load(path, None, queue).await;
        assert!(reloaded.get(&added.id).is_none());
        assert_eq!(reloaded.len(), 4);
    }

    #[tokio::test]
    async fn test_saved_document_has_categories_and_shortcuts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shortcuts.json");
        let (queue, _task) = PersistQueue::spawn();
        let store = sample_store(path.clone(), queue);

        store.save().wait().await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["categories"].is_array());
        assert_eq!(value["shortcuts"].as_array().unwrap().len(), 4);
        assert!(raw.contains("\n  "), "document should be indented");
    }
}
