//! Shortcut and category records as persisted on disk

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Name of the synthetic category that matches every record
pub const ALL_CATEGORIES: &str = "All";

const DEFAULT_CATEGORY_COLOR: &str = "#0078D4";

/// A single keyboard shortcut entry
///
/// Files written by earlier releases use PascalCase names and
/// `CreatedDate`/`LastModified`; those load through the aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShortcutRecord {
    /// Opaque unique id, fixed at creation
    #[serde(alias = "Id")]
    pub id: String,
    #[serde(alias = "Application")]
    pub application: String,
    #[serde(alias = "Category")]
    pub category: String,
    #[serde(alias = "Keys")]
    pub keys: String,
    #[serde(alias = "Description")]
    pub description: String,
    #[serde(alias = "IsVisible")]
    pub is_visible: bool,
    /// Added by the user rather than shipped in a default document
    #[serde(alias = "IsCustom")]
    pub is_custom: bool,
    #[serde(
        alias = "createdDate",
        alias = "CreatedDate",
        deserialize_with = "lenient_timestamp"
    )]
    pub created_at: DateTime<Utc>,
    #[serde(
        alias = "lastModified",
        alias = "LastModified",
        deserialize_with = "lenient_timestamp"
    )]
    pub modified_at: DateTime<Utc>,
}

impl Default for ShortcutRecord {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            application: String::new(),
            category: String::new(),
            keys: String::new(),
            description: String::new(),
            is_visible: true,
            is_custom: false,
            created_at: now,
            modified_at: now,
        }
    }
}

impl ShortcutRecord {
    /// Build a user-created record with a fresh id and timestamps
    pub fn from_new(new: NewShortcut) -> Self {
        let now = Utc::now();
        Self {
            id: fresh_id(),
            application: new.application,
            category: new.category,
            keys: new.keys,
            description: new.description,
            is_visible: new.is_visible,
            is_custom: true,
            created_at: now,
            modified_at: now,
        }
    }

    /// Apply the set fields of a patch and advance `modified_at`
    pub fn apply(&mut self, patch: ShortcutPatch) {
        if let Some(application) = patch.application {
            self.application = application;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(keys) = patch.keys {
            self.keys = keys;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(is_visible) = patch.is_visible {
            self.is_visible = is_visible;
        }
        self.touch();
    }

    /// Advance `modified_at`, strictly, even if the clock has not moved
    fn touch(&mut self) {
        let now = Utc::now();
        self.modified_at = if now > self.modified_at {
            now
        } else {
            self.modified_at + Duration::microseconds(1)
        };
    }

    /// Case-insensitive substring match over the searchable fields
    ///
    /// `needle` must already be lower-cased.
    pub fn matches_search(&self, needle: &str) -> bool {
        [&self.keys, &self.description, &self.application, &self.category]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }

    /// Case-insensitive exact match on the category name
    pub fn in_category(&self, category: &str) -> bool {
        self.category.to_lowercase() == category.to_lowercase()
    }
}

/// Fields supplied when creating a shortcut
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewShortcut {
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub category: String,
    pub keys: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_visible: bool,
}

/// Partial update of a shortcut's mutable fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShortcutPatch {
    pub application: Option<String>,
    pub category: Option<String>,
    pub keys: Option<String>,
    pub description: Option<String>,
    pub is_visible: Option<bool>,
}

/// A named group of shortcuts with display hints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Category {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Color")]
    pub color: String,
    #[serde(alias = "Description")]
    pub description: String,
    #[serde(alias = "IsVisible")]
    pub is_visible: bool,
}

impl Default for Category {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: DEFAULT_CATEGORY_COLOR.to_string(),
            description: String::new(),
            is_visible: true,
        }
    }
}

/// The persisted shortcut document
///
/// Older files hold a bare list of shortcuts; both shapes load.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ShortcutDocument {
    Bare(Vec<ShortcutRecord>),
    Full {
        #[serde(default, alias = "Categories")]
        categories: Vec<Category>,
        #[serde(default, alias = "Shortcuts")]
        shortcuts: Vec<ShortcutRecord>,
    },
}

impl ShortcutDocument {
    pub fn into_parts(self) -> (Vec<ShortcutRecord>, Vec<Category>) {
        match self {
            ShortcutDocument::Full { categories, shortcuts } => (shortcuts, categories),
            ShortcutDocument::Bare(shortcuts) => (shortcuts, Vec::new()),
        }
    }
}

/// Borrowed view used when writing the document back
#[derive(Serialize)]
pub struct ShortcutDocumentRef<'a> {
    pub categories: &'a [Category],
    pub shortcuts: &'a [ShortcutRecord],
}

pub fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_true() -> bool {
    true
}

/// RFC 3339, or a bare local timestamp without offset read as UTC
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}
