//! Content store backing the sync API.
//!
//! Posts, pages and attachments are all stored as [`ContentObject`] records
//! under `content/posts/` and share one id sequence. Terms live under
//! `content/terms/<taxonomy>/` with their own sequence. Uploaded file bytes
//! are kept separately under `media/files/<id>`.
//!
//! Every mutation holds the store-wide write lock, so id allocation, slug
//! uniqueness and file name uniqueness checks cannot race.

pub mod media;
pub mod posts;
pub mod site;
pub mod taxonomy;
pub mod users;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use forge_storage::StorageBackend;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::ContentError;
use crate::sanitize;

pub use media::{
    MediaFetcher, MediaFile, MediaList, MediaQuery, MediaUpdate, MediaUpload, MediaView,
};
pub use posts::{DeleteOutcome, PostInput, PostList, PostQuery, PostVerification, PostView};
pub use site::{PostStatus, PostTypeView, SiteInfo, normalize_post_type};
pub use taxonomy::{Taxonomy, Term, TermInput, TermView};
pub use users::{User, UserView};

const OBJECT_PREFIX: &str = "content/posts/";
const OBJECT_SEQUENCE: &str = "sys/sequence/object";
const TERM_SEQUENCE: &str = "sys/sequence/term";
const FILE_PREFIX: &str = "media/files/";

/// Stored date format, local and GMT alike.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// File metadata carried by attachments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentFile {
    pub filename: String,
    pub mime_type: String,
    pub file_size: u64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// A stored post, page or attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentObject {
    pub id: u64,
    #[serde(rename = "type")]
    pub object_type: String,
    pub status: String,
    pub title: String,
    pub slug: String,
    pub author: u64,
    pub content: String,
    pub excerpt: String,
    pub date: String,
    pub date_gmt: String,
    pub modified: String,
    pub modified_gmt: String,
    #[serde(default)]
    pub categories: Vec<u64>,
    #[serde(default)]
    pub tags: Vec<u64>,
    #[serde(default)]
    pub featured_media: Option<u64>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentFile>,
}

impl ContentObject {
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.object_type == site::ATTACHMENT_TYPE
    }
}

/// Everything Forge needs for a full sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSnapshot {
    pub site: SiteInfo,
    pub categories: Vec<TermView>,
    pub tags: Vec<TermView>,
    pub users: Vec<UserView>,
    pub post_types: Vec<PostTypeView>,
    pub post_statuses: Vec<PostStatus>,
    pub media_count: u64,
}

/// The content store.
pub struct ContentStore {
    storage: Arc<dyn StorageBackend>,
    site: SiteInfo,
    users: Vec<User>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("home", &self.site.home)
            .field("users", &self.users.len())
            .finish_non_exhaustive()
    }
}

impl ContentStore {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, site: SiteInfo, users: Vec<User>) -> Self {
        Self {
            storage,
            site,
            users,
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn site(&self) -> &SiteInfo {
        &self.site
    }

    /// Registered public post types (attachments excluded) with the number
    /// of published entries of each.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError`] if stored objects cannot be read.
    pub async fn post_types(&self) -> Result<Vec<PostTypeView>, ContentError> {
        let objects = self.all_objects().await?;
        Ok(site::POST_TYPES
            .iter()
            .filter(|def| def.public && !def.internal)
            .map(|def| {
                let count = objects
                    .iter()
                    .filter(|o| o.object_type == def.slug && o.status == "publish")
                    .count();
                PostTypeView::new(def, count as u64)
            })
            .collect())
    }

    #[must_use]
    pub fn post_statuses(&self) -> Vec<PostStatus> {
        site::POST_STATUSES.to_vec()
    }

    /// Attachments not in the trash.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError`] if stored objects cannot be read.
    pub async fn media_count(&self) -> Result<u64, ContentError> {
        let objects = self.all_objects().await?;
        Ok(objects
            .iter()
            .filter(|o| o.is_attachment() && o.status != site::TRASH_STATUS)
            .count() as u64)
    }

    /// Site data, terms, authors, types and statuses in one payload.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError`] if stored content cannot be read.
    pub async fn sync(&self) -> Result<SyncSnapshot, ContentError> {
        Ok(SyncSnapshot {
            site: self.site.clone(),
            categories: self.list_terms(Taxonomy::Category).await?,
            tags: self.list_terms(Taxonomy::Tag).await?,
            users: self.list_authors(),
            post_types: self.post_types().await?,
            post_statuses: self.post_statuses(),
            media_count: self.media_count().await?,
        })
    }

    // Storage helpers shared by the submodules.

    fn object_key(id: u64) -> String {
        format!("{OBJECT_PREFIX}{id:010}")
    }

    fn file_key(id: u64) -> String {
        format!("{FILE_PREFIX}{id}")
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ContentError> {
        match self.storage.get(key).await? {
            Some(bytes) => decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn load_object(&self, id: u64) -> Result<Option<ContentObject>, ContentError> {
        self.load(&Self::object_key(id)).await
    }

    async fn all_objects(&self) -> Result<Vec<ContentObject>, ContentError> {
        let keys = self.storage.list(OBJECT_PREFIX).await?;
        let mut objects = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(object) = self.load(&key).await? {
                objects.push(object);
            }
        }
        Ok(objects)
    }

    async fn save_object(&self, object: &ContentObject) -> Result<(), ContentError> {
        let key = Self::object_key(object.id);
        self.storage.put(&key, &encode(&key, object)?).await?;
        Ok(())
    }

    /// Next value of a sequence. Not persisted until the caller writes it
    /// back together with the record that uses it.
    async fn next_in_sequence(&self, sequence: &str) -> Result<u64, ContentError> {
        let current = match self.storage.get(sequence).await? {
            Some(bytes) => String::from_utf8_lossy(&bytes)
                .trim()
                .parse::<u64>()
                .map_err(|e| ContentError::Corrupt {
                    key: sequence.to_owned(),
                    reason: e.to_string(),
                })?,
            None => 0,
        };
        Ok(current + 1)
    }

    /// Assign the next object id to `object` and persist both atomically.
    async fn insert_object(&self, object: &mut ContentObject) -> Result<(), ContentError> {
        self.insert_object_with(object, |_| Vec::new()).await
    }

    /// Like [`Self::insert_object`], also writing the entries `extra`
    /// builds from the new id in the same batch.
    async fn insert_object_with<F>(
        &self,
        object: &mut ContentObject,
        extra: F,
    ) -> Result<(), ContentError>
    where
        F: FnOnce(u64) -> Vec<(String, Vec<u8>)> + Send,
    {
        let id = self.next_in_sequence(OBJECT_SEQUENCE).await?;
        object.id = id;
        let key = Self::object_key(id);
        let bytes = encode(&key, object)?;
        let mut batch = vec![
            (OBJECT_SEQUENCE.to_owned(), id.to_string().into_bytes()),
            (key, bytes),
        ];
        batch.extend(extra(id));
        self.storage.put_batch(&batch).await?;
        Ok(())
    }

    /// Current local and GMT timestamps.
    fn now_dates(&self) -> (String, String) {
        let now = Utc::now();
        let local = now + Duration::seconds(i64::from(self.site.utc_offset_secs));
        (
            local.format(DATE_FORMAT).to_string(),
            now.format(DATE_FORMAT).to_string(),
        )
    }

    /// Convert a local date string to the stored local and GMT pair.
    fn dates_from_local(&self, raw: &str) -> Option<(String, String)> {
        let local = parse_local_date(raw)?;
        let gmt = local - Duration::seconds(i64::from(self.site.utc_offset_secs));
        Some((
            local.format(DATE_FORMAT).to_string(),
            gmt.format(DATE_FORMAT).to_string(),
        ))
    }
}

/// Accepts `YYYY-MM-DD HH:MM:SS`, the `T`-separated form, or RFC 3339.
fn parse_local_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, ContentError> {
    serde_json::from_slice(bytes).map_err(|e| ContentError::Corrupt {
        key: key.to_owned(),
        reason: e.to_string(),
    })
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, ContentError> {
    serde_json::to_vec(value).map_err(|e| ContentError::Corrupt {
        key: key.to_owned(),
        reason: e.to_string(),
    })
}

/// Slice one page out of `items`. Pages are 1-based; page 0 reads as 1.
fn paginate<T>(items: Vec<T>, page: u64, per_page: u64) -> (Vec<T>, u64, u64) {
    let total = items.len() as u64;
    let per_page = per_page.max(1);
    let total_pages = total.div_ceil(per_page);
    let skip = usize::try_from((page.max(1) - 1).saturating_mul(per_page)).unwrap_or(usize::MAX);
    let take = usize::try_from(per_page).unwrap_or(usize::MAX);
    let slice = items.into_iter().skip(skip).take(take).collect();
    (slice, total, total_pages)
}

/// Text form of a JSON scalar, empty for arrays, objects and null.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "1".to_owned(),
        _ => String::new(),
    }
}

/// Whether a JSON value counts as "set": not null, false, 0, "" or "0".
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Deserialize any scalar into a non-negative integer, the lenient way.
fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.map(|v| sanitize::absint(&v)))
}

/// Keep explicit `null` as `Some(Value::Null)` so callers can tell it from
/// an absent field.
fn present<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(d).map(Some)
}

/// Case-insensitive substring match over several fields.
fn matches_search(needle: &str, haystacks: &[&str]) -> bool {
    let needle = needle.to_lowercase();
    haystacks.iter().any(|h| h.to_lowercase().contains(&needle))
}
