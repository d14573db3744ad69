//! Posts and pages.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::media::ImageSize;
use super::site::{self, TRASH_STATUS};
use super::taxonomy::{DEFAULT_CATEGORY_ID, Taxonomy, Term, TermRef};
use super::{
    ContentObject, ContentStore, is_truthy, lenient_u64, matches_search, paginate, present,
    scalar_text,
};
use crate::error::ContentError;
use crate::sanitize;

/// Meta key remembering the status a post had before it was trashed.
pub const TRASH_META_STATUS: &str = "_wp_trash_meta_status";

/// SEO meta keys always present in post responses.
pub const SEO_META_KEYS: &[&str] = &[
    "_yoast_wpseo_title",
    "_yoast_wpseo_metadesc",
    "_yoast_wpseo_focuskw",
    "rank_math_title",
    "rank_math_description",
    "rank_math_focus_keyword",
];

const DEFAULT_PER_PAGE: u64 = 100;
const MAX_PER_PAGE: u64 = 100;

/// Query parameters for listing posts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostQuery {
    #[serde(default)]
    pub post_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub per_page: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub page: Option<u64>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub orderby: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
}

/// Body of a create or update request. Absent fields are left alone on
/// update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub post_type: Option<String>,
    #[serde(default)]
    pub author: Option<Value>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub categories: Option<Value>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub featured_media: Option<Value>,
    #[serde(default)]
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeaturedMedia {
    pub id: u64,
    pub url: String,
    pub sizes: BTreeMap<String, ImageSize>,
}

/// A post as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub id: u64,
    pub title: String,
    pub slug: String,
    pub status: String,
    #[serde(rename = "type")]
    pub post_type: String,
    pub url: String,
    pub author: AuthorRef,
    pub date: String,
    pub date_gmt: String,
    pub modified: String,
    pub modified_gmt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    pub categories: Vec<TermRef>,
    pub tags: Vec<TermRef>,
    pub featured_media: Option<FeaturedMedia>,
    pub meta: BTreeMap<String, String>,
}

/// One page of posts.
#[derive(Debug, Clone, Serialize)]
pub struct PostList {
    pub posts: Vec<PostView>,
    pub total: u64,
    pub total_pages: u64,
    pub page: u64,
    /// The requested page size, echoed back unclamped.
    pub per_page: u64,
}

/// Result of a post existence check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostVerification {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub post_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Trashed,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderBy {
    Date,
    Title,
    Modified,
    Id,
}

impl OrderBy {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "title" => Self::Title,
            "modified" => Self::Modified,
            "id" => Self::Id,
            _ => Self::Date,
        }
    }
}

/// Terms looked up once per request.
struct TermIndex {
    categories: HashMap<u64, Term>,
    tags: HashMap<u64, Term>,
}

impl TermIndex {
    fn refs(map: &HashMap<u64, Term>, ids: &[u64]) -> Vec<TermRef> {
        ids.iter()
            .filter_map(|id| map.get(id))
            .map(Term::reference)
            .collect()
    }
}

/// Pull term ids out of a JSON array. `None` if the value is not an array.
fn id_list(value: Option<&Value>) -> Option<Vec<u64>> {
    match value? {
        Value::Array(items) => Some(items.iter().map(sanitize::absint).collect()),
        _ => None,
    }
}

/// `base`, or `base-2`, `base-3`, ... until no other post of the type uses it.
pub(super) fn unique_slug(
    base: &str,
    post_type: &str,
    exclude: u64,
    objects: &[ContentObject],
) -> String {
    let taken = |candidate: &str| {
        objects
            .iter()
            .any(|o| o.id != exclude && o.object_type == post_type && o.slug == candidate)
    };
    if !taken(base) {
        return base.to_owned();
    }
    (2u64..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_owned())
}

fn sanitized_meta(meta: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Object(map)) = meta else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(k, v)| {
            let key = sanitize::sanitize_key(k);
            (!key.is_empty()).then(|| (key, sanitize::sanitize_text_field(&scalar_text(v))))
        })
        .collect()
}

fn invalid_status(status: &str) -> ContentError {
    ContentError::invalid("invalid_status", format!("Post status \"{status}\" is not allowed."))
}

impl ContentStore {
    /// Public URL of an object: pretty for published content, `?p=` otherwise.
    #[must_use]
    pub fn permalink(&self, object: &ContentObject) -> String {
        let home = self.site.home_base();
        if object.status == "publish" && !object.slug.is_empty() {
            format!("{home}/{}/", object.slug)
        } else {
            format!("{home}/?p={}", object.id)
        }
    }

    async fn term_index(&self) -> Result<TermIndex, ContentError> {
        let collect = |terms: Vec<Term>| -> HashMap<u64, Term> {
            terms.into_iter().map(|t| (t.id, t)).collect()
        };
        Ok(TermIndex {
            categories: collect(self.load_terms(Taxonomy::Category).await?),
            tags: collect(self.load_terms(Taxonomy::Tag).await?),
        })
    }

    async fn post_view(
        &self,
        post: &ContentObject,
        include_content: bool,
        terms: &TermIndex,
    ) -> Result<PostView, ContentError> {
        let featured_media = match post.featured_media {
            Some(id) => self
                .load_object(id)
                .await?
                .filter(ContentObject::is_attachment)
                .map(|media| FeaturedMedia {
                    id,
                    url: self.media_url(&media),
                    sizes: Self::image_sizes(&media, self.media_url(&media)),
                }),
            None => None,
        };

        let meta = SEO_META_KEYS
            .iter()
            .map(|key| ((*key).to_owned(), post.meta.get(*key).cloned().unwrap_or_default()))
            .collect();

        Ok(PostView {
            id: post.id,
            title: post.title.clone(),
            slug: post.slug.clone(),
            status: post.status.clone(),
            post_type: post.object_type.clone(),
            url: self.permalink(post),
            author: AuthorRef {
                id: post.author,
                name: self.user(post.author).map(|u| u.name.clone()).unwrap_or_default(),
            },
            date: post.date.clone(),
            date_gmt: post.date_gmt.clone(),
            modified: post.modified.clone(),
            modified_gmt: post.modified_gmt.clone(),
            content: include_content.then(|| post.content.clone()),
            excerpt: include_content.then(|| post.excerpt.clone()),
            categories: TermIndex::refs(&terms.categories, &post.categories),
            tags: TermIndex::refs(&terms.tags, &post.tags),
            featured_media,
            meta,
        })
    }

    /// Format a post for output, looking up its terms.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError`] if terms or the featured image cannot be read.
    pub async fn format_post(
        &self,
        post: &ContentObject,
        include_content: bool,
    ) -> Result<PostView, ContentError> {
        let terms = self.term_index().await?;
        self.post_view(post, include_content, &terms).await
    }

    /// List posts matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError`] if stored content cannot be read.
    pub async fn list_posts(&self, query: &PostQuery) -> Result<PostList, ContentError> {
        let post_type = sanitize::sanitize_text_field(query.post_type.as_deref().unwrap_or("post"));
        let post_type = site::normalize_post_type(&post_type).to_owned();
        let status = sanitize::sanitize_text_field(query.status.as_deref().unwrap_or("any"));
        let wanted: Vec<&str> = status.split(',').map(str::trim).collect();
        let any_status = status.is_empty() || wanted.contains(&"any");
        let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE);
        let page = query.page.unwrap_or(1).max(1);
        let search = sanitize::sanitize_text_field(query.search.as_deref().unwrap_or_default());
        let order_by = OrderBy::parse(query.orderby.as_deref().unwrap_or("date"));
        let ascending = query
            .order
            .as_deref()
            .is_some_and(|o| o.trim().eq_ignore_ascii_case("asc"));

        let mut posts: Vec<ContentObject> = self
            .all_objects()
            .await?
            .into_iter()
            .filter(|o| o.object_type == post_type)
            .filter(|o| {
                if any_status {
                    o.status != TRASH_STATUS
                } else {
                    wanted.contains(&o.status.as_str())
                }
            })
            .filter(|o| {
                search.is_empty() || matches_search(&search, &[&o.title, &o.content, &o.excerpt])
            })
            .collect();

        posts.sort_by(|a, b| {
            let primary = match order_by {
                OrderBy::Date => a.date_gmt.cmp(&b.date_gmt),
                OrderBy::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
                OrderBy::Modified => a.modified_gmt.cmp(&b.modified_gmt),
                OrderBy::Id => a.id.cmp(&b.id),
            };
            let ordering = primary.then(a.id.cmp(&b.id));
            if ascending { ordering } else { ordering.reverse() }
        });

        let (page_items, total, total_pages) =
            paginate(posts, page, per_page.clamp(1, MAX_PER_PAGE));
        let terms = self.term_index().await?;
        let mut views = Vec::with_capacity(page_items.len());
        for post in &page_items {
            views.push(self.post_view(post, false, &terms).await?);
        }

        Ok(PostList {
            posts: views,
            total,
            total_pages,
            page,
            per_page,
        })
    }

    async fn load_post(&self, id: u64) -> Result<ContentObject, ContentError> {
        self.load_object(id)
            .await?
            .filter(|o| !o.is_attachment())
            .ok_or(ContentError::NotFound { what: "post", id })
    }

    /// Fetch one post with its content.
    ///
    /// # Errors
    ///
    /// `not_found` (404) when the id is missing or names an attachment.
    pub async fn get_post(&self, id: u64) -> Result<PostView, ContentError> {
        let post = self.load_post(id).await?;
        self.format_post(&post, true).await
    }

    /// Create a post or page.
    ///
    /// # Errors
    ///
    /// `missing_title`, `invalid_post_type`, `invalid_status` or
    /// `invalid_date` (all 400) for bad input.
    pub async fn create_post(&self, input: &PostInput) -> Result<PostView, ContentError> {
        let raw_type = sanitize::sanitize_text_field(input.post_type.as_deref().unwrap_or("post"));
        let post_type = site::normalize_post_type(&raw_type).to_owned();
        let title = sanitize::sanitize_text_field(input.title.as_deref().unwrap_or_default());
        let mut status = sanitize::sanitize_text_field(input.status.as_deref().unwrap_or("draft"));
        if status.is_empty() {
            "draft".clone_into(&mut status);
        }

        if title.is_empty() {
            return Err(ContentError::invalid("missing_title", "Post title is required."));
        }
        let Some(type_def) = site::post_type(&post_type)
            .filter(|def| def.public && def.slug != site::ATTACHMENT_TYPE)
        else {
            return Err(ContentError::invalid(
                "invalid_post_type",
                format!("Post type \"{post_type}\" does not exist or is not public."),
            ));
        };
        if !site::is_writable_status(&status) {
            return Err(invalid_status(&status));
        }

        let author = match input.author.as_ref() {
            Some(raw) => sanitize::absint(raw),
            None => self.default_author().map_or(0, |u| u.id),
        };

        let guard = self.write_lock.lock().await;
        self.ensure_default_category_locked().await?;

        let (date, date_gmt) = match input.date.as_deref().filter(|d| !d.is_empty()) {
            Some(raw) if status == "future" => self
                .dates_from_local(&sanitize::sanitize_text_field(raw))
                .ok_or_else(|| ContentError::invalid("invalid_date", "Invalid post date."))?,
            _ => self.now_dates(),
        };

        let objects = self.all_objects().await?;
        let requested_slug = input
            .slug
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(sanitize::sanitize_title)
            .filter(|s| !s.is_empty());
        let base_slug = requested_slug.unwrap_or_else(|| sanitize::sanitize_title(&title));
        let base_slug = if base_slug.is_empty() { post_type.clone() } else { base_slug };
        let slug = unique_slug(&base_slug, &post_type, 0, &objects);

        let categories = if type_def.has_taxonomy(Taxonomy::Category.as_str()) {
            let requested = id_list(input.categories.as_ref()).unwrap_or_default();
            let ids = self.existing_term_ids(Taxonomy::Category, &requested).await?;
            if ids.is_empty() { vec![DEFAULT_CATEGORY_ID] } else { ids }
        } else {
            Vec::new()
        };
        let tags = if type_def.has_taxonomy(Taxonomy::Tag.as_str()) {
            let requested = id_list(input.tags.as_ref()).unwrap_or_default();
            self.existing_term_ids(Taxonomy::Tag, &requested).await?
        } else {
            Vec::new()
        };

        let featured_media = match input.featured_media.as_ref().filter(|v| is_truthy(v)) {
            Some(raw) => self.attachment_id(sanitize::absint(raw)).await?,
            None => None,
        };

        let mut post = ContentObject {
            id: 0,
            object_type: post_type,
            status,
            title,
            slug,
            author,
            content: sanitize::kses_post(input.content.as_deref().unwrap_or_default()),
            excerpt: sanitize::sanitize_textarea_field(input.excerpt.as_deref().unwrap_or_default()),
            modified: date.clone(),
            modified_gmt: date_gmt.clone(),
            date,
            date_gmt,
            categories,
            tags,
            featured_media,
            meta: sanitized_meta(input.meta.as_ref()).into_iter().collect(),
            attachment: None,
        };
        self.insert_object(&mut post).await?;
        drop(guard);

        info!(id = post.id, post_type = %post.object_type, status = %post.status, "post created");
        self.format_post(&post, true).await
    }

    /// `Some(id)` when `id` names an attachment.
    async fn attachment_id(&self, id: u64) -> Result<Option<u64>, ContentError> {
        Ok(self
            .load_object(id)
            .await?
            .filter(ContentObject::is_attachment)
            .map(|o| o.id))
    }

    /// Apply the provided fields to an existing post.
    ///
    /// # Errors
    ///
    /// `not_found` (404) for an unknown id; `invalid_status` or
    /// `invalid_date` (400) for bad input.
    pub async fn update_post(&self, id: u64, input: &PostInput) -> Result<PostView, ContentError> {
        let guard = self.write_lock.lock().await;
        let mut post = self.load_post(id).await?;
        let type_def = site::post_type(&post.object_type);

        if let Some(title) = input.title.as_deref() {
            post.title = sanitize::sanitize_text_field(title);
        }
        if let Some(content) = input.content.as_deref() {
            post.content = sanitize::kses_post(content);
        }
        if let Some(excerpt) = input.excerpt.as_deref() {
            post.excerpt = sanitize::sanitize_textarea_field(excerpt);
        }
        if let Some(status) = input.status.as_deref() {
            let status = sanitize::sanitize_text_field(status);
            if !site::is_writable_status(&status) {
                return Err(invalid_status(&status));
            }
            post.status = status;
        }
        if let Some(author) = input.author.as_ref() {
            post.author = sanitize::absint(author);
        }
        if let Some(slug) = input.slug.as_deref() {
            let objects = self.all_objects().await?;
            let mut base = sanitize::sanitize_title(slug);
            if base.is_empty() {
                base = sanitize::sanitize_title(&post.title);
            }
            if base.is_empty() {
                base.clone_from(&post.object_type);
            }
            post.slug = unique_slug(&base, &post.object_type, post.id, &objects);
        }
        if input.status.as_deref() == Some("future") {
            if let Some(raw) = input.date.as_deref().filter(|d| !d.is_empty()) {
                let (date, date_gmt) = self
                    .dates_from_local(&sanitize::sanitize_text_field(raw))
                    .ok_or_else(|| ContentError::invalid("invalid_date", "Invalid post date."))?;
                post.date = date;
                post.date_gmt = date_gmt;
            }
        }

        let supports = |taxonomy: Taxonomy| type_def.is_some_and(|d| d.has_taxonomy(taxonomy.as_str()));
        if let Some(requested) = id_list(input.categories.as_ref()) {
            if supports(Taxonomy::Category) {
                self.ensure_default_category_locked().await?;
                let ids = self.existing_term_ids(Taxonomy::Category, &requested).await?;
                post.categories = if ids.is_empty() { vec![DEFAULT_CATEGORY_ID] } else { ids };
            }
        }
        if let Some(requested) = id_list(input.tags.as_ref()) {
            if supports(Taxonomy::Tag) {
                post.tags = self.existing_term_ids(Taxonomy::Tag, &requested).await?;
            }
        }
        if let Some(raw) = input.featured_media.as_ref() {
            post.featured_media = if is_truthy(raw) {
                self.attachment_id(sanitize::absint(raw)).await?
            } else {
                None
            };
        }
        post.meta.extend(sanitized_meta(input.meta.as_ref()));

        let (modified, modified_gmt) = self.now_dates();
        post.modified = modified;
        post.modified_gmt = modified_gmt;
        self.save_object(&post).await?;
        drop(guard);

        info!(id, "post updated");
        self.format_post(&post, true).await
    }

    /// Trash a post, or remove it when `force` is set or it is already in
    /// the trash.
    ///
    /// # Errors
    ///
    /// `not_found` (404) for an unknown id.
    pub async fn delete_post(&self, id: u64, force: bool) -> Result<DeleteOutcome, ContentError> {
        let _guard = self.write_lock.lock().await;
        let mut post = self.load_post(id).await?;

        if force || post.status == TRASH_STATUS {
            self.storage.delete(&Self::object_key(id)).await?;
            info!(id, "post deleted");
            return Ok(DeleteOutcome::Deleted);
        }

        let previous = std::mem::replace(&mut post.status, TRASH_STATUS.to_owned());
        post.meta.insert(TRASH_META_STATUS.to_owned(), previous);
        let (modified, modified_gmt) = self.now_dates();
        post.modified = modified;
        post.modified_gmt = modified_gmt;
        self.save_object(&post).await?;
        info!(id, "post trashed");
        Ok(DeleteOutcome::Trashed)
    }

    /// Report whether an object exists, without failing when it doesn't.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError`] if storage fails.
    pub async fn verify_post(&self, id: u64) -> Result<PostVerification, ContentError> {
        Ok(match self.load_object(id).await? {
            Some(post) => PostVerification {
                exists: true,
                url: Some(self.permalink(&post)),
                status: Some(post.status),
                post_type: Some(post.object_type),
                modified: Some(post.modified_gmt),
            },
            None => PostVerification {
                exists: false,
                status: None,
                post_type: None,
                url: None,
                modified: None,
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::content::taxonomy::TermInput;
    use crate::content::tests::test_store;

    fn input(value: Value) -> PostInput {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let store = test_store();
        let post = store
            .create_post(&input(json!({
                "title": "  Hello <em>World</em> ",
                "content": "<p onclick=\"x()\">Body</p><script>bad()</script>",
                "excerpt": "Short\nsummary"
            })))
            .await
            .unwrap();

        assert_eq!(post.title, "Hello World");
        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.status, "draft");
        assert_eq!(post.post_type, "post");
        assert_eq!(post.author.id, 1);
        assert_eq!(post.author.name, "Site Admin");
        assert_eq!(post.content.as_deref(), Some("<p>Body</p>"));
        assert_eq!(post.excerpt.as_deref(), Some("Short\nsummary"));
        assert_eq!(post.url, format!("https://blog.example.com/?p={}", post.id));
        assert_eq!(post.categories.len(), 1);
        assert_eq!(post.categories[0].slug, "uncategorized");
        assert!(post.featured_media.is_none());
        assert_eq!(post.meta.len(), SEO_META_KEYS.len());
        assert!(post.meta.values().all(String::is_empty));
    }

    #[tokio::test]
    async fn create_validates_input() {
        let store = test_store();
        let err = store.create_post(&input(json!({"title": " "}))).await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidInput { code: "missing_title", .. }));

        let err = store
            .create_post(&input(json!({"title": "x", "post_type": "product"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidInput { code: "invalid_post_type", .. }));

        let err = store
            .create_post(&input(json!({"title": "x", "post_type": "attachment"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidInput { code: "invalid_post_type", .. }));

        let err = store
            .create_post(&input(json!({"title": "x", "status": "trash"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidInput { code: "invalid_status", .. }));
    }

    #[tokio::test]
    async fn slugs_are_unique_per_type() {
        let store = test_store();
        let a = store.create_post(&input(json!({"title": "Same"}))).await.unwrap();
        let b = store.create_post(&input(json!({"title": "Same"}))).await.unwrap();
        let c = store
            .create_post(&input(json!({"title": "Other", "slug": "same"})))
            .await
            .unwrap();
        let page = store
            .create_post(&input(json!({"title": "Same", "post_type": "pages"})))
            .await
            .unwrap();
        assert_eq!(a.slug, "same");
        assert_eq!(b.slug, "same-2");
        assert_eq!(c.slug, "same-3");
        assert_eq!(page.slug, "same");
        assert_eq!(page.post_type, "page");
        assert!(page.categories.is_empty());
    }

    #[tokio::test]
    async fn published_posts_get_pretty_urls() {
        let store = test_store();
        let post = store
            .create_post(&input(json!({"title": "Launch Day", "status": "publish"})))
            .await
            .unwrap();
        assert_eq!(post.url, "https://blog.example.com/launch-day/");
    }

    #[tokio::test]
    async fn scheduled_posts_keep_their_date() {
        let store = test_store();
        let post = store
            .create_post(&input(json!({
                "title": "Later",
                "status": "future",
                "date": "2031-01-02 03:04:05"
            })))
            .await
            .unwrap();
        assert_eq!(post.date, "2031-01-02 03:04:05");
        assert_eq!(post.date_gmt, "2031-01-02 03:04:05");

        let err = store
            .create_post(&input(json!({"title": "Bad", "status": "future", "date": "soon"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidInput { code: "invalid_date", .. }));
    }

    #[tokio::test]
    async fn terms_and_meta_are_applied() {
        let store = test_store();
        let cat = store
            .create_category(&serde_json::from_value::<TermInput>(json!({"name": "News"})).unwrap())
            .await
            .unwrap();
        let tag = store
            .create_tag(&serde_json::from_value::<TermInput>(json!({"name": "rust"})).unwrap())
            .await
            .unwrap();

        let post = store
            .create_post(&input(json!({
                "title": "Tagged",
                "categories": [cat.id, 999],
                "tags": [tag.id.to_string()],
                "meta": {"_yoast_wpseo_title": "<b>SEO</b> title", "Custom Key!": 5}
            })))
            .await
            .unwrap();
        assert_eq!(post.categories.iter().map(|c| c.id).collect::<Vec<_>>(), vec![cat.id]);
        assert_eq!(post.tags[0].name, "rust");
        assert_eq!(post.meta["_yoast_wpseo_title"], "SEO title");

        let stored = store.load_object(post.id).await.unwrap().unwrap();
        assert_eq!(stored.meta["customkey"], "5");
    }

    #[tokio::test]
    async fn update_changes_only_provided_fields() {
        let store = test_store();
        let post = store
            .create_post(&input(json!({"title": "Original", "excerpt": "keep"})))
            .await
            .unwrap();

        let updated = store
            .update_post(post.id, &input(json!({"title": "Renamed", "status": "publish"})))
            .await
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.excerpt.as_deref(), Some("keep"));
        assert_eq!(updated.slug, "original");
        assert_eq!(updated.status, "publish");

        let err = store
            .update_post(9_999, &input(json!({"title": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_falls_back_to_default_category() {
        let store = test_store();
        let cat = store
            .create_category(&serde_json::from_value::<TermInput>(json!({"name": "News"})).unwrap())
            .await
            .unwrap();
        let post = store
            .create_post(&input(json!({"title": "Filed", "categories": [cat.id]})))
            .await
            .unwrap();
        assert_eq!(post.categories[0].id, cat.id);

        let updated = store
            .update_post(post.id, &input(json!({"categories": [404]})))
            .await
            .unwrap();
        assert_eq!(updated.categories.len(), 1);
        assert_eq!(updated.categories[0].slug, "uncategorized");
    }

    #[tokio::test]
    async fn trash_then_delete() {
        let store = test_store();
        let post = store
            .create_post(&input(json!({"title": "Doomed", "status": "pending"})))
            .await
            .unwrap();

        assert_eq!(store.delete_post(post.id, false).await.unwrap(), DeleteOutcome::Trashed);
        let trashed = store.load_object(post.id).await.unwrap().unwrap();
        assert_eq!(trashed.status, "trash");
        assert_eq!(trashed.meta[TRASH_META_STATUS], "pending");

        let listed = store.list_posts(&PostQuery::default()).await.unwrap();
        assert_eq!(listed.total, 0);

        assert_eq!(store.delete_post(post.id, false).await.unwrap(), DeleteOutcome::Deleted);
        assert!(!store.verify_post(post.id).await.unwrap().exists);
    }

    #[tokio::test]
    async fn force_delete_skips_the_trash() {
        let store = test_store();
        let post = store.create_post(&input(json!({"title": "Gone"}))).await.unwrap();
        assert_eq!(store.delete_post(post.id, true).await.unwrap(), DeleteOutcome::Deleted);
        assert!(matches!(
            store.get_post(post.id).await,
            Err(ContentError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_filters_sorts_and_pages() {
        let store = test_store();
        for title in ["Bravo", "alpha", "Charlie"] {
            store
                .create_post(&input(json!({"title": title, "status": "publish"})))
                .await
                .unwrap();
        }
        store
            .create_post(&input(json!({"title": "Draft alpha"})))
            .await
            .unwrap();

        let query: PostQuery = serde_json::from_value(json!({
            "status": "publish",
            "orderby": "title",
            "order": "asc",
            "per_page": "2",
            "page": 1
        }))
        .unwrap();
        let list = store.list_posts(&query).await.unwrap();
        assert_eq!(list.total, 3);
        assert_eq!(list.total_pages, 2);
        assert_eq!(list.per_page, 2);
        let titles: Vec<&str> = list.posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["alpha", "Bravo"]);
        assert!(list.posts.iter().all(|p| p.content.is_none()));

        let query: PostQuery = serde_json::from_value(json!({"search": "ALPHA"})).unwrap();
        assert_eq!(store.list_posts(&query).await.unwrap().total, 2);

        let query: PostQuery = serde_json::from_value(json!({"per_page": 500})).unwrap();
        let list = store.list_posts(&query).await.unwrap();
        assert_eq!(list.per_page, 500);
        assert_eq!(list.total_pages, 1);
    }

    #[tokio::test]
    async fn newest_first_by_default() {
        let store = test_store();
        let first = store.create_post(&input(json!({"title": "One"}))).await.unwrap();
        let second = store.create_post(&input(json!({"title": "Two"}))).await.unwrap();
        let list = store.list_posts(&PostQuery::default()).await.unwrap();
        assert_eq!(list.posts[0].id, second.id);
        assert_eq!(list.posts[1].id, first.id);
        assert_eq!(list.page, 1);
        assert_eq!(list.per_page, 100);
    }

    #[tokio::test]
    async fn verify_reports_existing_posts() {
        let store = test_store();
        let post = store
            .create_post(&input(json!({"title": "Here", "status": "publish"})))
            .await
            .unwrap();
        let check = store.verify_post(post.id).await.unwrap();
        assert!(check.exists);
        assert_eq!(check.status.as_deref(), Some("publish"));
        assert_eq!(check.post_type.as_deref(), Some("post"));
        assert_eq!(check.url.as_deref(), Some("https://blog.example.com/here/"));
    }
}
