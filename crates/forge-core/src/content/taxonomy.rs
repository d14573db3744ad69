//! Categories and tags.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{ContentStore, TERM_SEQUENCE, encode};
use crate::error::ContentError;
use crate::sanitize;

/// Id of the category every post falls back to.
pub const DEFAULT_CATEGORY_ID: u64 = 1;
const DEFAULT_CATEGORY_NAME: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Taxonomy {
    Category,
    Tag,
}

impl Taxonomy {
    /// Registry name, as listed in a post type's taxonomies.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Tag => "post_tag",
        }
    }

    fn prefix(self) -> String {
        format!("content/terms/{}/", self.as_str())
    }

    fn key(self, id: u64) -> String {
        format!("{}{id:010}", self.prefix())
    }

    fn label(self) -> &'static str {
        match self {
            Self::Category => "Category",
            Self::Tag => "Tag",
        }
    }
}

/// A stored term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: u64,
    pub taxonomy: Taxonomy,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[serde(default)]
    pub parent: u64,
}

/// A term as listed by the API. Tags carry no `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermView {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<u64>,
    pub count: u64,
}

/// Short reference embedded in post responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermRef {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

/// Body of a create-term request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TermInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent: Option<Value>,
    #[serde(default)]
    pub slug: Option<String>,
}

impl Term {
    fn view(&self, count: u64) -> TermView {
        TermView {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
            description: self.description.clone(),
            parent: (self.taxonomy == Taxonomy::Category).then_some(self.parent),
            count,
        }
    }

    pub(crate) fn reference(&self) -> TermRef {
        TermRef {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
        }
    }
}

impl ContentStore {
    /// Create the Uncategorized category if the term table is empty.
    /// Callers must hold the write lock.
    pub(super) async fn ensure_default_category_locked(&self) -> Result<(), ContentError> {
        if self.storage.exists(TERM_SEQUENCE).await? {
            return Ok(());
        }
        let term = Term {
            id: DEFAULT_CATEGORY_ID,
            taxonomy: Taxonomy::Category,
            name: DEFAULT_CATEGORY_NAME.to_owned(),
            slug: sanitize::sanitize_title(DEFAULT_CATEGORY_NAME),
            description: String::new(),
            parent: 0,
        };
        let key = Taxonomy::Category.key(term.id);
        let bytes = encode(&key, &term)?;
        self.storage
            .put_batch(&[
                (TERM_SEQUENCE.to_owned(), term.id.to_string().into_bytes()),
                (key, bytes),
            ])
            .await?;
        Ok(())
    }

    pub(crate) async fn ensure_default_category(&self) -> Result<(), ContentError> {
        if self.storage.exists(TERM_SEQUENCE).await? {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        self.ensure_default_category_locked().await
    }

    pub(crate) async fn load_terms(&self, taxonomy: Taxonomy) -> Result<Vec<Term>, ContentError> {
        let keys = self.storage.list(&taxonomy.prefix()).await?;
        let mut terms = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(term) = self.load::<Term>(&key).await? {
                terms.push(term);
            }
        }
        Ok(terms)
    }

    pub(crate) async fn load_term(
        &self,
        taxonomy: Taxonomy,
        id: u64,
    ) -> Result<Option<Term>, ContentError> {
        self.load(&taxonomy.key(id)).await
    }

    /// Every term of `taxonomy`, ordered by name, with published-post counts.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError`] if stored terms or posts cannot be read.
    pub async fn list_terms(&self, taxonomy: Taxonomy) -> Result<Vec<TermView>, ContentError> {
        self.ensure_default_category().await?;
        let mut terms = self.load_terms(taxonomy).await?;
        terms.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });

        let published: Vec<_> = self
            .all_objects()
            .await?
            .into_iter()
            .filter(|o| o.status == "publish")
            .collect();
        Ok(terms
            .iter()
            .map(|term| {
                let count = published
                    .iter()
                    .filter(|o| match taxonomy {
                        Taxonomy::Category => o.categories.contains(&term.id),
                        Taxonomy::Tag => o.tags.contains(&term.id),
                    })
                    .count();
                term.view(count as u64)
            })
            .collect())
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// `missing_name` (400) without a name, `missing_parent` (400) for an
    /// unknown parent, `term_exists` (409) for a duplicate.
    pub async fn create_category(&self, input: &TermInput) -> Result<TermView, ContentError> {
        self.create_term(Taxonomy::Category, input).await
    }

    /// Create a tag. The slug defaults to the name.
    ///
    /// # Errors
    ///
    /// `missing_name` (400) without a name, `term_exists` (409) for a
    /// duplicate.
    pub async fn create_tag(&self, input: &TermInput) -> Result<TermView, ContentError> {
        self.create_term(Taxonomy::Tag, input).await
    }

    async fn create_term(
        &self,
        taxonomy: Taxonomy,
        input: &TermInput,
    ) -> Result<TermView, ContentError> {
        let name = sanitize::sanitize_text_field(input.name.as_deref().unwrap_or_default());
        if name.is_empty() {
            return Err(ContentError::invalid(
                "missing_name",
                format!("{} name is required.", taxonomy.label()),
            ));
        }
        let description =
            sanitize::sanitize_textarea_field(input.description.as_deref().unwrap_or_default());
        let slug_source = match (taxonomy, input.slug.as_deref()) {
            (Taxonomy::Tag, Some(slug)) if !slug.is_empty() => slug,
            _ => name.as_str(),
        };
        let mut slug = sanitize::sanitize_title(slug_source);

        let _guard = self.write_lock.lock().await;
        self.ensure_default_category_locked().await?;

        let parent = match (taxonomy, input.parent.as_ref()) {
            (Taxonomy::Category, Some(raw)) => {
                let parent = sanitize::intval(raw);
                let known = match u64::try_from(parent) {
                    Ok(0) => true,
                    Ok(id) => self.load_term(Taxonomy::Category, id).await?.is_some(),
                    Err(_) => false,
                };
                if !known {
                    return Err(ContentError::invalid(
                        "missing_parent",
                        "Parent term does not exist.",
                    ));
                }
                parent.unsigned_abs()
            }
            _ => 0,
        };

        let existing = self.load_terms(taxonomy).await?;
        let duplicate = existing.iter().any(|t| {
            (t.name.eq_ignore_ascii_case(&name) && t.parent == parent)
                || (!slug.is_empty() && t.slug == slug)
        });
        if duplicate {
            return Err(ContentError::Conflict {
                code: "term_exists",
                message: "A term with the name provided already exists in this taxonomy."
                    .to_owned(),
            });
        }

        let id = self.next_in_sequence(TERM_SEQUENCE).await?;
        if slug.is_empty() {
            slug = id.to_string();
        }
        let term = Term {
            id,
            taxonomy,
            name,
            slug,
            description,
            parent,
        };
        let key = taxonomy.key(id);
        let bytes = encode(&key, &term)?;
        self.storage
            .put_batch(&[(TERM_SEQUENCE.to_owned(), id.to_string().into_bytes()), (key, bytes)])
            .await?;

        info!(taxonomy = taxonomy.as_str(), id, slug = %term.slug, "term created");
        Ok(term.view(0))
    }

    /// Keep only ids that name an existing term, in order, without repeats.
    pub(crate) async fn existing_term_ids(
        &self,
        taxonomy: Taxonomy,
        ids: &[u64],
    ) -> Result<Vec<u64>, ContentError> {
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            if !out.contains(&id) && self.load_term(taxonomy, id).await?.is_some() {
                out.push(id);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::content::tests::test_store;

    fn input(value: serde_json::Value) -> TermInput {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn uncategorized_exists_from_the_start() {
        let store = test_store();
        let cats = store.list_terms(Taxonomy::Category).await.unwrap();
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].id, DEFAULT_CATEGORY_ID);
        assert_eq!(cats[0].slug, "uncategorized");
        assert_eq!(cats[0].parent, Some(0));
    }

    #[tokio::test]
    async fn categories_get_slugs_and_sequence_ids() {
        let store = test_store();
        let news = store
            .create_category(&input(json!({"name": " <b>Big</b> News ", "description": "d"})))
            .await
            .unwrap();
        assert_eq!(news.id, 2);
        assert_eq!(news.name, "Big News");
        assert_eq!(news.slug, "big-news");

        let child = store
            .create_category(&input(json!({"name": "Local", "parent": news.id})))
            .await
            .unwrap();
        assert_eq!(child.parent, Some(news.id));

        let names: Vec<String> = store
            .list_terms(Taxonomy::Category)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Big News", "Local", "Uncategorized"]);
    }

    #[tokio::test]
    async fn create_term_validation() {
        let store = test_store();
        let err = store.create_category(&input(json!({"name": "  "}))).await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidInput { code: "missing_name", .. }));

        let err = store
            .create_category(&input(json!({"name": "Orphan", "parent": 99})))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidInput { code: "missing_parent", .. }));

        store.create_tag(&input(json!({"name": "Rust"}))).await.unwrap();
        let err = store.create_tag(&input(json!({"name": "rust"}))).await.unwrap_err();
        assert!(matches!(err, ContentError::Conflict { code: "term_exists", .. }));
    }

    #[tokio::test]
    async fn tags_take_an_explicit_slug_and_have_no_parent() {
        let store = test_store();
        let tag = store
            .create_tag(&input(json!({"name": "Async Rust", "slug": "Async_RS"})))
            .await
            .unwrap();
        assert_eq!(tag.slug, "async-rs");
        assert_eq!(tag.parent, None);
        assert_eq!(store.list_terms(Taxonomy::Tag).await.unwrap().len(), 1);
    }
}
