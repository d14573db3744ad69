//! Site description and the fixed post type and status registries.

use serde::{Deserialize, Serialize};

use crate::signing::PLUGIN_VERSION;

/// Public information about the site, reported on connect, status and sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub name: String,
    pub description: String,
    pub url: String,
    pub home: String,
    pub admin_email: String,
    pub language: String,
    pub timezone: String,
    /// Reported as `wp_version` so existing Forge clients keep working.
    #[serde(rename = "wp_version")]
    pub platform_version: String,
    pub plugin_version: String,
    pub multisite: bool,
    /// Seconds east of UTC used for local post dates.
    #[serde(skip)]
    pub utc_offset_secs: i32,
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            name: "Forge Site".to_owned(),
            description: String::new(),
            url: "http://localhost:8300".to_owned(),
            home: "http://localhost:8300".to_owned(),
            admin_email: String::new(),
            language: "en_US".to_owned(),
            timezone: "UTC".to_owned(),
            platform_version: PLUGIN_VERSION.to_owned(),
            plugin_version: PLUGIN_VERSION.to_owned(),
            multisite: false,
            utc_offset_secs: 0,
        }
    }
}

impl SiteInfo {
    /// Home URL without a trailing slash.
    #[must_use]
    pub fn home_base(&self) -> &str {
        self.home.trim_end_matches('/')
    }
}

/// A registered content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostTypeDef {
    pub slug: &'static str,
    pub name: &'static str,
    pub singular_name: &'static str,
    pub public: bool,
    pub hierarchical: bool,
    pub supports: &'static [&'static str],
    pub taxonomies: &'static [&'static str],
    /// Hidden from the post type listing.
    pub internal: bool,
}

impl PostTypeDef {
    #[must_use]
    pub fn has_taxonomy(&self, taxonomy: &str) -> bool {
        self.taxonomies.contains(&taxonomy)
    }
}

pub const ATTACHMENT_TYPE: &str = "attachment";

pub const POST_TYPES: &[PostTypeDef] = &[
    PostTypeDef {
        slug: "post",
        name: "Posts",
        singular_name: "Post",
        public: true,
        hierarchical: false,
        supports: &[
            "title",
            "editor",
            "author",
            "thumbnail",
            "excerpt",
            "custom-fields",
            "revisions",
        ],
        taxonomies: &["category", "post_tag"],
        internal: false,
    },
    PostTypeDef {
        slug: "page",
        name: "Pages",
        singular_name: "Page",
        public: true,
        hierarchical: true,
        supports: &[
            "title",
            "editor",
            "author",
            "thumbnail",
            "page-attributes",
            "custom-fields",
            "revisions",
        ],
        taxonomies: &[],
        internal: false,
    },
    PostTypeDef {
        slug: ATTACHMENT_TYPE,
        name: "Media",
        singular_name: "Media",
        public: true,
        hierarchical: false,
        supports: &["title", "author"],
        taxonomies: &[],
        internal: true,
    },
];

/// Look up a registered post type.
#[must_use]
pub fn post_type(slug: &str) -> Option<&'static PostTypeDef> {
    POST_TYPES.iter().find(|t| t.slug == slug)
}

/// Map REST collection names to post type slugs (`posts` to `post`,
/// `pages` to `page`). Anything else passes through.
#[must_use]
pub fn normalize_post_type(post_type: &str) -> &str {
    match post_type {
        "posts" => "post",
        "pages" => "page",
        other => other,
    }
}

/// Listing entry for a post type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostTypeView {
    pub slug: String,
    pub name: String,
    pub singular_name: String,
    pub description: String,
    pub public: bool,
    pub hierarchical: bool,
    pub has_archive: bool,
    pub supports: Vec<String>,
    pub taxonomies: Vec<String>,
    pub count: u64,
}

impl PostTypeView {
    pub(crate) fn new(def: &PostTypeDef, count: u64) -> Self {
        Self {
            slug: def.slug.to_owned(),
            name: def.name.to_owned(),
            singular_name: def.singular_name.to_owned(),
            description: String::new(),
            public: def.public,
            hierarchical: def.hierarchical,
            has_archive: false,
            supports: def.supports.iter().map(|s| (*s).to_owned()).collect(),
            taxonomies: def.taxonomies.iter().map(|s| (*s).to_owned()).collect(),
            count,
        }
    }
}

/// A post status as reported to Forge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PostStatus {
    pub name: &'static str,
    pub label: &'static str,
    pub public: bool,
    pub protected: bool,
    pub private: bool,
}

pub const TRASH_STATUS: &str = "trash";
pub const INHERIT_STATUS: &str = "inherit";

pub const POST_STATUSES: &[PostStatus] = &[
    PostStatus {
        name: "publish",
        label: "Published",
        public: true,
        protected: false,
        private: false,
    },
    PostStatus {
        name: "future",
        label: "Scheduled",
        public: false,
        protected: true,
        private: false,
    },
    PostStatus {
        name: "draft",
        label: "Draft",
        public: false,
        protected: true,
        private: false,
    },
    PostStatus {
        name: "pending",
        label: "Pending",
        public: false,
        protected: true,
        private: false,
    },
    PostStatus {
        name: "private",
        label: "Private",
        public: false,
        protected: false,
        private: true,
    },
    PostStatus {
        name: TRASH_STATUS,
        label: "Trash",
        public: false,
        protected: false,
        private: false,
    },
];

/// Whether `status` may be set on a post through the API.
#[must_use]
pub fn is_writable_status(status: &str) -> bool {
    status != TRASH_STATUS && POST_STATUSES.iter().any(|s| s.name == status)
}
