//! Site users. Seeded from configuration; read-only at runtime.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ContentStore;

/// Roles that carry the `edit_posts` capability.
const EDITING_ROLES: &[&str] = &["administrator", "editor", "author", "contributor"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    /// Display name.
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl User {
    #[must_use]
    pub fn can_edit_posts(&self) -> bool {
        self.roles.iter().any(|r| EDITING_ROLES.contains(&r.as_str()))
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == "administrator")
    }
}

/// An author as listed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: u64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub roles: Vec<String>,
}

/// Gravatar URL for an email address at 96px.
#[must_use]
pub fn avatar_url(email: &str) -> String {
    let hash = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{}?s=96&d=mm",
        hex::encode(hash)
    )
}

impl ContentStore {
    /// Users who can edit posts, ordered by display name.
    #[must_use]
    pub fn list_authors(&self) -> Vec<UserView> {
        let mut authors: Vec<&User> = self.users.iter().filter(|u| u.can_edit_posts()).collect();
        authors.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        authors
            .into_iter()
            .map(|u| UserView {
                id: u.id,
                username: u.username.clone(),
                name: u.name.clone(),
                email: u.email.clone(),
                avatar: avatar_url(&u.email),
                roles: u.roles.clone(),
            })
            .collect()
    }

    /// The user API writes are attributed to: the first administrator by
    /// id, else the first user who can edit posts.
    #[must_use]
    pub fn default_author(&self) -> Option<&User> {
        let by_id = |pred: fn(&User) -> bool| {
            self.users
                .iter()
                .filter(|u| pred(u))
                .min_by_key(|u| u.id)
        };
        by_id(User::is_admin).or_else(|| by_id(User::can_edit_posts))
    }

    #[must_use]
    pub fn user(&self, id: u64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }
}
