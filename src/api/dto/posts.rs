/*
 * Responsibility
 * - Posts request/response DTOs
 * - validate() for the shape checks done before touching the store
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repos::{PostChanges, PostRow};

pub const MISSING_FIELDS: &str =
    "Missing required fields: title, desc, and content are required";

/// Body of `POST /posts` and `PUT /posts/{id}`.
///
/// Fields are optional at the serde level so a missing field yields our 400
/// message rather than a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub img: Option<String>,
}

impl PostRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        if !(present(&self.title) && present(&self.desc) && present(&self.content)) {
            return Err(MISSING_FIELDS);
        }
        Ok(())
    }

    pub fn into_changes(self) -> PostChanges {
        PostChanges {
            title: self.title,
            desc: self.desc,
            img: self.img,
            content: self.content,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub desc: String,
    pub img: Option<String>,
    pub content: String,
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PostRow> for PostResponse {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.post_id,
            title: row.title,
            desc: row.desc,
            img: row.img,
            content: row.content,
            username: row.username,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
