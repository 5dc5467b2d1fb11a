/*
 * Responsibility
 * - process-local PostStore (development without DATABASE_URL, tests)
 */
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::repos::error::RepoError;
use crate::repos::post_repo::{
    NewPost, PostChanges, PostOwnership, PostRow, PostStore, ResourceStore,
};

#[derive(Debug, Default)]
pub struct InMemoryPostStore {
    inner: RwLock<Posts>,
}

#[derive(Debug, Default)]
struct Posts {
    last_id: i64,
    rows: BTreeMap<i64, PostRow>,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row as-is (keeps the given id). Useful for seeding posts whose
    /// owner fields were written by another client.
    pub async fn insert(&self, row: PostRow) {
        let mut posts = self.inner.write().await;
        posts.last_id = posts.last_id.max(row.post_id);
        posts.rows.insert(row.post_id, row);
    }
}

#[async_trait]
impl ResourceStore for InMemoryPostStore {
    async fn find_ownership(&self, post_id: i64) -> Result<Option<PostOwnership>, RepoError> {
        let posts = self.inner.read().await;
        Ok(posts.rows.get(&post_id).map(PostRow::ownership))
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn list(&self) -> Result<Vec<PostRow>, RepoError> {
        let posts = self.inner.read().await;
        let mut rows: Vec<PostRow> = posts.rows.values().cloned().collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.post_id.cmp(&a.post_id))
        });
        Ok(rows)
    }

    async fn create(&self, post: NewPost) -> Result<PostRow, RepoError> {
        let mut posts = self.inner.write().await;
        posts.last_id += 1;

        let now = Utc::now();
        let row = PostRow {
            post_id: posts.last_id,
            title: post.title,
            desc: post.desc,
            img: post.img,
            content: post.content,
            username: Some(post.owner_email),
            user_id: Some(post.owner_id),
            created_at: now,
            updated_at: now,
        };
        posts.rows.insert(row.post_id, row.clone());

        Ok(row)
    }

    async fn get(&self, post_id: i64) -> Result<Option<PostRow>, RepoError> {
        let posts = self.inner.read().await;
        Ok(posts.rows.get(&post_id).cloned())
    }

    async fn update(
        &self,
        post_id: i64,
        changes: PostChanges,
    ) -> Result<Option<PostRow>, RepoError> {
        let mut posts = self.inner.write().await;
        let Some(row) = posts.rows.get_mut(&post_id) else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            row.title = title;
        }
        if let Some(desc) = changes.desc {
            row.desc = desc;
        }
        if let Some(img) = changes.img {
            row.img = Some(img);
        }
        if let Some(content) = changes.content {
            row.content = content;
        }
        row.updated_at = Utc::now();

        Ok(Some(row.clone()))
    }

    async fn delete(&self, post_id: i64) -> Result<bool, RepoError> {
        let mut posts = self.inner.write().await;
        Ok(posts.rows.remove(&post_id).is_some())
    }
}
