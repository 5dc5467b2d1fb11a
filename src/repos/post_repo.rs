/*
 * Responsibility
 * - posts CRUD behind the PostStore trait
 * - the ownership projection (ResourceStore) used by the ownership gate
 * - Postgres implementation (schema: db/schema.sql)
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::repos::error::RepoError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    #[sqlx(rename = "postId")]
    pub post_id: i64,

    pub title: String,
    pub desc: String,
    pub img: Option<String>,
    pub content: String,

    // Owner email
    pub username: Option<String>,
    #[sqlx(rename = "userId")]
    pub user_id: Option<String>,

    #[sqlx(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[sqlx(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl PostRow {
    pub fn ownership(&self) -> PostOwnership {
        PostOwnership {
            owner_email: self.username.clone(),
            owner_id: self.user_id.clone(),
        }
    }
}

/// The owner fields of a post, without the rest of the row.
///
/// Either field may be absent depending on how the post was created.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PostOwnership {
    #[sqlx(rename = "username")]
    pub owner_email: Option<String>,
    #[sqlx(rename = "userId")]
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub desc: String,
    pub img: Option<String>,
    pub content: String,
    pub owner_email: String,
    pub owner_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub img: Option<String>,
    pub content: Option<String>,
}

/// The single lookup the ownership gate makes into persistence.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn find_ownership(&self, post_id: i64) -> Result<Option<PostOwnership>, RepoError>;
}

#[async_trait]
pub trait PostStore: ResourceStore {
    // Newest first.
    async fn list(&self) -> Result<Vec<PostRow>, RepoError>;

    async fn create(&self, post: NewPost) -> Result<PostRow, RepoError>;

    async fn get(&self, post_id: i64) -> Result<Option<PostRow>, RepoError>;

    async fn update(&self, post_id: i64, changes: PostChanges)
    -> Result<Option<PostRow>, RepoError>;

    async fn delete(&self, post_id: i64) -> Result<bool, RepoError>;
}

#[derive(Clone, Debug)]
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, RepoError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl ResourceStore for PgPostStore {
    async fn find_ownership(&self, post_id: i64) -> Result<Option<PostOwnership>, RepoError> {
        let row = sqlx::query_as::<_, PostOwnership>(
            r#"
            SELECT username, "userId"
            FROM posts
            WHERE "postId" = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn list(&self) -> Result<Vec<PostRow>, RepoError> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT
                "postId", title, "desc", img, content, username, "userId", "createdAt", "updatedAt"
            FROM posts
            ORDER BY "createdAt" DESC, "postId" DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn create(&self, post: NewPost) -> Result<PostRow, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (title, "desc", img, content, username, "userId")
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING
                "postId", title, "desc", img, content, username, "userId", "createdAt", "updatedAt"
            "#,
        )
        .bind(&post.title)
        .bind(&post.desc)
        .bind(post.img.as_deref())
        .bind(&post.content)
        .bind(&post.owner_email)
        .bind(&post.owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get(&self, post_id: i64) -> Result<Option<PostRow>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT
                "postId", title, "desc", img, content, username, "userId", "createdAt", "updatedAt"
            FROM posts
            WHERE "postId" = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update(
        &self,
        post_id: i64,
        changes: PostChanges,
    ) -> Result<Option<PostRow>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            UPDATE posts
            SET
                title = COALESCE($2, title),
                "desc" = COALESCE($3, "desc"),
                img = COALESCE($4, img),
                content = COALESCE($5, content),
                "updatedAt" = now()
            WHERE "postId" = $1
            RETURNING
                "postId", title, "desc", img, content, username, "userId", "createdAt", "updatedAt"
            "#,
        )
        .bind(post_id)
        .bind(changes.title.as_deref())
        .bind(changes.desc.as_deref())
        .bind(changes.img.as_deref())
        .bind(changes.content.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete(&self, post_id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM posts
            WHERE "postId" = $1
            "#,
        )
        .bind(post_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
