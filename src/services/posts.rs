use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{parse_secondary_interests, InterestRef, Post};

/// Fields for creating a post
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub primary_interest_id: Option<i64>,
    pub secondary_interest_ids: Vec<i64>,
}

/// Posts query surface consumed by the recommendation core
///
/// Every read excludes soft-deleted posts.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PostStore: Send + Sync {
    /// Posts whose primary interest is in `interest_ids`, most recent first
    async fn by_primary_interest(&self, interest_ids: &[i64], limit: i64)
        -> AppResult<Vec<Post>>;

    /// Most recent posts regardless of interest
    async fn recent(&self, limit: i64) -> AppResult<Vec<Post>>;

    async fn by_id(&self, id: i64) -> AppResult<Option<Post>>;

    /// Posts for the given ids, preserving input order; missing or deleted ids
    /// are silently dropped
    async fn by_ids(&self, ids: &[i64]) -> AppResult<Vec<Post>>;

    async fn create(&self, post: NewPost) -> AppResult<Post>;
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    title: String,
    content: String,
    author: String,
    created_at: DateTime<Utc>,
    is_deleted: bool,
    primary_interest_id: Option<i64>,
    primary_interest_name: Option<String>,
    primary_interest_category: Option<String>,
    secondary_interest_ids: Option<String>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        let primary_interest = match (
            row.primary_interest_id,
            row.primary_interest_name,
            row.primary_interest_category,
        ) {
            (Some(id), Some(name), Some(category)) => Some(InterestRef { id, name, category }),
            _ => None,
        };

        Post {
            id: row.id,
            title: row.title,
            content: row.content,
            author: row.author,
            created_at: row.created_at,
            is_deleted: row.is_deleted,
            primary_interest,
            secondary_interest_ids: parse_secondary_interests(
                row.secondary_interest_ids.as_deref(),
            ),
        }
    }
}

const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.content, u.username AS author, p.created_at, p.is_deleted,
           p.primary_interest_id,
           i.name AS primary_interest_name,
           i.category AS primary_interest_category,
           p.secondary_interest_ids
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN interests i ON i.id = p.primary_interest_id
"#;

/// Postgres-backed post store
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PostStore for PgPostStore {
    async fn by_primary_interest(
        &self,
        interest_ids: &[i64],
        limit: i64,
    ) -> AppResult<Vec<Post>> {
        if interest_ids.is_empty() || limit <= 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{POST_SELECT} WHERE p.primary_interest_id = ANY($1) AND p.is_deleted = FALSE \
             ORDER BY p.created_at DESC LIMIT $2"
        );

        let rows: Vec<PostRow> = sqlx::query_as(&sql)
            .bind(interest_ids)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<Post>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let sql =
            format!("{POST_SELECT} WHERE p.is_deleted = FALSE ORDER BY p.created_at DESC LIMIT $1");

        let rows: Vec<PostRow> = sqlx::query_as(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn by_id(&self, id: i64) -> AppResult<Option<Post>> {
        let sql = format!("{POST_SELECT} WHERE p.id = $1 AND p.is_deleted = FALSE");

        let row: Option<PostRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Post::from))
    }

    async fn by_ids(&self, ids: &[i64]) -> AppResult<Vec<Post>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("{POST_SELECT} WHERE p.id = ANY($1) AND p.is_deleted = FALSE");

        let rows: Vec<PostRow> = sqlx::query_as(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        let mut by_id: std::collections::HashMap<i64, Post> = rows
            .into_iter()
            .map(Post::from)
            .map(|post| (post.id, post))
            .collect();

        // Re-apply the caller's ranking order
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn create(&self, post: NewPost) -> AppResult<Post> {
        let secondary = if post.secondary_interest_ids.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&post.secondary_interest_ids)
                    .map_err(|e| AppError::Internal(format!("Encoding interests: {e}")))?,
            )
        };

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO posts (title, content, author_id, primary_interest_id, secondary_interest_ids)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.author_id)
        .bind(post.primary_interest_id)
        .bind(secondary)
        .fetch_one(&self.pool)
        .await?;

        self.by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal("Created post not found".to_string()))
    }
}
