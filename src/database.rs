use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::{path::Path, str::FromStr};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    Category, CategoryWithCount, Comment, CommentWithAuthor, NewPost, Post, PostChanges,
    PostListing, Tag, DEFAULT_POST_CONTENT,
};

const POST_COLUMNS: &str = "p.id, p.title, p.content, p.created_at, p.updated_at, p.photo, \
     p.watched, p.is_published, p.category_id, p.author_id";

const LISTING_JOINS: &str = "FROM posts p \
     JOIN categories c ON c.id = p.category_id \
     LEFT JOIN users u ON u.id = p.author_id";

// Blog database over an SQLx SQLite pool. Referential integrity lives in the
// schema: every cascade below is an ON DELETE CASCADE foreign key.
pub struct BlogDatabase {
    pub pool: SqlitePool,
}

impl BlogDatabase {
    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        let in_memory = config.url.contains(":memory:");
        if !in_memory {
            ensure_parent_dir(&config.url)?;
        }

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid DATABASE_URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections.max(1));
        if in_memory {
            // Every connection to :memory: is a separate database, so keep exactly one alive.
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to connect to {}: {}", config.url, e))
        })?;

        Ok(BlogDatabase { pool })
    }

    pub async fn new_in_memory() -> AppResult<Self> {
        let db = Self::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await?;
        db.init().await?;
        Ok(db)
    }

    pub async fn init(&self) -> AppResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL DEFAULT '',
                password_hash TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                date_joined TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL UNIQUE
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                photo TEXT,
                watched INTEGER NOT NULL DEFAULT 0 CHECK (watched >= 0),
                is_published INTEGER NOT NULL DEFAULT 1,
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                author_id INTEGER REFERENCES users(id) ON DELETE CASCADE
            )",
            DEFAULT_POST_CONTENT.replace('\'', "''")
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text TEXT NOT NULL CHECK (length(trim(text)) > 0),
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS post_tags (
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (post_id, tag_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        // The view counter only ever grows
        sqlx::query(
            "CREATE TRIGGER IF NOT EXISTS posts_watched_never_decreases
             BEFORE UPDATE OF watched ON posts
             WHEN NEW.watched < OLD.watched
             BEGIN
                 SELECT RAISE(ABORT, 'watched counter cannot decrease');
             END",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_category ON posts(category_id, is_published)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_watched ON posts(watched DESC)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)")
            .execute(&self.pool)
            .await?;

        info!("Database schema ready");
        Ok(())
    }

    /// Health check to verify database connectivity
    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // Categories

    pub async fn create_category(&self, title: &str) -> AppResult<Category> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Category title is required".to_string()));
        }

        let result = sqlx::query("INSERT INTO categories (title) VALUES (?)")
            .bind(title)
            .execute(&self.pool)
            .await?;

        Ok(Category {
            id: result.last_insert_rowid(),
            title: title.to_string(),
        })
    }

    pub async fn get_category(&self, id: i64) -> AppResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT id, title FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>("SELECT id, title FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    /// Removes a category together with all of its posts.
    pub async fn delete_category(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_categories_with_published_posts(&self) -> AppResult<Vec<CategoryWithCount>> {
        let categories = sqlx::query_as::<_, CategoryWithCount>(
            "SELECT c.id, c.title, COUNT(p.id) AS post_count
             FROM categories c
             JOIN posts p ON p.category_id = c.id AND p.is_published = 1
             GROUP BY c.id, c.title
             HAVING COUNT(p.id) > 0
             ORDER BY c.id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    // Posts

    pub async fn create_post(&self, new_post: &NewPost) -> AppResult<Post> {
        let now = Utc::now();
        let content = new_post
            .content
            .clone()
            .unwrap_or_else(|| DEFAULT_POST_CONTENT.to_string());

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO posts (title, content, created_at, updated_at, photo, is_published, category_id, author_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_post.title)
        .bind(&content)
        .bind(now)
        .bind(now)
        .bind(&new_post.photo)
        .bind(new_post.is_published)
        .bind(new_post.category_id)
        .bind(new_post.author_id)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();

        for tag_id in &new_post.tag_ids {
            sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!("Created post {} in category {}", id, new_post.category_id);

        Ok(Post {
            id,
            title: new_post.title.clone(),
            content,
            created_at: now,
            updated_at: now,
            photo: new_post.photo.clone(),
            watched: 0,
            is_published: new_post.is_published,
            category_id: new_post.category_id,
            author_id: new_post.author_id,
        })
    }

    pub async fn get_post(&self, id: i64) -> AppResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!("SELECT {} FROM posts p WHERE p.id = ?", POST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    pub async fn get_post_listing(&self, id: i64) -> AppResult<Option<PostListing>> {
        let post = sqlx::query_as::<_, PostListing>(&listing_query("WHERE p.id = ?", ""))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    /// Applies form changes; returns the previous row so callers can clean up a replaced photo.
    pub async fn update_post(&self, id: i64, changes: &PostChanges) -> AppResult<Post> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_as::<_, Post>(&format!("SELECT {} FROM posts p WHERE p.id = ?", POST_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))?;

        sqlx::query(
            "UPDATE posts SET title = ?, content = ?, photo = COALESCE(?, photo), category_id = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&changes.title)
        .bind(&changes.content)
        .bind(&changes.photo)
        .bind(changes.category_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(tag_ids) = &changes.tag_ids {
            sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for tag_id in tag_ids {
                sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                    .bind(id)
                    .bind(tag_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        info!("Updated post {}", id);
        Ok(previous)
    }

    pub async fn set_post_published(&self, id: i64, is_published: bool) -> AppResult<bool> {
        let result = sqlx::query("UPDATE posts SET is_published = ?, updated_at = ? WHERE id = ?")
            .bind(is_published)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes a post; its comments and tag links go with it.
    pub async fn delete_post(&self, id: i64) -> AppResult<Option<Post>> {
        let mut tx = self.pool.begin().await?;

        let post = sqlx::query_as::<_, Post>(&format!("SELECT {} FROM posts p WHERE p.id = ?", POST_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        if post.is_some() {
            sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        if post.is_some() {
            info!("Deleted post {}", id);
        }
        Ok(post)
    }

    /// Atomic `watched + 1` in a single statement. Returns false when the post does not exist.
    pub async fn increment_post_views(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("UPDATE posts SET watched = watched + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_published_posts(&self) -> AppResult<Vec<PostListing>> {
        let posts = sqlx::query_as::<_, PostListing>(&listing_query("WHERE p.is_published = 1", "ORDER BY p.id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    pub async fn list_posts_by_category(&self, category_id: i64) -> AppResult<Vec<PostListing>> {
        let posts = sqlx::query_as::<_, PostListing>(&listing_query(
            "WHERE p.category_id = ? AND p.is_published = 1",
            "ORDER BY p.id",
        ))
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    /// Case-insensitive substring match on title or content, with full
    /// Unicode case folding (SQLite `LIKE` only folds ASCII). An empty query
    /// matches every post.
    pub async fn search_posts(&self, query_text: &str) -> AppResult<Vec<PostListing>> {
        let posts = sqlx::query_as::<_, PostListing>(&listing_query("", "ORDER BY p.id"))
            .fetch_all(&self.pool)
            .await?;

        let needle = query_text.to_lowercase();
        if needle.is_empty() {
            return Ok(posts);
        }
        Ok(posts
            .into_iter()
            .filter(|listing| {
                contains_folded(&listing.post.title, &needle)
                    || contains_folded(&listing.post.content, &needle)
            })
            .collect())
    }

    /// Every post of an author, published or not.
    pub async fn list_posts_by_author(&self, user_id: i64) -> AppResult<Vec<PostListing>> {
        let posts = sqlx::query_as::<_, PostListing>(&listing_query("WHERE p.author_id = ?", "ORDER BY p.id"))
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    /// Most watched published posts, excluding the one being read.
    pub async fn list_popular_posts(&self, exclude_id: i64, limit: i64) -> AppResult<Vec<PostListing>> {
        let posts = sqlx::query_as::<_, PostListing>(&listing_query(
            "WHERE p.id != ? AND p.is_published = 1",
            "ORDER BY p.watched DESC, p.id LIMIT ?",
        ))
        .bind(exclude_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    // Comments

    pub async fn create_comment(&self, post_id: i64, user_id: i64, text: &str) -> AppResult<Comment> {
        let now = Utc::now();
        let result = sqlx::query("INSERT INTO comments (post_id, user_id, text, created_at) VALUES (?, ?, ?, ?)")
            .bind(post_id)
            .bind(user_id)
            .bind(text)
            .bind(now)
            .execute(&self.pool)
            .await?;

        let id = result.last_insert_rowid();
        info!("User {} commented on post {}", user_id, post_id);

        Ok(Comment {
            id,
            post_id,
            user_id,
            text: text.to_string(),
            created_at: now,
        })
    }

    pub async fn list_comments_for_post(&self, post_id: i64) -> AppResult<Vec<CommentWithAuthor>> {
        let comments = sqlx::query_as::<_, CommentWithAuthor>(
            "SELECT cm.id, cm.post_id, cm.user_id, cm.text, cm.created_at, u.username
             FROM comments cm
             JOIN users u ON u.id = cm.user_id
             WHERE cm.post_id = ?
             ORDER BY cm.created_at, cm.id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    pub async fn count_comments(&self, post_id: i64) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) FROM comments WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get(0))
    }

    // Tags

    pub async fn create_tag(&self, name: &str) -> AppResult<Tag> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 50 {
            return Err(AppError::Validation(
                "Tag name must be between 1 and 50 characters".to_string(),
            ));
        }

        let result = sqlx::query("INSERT INTO tags (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(Tag {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub async fn list_tags(&self) -> AppResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    pub async fn delete_tag(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn tags_for_post(&self, post_id: i64) -> AppResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT t.id, t.name FROM tags t
             JOIN post_tags pt ON pt.tag_id = t.id
             WHERE pt.post_id = ?
             ORDER BY t.name, t.id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    /// Ids from the list that name existing tags.
    pub async fn existing_tag_ids(&self, ids: &[i64]) -> AppResult<Vec<i64>> {
        let mut existing = Vec::with_capacity(ids.len());
        for id in ids {
            let found = sqlx::query("SELECT 1 FROM tags WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            if found.is_some() && !existing.contains(id) {
                existing.push(*id);
            }
        }
        Ok(existing)
    }
}

fn listing_query(filter: &str, tail: &str) -> String {
    format!(
        "SELECT {}, c.title AS category_title, u.username AS author_username {} {} {}",
        POST_COLUMNS, LISTING_JOINS, filter, tail
    )
}

/// `needle` must already be lowercased.
fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn ensure_parent_dir(url: &str) -> AppResult<()> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
