// Blog domain rows - one struct per table, plus the joined listings the pages need

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder body for posts created without content.
pub const DEFAULT_POST_CONTENT: &str = "An article is coming here soon ...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub title: String,
}

/// Category annotated with the number of its published posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryWithCount {
    pub id: i64,
    pub title: String,
    pub post_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub photo: Option<String>,
    pub watched: i64,
    pub is_published: bool,
    pub category_id: i64,
    pub author_id: Option<i64>,
}

/// A post joined with the display names of its category and author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub post: Post,
    pub category_title: String,
    pub author_username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub comment: Comment,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Input for creating a post. `content: None` stores the placeholder body.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub content: Option<String>,
    pub photo: Option<String>,
    pub is_published: bool,
    pub category_id: i64,
    pub author_id: Option<i64>,
    pub tag_ids: Vec<i64>,
}

/// Input for updating a post. `photo: None` keeps the current photo.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: String,
    pub content: String,
    pub photo: Option<String>,
    pub category_id: i64,
    pub tag_ids: Option<Vec<i64>>,
}
