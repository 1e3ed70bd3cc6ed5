// REST projections served under /posts/api/ and /categories/api/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::blog::{Category, Post};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostResource {
    pub title: String,
    pub category: i64,
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub author: Option<i64>,
}

impl From<Post> for PostResource {
    fn from(post: Post) -> Self {
        Self {
            title: post.title,
            category: post.category_id,
            created_at: post.created_at,
            content: post.content,
            author: post.author_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResource {
    pub title: String,
    pub id: i64,
}

impl From<Category> for CategoryResource {
    fn from(category: Category) -> Self {
        Self {
            title: category.title,
            id: category.id,
        }
    }
}
