// Demo content for a fresh database

use tracing::{info, warn};

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    models::{NewPost, NewUser},
};

pub const DEMO_USERNAME: &str = "chef";
pub const DEMO_PASSWORD: &str = "bon-appetit-2024";

const CATEGORIES: [&str; 4] = ["Breakfast", "Soups", "Pasta", "Desserts"];
const TAGS: [&str; 4] = ["vegetarian", "quick", "classic", "comfort food"];

struct SamplePost {
    title: &'static str,
    content: Option<&'static str>,
    category: &'static str,
    tags: &'static [&'static str],
    is_published: bool,
}

const POSTS: [SamplePost; 6] = [
    SamplePost {
        title: "Fluffy pancakes",
        content: Some("Whisk flour, milk, eggs and a spoon of sugar. Rest the batter for ten minutes before frying."),
        category: "Breakfast",
        tags: &["vegetarian", "quick"],
        is_published: true,
    },
    SamplePost {
        title: "Borscht",
        content: Some("Beetroot, cabbage and potatoes simmered in a rich broth. Serve with sour cream and dill."),
        category: "Soups",
        tags: &["classic", "comfort food"],
        is_published: true,
    },
    SamplePost {
        title: "Pasta carbonara",
        content: Some("Guanciale, eggs, pecorino and black pepper. No cream, ever."),
        category: "Pasta",
        tags: &["classic", "quick"],
        is_published: true,
    },
    SamplePost {
        title: "Pasta e fagioli",
        content: Some("A thick soup of small pasta and borlotti beans."),
        category: "Pasta",
        tags: &["comfort food"],
        is_published: true,
    },
    SamplePost {
        title: "Tiramisu",
        content: Some("Savoiardi dipped in espresso, layered with mascarpone cream and dusted with cocoa."),
        category: "Desserts",
        tags: &["classic", "vegetarian"],
        is_published: true,
    },
    SamplePost {
        title: "Chocolate souffle",
        content: None,
        category: "Desserts",
        tags: &[],
        is_published: false,
    },
];

/// Seeds categories, tags, a demo author and posts. Does nothing when the
/// database already has categories; returns whether anything was written.
pub async fn seed_sample_data(state: &AppState) -> AppResult<bool> {
    if !state.db.list_categories().await?.is_empty() {
        info!("Database already has content, skipping sample data");
        return Ok(false);
    }

    let mut categories = Vec::with_capacity(CATEGORIES.len());
    for title in CATEGORIES {
        categories.push(state.db.create_category(title).await?);
    }

    let mut tags = Vec::with_capacity(TAGS.len());
    for name in TAGS {
        tags.push(state.db.create_tag(name).await?);
    }

    let author_id = match state
        .identity
        .register(&NewUser {
            username: DEMO_USERNAME.to_string(),
            email: format!("{}@example.com", DEMO_USERNAME),
            password: DEMO_PASSWORD.to_string(),
        })
        .await
    {
        Ok(user) => Some(user.id),
        Err(AppError::Validation(message)) => {
            warn!("Demo author not created ({}), posts will have no author", message);
            None
        }
        Err(e) => return Err(e),
    };

    for sample in &POSTS {
        let category_id = categories
            .iter()
            .find(|c| c.title == sample.category)
            .map(|c| c.id)
            .ok_or_else(|| AppError::Internal(format!("Unknown sample category {}", sample.category)))?;
        let tag_ids = tags
            .iter()
            .filter(|t| sample.tags.contains(&t.name.as_str()))
            .map(|t| t.id)
            .collect();

        state
            .db
            .create_post(&NewPost {
                title: sample.title.to_string(),
                content: sample.content.map(str::to_string),
                photo: None,
                is_published: sample.is_published,
                category_id,
                author_id,
                tag_ids,
            })
            .await?;
    }

    info!(
        "Seeded {} categories, {} tags and {} posts",
        categories.len(),
        tags.len(),
        POSTS.len()
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, database::BlogDatabase};
    use std::sync::Arc;

    async fn test_state(media: &std::path::Path) -> AppState {
        let db = Arc::new(BlogDatabase::new_in_memory().await.unwrap());
        AppState::with_database(Config::for_testing(media), db).unwrap()
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;

        assert!(seed_sample_data(&state).await.unwrap());
        assert!(!seed_sample_data(&state).await.unwrap());

        assert_eq!(state.db.list_categories().await.unwrap().len(), CATEGORIES.len());
        // The draft stays out of the published listing.
        assert_eq!(state.db.list_published_posts().await.unwrap().len(), POSTS.len() - 1);
    }

    #[tokio::test]
    async fn test_seeded_posts_have_author_and_tags() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path()).await;
        seed_sample_data(&state).await.unwrap();

        let (author, _) = state.identity.login(DEMO_USERNAME, DEMO_PASSWORD).await.unwrap();
        let posts = state.db.list_posts_by_author(author.id).await.unwrap();
        assert_eq!(posts.len(), POSTS.len());

        let tiramisu = posts.iter().find(|p| p.post.title == "Tiramisu").unwrap();
        assert_eq!(tiramisu.category_title, "Desserts");
        let tags = state.db.tags_for_post(tiramisu.post.id).await.unwrap();
        assert_eq!(tags.len(), 2);
    }
}
