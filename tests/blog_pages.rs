mod common;

use axum::http::StatusCode;
use futures::future::join_all;

use common::{json_body, location, multipart_body, TestApp};

const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

#[tokio::test]
async fn test_tiramisu_category_and_detail() {
    let app = TestApp::new().await;
    let desserts = app.category("Desserts").await;
    let soups = app.category("Soups").await;
    let tiramisu = app.post("Tiramisu", "Coffee and mascarpone", desserts.id, None).await;
    app.post("Borscht", "Beetroot", soups.id, None).await;

    let response = app.get(&format!("/category/{}/", desserts.id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(page["title"], "Desserts");
    let posts = page["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["title"], "Tiramisu");
    assert_eq!(page["categories"].as_array().unwrap().len(), 2);

    let before = app.state.db.get_post(tiramisu.id).await.unwrap().unwrap().watched;
    let page = json_body(app.get(&format!("/post/{}/", tiramisu.id), None).await).await;
    assert_eq!(page["post"]["watched"], before + 1);
    assert_eq!(page["post"]["category_title"], "Desserts");
    assert_eq!(page["can_comment"], false);
}

#[tokio::test]
async fn test_concurrent_views_are_all_counted() {
    let app = TestApp::new().await;
    let pasta = app.category("Pasta").await;
    let post = app.post("Carbonara", "Eggs and guanciale", pasta.id, None).await;

    let uri = format!("/post/{}/", post.id);
    let responses = join_all((0..20).map(|_| app.get(&uri, None))).await;
    assert!(responses.iter().all(|r| r.status() == StatusCode::OK));

    let stored = app.state.db.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.watched, 20);
}

#[tokio::test]
async fn test_index_and_sidebar_only_show_published_posts() {
    let app = TestApp::new().await;
    let soups = app.category("Soups").await;
    let drafts = app.category("Drafts").await;
    app.post("Borscht", "Beetroot", soups.id, None).await;
    let draft = app.post("Secret soup", "Not yet", drafts.id, None).await;
    app.state.db.set_post_published(draft.id, false).await.unwrap();

    let page = json_body(app.get("/", None).await).await;
    assert_eq!(page["title"], "Home");
    assert!(page["viewer"].is_null());
    let posts = page["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["title"], "Borscht");

    let categories = page["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0]["title"], "Soups");
    assert_eq!(categories[0]["post_count"], 1);
}

#[tokio::test]
async fn test_search_matches_title_and_content() {
    let app = TestApp::new().await;
    let mains = app.category("Mains").await;
    app.post("Pasta carbonara", "Roman classic", mains.id, None).await;
    app.post("Lasagne", "Baked PASTA sheets", mains.id, None).await;
    app.post("Borscht", "Beetroot soup", mains.id, None).await;

    let page = json_body(app.get("/search/?q=pasta", None).await).await;
    assert_eq!(page["query"], "pasta");
    let mut titles: Vec<_> = page["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap().to_string())
        .collect();
    titles.sort();
    assert_eq!(titles, ["Lasagne", "Pasta carbonara"]);

    let everything = json_body(app.get("/search/", None).await).await;
    assert_eq!(everything["posts"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_search_is_case_insensitive_for_cyrillic() {
    let app = TestApp::new().await;
    let soups = app.category("Супы").await;
    app.post("Борщ украинский", "Скоро тут будет статья ...", soups.id, None).await;
    app.post("Щи", "Капуста", soups.id, None).await;

    let page = json_body(app.get("/search/?q=%D0%B1%D0%BE%D1%80%D1%89", None).await).await;
    assert_eq!(page["query"], "борщ");
    let posts = page["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["title"], "Борщ украинский");
}

#[tokio::test]
async fn test_missing_objects_are_not_found() {
    let app = TestApp::new().await;
    assert_eq!(app.get("/post/999/", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/category/999/", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/profile/999/", None).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_lists_all_posts_by_author() {
    let app = TestApp::new().await;
    let (author, _) = app.sign_up("nonna").await;
    let desserts = app.category("Desserts").await;
    app.post("Tiramisu", "Mascarpone", desserts.id, Some(author.id)).await;
    let draft = app.post("Panna cotta", "Soon", desserts.id, Some(author.id)).await;
    app.state.db.set_post_published(draft.id, false).await.unwrap();

    let page = json_body(app.get(&format!("/profile/{}/", author.id), None).await).await;
    assert_eq!(page["profile"]["username"], "nonna");
    assert!(page["profile"].get("password_hash").is_none());
    assert_eq!(page["posts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_add_comment_requires_login_and_text() {
    let app = TestApp::new().await;
    let soups = app.category("Soups").await;
    let post = app.post("Borscht", "Beetroot", soups.id, None).await;
    let uri = format!("/add_comment/{}/", post.id);

    let response = app.post_form(&uri, "text=Lovely", None).await;
    assert_eq!(location(&response), format!("/login/?next={}", uri));

    let (user, token) = app.sign_up("taster").await;
    let response = app.post_form(&uri, "text=+++", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = json_body(response).await;
    assert_eq!(page["errors"]["text"][0], "This field is required.");
    assert_eq!(app.state.db.count_comments(post.id).await.unwrap(), 0);

    let response = app.post_form(&uri, "text=Lovely+soup", Some(&token)).await;
    assert_eq!(location(&response), format!("/post/{}/", post.id));

    let comments = app.state.db.list_comments_for_post(post.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].comment.text, "Lovely soup");
    assert_eq!(comments[0].comment.user_id, user.id);
    assert_eq!(comments[0].username, "taster");

    let page = json_body(app.get(&format!("/post/{}/", post.id), Some(&token)).await).await;
    assert_eq!(page["can_comment"], true);
    assert_eq!(page["comments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_add_article_with_photo() {
    let app = TestApp::new().await;
    let (user, token) = app.sign_up("baker").await;
    let breads = app.category("Breads").await;
    let tag = app.state.db.create_tag("vegan").await.unwrap();

    let category = breads.id.to_string();
    let tag_id = tag.id.to_string();
    let body = multipart_body(
        &[
            ("title", "Focaccia"),
            ("content", "Olive oil and rosemary"),
            ("category", category.as_str()),
            ("tags", tag_id.as_str()),
        ],
        Some(("photo", "focaccia.JPG", JPEG_HEADER)),
    );
    let response = app.post_multipart("/add_article/", body, Some(&token)).await;
    assert_eq!(location(&response), "/");

    let posts = app.state.db.list_posts_by_author(user.id).await.unwrap();
    assert_eq!(posts.len(), 1);
    let post = &posts[0].post;
    assert_eq!(post.title, "Focaccia");
    assert!(post.is_published);
    let photo = post.photo.clone().unwrap();
    assert!(photo.starts_with("photos/") && photo.ends_with(".jpg"));
    assert!(app.media.path().join(&photo).exists());
    assert_eq!(app.state.db.tags_for_post(post.id).await.unwrap(), vec![tag]);

    let served = app.get(&format!("/media/{}", photo), None).await;
    assert_eq!(served.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_add_article_rejects_invalid_form() {
    let app = TestApp::new().await;
    let (_, token) = app.sign_up("baker").await;

    let response = app.get("/add_article/", None).await;
    assert_eq!(location(&response), "/login/?next=/add_article/");

    let body = multipart_body(
        &[("title", "Mystery"), ("content", ""), ("category", "42")],
        Some(("photo", "notes.txt", &b"hello"[..])),
    );
    let response = app.post_multipart("/add_article/", body, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = json_body(response).await;
    for field in ["content", "category", "photo"] {
        assert!(page["errors"][field].is_array(), "expected error on {}", field);
    }
    assert_eq!(page["form"]["title"], "Mystery");
    assert!(app.state.db.list_published_posts().await.unwrap().is_empty());
    assert!(!app.media.path().join("photos").exists());
}

#[tokio::test]
async fn test_add_article_rejects_markup_posing_as_image() {
    let app = TestApp::new().await;
    let (_, token) = app.sign_up("baker").await;
    let breads = app.category("Breads").await;

    let category = breads.id.to_string();
    let body = multipart_body(
        &[
            ("title", "Focaccia"),
            ("content", "Olive oil and rosemary"),
            ("category", category.as_str()),
        ],
        Some(("photo", "evil.png", &b"<html><script>alert(1)</script></html>"[..])),
    );
    let response = app.post_multipart("/add_article/", body, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = json_body(response).await;
    assert!(page["errors"]["photo"][0].as_str().unwrap().contains("valid image"));
    assert!(app.state.db.list_published_posts().await.unwrap().is_empty());
    assert!(!app.media.path().join("photos").exists());
}

#[tokio::test]
async fn test_only_the_author_may_update_or_delete() {
    let app = TestApp::new().await;
    let (author, author_token) = app.sign_up("author").await;
    let (_, other_token) = app.sign_up("stranger").await;
    let soups = app.category("Soups").await;
    let post = app.post("Borscht", "Beetroot", soups.id, Some(author.id)).await;
    let commenter = app.sign_up("commenter").await.0;
    app.state.db.create_comment(post.id, commenter.id, "Yum").await.unwrap();

    let category = soups.id.to_string();
    let update = || {
        multipart_body(
            &[("title", "Red borscht"), ("content", "More beetroot"), ("category", category.as_str())],
            None,
        )
    };
    let update_uri = format!("/post/{}/update/", post.id);
    let delete_uri = format!("/post/{}/delete/", post.id);

    let response = app.post_multipart(&update_uri, update(), Some(&other_token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app.post_form(&delete_uri, "", Some(&other_token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let form = json_body(app.get(&update_uri, Some(&author_token)).await).await;
    assert_eq!(form["form"]["title"], "Borscht");

    let response = app.post_multipart(&update_uri, update(), Some(&author_token)).await;
    assert_eq!(location(&response), "/");
    let stored = app.state.db.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Red borscht");
    assert_eq!(stored.content, "More beetroot");

    let response = app.post_form(&delete_uri, "", Some(&author_token)).await;
    assert_eq!(location(&response), "/");
    assert!(app.state.db.get_post(post.id).await.unwrap().is_none());
    assert_eq!(app.state.db.count_comments(post.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_ownership_check_can_be_disabled() {
    let app = TestApp::with_config(|config| config.auth.enforce_post_ownership = false).await;
    let (author, _) = app.sign_up("author").await;
    let (_, editor_token) = app.sign_up("editor").await;
    let soups = app.category("Soups").await;
    let post = app.post("Borscht", "Beetroot", soups.id, Some(author.id)).await;

    let response = app
        .post_form(&format!("/post/{}/delete/", post.id), "", Some(&editor_token))
        .await;
    assert_eq!(location(&response), "/");
    assert!(app.state.db.get_post(post.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;
    let response = app.get("/health/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}
