pub mod api_models;
pub mod blog;
pub mod user;

pub use api_models::{CategoryResource, PostResource};
pub use blog::{
    Category, CategoryWithCount, Comment, CommentWithAuthor, NewPost, Post, PostChanges,
    PostListing, Tag, DEFAULT_POST_CONTENT,
};
pub use user::{NewUser, Session, User, UserPublic};
