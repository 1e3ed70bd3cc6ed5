// Infrastructure: identity, request context, security primitives and file storage
pub mod identity;      // Identity provider trait and its SQLite implementation
pub mod media;         // Uploaded photo storage
pub mod middleware;    // ViewerContext middleware and extractor
pub mod security;      // Password hashing and session tokens
pub mod viewer;        // Viewer context

pub use identity::{IdentityProvider, SqliteIdentityProvider};
pub use media::MediaStore;
pub use middleware::{viewer_context_middleware, HasIdentityProvider, Vc, SESSION_COOKIE};
pub use security::PasswordService;
pub use viewer::ViewerContext;
