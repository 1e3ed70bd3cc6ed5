use std::sync::Arc;

use crate::{
    config::Config,
    database::BlogDatabase,
    error::AppResult,
    infrastructure::{HasIdentityProvider, IdentityProvider, MediaStore, SqliteIdentityProvider},
};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<BlogDatabase>,
    pub identity: Arc<dyn IdentityProvider>,
    pub media: MediaStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let database = BlogDatabase::new(&config.database).await?;
        database.init().await?;
        Self::with_database(config, Arc::new(database))
    }

    /// Wire the state around an already initialized database.
    pub fn with_database(config: Config, db: Arc<BlogDatabase>) -> AppResult<Self> {
        let identity: Arc<dyn IdentityProvider> =
            Arc::new(SqliteIdentityProvider::new(db.clone(), &config.auth)?);
        let media = MediaStore::new(config.media.root.clone());

        Ok(Self {
            db,
            identity,
            media,
            config: Arc::new(config),
        })
    }
}

impl HasIdentityProvider for AppState {
    fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }
}
