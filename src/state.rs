use crate::auth::session_store::{PgSessionStore, SessionStore};
use crate::config::AppConfig;
use crate::identity::{pg::PgIdentityStore, IdentityStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub identities: Arc<dyn IdentityStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let identities = Arc::new(PgIdentityStore::new(db.clone())) as Arc<dyn IdentityStore>;
        let sessions = Arc::new(PgSessionStore::new(db)) as Arc<dyn SessionStore>;
        Ok(Self::from_parts(config, identities, sessions))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            identities,
            sessions,
        }
    }

    /// State backed by in-memory stores and a throwaway config.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::with_memory(Arc::new(crate::identity::memory::MemoryIdentityStore::new()))
    }

    #[cfg(test)]
    pub fn with_memory(store: Arc<crate::identity::memory::MemoryIdentityStore>) -> Self {
        use crate::auth::session_store::memory::MemorySessionStore;

        Self::from_parts(
            Arc::new(crate::testing::test_config()),
            store,
            Arc::new(MemorySessionStore::default()),
        )
    }
}
