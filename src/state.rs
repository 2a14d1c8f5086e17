use std::sync::Arc;

use crate::{
    accounts::Accounts,
    auth::jwt::JwtKeys,
    config::{AppConfig, JwtConfig, StoreKind},
    storage::{MemoryStore, Store},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub accounts: Arc<Accounts>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let store = config.store.connect().await?;
        Ok(Self::from_parts(config, store))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn Store>) -> Self {
        let keys = JwtKeys::from(&config.jwt);
        Self {
            accounts: Arc::new(Accounts::new(store, keys)),
            config,
        }
    }

    /// In-memory wiring for tests.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            store: StoreKind::Memory,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: None,
            },
        });
        Self::from_parts(config, Arc::new(MemoryStore::new()))
    }
}
