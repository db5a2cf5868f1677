use std::sync::Arc;

use time::OffsetDateTime;

use crate::config::AppConfig;
use crate::recipes::repo::RecipeCatalog;
use crate::users::repo::UserStore;

/// Where `AppState::now` reads the time from.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    System,
    #[cfg(test)]
    Fixed(OffsetDateTime),
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<UserStore>,
    pub recipes: Arc<RecipeCatalog>,
    pub config: Arc<AppConfig>,
    pub clock: Clock,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = Arc::new(UserStore::open(&config.users_file).await?);
        let recipes = Arc::new(RecipeCatalog::load(&config.recipes_file).await?);

        Ok(Self::from_parts(store, recipes, config))
    }

    pub fn from_parts(
        store: Arc<UserStore>,
        recipes: Arc<RecipeCatalog>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            recipes,
            config,
            clock: Clock::System,
        }
    }

    /// Current wall-clock time in the configured offset.
    pub fn now(&self) -> OffsetDateTime {
        let now = match self.clock {
            Clock::System => OffsetDateTime::now_utc(),
            #[cfg(test)]
            Clock::Fixed(at) => at,
        };
        now.to_offset(self.config.utc_offset)
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            users_file: "unused/users.json".into(),
            recipes_file: "unused/recipes.json".into(),
            utc_offset: time::UtcOffset::UTC,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
        });

        Self {
            clock: Clock::Fixed(time::macros::datetime!(2024-06-06 12:00 UTC)),
            ..Self::from_parts(
                Arc::new(UserStore::in_memory()),
                Arc::new(RecipeCatalog::new(crate::recipes::repo::sample_recipes())),
                config,
            )
        }
    }
}
