//! Runtime configuration.

use typed_builder::TypedBuilder;

const DEFAULT_NOTIFIER_CAPACITY: usize = 1024;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("environment variable {name} is not valid: `{value}`")]
    Invalid { name: &'static str, value: String },
}

/// Connection parameters of the Postgres backend.
#[derive(TypedBuilder, Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    #[builder(setter(into))]
    pub host: String,
    #[builder(default = 5432)]
    pub port: u16,
    #[builder(setter(into))]
    pub user: String,
    #[builder(setter(into))]
    pub password: String,
    #[builder(setter(into))]
    pub database: String,
    /// Upper bound of the connection pool.
    #[builder(default = 5)]
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub const HOST: &'static str = "BATTERY_DB_HOST";
    pub const PORT: &'static str = "BATTERY_DB_PORT";
    pub const USER: &'static str = "BATTERY_DB_USER";
    pub const PASSWORD: &'static str = "BATTERY_DB_PASSWORD";
    pub const DATABASE: &'static str = "BATTERY_DB_NAME";

    pub fn postgres_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            &self.user, &self.password, &self.host, self.port, &self.database
        )
    }

    /// Reads the configuration from the `BATTERY_DB_*` environment variables. The port is optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));

        let port = match lookup(Self::PORT) {
            None => 5432,
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { name: Self::PORT, value })?,
        };

        Ok(Self {
            host: required(Self::HOST)?,
            port,
            user: required(Self::USER)?,
            password: required(Self::PASSWORD)?,
            database: required(Self::DATABASE)?,
            max_connections: 5,
        })
    }

    /// Opens a connection pool towards the configured database.
    #[cfg(feature = "postgres")]
    pub async fn connect(&self) -> Result<sqlx::PgPool, sqlx::Error> {
        sqlx::postgres::PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.postgres_url())
            .await
    }
}

/// Change notifier settings.
#[derive(TypedBuilder, Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifierConfig {
    /// How many notifications a slow subscriber may fall behind before it starts losing them.
    #[builder(default = DEFAULT_NOTIFIER_CAPACITY)]
    pub capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_NOTIFIER_CAPACITY,
        }
    }
}
