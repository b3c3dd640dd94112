//! Redis connection
//!
//! Connected once at startup and shared through [`crate::state::AppState`];
//! `/health` reports whether it still answers.

use crate::config::RedisConfig;
use crate::error::AppError;
use redis::aio::MultiplexedConnection;
use tracing::info;

#[derive(Clone)]
pub struct Cache {
    conn: MultiplexedConnection,
}

impl Cache {
    pub async fn connect(config: &RedisConfig) -> Result<Self, AppError> {
        let client = redis::Client::open(connection_url(config)?)?;
        let conn = client.get_multiplexed_async_connection().await?;

        let cache = Self { conn };
        cache.ping().await?;
        info!("✅ Connected to Redis");
        Ok(cache)
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// `REDIS_URL` with `REDIS_PASSWORD` applied when the URL carries none
fn connection_url(config: &RedisConfig) -> Result<String, AppError> {
    let mut url = url::Url::parse(&config.url)
        .map_err(|e| AppError::Config(format!("Invalid REDIS_URL: {}", e)))?;

    if let Some(password) = &config.password {
        if url.password().is_none() {
            url.set_password(Some(password))
                .map_err(|_| AppError::Config("REDIS_URL cannot carry a password".to_string()))?;
        }
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_is_applied() {
        let config = RedisConfig {
            url: "redis://localhost:6379".to_string(),
            password: Some("s3cret".to_string()),
        };
        assert_eq!(connection_url(&config).unwrap(), "redis://:s3cret@localhost:6379");
    }

    #[test]
    fn test_url_password_wins() {
        let config = RedisConfig {
            url: "redis://:inline@cache:6380/2".to_string(),
            password: Some("ignored".to_string()),
        };
        assert_eq!(connection_url(&config).unwrap(), "redis://:inline@cache:6380/2");
    }

    #[test]
    fn test_invalid_url() {
        let config = RedisConfig {
            url: "not a url".to_string(),
            password: None,
        };
        assert!(matches!(connection_url(&config), Err(AppError::Config(_))));
    }
}
