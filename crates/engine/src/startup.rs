// Wiring from config to live collaborators: SQLite cache and HTTP service.

use anyhow::{Context, Result};
use tracing::info;

use crate::cache::store::SqliteStore;
use crate::cache::TermDataCache;
use crate::config::{CacheConfig, ServiceConfig};
use crate::service::HttpTermService;

/// Open the SQLite-backed term cache named by `config`.
pub fn open_cache(config: &CacheConfig) -> Result<TermDataCache<SqliteStore>> {
    let path = config.resolved_path().context("could not determine home directory for cache")?;
    let store = SqliteStore::open(&path)
        .with_context(|| format!("failed to open term cache at {}", path.display()))?;
    info!(path = %path.display(), "term cache opened");
    Ok(TermDataCache::new(store))
}

/// Build the HTTP term service client.
pub fn connect_service(config: &ServiceConfig) -> Result<HttpTermService> {
    HttpTermService::new(&config.base_url, &config.user_scope, config.timeout())
        .with_context(|| format!("invalid service configuration for {}", config.base_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use termlight_common::types::Term;

    #[test]
    fn open_cache_creates_database() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig { path: Some(dir.path().join("state").join("cache.db")), ttl_sec: 300 };

        let cache = open_cache(&config).unwrap();
        cache.write(&[Term::new("1", "cat", "gato")]).unwrap();
        drop(cache);

        let reopened = open_cache(&config).unwrap();
        assert_eq!(reopened.read(config.ttl()).unwrap().unwrap().len(), 1);
    }

    #[test]
    fn connect_service_rejects_bad_url() {
        let config = ServiceConfig { base_url: "ftp://example.com".into(), ..ServiceConfig::default() };
        let err = connect_service(&config).unwrap_err();
        assert!(err.to_string().contains("ftp://example.com"));
    }

    #[test]
    fn connect_service_accepts_default() {
        assert!(connect_service(&ServiceConfig::default()).is_ok());
    }
}
