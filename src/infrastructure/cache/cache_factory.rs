use std::path::PathBuf;
use std::sync::Arc;

use crate::application::ports::{CacheError, ContentCache};
use crate::presentation::config::CacheSettings;

use super::disabled_cache::DisabledContentCache;
use super::file_cache::FileContentCache;

pub struct ContentCacheFactory;

impl ContentCacheFactory {
    pub fn create(settings: &CacheSettings) -> Result<Arc<dyn ContentCache>, CacheError> {
        if !settings.enabled {
            tracing::info!("Content cache disabled");
            return Ok(Arc::new(DisabledContentCache));
        }

        let cache = FileContentCache::new(PathBuf::from(&settings.dir), settings.ttl())?;
        Ok(Arc::new(cache))
    }
}
