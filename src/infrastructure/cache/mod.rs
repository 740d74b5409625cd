mod cache_factory;
mod disabled_cache;
mod file_cache;

pub use cache_factory::ContentCacheFactory;
pub use disabled_cache::DisabledContentCache;
pub use file_cache::{FileContentCache, TRANSCRIPT_DIR};
