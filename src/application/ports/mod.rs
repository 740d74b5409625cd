mod content_cache;
mod media_fetcher;
mod transcriber;

pub use content_cache::{CacheError, ContentCache};
pub use media_fetcher::{FetchRequest, MediaFetchError, MediaFetcher};
pub use transcriber::{EngineError, EngineLoader, GenerateOptions, RecognitionResult, Transcriber};
