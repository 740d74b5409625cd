pub mod cache;
pub mod engine;
pub mod media;
pub mod observability;
