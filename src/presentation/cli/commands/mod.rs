pub mod clear_cache;
pub mod correlate;
pub mod daemon;
pub mod export;
pub mod ingest;
pub mod monitor;
