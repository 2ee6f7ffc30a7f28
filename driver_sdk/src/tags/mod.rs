pub mod cache;
pub mod engine;
pub mod ingest;
pub mod range;
pub mod scaler;
pub mod structures;
