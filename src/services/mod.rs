pub mod fetcher;
pub mod matrix;
pub mod orchestrator;
pub mod probe;
pub mod snapshot;
