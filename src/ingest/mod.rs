//! Ingestion of raw lead payloads.

pub mod normalizer;

pub use normalizer::*;
