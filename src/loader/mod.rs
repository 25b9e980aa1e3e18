//! Lead loading from the API or from disk.

pub mod client;

pub use client::*;
