//! Analysis modules.
//!
//! Pure computations over a snapshot of normalized leads: the analytics
//! aggregator and the table pipeline.

pub mod aggregator;
pub mod table;

pub use aggregator::*;
pub use table::*;
