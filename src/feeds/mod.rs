//! Feed ingestion.
//!
//! Collection follows a two-phase pattern per source:
//!
//! 1. **Fetching**: Download the RSS/Atom document with a bounded timeout
//! 2. **Admitting**: Parse entries, drop the unusable or excluded ones, and
//!    stop at the per-source cap
//!
//! # Submodules
//!
//! - [`rss`]: Event-driven RSS/Atom entry parser
//! - [`collector`]: Concurrent, order-preserving collection across sources

pub mod collector;
pub mod rss;

pub use collector::collect;
