//! Scoring engine for venue consumption patterns.
//!
//! A *pattern* is a per-venue baseline profile (sales per diner, standard
//! deviation, per-product-tag presence and ratio) against which a trailing
//! week of pre-aggregated sales is scored. The crate derives per-tag metrics,
//! ranks waiters on two axes, classifies overall performance, and assembles
//! the numeric [`patterns::report::PatternReport`] consumed by an external
//! rendering layer. Storage, aggregation, and directory lookups are
//! collaborator traits so the engine can be exercised in isolation.

pub mod config;
pub mod error;
pub mod patterns;
pub mod telemetry;

pub use error::AppError;
