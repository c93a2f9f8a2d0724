//! # medlab Core
//!
//! Shared, runtime-free logic for medlab: catalog data models, the store
//! abstraction, analysis metric generation, the faceted search engine,
//! the recognition seam, and the aggregation report.
//!
//! This crate contains no tokio, networking, or filesystem I/O. Job
//! scheduling, configuration, and the HTTP service live in the `medlab`
//! application crate.

pub mod analysis;
pub mod error;
pub mod models;
pub mod recognition;
pub mod report;
pub mod search;
pub mod store;

pub use error::{CatalogError, CatalogResult};
