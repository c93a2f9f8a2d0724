//! # Medlab
//!
//! Quality analysis jobs and faceted search over a medicine sample catalog.
//!
//! Items are registered Pending, analysed on background jobs that publish
//! 0→100 progress, and become Completed with a quality score, a quality
//! tier, a confidence, and four quality parameters. The catalog can be
//! searched by text or by an image (through a recognizer), narrowed by
//! category, quality tier, manufacturer, and status facets.
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────┐
//!   create/get ─▶│ CatalogStore │◀──── search (read only)
//!                └──────▲───────┘
//!                       │ update (atomic)
//!                ┌──────┴───────┐
//!   start/cancel▶│  JobManager  │── watch ──▶ JobHandle (poll / wait)
//!                └──────────────┘
//!                       │
//!                       ▼
//!                    Summary
//! ```
//!
//! The store, the search engine, and the report live in `medlab-core`;
//! this crate adds the async job manager, configuration, the CLI, and the
//! HTTP server.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`jobs`] | Analysis job manager |
//! | [`recognition`] | Simulated image recognizer |
//! | [`service`] | Facade shared by the CLI and the server |
//! | [`catalog`] | Seeding the catalog from config |
//! | [`progress`] | Job progress on stderr |
//! | [`stats`] | Human-readable listings |
//! | [`server`] | JSON HTTP API |

pub mod catalog;
pub mod config;
pub mod jobs;
pub mod progress;
pub mod recognition;
pub mod server;
pub mod service;
pub mod stats;
