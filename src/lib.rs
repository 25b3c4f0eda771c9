//! Synchronizes photo/video album membership across independently
//! operated media-server instances.
//!
//! Content identity is the server-reported checksum. For each asset, an
//! instance either already has the bytes (in which case the engine
//! re-links the asset it already stores) or it doesn't (in which case the
//! engine downloads from a source that has it and uploads to the target).
//! See `sync::sync_assets` for the entry point.

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod index;
pub mod models;
pub mod presence;
pub mod progress;
pub mod reconcile;
pub mod sync;

pub use error::{Result, SyncError};
pub use sync::{sync_assets, sync_assets_with, SyncOptions};
