//! Offline-first storefront cache and sync layer.
//!
//! - [`storage`]: key/value media (in-memory, SQLite) with change watches
//! - [`cache`]: per-category listing snapshots and the fetch coordinator
//! - [`wishlist`]: persisted favorites with live change signals
//! - [`notify`]: same-document and cross-context change delivery
//! - [`search`]: debounced, last-request-wins product search
//!
//! The terminal front end in [`app`] and [`ui`] is built on top of these.

pub mod app;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod event;
pub mod logging;
pub mod notify;
pub mod search;
pub mod storage;
pub mod ui;
pub mod wishlist;
