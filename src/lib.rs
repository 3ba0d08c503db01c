//! Keeps a paginated, filterable gallery grid in sync with a media library.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod runtime;
pub mod store;
pub mod sync;

pub use config::{GalleryConfig, LiveCameraPolicy};
pub use error::{GalleryError, StoreError};
