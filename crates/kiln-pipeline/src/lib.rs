//! Asset pipeline for kiln.
//!
//! Compiles templates, stylesheets, scripts and images from a fixed source
//! tree into a static output directory, in development or production mode.

pub mod cache;
pub mod config;
pub mod layout;
pub mod notifier;
pub mod pipeline;
pub mod tasks;

pub use config::{BuildMode, ConfigError, SiteConfig};
pub use layout::{is_partial, AssetClass, CleanTarget, Layout};
pub use notifier::Notifier;
pub use pipeline::{BuildResult, Pipeline};
pub use tasks::clean::CleanReport;
pub use tasks::{TaskError, TaskReport};
