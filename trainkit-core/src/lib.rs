//! # trainkit-core — utilities around a generative-model training loop
//!
//! - [`shard`] splits a batch of named tensors across accelerators.
//! - [`grid`] and [`image_io`] tile sample images into one preview and save it.
//! - [`run`], [`persist`] and [`snapshot`] keep each run's directory, configs
//!   and source code together for later reproduction.
//! - [`config`] and [`logging`] carry the layered settings and tracing setup.

// Core
pub mod device;
pub mod grid;
pub mod image_io;
pub mod shard;

// Run bookkeeping
pub mod persist;
pub mod run;
pub mod snapshot;

// Foundation
pub mod config;
pub mod error;
pub mod logging;

// Re-exports
pub use config::{load_config, TrainkitConfig};
pub use device::{DeviceProvider, StaticDevices, SystemDevices, HOST_DEVICE};
pub use error::{Error, Result};
pub use grid::{compose_grid, stack_images, GridLayout, GridOptions};
pub use image_io::{load_grid, save_grid, save_images};
pub use logging::{init_logging, LoggingOptions};
pub use persist::{load_saved_config, save_config, ConfigBundle, DEFAULT_CONFIG_NAME};
pub use run::{model_name, prepare_run, prepare_run_now, RunPaths, RunSettings};
pub use shard::{distribute, Shard, ShardedBatch, TensorMap};
pub use snapshot::{snapshot_source_tree, SnapshotReport, SnapshotRules};
