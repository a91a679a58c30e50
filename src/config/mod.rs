//! Configuration module for Patchwise
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use patchwise::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("patchwise.toml")).unwrap();
//! println!("Hosts processed concurrently: {}", config.batch.max_workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BatchConfig, BrowserConfig, Config, FetchConfig, OutputConfig, QualityConfig, RetryConfig,
    VendorApiConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, hash_content, load_config, load_config_with_hash, parse_config,
};
