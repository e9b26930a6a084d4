//! Configuration management for the clearance proxy
//!
//! This module handles loading and managing configuration settings
//! from defaults, a TOML file, and environment variable overrides.

pub mod settings;

pub use settings::Settings;
