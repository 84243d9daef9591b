/// Database configuration and connection management
pub mod database;

/// Bot owner configuration from environment variables
pub mod owners;

/// Bot settings loading from config.toml
pub mod settings;
