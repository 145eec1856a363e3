/// Contract roster loading from config.toml and database seeding
pub mod contracts;

/// Database configuration, connection, and schema creation
pub mod database;

/// Cycle schedule settings from environment variables
pub mod schedule;
