// Build-time identity, baked in from Cargo.toml

/// Crate name, for the startup log line.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
