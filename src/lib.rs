// ME3 Manager - profile and mod-state engine for the ME3 mod loader
//
// This is the library crate containing the profile format, the mod registry and
// the profile lifecycle. The binary crate (main.rs) is a thin startup driver.

pub mod config;
pub mod logging;
pub mod models;
pub mod paths;
pub mod profile;
pub mod services;

// Re-export commonly used types for convenience
pub use config::{CatalogError, ConfigContext};
pub use models::{Game, ModKind, ModRecord, ModStatus, Profile, ProfileDocument, Settings};
pub use profile::{ProfileStore, ProfileWriter, SchemaMigrator};
pub use services::{ModRegistry, ProfileError, ProfileManager, RegistryError};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
